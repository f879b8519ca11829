//! Reprojection of whole shapes between coordinate reference systems.
//!
//! Point math is delegated to a [`PointReprojector`]; this module owns
//! clipping at poles and at the target's seam, dropping of vertices that
//! fail, and the rules deciding when a shape has no image at all.

mod angle;
pub mod clip;

pub use angle::{normalize_angle, reproject_angle};

use crate::config::EngineConfig;
use crate::crs::{Crs, PointReprojector};
use crate::geo::{is_finite_point, Point};
use crate::map::Extent;
use crate::shape::{
    close_ring, ring_vertex_count, EllipseShape, PointShape, Polygon, PolygonShape, Polyline,
    Shape,
};
use clip::{clip_line_to_lat, clip_ring_to_lat, split_line_at_lon, split_ring_at_lon};

/// Shape-level reprojection with the engine's clipping and failure policy
pub struct ShapeReprojector<'a, R: PointReprojector + ?Sized> {
    reprojector: &'a R,
    config: &'a EngineConfig,
}

impl<'a, R: PointReprojector + ?Sized> ShapeReprojector<'a, R> {
    pub fn new(reprojector: &'a R, config: &'a EngineConfig) -> Self {
        Self {
            reprojector,
            config,
        }
    }

    /// Reproject one shape. `None` means the shape has no valid
    /// representation in `to` and should be left out of the output.
    pub fn reproject(&self, shape: &Shape, from: &Crs, to: &Crs) -> Option<Shape> {
        if from == to {
            return Some(shape.clone());
        }
        let out = match shape {
            Shape::Point(p) => self.reproject_point_shape(p, from, to).map(Shape::Point),
            Shape::Polyline(l) => self.reproject_polyline(l, from, to).map(Shape::Polyline),
            Shape::Polygon(p) => self.reproject_polygon(p, from, to).map(Shape::Polygon),
            Shape::Circle(e) => self.reproject_ellipse(e, from, to, true).map(Shape::Circle),
            Shape::Ellipse(e) => self.reproject_ellipse(e, from, to, false).map(Shape::Ellipse),
        };
        if out.is_none() {
            log::debug!(
                "{} has no image in {}, dropped",
                shape.kind(),
                to.definition()
            );
        }
        out
    }

    /// Source-space clipping applies only when going from lon/lat to a
    /// projected CRS; elsewhere the seam is not expressed in longitudes.
    fn clips(&self, from: &Crs, to: &Crs) -> bool {
        from.is_geographic() && !to.is_geographic()
    }

    /// Reproject a run of points, dropping the ones without an image
    fn reproject_run(&self, points: &[Point], from: &Crs, to: &Crs) -> Vec<Point> {
        self.reprojector
            .reproject_points(points, from, to)
            .into_iter()
            .flatten()
            .filter(|p| is_finite_point(*p))
            .collect()
    }

    fn reproject_point_shape(&self, shape: &PointShape, from: &Crs, to: &Crs) -> Option<PointShape> {
        let point = self
            .reprojector
            .reproject_point(shape.point, from, to)
            .filter(|p| is_finite_point(*p))?;
        let angle = shape.angle.map(|a| {
            reproject_angle(
                a,
                shape.point,
                point,
                from,
                to,
                self.reprojector,
                self.config.angle_sample_step,
            )
        });
        Some(PointShape { point, angle })
    }

    fn line_pieces(&self, part: &[Point], from: &Crs, to: &Crs) -> Vec<Vec<Point>> {
        if !self.clips(from, to) {
            return vec![part.to_vec()];
        }
        let mut pieces = match self.config.pole_limits_for(to.family_name()) {
            Some(limits) => clip_line_to_lat(part, limits),
            None => vec![part.to_vec()],
        };
        if let Some(cut) = to.reference_cut_longitude() {
            let eps = self.config.cut_epsilon;
            pieces = pieces
                .iter()
                .flat_map(|piece| split_line_at_lon(piece, cut, eps))
                .collect();
        }
        pieces
    }

    fn ring_pieces(&self, ring: &[Point], from: &Crs, to: &Crs) -> Vec<Vec<Point>> {
        if !self.clips(from, to) {
            return vec![ring.to_vec()];
        }
        let clipped = match self.config.pole_limits_for(to.family_name()) {
            Some(limits) => match clip_ring_to_lat(ring, limits) {
                Some(r) => r,
                None => return Vec::new(),
            },
            None => ring.to_vec(),
        };
        match to.reference_cut_longitude() {
            Some(cut) => split_ring_at_lon(&clipped, cut, self.config.cut_epsilon),
            None => vec![clipped],
        }
    }

    fn reproject_polyline(&self, line: &Polyline, from: &Crs, to: &Crs) -> Option<Polyline> {
        let mut parts = Vec::new();
        for part in line.parts() {
            for piece in self.line_pieces(part, from, to) {
                let projected = self.reproject_run(&piece, from, to);
                if projected.len() >= 2 {
                    parts.push(projected);
                } else {
                    log::trace!("polyline part collapsed to {} points", projected.len());
                }
            }
        }
        Polyline::new(parts)
    }

    /// Reproject the vertices of a closed ring and re-close it.
    /// `None` when fewer than three vertices survive.
    fn reproject_ring(&self, ring: &[Point], from: &Crs, to: &Crs) -> Option<Vec<Point>> {
        let n = ring_vertex_count(ring);
        let mut projected = self.reproject_run(&ring[..n], from, to);
        if projected.len() > 1 && projected.first() == projected.last() {
            projected.pop();
        }
        if projected.len() < 3 {
            return None;
        }
        close_ring(&mut projected);
        Some(projected)
    }

    fn reproject_polygon(&self, shape: &PolygonShape, from: &Crs, to: &Crs) -> Option<PolygonShape> {
        let mut parts = Vec::new();
        for polygon in shape.parts() {
            let outers = self.ring_pieces(polygon.outer(), from, to);
            let holes: Vec<Vec<Point>> = polygon
                .holes()
                .iter()
                .flat_map(|h| self.ring_pieces(h, from, to))
                .collect();

            for outer in &outers {
                // Outer ring first: if it collapses, its holes go with it
                let Some(projected_outer) = self.reproject_ring(outer, from, to) else {
                    log::trace!("outer ring collapsed");
                    continue;
                };
                let outer_extent = Extent::from_points(outer.iter());
                let projected_holes = holes
                    .iter()
                    .filter(|h| {
                        outers.len() == 1
                            || match (outer_extent, h.first()) {
                                (Some(ext), Some(&first)) => ext.contains(first),
                                _ => false,
                            }
                    })
                    .filter_map(|h| self.reproject_ring(h, from, to))
                    .collect();
                if let Some(p) = Polygon::new(projected_outer, projected_holes) {
                    parts.push(p);
                }
            }
        }
        PolygonShape::new(parts)
    }

    /// Whether a copy of the target's cut longitude falls in `(a, b]`,
    /// i.e. the segment from `a` to `b` lands on both map edges
    fn crosses_cut(&self, a: f64, b: f64, from: &Crs, to: &Crs) -> bool {
        if !self.clips(from, to) {
            return false;
        }
        match to.reference_cut_longitude() {
            Some(cut) => {
                let next = cut + 360.0 * (((a - cut) / 360.0).floor() + 1.0);
                next <= b
            }
            None => false,
        }
    }

    /// Rebuild the four extrema around the reprojected center. The radius
    /// comes from the reprojected east extremum, or from the west or north
    /// one when the seam lies between it and the center; an ellipse keeps
    /// its axis ratio.
    fn reproject_ellipse(
        &self,
        shape: &EllipseShape,
        from: &Crs,
        to: &Crs,
        circle: bool,
    ) -> Option<EllipseShape> {
        let center = shape.center();
        let [west, north, east, _] = *shape.points();
        let (sample, horizontal) = if !self.crosses_cut(center.x, east.x, from, to) {
            (east, true)
        } else if !self.crosses_cut(west.x, center.x, from, to) {
            (west, true)
        } else {
            (north, false)
        };
        let projected = self.reprojector.reproject_points(&[center, sample], from, to);
        let new_center = projected.first().copied().flatten().filter(|p| is_finite_point(*p))?;
        let new_sample = projected.get(1).copied().flatten().filter(|p| is_finite_point(*p))?;

        let radius = new_center.distance(new_sample);
        if !radius.is_finite() {
            return None;
        }
        if circle {
            return Some(EllipseShape::circle(new_center, radius));
        }
        let (rx, ry) = (shape.radius_x(), shape.radius_y());
        let (new_rx, new_ry) = match (horizontal, rx > 0.0, ry > 0.0) {
            (true, true, _) => (radius, ry * radius / rx),
            (false, _, true) => (rx * radius / ry, radius),
            _ => (radius, radius),
        };
        Some(EllipseShape::new(new_center, new_rx, new_ry))
    }
}
