use std::f64::consts::TAU;

use crate::config::{AnnotationSettings, EngineConfig};
use crate::crs::{Crs, PointReprojector, SphericalReprojector};
use crate::geo::Point;
use crate::layer::{self, reproject_indexed, Feature, ReprojectStats, VectorLayer};
use crate::map::extent::Extent;
use crate::map::placement::{place, AnnotationCandidate, PlacementCache};
use crate::map::projection::ScreenTransform;
use crate::map::spatial::FeatureGrid;
use crate::map::viewport::ViewState;
use crate::map::wrap::visible_shifts;
use crate::reproject::ShapeReprojector;
use crate::shape::{EllipseShape, Polygon, PolygonShape, Polyline, Shape};

/// Segments used to outline circles and ellipses
const ELLIPSE_SEGMENTS: usize = 48;

/// Finest graticule spacing in degrees
pub const MIN_GRATICULE_SPACING: f64 = 0.1;

/// Collection a frame item was produced from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Vector(usize),
    Graticule,
    Graphics,
}

/// Raster layer; only its footprint takes part in planning
#[derive(Clone, Debug, PartialEq)]
pub struct ImageLayer {
    pub name: String,
    pub crs: Crs,
    pub extent: Extent,
}

/// Longitude/latitude grid generated at a fixed spacing in degrees
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Graticule {
    pub spacing: f64,
}

impl Graticule {
    pub fn new(spacing: f64) -> Self {
        Self { spacing }
    }

    /// Meridians and parallels as lon/lat polylines. Lines are densified
    /// to one vertex per degree so they bend under reprojection. Spacings
    /// below [`MIN_GRATICULE_SPACING`] produce no lines.
    pub fn to_layer(&self) -> VectorLayer {
        let mut grid = VectorLayer::new("graticule", Crs::lon_lat());
        if !(self.spacing.is_finite() && self.spacing >= MIN_GRATICULE_SPACING) {
            log::warn!("graticule spacing {} rejected", self.spacing);
            return grid;
        }

        let lats: Vec<f64> = (0..=180).map(|i| -90.0 + i as f64).collect();
        let lons: Vec<f64> = (0..=360).map(|i| -180.0 + i as f64).collect();

        let meridians = (360.0 / self.spacing + 1e-9).floor() as usize;
        for i in 0..=meridians {
            let lon = -180.0 + i as f64 * self.spacing;
            let line: Vec<Point> = lats.iter().map(|&lat| Point::new(lon, lat)).collect();
            if let Some(l) = Polyline::new(vec![line]) {
                grid.push(Feature::new(Shape::Polyline(l)));
            }
        }

        let parallels = (180.0 / self.spacing - 1e-9).ceil() as usize;
        for i in 1..parallels {
            let lat = -90.0 + i as f64 * self.spacing;
            let line: Vec<Point> = lons.iter().map(|&lon| Point::new(lon, lat)).collect();
            if let Some(l) = Polyline::new(vec![line]) {
                grid.push(Feature::new(Shape::Polyline(l)));
            }
        }
        grid
    }
}

/// Display settings for map layers
#[derive(Clone, Debug, PartialEq)]
pub struct DisplaySettings {
    pub show_images: bool,
    pub show_graticule: bool,
    pub show_vectors: bool,
    pub show_graphics: bool,
    pub show_labels: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_images: true,
            show_graticule: true,
            show_vectors: true,
            show_graphics: true,
            show_labels: true,
        }
    }
}

/// Polyline or ring in screen pixels
#[derive(Clone, Debug, PartialEq)]
pub struct ScreenPath {
    pub source: Source,
    /// Index of the feature in its source layer
    pub feature: usize,
    pub shift: f64,
    pub points: Vec<Point>,
    pub closed: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImageRect {
    pub layer: usize,
    pub shift: f64,
    pub rect: Extent,
}

/// Point symbol (and label) that survived collision avoidance
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedAnnotation {
    pub source: Source,
    pub feature: usize,
    pub anchor: Point,
    pub angle: Option<f64>,
    pub label: Option<String>,
    /// Screen box claimed by the symbol and its label
    pub bbox: Extent,
}

/// Everything a painter needs for one frame, in paint order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FramePlan {
    pub images: Vec<ImageRect>,
    pub paths: Vec<ScreenPath>,
    pub annotations: Vec<PlacedAnnotation>,
    /// Annotations rejected by collision avoidance
    pub suppressed: usize,
}

/// Result of a hit test
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    pub source: Source,
    pub feature: usize,
    pub shift: f64,
}

/// Display-CRS copy of a layer with per-feature extents and a spatial index
#[derive(Clone, Debug)]
struct DisplayLayer {
    /// Source index of each surviving feature
    indices: Vec<usize>,
    features: Vec<Feature>,
    extents: Vec<Extent>,
    grid: FeatureGrid,
    avoid_collision: bool,
}

impl DisplayLayer {
    fn build<R: PointReprojector + ?Sized>(
        layer: &VectorLayer,
        to: &Crs,
        reprojector: &R,
        config: &EngineConfig,
    ) -> Self {
        let (indices, features): (Vec<usize>, Vec<Feature>) =
            reproject_indexed(layer, to, reprojector, config)
                .into_iter()
                .unzip();
        let extents: Vec<Extent> = features.iter().map(|f| f.shape.extent()).collect();
        let grid = FeatureGrid::build_auto(&extents, config.grid_cells_per_axis);
        Self {
            indices,
            features,
            extents,
            grid,
            avoid_collision: layer.avoid_collision,
        }
    }

    /// Positions of features that may show in `draw`, including the
    /// copies one world to either side in geographic mode
    fn candidates(&self, draw: &Extent, geographic: bool) -> Vec<usize> {
        let mut hits = Vec::new();
        self.grid.query_into(draw, &mut hits);
        if geographic {
            self.grid.query_into(&draw.shift_x(360.0), &mut hits);
            self.grid.query_into(&draw.shift_x(-360.0), &mut hits);
        }
        hits.sort_unstable();
        hits.dedup();
        hits
    }
}

/// Annotation awaiting the placement decision
struct Pending {
    annotation: PlacedAnnotation,
    managed: bool,
}

/// Turns layers into screen-space frame plans for a given view.
///
/// Source layers stay in their own CRS; display copies in the display CRS
/// are rebuilt whenever a layer or the display CRS changes.
pub struct MapRenderer<R: PointReprojector = SphericalReprojector> {
    reprojector: R,
    config: EngineConfig,
    display_crs: Crs,
    layers: Vec<VectorLayer>,
    display: Vec<DisplayLayer>,
    images: Vec<ImageLayer>,
    image_extents: Vec<Option<Extent>>,
    graticule: Option<(Graticule, DisplayLayer)>,
    graphics: VectorLayer,
    graphics_display: DisplayLayer,
    settings: DisplaySettings,
    placement: PlacementCache,
}

impl MapRenderer<SphericalReprojector> {
    pub fn new(display_crs: Crs, config: EngineConfig) -> Self {
        Self::with_reprojector(SphericalReprojector, display_crs, config)
    }
}

impl<R: PointReprojector> MapRenderer<R> {
    pub fn with_reprojector(reprojector: R, display_crs: Crs, config: EngineConfig) -> Self {
        let graphics = VectorLayer::new("graphics", display_crs.clone());
        let graphics_display = DisplayLayer::build(&graphics, &display_crs, &reprojector, &config);
        Self {
            reprojector,
            config,
            display_crs,
            layers: Vec::new(),
            display: Vec::new(),
            images: Vec::new(),
            image_extents: Vec::new(),
            graticule: None,
            graphics,
            graphics_display,
            settings: DisplaySettings::default(),
            placement: PlacementCache::new(),
        }
    }

    pub fn display_crs(&self) -> &Crs {
        &self.display_crs
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn settings(&self) -> &DisplaySettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: DisplaySettings) {
        self.settings = settings;
        self.placement.invalidate();
    }

    pub fn layers(&self) -> &[VectorLayer] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&VectorLayer> {
        self.layers.get(index)
    }

    /// Append a vector layer on top of the others; returns its index
    pub fn add_layer(&mut self, layer: VectorLayer) -> usize {
        let display = self.build_display(&layer);
        self.layers.push(layer);
        self.display.push(display);
        self.placement.invalidate();
        self.layers.len() - 1
    }

    pub fn remove_layer(&mut self, index: usize) -> Option<VectorLayer> {
        if index >= self.layers.len() {
            return None;
        }
        self.display.remove(index);
        self.placement.invalidate();
        Some(self.layers.remove(index))
    }

    /// Destructively move a layer into another CRS
    pub fn change_layer_crs(&mut self, index: usize, to: &Crs) -> Option<ReprojectStats> {
        let target = self.layers.get_mut(index)?;
        let stats = layer::change_layer_crs(target, to, &self.reprojector, &self.config);
        self.refresh_layer(index);
        Some(stats)
    }

    /// Undo [`MapRenderer::change_layer_crs`] for one layer
    pub fn restore_layer(&mut self, index: usize) -> bool {
        let restored = self
            .layers
            .get_mut(index)
            .map_or(false, |l| l.restore_original());
        if restored {
            self.refresh_layer(index);
        }
        restored
    }

    fn refresh_layer(&mut self, index: usize) {
        if let Some(layer) = self.layers.get(index) {
            let display = self.build_display(layer);
            self.display[index] = display;
            self.placement.invalidate();
        }
    }

    pub fn add_image(&mut self, image: ImageLayer) -> usize {
        let extent = self.image_display_extent(&image);
        self.images.push(image);
        self.image_extents.push(extent);
        self.images.len() - 1
    }

    pub fn images(&self) -> &[ImageLayer] {
        &self.images
    }

    /// Show a graticule at `spacing` degrees, or hide it with `None`
    pub fn set_graticule(&mut self, spacing: Option<f64>) {
        self.graticule = spacing.map(|s| {
            let g = Graticule::new(s);
            let display = self.build_display(&g.to_layer());
            (g, display)
        });
    }

    pub fn graticule(&self) -> Option<Graticule> {
        self.graticule.as_ref().map(|(g, _)| *g)
    }

    /// Replace the free-floating graphic collection
    pub fn set_graphics(&mut self, graphics: VectorLayer) {
        self.graphics_display = self.build_display(&graphics);
        self.graphics = graphics;
        self.placement.invalidate();
    }

    pub fn add_graphic(&mut self, feature: Feature) {
        self.graphics.push(feature);
        self.graphics_display = self.build_display(&self.graphics);
        self.placement.invalidate();
    }

    pub fn graphics(&self) -> &VectorLayer {
        &self.graphics
    }

    /// Switch the display CRS. Sources are untouched; every display copy
    /// is rebuilt from them.
    pub fn set_display_crs(&mut self, crs: Crs) {
        if crs == self.display_crs {
            return;
        }
        self.display_crs = crs;
        self.display = self.layers.iter().map(|l| self.build_display(l)).collect();
        self.image_extents = self
            .images
            .iter()
            .map(|i| self.image_display_extent(i))
            .collect();
        if let Some((g, _)) = self.graticule {
            let display = self.build_display(&g.to_layer());
            self.graticule = Some((g, display));
        }
        self.graphics_display = self.build_display(&self.graphics);
        self.placement.invalidate();
    }

    fn build_display(&self, layer: &VectorLayer) -> DisplayLayer {
        DisplayLayer::build(layer, &self.display_crs, &self.reprojector, &self.config)
    }

    /// Footprint of an image in the display CRS, traced along its edges
    fn image_display_extent(&self, image: &ImageLayer) -> Option<Extent> {
        if image.crs == self.display_crs {
            return Some(image.extent);
        }
        let e = image.extent;
        let steps = 8;
        let mut ring = Vec::with_capacity(steps * 4);
        for i in 0..steps {
            let t = i as f64 / steps as f64;
            ring.push(Point::new(e.min_x + t * e.width(), e.min_y));
        }
        for i in 0..steps {
            let t = i as f64 / steps as f64;
            ring.push(Point::new(e.max_x, e.min_y + t * e.height()));
        }
        for i in 0..steps {
            let t = i as f64 / steps as f64;
            ring.push(Point::new(e.max_x - t * e.width(), e.max_y));
        }
        for i in 0..steps {
            let t = i as f64 / steps as f64;
            ring.push(Point::new(e.min_x, e.max_y - t * e.height()));
        }
        let outline = Shape::Polygon(PolygonShape::single(Polygon::new(ring, Vec::new())?));
        ShapeReprojector::new(&self.reprojector, &self.config)
            .reproject(&outline, &image.crs, &self.display_crs)
            .map(|s| s.extent())
    }

    /// Plan a frame, running collision avoidance from scratch
    pub fn plan_frame(&mut self, view: &ViewState) -> FramePlan {
        self.plan(view, None)
    }

    /// Plan a frame, reusing the last placement while the view epoch is unchanged
    pub fn plan_frame_cached(&mut self, view: &ViewState, epoch: u64) -> FramePlan {
        self.plan(view, Some(epoch))
    }

    fn plan(&mut self, view: &ViewState, epoch: Option<u64>) -> FramePlan {
        let t = view.transform();
        let draw = view.draw_extent;
        let mut plan = FramePlan::default();
        let mut pending = Vec::new();
        let labels = self.settings.show_labels;
        let style = &self.config.annotation;

        if self.settings.show_images {
            for (i, ext) in self.image_extents.iter().enumerate() {
                let Some(ext) = ext else { continue };
                for shift in visible_shifts(ext, &draw, view.geographic).iter() {
                    plan.images.push(ImageRect {
                        layer: i,
                        shift,
                        rect: t.project_extent(ext, shift),
                    });
                }
            }
        }

        if self.settings.show_graticule {
            if let Some((_, grid)) = &self.graticule {
                plan_layer(Source::Graticule, grid, view, &t, style, labels, &mut plan, &mut pending);
            }
        }

        if self.settings.show_vectors {
            for (i, display) in self.display.iter().enumerate() {
                plan_layer(Source::Vector(i), display, view, &t, style, labels, &mut plan, &mut pending);
            }
        }

        if self.settings.show_graphics {
            plan_layer(
                Source::Graphics,
                &self.graphics_display,
                view,
                &t,
                style,
                labels,
                &mut plan,
                &mut pending,
            );
        }

        let mut candidates: Vec<AnnotationCandidate> = pending
            .iter()
            .filter(|p| p.managed)
            .map(|p| AnnotationCandidate::new(p.annotation.bbox))
            .collect();
        match epoch {
            Some(e) => {
                self.placement.get_or_place(e, &mut candidates);
            }
            None => place(&mut candidates),
        }

        let mut decisions = candidates.iter().map(|c| c.visible);
        for p in pending {
            let visible = if p.managed {
                decisions.next().unwrap_or(false)
            } else {
                true
            };
            if visible {
                plan.annotations.push(p.annotation);
            } else {
                plan.suppressed += 1;
            }
        }
        plan
    }

    /// Features under a screen point, in paint order (last is topmost).
    /// Every world copy is tested in geographic mode.
    pub fn select_at(&self, view: &ViewState, sx: f64, sy: f64, tolerance_px: f64) -> Vec<Hit> {
        let t = view.transform();
        let cursor = Point::new(sx, sy);
        let symbol_half = self.config.annotation.symbol_size_px * 0.5;
        let reach = tolerance_px + symbol_half;
        let (mx, my) = t.unproject(sx, sy);
        // Unshifted model-space neighbourhood of the cursor. Copies are
        // found by testing each feature's shifts against it
        let query = Extent::around(
            Point::new(mx, my),
            reach / t.scale_x.abs(),
            reach / t.scale_y.abs(),
        );

        let mut layers: Vec<(Source, &DisplayLayer)> = Vec::new();
        if self.settings.show_vectors {
            for (i, d) in self.display.iter().enumerate() {
                layers.push((Source::Vector(i), d));
            }
        }
        if self.settings.show_graphics {
            layers.push((Source::Graphics, &self.graphics_display));
        }

        let mut hits: Vec<Hit> = Vec::new();
        for (source, display) in layers {
            for pos in display.candidates(&query, view.geographic) {
                let shape = &display.features[pos].shape;
                let shift = visible_shifts(&display.extents[pos], &query, view.geographic)
                    .iter()
                    .find(|&shift| hit_shape(shape, &t, shift, cursor, tolerance_px, symbol_half));
                if let Some(shift) = shift {
                    hits.push(Hit {
                        source,
                        feature: display.indices[pos],
                        shift,
                    });
                }
            }
        }
        hits
    }
}

#[allow(clippy::too_many_arguments)]
fn plan_layer(
    source: Source,
    display: &DisplayLayer,
    view: &ViewState,
    t: &ScreenTransform,
    style: &AnnotationSettings,
    labels: bool,
    plan: &mut FramePlan,
    pending: &mut Vec<Pending>,
) {
    let draw = view.draw_extent;
    for pos in display.candidates(&draw, view.geographic) {
        let feature = &display.features[pos];
        let index = display.indices[pos];
        for shift in visible_shifts(&display.extents[pos], &draw, view.geographic).iter() {
            match &feature.shape {
                Shape::Point(p) => {
                    let anchor = t.project_point(p.point, shift);
                    let label = feature.label.as_ref().filter(|l| labels && !l.is_empty());
                    pending.push(Pending {
                        annotation: PlacedAnnotation {
                            source,
                            feature: index,
                            anchor,
                            angle: p.angle,
                            label: label.cloned(),
                            bbox: annotation_box(anchor, label.map(|l| l.as_str()), style),
                        },
                        managed: display.avoid_collision,
                    });
                }
                Shape::Polyline(line) => {
                    for part in line.parts() {
                        plan.paths.push(screen_path(source, index, shift, part, t, false));
                    }
                }
                Shape::Polygon(polygon) => {
                    for part in polygon.parts() {
                        plan.paths.push(screen_path(source, index, shift, part.outer(), t, true));
                        for hole in part.holes() {
                            plan.paths.push(screen_path(source, index, shift, hole, t, true));
                        }
                    }
                }
                Shape::Circle(e) | Shape::Ellipse(e) => {
                    let outline = ellipse_outline(e);
                    plan.paths.push(screen_path(source, index, shift, &outline, t, true));
                }
            }

            // Labels of non-point shapes sit centered on the shape's extent
            if matches!(feature.shape, Shape::Point(_)) || !labels {
                continue;
            }
            if let Some(text) = feature.label.as_ref().filter(|l| !l.is_empty()) {
                let anchor = t.project_point(display.extents[pos].center(), shift);
                pending.push(Pending {
                    annotation: PlacedAnnotation {
                        source,
                        feature: index,
                        anchor,
                        angle: None,
                        label: Some(text.clone()),
                        bbox: text_box(anchor, text, style),
                    },
                    managed: display.avoid_collision,
                });
            }
        }
    }
}

/// Text box centered on the anchor
fn text_box(anchor: Point, text: &str, style: &AnnotationSettings) -> Extent {
    let w = style.char_width_px * text.chars().count() as f64;
    Extent::around(anchor, w * 0.5, style.char_height_px * 0.5)
}

fn screen_path(
    source: Source,
    feature: usize,
    shift: f64,
    points: &[Point],
    t: &ScreenTransform,
    closed: bool,
) -> ScreenPath {
    ScreenPath {
        source,
        feature,
        shift,
        points: project_all(points, t, shift),
        closed,
    }
}

fn project_all(points: &[Point], t: &ScreenTransform, shift: f64) -> Vec<Point> {
    points.iter().map(|&p| t.project_point(p, shift)).collect()
}

/// Symbol box centered on the anchor, widened by a label box to its right
fn annotation_box(anchor: Point, label: Option<&str>, style: &AnnotationSettings) -> Extent {
    let half = style.symbol_size_px * 0.5;
    let symbol = Extent::around(anchor, half, half);
    match label {
        Some(text) => {
            let x0 = anchor.x + half + style.label_offset_px;
            let w = style.char_width_px * text.chars().count() as f64;
            let h = style.char_height_px * 0.5;
            symbol.union(&Extent::new(x0, x0 + w, anchor.y - h, anchor.y + h))
        }
        None => symbol,
    }
}

/// Closed polygonal outline of an ellipse in map units
fn ellipse_outline(e: &EllipseShape) -> Vec<Point> {
    let c = e.center();
    let (rx, ry) = (e.radius_x(), e.radius_y());
    let mut pts: Vec<Point> = (0..ELLIPSE_SEGMENTS)
        .map(|i| {
            let a = TAU * i as f64 / ELLIPSE_SEGMENTS as f64;
            Point::new(c.x + rx * a.cos(), c.y + ry * a.sin())
        })
        .collect();
    if let Some(&first) = pts.first() {
        pts.push(first);
    }
    pts
}

#[inline(always)]
fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len2 = ab.length_squared();
    if len2 == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len2).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

/// Even-odd ray cast
fn ring_contains(ring: &[Point], p: Point) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn near_path(points: &[Point], p: Point, tol: f64) -> bool {
    points.windows(2).any(|w| segment_distance(p, w[0], w[1]) <= tol)
}

/// Screen-space hit test of one shape copy
fn hit_shape(
    shape: &Shape,
    t: &ScreenTransform,
    shift: f64,
    cursor: Point,
    tol: f64,
    symbol_half: f64,
) -> bool {
    match shape {
        Shape::Point(p) => t.project_point(p.point, shift).distance(cursor) <= tol + symbol_half,
        Shape::Polyline(line) => line
            .parts()
            .iter()
            .any(|part| near_path(&project_all(part, t, shift), cursor, tol)),
        Shape::Polygon(polygon) => polygon.parts().iter().any(|part| {
            let outer = project_all(part.outer(), t, shift);
            if near_path(&outer, cursor, tol) {
                return true;
            }
            ring_contains(&outer, cursor)
                && !part
                    .holes()
                    .iter()
                    .any(|h| ring_contains(&project_all(h, t, shift), cursor))
        }),
        Shape::Circle(e) | Shape::Ellipse(e) => {
            let c = t.project_point(e.center(), shift);
            let rx = e.radius_x() * t.scale_x.abs() + tol;
            let ry = e.radius_y() * t.scale_y.abs() + tol;
            let d = cursor - c;
            (d.x / rx).powi(2) + (d.y / ry).powi(2) <= 1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::viewport::fit;
    use crate::shape::PointShape;

    fn world_view(geographic: bool) -> ViewState {
        fit(
            Extent::new(-180.0, 180.0, -90.0, 90.0),
            360.0,
            180.0,
            geographic,
            1.0,
            &EngineConfig::default(),
        )
        .unwrap()
    }

    fn point(x: f64, y: f64) -> Feature {
        Feature::new(Shape::Point(PointShape::new(Point::new(x, y))))
    }

    fn line(points: &[(f64, f64)]) -> Feature {
        let pts = points.iter().map(|&(x, y)| Point::new(x, y)).collect();
        Feature::new(Shape::Polyline(Polyline::new(vec![pts]).unwrap()))
    }

    fn renderer() -> MapRenderer {
        MapRenderer::new(Crs::lon_lat(), EngineConfig::default())
    }

    #[test]
    fn test_paths_are_in_screen_space() {
        let mut r = renderer();
        r.add_layer(VectorLayer::with_features(
            "lines",
            Crs::lon_lat(),
            vec![line(&[(0.0, 0.0), (10.0, 10.0)])],
        ));
        let plan = r.plan_frame(&world_view(true));
        assert_eq!(plan.paths.len(), 1);
        assert_eq!(plan.paths[0].points[0], Point::new(180.0, 90.0));
        assert_eq!(plan.paths[0].points[1], Point::new(190.0, 80.0));
        assert_eq!(plan.paths[0].source, Source::Vector(0));
        assert!(!plan.paths[0].closed);
    }

    #[test]
    fn test_antimeridian_copy() {
        let mut r = renderer();
        r.add_layer(VectorLayer::with_features(
            "lines",
            Crs::lon_lat(),
            vec![line(&[(170.0, 0.0), (190.0, 10.0)])],
        ));
        let plan = r.plan_frame(&world_view(true));
        let shifts: Vec<f64> = plan.paths.iter().map(|p| p.shift).collect();
        assert_eq!(shifts, vec![0.0, -360.0]);
        assert_eq!(plan.paths[1].points[0], Point::new(-10.0, 90.0));

        // projected display never draws world copies
        let plan = r.plan_frame(&world_view(false));
        assert_eq!(plan.paths.len(), 1);
    }

    #[test]
    fn test_offscreen_features_skipped() {
        let mut r = renderer();
        r.add_layer(VectorLayer::with_features(
            "lines",
            Crs::lon_lat(),
            vec![line(&[(0.0, 0.0), (10.0, 10.0)]), line(&[(50.0, 0.0), (60.0, 10.0)])],
        ));
        let view = fit(
            Extent::new(40.0, 70.0, -10.0, 20.0),
            300.0,
            300.0,
            true,
            1.0,
            &EngineConfig::default(),
        )
        .unwrap();
        let plan = r.plan_frame(&view);
        assert_eq!(plan.paths.len(), 1);
        assert_eq!(plan.paths[0].feature, 1);
    }

    #[test]
    fn test_collision_avoidance_per_layer() {
        let features = vec![point(0.0, 0.0), point(1.0, 0.0), point(50.0, 0.0)];
        let mut r = renderer();
        let mut managed = VectorLayer::with_features("managed", Crs::lon_lat(), features.clone());
        managed.avoid_collision = true;
        r.add_layer(managed);
        let plan = r.plan_frame(&world_view(true));
        let shown: Vec<usize> = plan.annotations.iter().map(|a| a.feature).collect();
        assert_eq!(shown, vec![0, 2]);
        assert_eq!(plan.suppressed, 1);

        let mut r = renderer();
        r.add_layer(VectorLayer::with_features("free", Crs::lon_lat(), features));
        let plan = r.plan_frame(&world_view(true));
        assert_eq!(plan.annotations.len(), 3);
        assert_eq!(plan.suppressed, 0);
    }

    #[test]
    fn test_label_widens_box() {
        let mut r = renderer();
        r.add_layer(VectorLayer::with_features(
            "cities",
            Crs::lon_lat(),
            vec![Feature::labeled(
                Shape::Point(PointShape::new(Point::new(0.0, 0.0))),
                "abc",
            )],
        ));
        let plan = r.plan_frame(&world_view(true));
        let a = &plan.annotations[0];
        assert_eq!(a.label.as_deref(), Some("abc"));
        // symbol 8 px, offset 4 px, 3 chars of 7 px, text 12 px tall
        assert_eq!(a.bbox, Extent::new(176.0, 184.0 + 4.0 + 21.0, 84.0, 96.0));

        r.set_settings(DisplaySettings {
            show_labels: false,
            ..DisplaySettings::default()
        });
        let plan = r.plan_frame(&world_view(true));
        assert_eq!(plan.annotations[0].label, None);
        assert_eq!(plan.annotations[0].bbox, Extent::new(176.0, 184.0, 86.0, 94.0));
    }

    #[test]
    fn test_line_label_centered_on_extent() {
        let mut r = renderer();
        r.add_layer(VectorLayer::with_features(
            "tracks",
            Crs::lon_lat(),
            vec![Feature::labeled(
                Shape::Polyline(
                    Polyline::new(vec![vec![Point::new(0.0, 0.0), Point::new(20.0, 10.0)]]).unwrap(),
                ),
                "ab",
            )],
        ));
        let plan = r.plan_frame(&world_view(true));
        assert_eq!(plan.paths.len(), 1);
        let a = &plan.annotations[0];
        assert_eq!(a.anchor, Point::new(190.0, 85.0));
        assert_eq!(a.angle, None);
        assert_eq!(a.bbox, Extent::new(183.0, 197.0, 79.0, 91.0));

        r.set_settings(DisplaySettings {
            show_labels: false,
            ..DisplaySettings::default()
        });
        assert!(r.plan_frame(&world_view(true)).annotations.is_empty());
    }

    #[test]
    fn test_graticule_spacing() {
        assert!(Graticule::new(1e-7).to_layer().is_empty());
        assert!(Graticule::new(0.0).to_layer().is_empty());
        assert!(Graticule::new(f64::NAN).to_layer().is_empty());

        // 52 meridians up to 177E and 25 parallels up to 85N
        let grid = Graticule::new(7.0).to_layer();
        assert_eq!(grid.len(), 52 + 25);
        match &grid.features()[51].shape {
            Shape::Polyline(l) => assert_eq!(l.parts()[0][0].x, 177.0),
            other => panic!("expected polyline, got {}", other.kind()),
        }
        match &grid.features()[76].shape {
            Shape::Polyline(l) => assert_eq!(l.parts()[0][0].y, 85.0),
            other => panic!("expected polyline, got {}", other.kind()),
        }
    }

    #[test]
    fn test_images_and_graticule_wrap() {
        let mut r = renderer();
        r.add_image(ImageLayer {
            name: "sst".into(),
            crs: Crs::lon_lat(),
            extent: Extent::new(170.0, 190.0, -10.0, 10.0),
        });
        r.set_graticule(Some(30.0));
        let plan = r.plan_frame(&world_view(true));
        let shifts: Vec<f64> = plan.images.iter().map(|i| i.shift).collect();
        assert_eq!(shifts, vec![0.0, -360.0]);
        assert_eq!(plan.images[1].rect, Extent::new(-10.0, 10.0, 80.0, 100.0));
        assert!(plan.paths.iter().all(|p| p.source == Source::Graticule));
        // 13 meridians and 5 parallels; copies touching the edges come on top
        let primary = plan.paths.iter().filter(|p| p.shift == 0.0).count();
        assert_eq!(primary, 18);
    }

    #[test]
    fn test_display_crs_rebuilds_copies() {
        let mut r = renderer();
        r.add_layer(VectorLayer::with_features(
            "stations",
            Crs::lon_lat(),
            vec![point(10.0, 50.0), point(10.0, 90.0)],
        ));
        r.set_graticule(Some(30.0));
        let merc = Crs::from_proj4("+proj=merc").unwrap();
        r.set_display_crs(merc);

        let half = std::f64::consts::PI * crate::crs::EARTH_RADIUS;
        let view = fit(
            Extent::new(-half, half, -half, half),
            400.0,
            400.0,
            false,
            1.0,
            r.config(),
        )
        .unwrap();
        let plan = r.plan_frame(&view);
        assert_eq!(plan.annotations.len(), 1);
        assert!(!plan.paths.is_empty());
        assert!(plan
            .paths
            .iter()
            .flat_map(|p| p.points.iter())
            .all(|p| p.x.is_finite() && p.y.is_finite()));
        // sources keep their CRS
        assert_eq!(r.layer(0).unwrap().crs(), &Crs::lon_lat());
        assert_eq!(r.layer(0).unwrap().len(), 2);
    }

    #[test]
    fn test_change_and_restore_layer() {
        let mut r = renderer();
        r.add_layer(VectorLayer::with_features(
            "stations",
            Crs::lon_lat(),
            vec![point(10.0, 50.0), point(10.0, 90.0)],
        ));
        let merc = Crs::from_proj4("+proj=merc").unwrap();
        let stats = r.change_layer_crs(0, &merc).unwrap();
        assert_eq!(stats, ReprojectStats { kept: 1, dropped: 1 });
        assert!(r.change_layer_crs(5, &merc).is_none());
        assert!(r.restore_layer(0));
        assert_eq!(r.layer(0).unwrap().len(), 2);
    }

    #[test]
    fn test_select_point_and_wrapped_line() {
        let mut r = renderer();
        r.add_layer(VectorLayer::with_features(
            "mixed",
            Crs::lon_lat(),
            vec![point(0.0, 0.0), line(&[(170.0, 0.0), (190.0, 0.0)])],
        ));
        let view = world_view(true);

        let hits = r.select_at(&view, 181.0, 90.0, 2.0);
        assert_eq!(hits.len(), 1);
        assert_eq!((hits[0].feature, hits[0].shift), (0, 0.0));

        // x = 5 px is lon -175, covered by the line's western copy
        let hits = r.select_at(&view, 5.0, 90.5, 2.0);
        assert_eq!(hits.len(), 1);
        assert_eq!((hits[0].feature, hits[0].shift), (1, -360.0));

        assert!(r.select_at(&view, 100.0, 20.0, 2.0).is_empty());
    }

    #[test]
    fn test_select_inside_polygon_and_ellipse() {
        let ring = vec![
            Point::new(-20.0, -20.0),
            Point::new(20.0, -20.0),
            Point::new(20.0, 20.0),
            Point::new(-20.0, 20.0),
        ];
        let hole = vec![
            Point::new(-5.0, -5.0),
            Point::new(5.0, -5.0),
            Point::new(5.0, 5.0),
            Point::new(-5.0, 5.0),
        ];
        let polygon = PolygonShape::single(Polygon::new(ring, vec![hole]).unwrap());
        let mut r = renderer();
        r.add_graphic(Feature::new(Shape::Polygon(polygon)));
        r.add_graphic(Feature::new(Shape::Circle(EllipseShape::circle(
            Point::new(100.0, 0.0),
            10.0,
        ))));
        let view = world_view(true);

        // inside the ring, outside the hole
        let hits = r.select_at(&view, 180.0 + 15.0, 90.0, 1.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source, Source::Graphics);
        // inside the hole
        assert!(r.select_at(&view, 180.0, 90.0, 1.0).is_empty());
        // inside the circle
        let hits = r.select_at(&view, 280.0 + 5.0, 90.0, 1.0);
        assert_eq!(hits[0].feature, 1);
    }

    #[test]
    fn test_cached_placement_follows_epoch() {
        let mut r = renderer();
        let mut layer =
            VectorLayer::with_features("p", Crs::lon_lat(), vec![point(0.0, 0.0), point(1.0, 0.0)]);
        layer.avoid_collision = true;
        r.add_layer(layer);
        let view = world_view(true);
        let first = r.plan_frame_cached(&view, 7);
        let again = r.plan_frame_cached(&view, 7);
        assert_eq!(first, again);
        assert_eq!(first.annotations.len(), 1);

        // a new layer invalidates the cached result
        r.add_layer(VectorLayer::with_features("q", Crs::lon_lat(), vec![point(90.0, 0.0)]));
        let plan = r.plan_frame_cached(&view, 7);
        assert_eq!(plan.annotations.len(), 2);
    }

    #[test]
    fn test_ellipse_outline_closed() {
        let e = EllipseShape::new(Point::new(1.0, 2.0), 3.0, 1.0);
        let o = ellipse_outline(&e);
        assert_eq!(o.len(), ELLIPSE_SEGMENTS + 1);
        assert_eq!(o.first(), o.last());
        assert_eq!(o[0], Point::new(4.0, 2.0));
    }
}
