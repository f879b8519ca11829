//! Half-plane clipping of lines and rings in source coordinates.

use crate::config::PoleLimits;
use crate::geo::Point;
use crate::map::Extent;
use crate::shape::{close_ring, ring_vertex_count};

/// Keep-side of an axis-aligned line
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HalfPlane {
    /// x <= v
    West(f64),
    /// x >= v
    East(f64),
    /// y <= v
    South(f64),
    /// y >= v
    North(f64),
}

impl HalfPlane {
    #[inline(always)]
    pub fn inside(&self, p: Point) -> bool {
        match *self {
            HalfPlane::West(v) => p.x <= v,
            HalfPlane::East(v) => p.x >= v,
            HalfPlane::South(v) => p.y <= v,
            HalfPlane::North(v) => p.y >= v,
        }
    }

    /// Crossing point of segment `a`-`b` with the boundary.
    /// Only meaningful when the endpoints lie on different sides.
    fn intersect(&self, a: Point, b: Point) -> Point {
        match *self {
            HalfPlane::West(v) | HalfPlane::East(v) => {
                let t = (v - a.x) / (b.x - a.x);
                Point::new(v, a.y + t * (b.y - a.y))
            }
            HalfPlane::South(v) | HalfPlane::North(v) => {
                let t = (v - a.y) / (b.y - a.y);
                Point::new(a.x + t * (b.x - a.x), v)
            }
        }
    }
}

#[inline(always)]
fn push_dedup(out: &mut Vec<Point>, p: Point) {
    if out.last() != Some(&p) {
        out.push(p);
    }
}

/// Clip an open line, returning each inside run with at least two points
pub fn clip_line(points: &[Point], plane: HalfPlane) -> Vec<Vec<Point>> {
    let mut pieces = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    let mut prev: Option<(Point, bool)> = None;

    for &p in points {
        let inside = plane.inside(p);
        if let Some((prev_p, prev_inside)) = prev {
            if prev_inside != inside {
                push_dedup(&mut current, plane.intersect(prev_p, p));
                if prev_inside {
                    pieces.push(std::mem::take(&mut current));
                }
            }
        }
        if inside {
            push_dedup(&mut current, p);
        }
        prev = Some((p, inside));
    }
    pieces.push(current);

    pieces.retain(|piece| piece.len() >= 2);
    pieces
}

/// Sutherland-Hodgman clip of a closed ring against one half-plane.
/// Returns a closed ring, or `None` if fewer than three vertices survive.
pub fn clip_ring(ring: &[Point], plane: HalfPlane) -> Option<Vec<Point>> {
    let n = ring_vertex_count(ring);
    if n == 0 {
        return None;
    }
    let vertices = &ring[..n];
    let mut out = Vec::with_capacity(n + 4);

    for i in 0..n {
        let cur = vertices[i];
        let prev = vertices[(i + n - 1) % n];
        let cur_in = plane.inside(cur);
        let prev_in = plane.inside(prev);
        if cur_in {
            if !prev_in {
                push_dedup(&mut out, plane.intersect(prev, cur));
            }
            push_dedup(&mut out, cur);
        } else if prev_in {
            push_dedup(&mut out, plane.intersect(prev, cur));
        }
    }

    if out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    if out.len() < 3 {
        return None;
    }
    close_ring(&mut out);
    Some(out)
}

/// Copies of the cut longitude that fall strictly inside `extent`
fn cuts_within(extent: &Extent, cut: f64) -> impl Iterator<Item = f64> + '_ {
    [cut - 360.0, cut, cut + 360.0]
        .into_iter()
        .filter(move |&c| extent.min_x < c && c < extent.max_x)
}

/// Split a line at every copy of the cut longitude it straddles.
/// The two sides are kept `eps` apart so neither touches the seam.
pub fn split_line_at_lon(points: &[Point], cut: f64, eps: f64) -> Vec<Vec<Point>> {
    let mut pieces = vec![points.to_vec()];
    let Some(extent) = Extent::from_points(points) else {
        return pieces;
    };
    for c in cuts_within(&extent, cut) {
        log::trace!("splitting line at longitude {c}");
        pieces = pieces
            .iter()
            .flat_map(|piece| {
                let mut sides = clip_line(piece, HalfPlane::West(c - eps));
                sides.extend(clip_line(piece, HalfPlane::East(c + eps)));
                sides
            })
            .collect();
    }
    pieces
}

/// Ring counterpart of [`split_line_at_lon`]
pub fn split_ring_at_lon(ring: &[Point], cut: f64, eps: f64) -> Vec<Vec<Point>> {
    let mut pieces = vec![ring.to_vec()];
    let Some(extent) = Extent::from_points(ring) else {
        return pieces;
    };
    for c in cuts_within(&extent, cut) {
        log::trace!("splitting ring at longitude {c}");
        pieces = pieces
            .iter()
            .flat_map(|piece| {
                clip_ring(piece, HalfPlane::West(c - eps))
                    .into_iter()
                    .chain(clip_ring(piece, HalfPlane::East(c + eps)))
            })
            .collect();
    }
    pieces
}

/// Restrict a line to a latitude window
pub fn clip_line_to_lat(points: &[Point], limits: PoleLimits) -> Vec<Vec<Point>> {
    clip_line(points, HalfPlane::North(limits.min_lat))
        .iter()
        .flat_map(|piece| clip_line(piece, HalfPlane::South(limits.max_lat)))
        .collect()
}

/// Restrict a ring to a latitude window
pub fn clip_ring_to_lat(ring: &[Point], limits: PoleLimits) -> Option<Vec<Point>> {
    let clipped = clip_ring(ring, HalfPlane::North(limits.min_lat))?;
    clip_ring(&clipped, HalfPlane::South(limits.max_lat))
}
