use crate::geo::Point;
use crate::map::Extent;

/// Point feature with an optional direction (compass degrees, e.g. wind)
#[derive(Clone, Debug, PartialEq)]
pub struct PointShape {
    pub point: Point,
    pub angle: Option<f64>,
}

impl PointShape {
    pub fn new(point: Point) -> Self {
        Self { point, angle: None }
    }

    pub fn with_angle(point: Point, angle: f64) -> Self {
        Self {
            point,
            angle: Some(angle),
        }
    }
}

/// Multi-part line. Every part keeps at least two points.
#[derive(Clone, Debug, PartialEq)]
pub struct Polyline {
    parts: Vec<Vec<Point>>,
    extent: Extent,
}

impl Polyline {
    /// Parts shorter than two points are discarded; `None` if nothing is left
    pub fn new(parts: Vec<Vec<Point>>) -> Option<Self> {
        let parts: Vec<Vec<Point>> = parts.into_iter().filter(|p| p.len() >= 2).collect();
        let extent = Extent::from_points(parts.iter().flatten())?;
        Some(Self { parts, extent })
    }

    pub fn parts(&self) -> &[Vec<Point>] {
        &self.parts
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn into_parts(self) -> Vec<Vec<Point>> {
        self.parts
    }
}

/// Close a ring in place by repeating its first point
pub fn close_ring(ring: &mut Vec<Point>) {
    if let (Some(&first), Some(&last)) = (ring.first(), ring.last()) {
        if first != last {
            ring.push(first);
        }
    }
}

/// Vertex count of a ring, not counting the closing duplicate
pub fn ring_vertex_count(ring: &[Point]) -> usize {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() > 1 && first == last => ring.len() - 1,
        _ => ring.len(),
    }
}

/// One outer ring plus holes; every ring is closed (first == last)
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    outer: Vec<Point>,
    holes: Vec<Vec<Point>>,
}

impl Polygon {
    /// Closes every ring. Fails when the outer ring has fewer than three
    /// vertices; degenerate holes are dropped on their own.
    pub fn new(mut outer: Vec<Point>, holes: Vec<Vec<Point>>) -> Option<Self> {
        if ring_vertex_count(&outer) < 3 {
            return None;
        }
        close_ring(&mut outer);
        let holes = holes
            .into_iter()
            .filter(|h| ring_vertex_count(h) >= 3)
            .map(|mut h| {
                close_ring(&mut h);
                h
            })
            .collect();
        Some(Self { outer, holes })
    }

    pub fn outer(&self) -> &[Point] {
        &self.outer
    }

    pub fn holes(&self) -> &[Vec<Point>] {
        &self.holes
    }

    pub fn into_rings(self) -> (Vec<Point>, Vec<Vec<Point>>) {
        (self.outer, self.holes)
    }
}

/// Multi-part polygon
#[derive(Clone, Debug, PartialEq)]
pub struct PolygonShape {
    parts: Vec<Polygon>,
    extent: Extent,
}

impl PolygonShape {
    pub fn new(parts: Vec<Polygon>) -> Option<Self> {
        let extent = Extent::from_points(parts.iter().flat_map(|p| p.outer.iter()))?;
        Some(Self { parts, extent })
    }

    pub fn single(polygon: Polygon) -> Self {
        let extent = Extent::from_points(polygon.outer.iter())
            .unwrap_or_else(|| Extent::from_point(Point::ZERO));
        Self {
            parts: vec![polygon],
            extent,
        }
    }

    pub fn parts(&self) -> &[Polygon] {
        &self.parts
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }
}

/// Circle or ellipse stored as its west, north, east and south extrema
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EllipseShape {
    points: [Point; 4],
}

impl EllipseShape {
    pub fn new(center: Point, radius_x: f64, radius_y: f64) -> Self {
        let rx = radius_x.abs();
        let ry = radius_y.abs();
        Self {
            points: [
                Point::new(center.x - rx, center.y),
                Point::new(center.x, center.y + ry),
                Point::new(center.x + rx, center.y),
                Point::new(center.x, center.y - ry),
            ],
        }
    }

    pub fn circle(center: Point, radius: f64) -> Self {
        Self::new(center, radius, radius)
    }

    /// West, north, east, south
    pub fn points(&self) -> &[Point; 4] {
        &self.points
    }

    pub fn center(&self) -> Point {
        let [w, n, e, s] = self.points;
        Point::new((w.x + e.x) * 0.5, (n.y + s.y) * 0.5)
    }

    pub fn radius_x(&self) -> f64 {
        (self.points[2].x - self.points[0].x) * 0.5
    }

    pub fn radius_y(&self) -> f64 {
        (self.points[1].y - self.points[3].y) * 0.5
    }

    pub fn extent(&self) -> Extent {
        let [w, n, e, s] = self.points;
        Extent::new(w.x, e.x, s.y, n.y)
    }
}

/// Geometry variants handled by the engine
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    Point(PointShape),
    Polyline(Polyline),
    Polygon(PolygonShape),
    Circle(EllipseShape),
    Ellipse(EllipseShape),
}

impl Shape {
    pub fn extent(&self) -> Extent {
        match self {
            Shape::Point(p) => Extent::from_point(p.point),
            Shape::Polyline(l) => l.extent(),
            Shape::Polygon(p) => p.extent(),
            Shape::Circle(e) | Shape::Ellipse(e) => e.extent(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Shape::Point(_) => "point",
            Shape::Polyline(_) => "polyline",
            Shape::Polygon(_) => "polygon",
            Shape::Circle(_) => "circle",
            Shape::Ellipse(_) => "ellipse",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn test_polyline_drops_short_parts() {
        let line = Polyline::new(vec![vec![p(0.0, 0.0)], vec![p(1.0, 1.0), p(3.0, -2.0)]]).unwrap();
        assert_eq!(line.parts().len(), 1);
        assert_eq!(line.extent(), Extent::new(1.0, 3.0, -2.0, 1.0));
        assert!(Polyline::new(vec![vec![p(0.0, 0.0)]]).is_none());
    }

    #[test]
    fn test_polygon_closes_rings() {
        let poly = Polygon::new(
            vec![p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0)],
            vec![
                vec![p(1.0, 1.0), p(2.0, 1.0), p(2.0, 2.0)],
                vec![p(5.0, 5.0), p(6.0, 6.0), p(5.0, 5.0)],
            ],
        )
        .unwrap();
        assert_eq!(poly.outer().len(), 4);
        assert_eq!(poly.outer().first(), poly.outer().last());
        // the two-vertex hole is dropped
        assert_eq!(poly.holes().len(), 1);
        assert_eq!(poly.holes()[0].first(), poly.holes()[0].last());
    }

    #[test]
    fn test_polygon_outer_too_small() {
        assert!(Polygon::new(vec![p(0.0, 0.0), p(1.0, 1.0), p(0.0, 0.0)], vec![]).is_none());
    }

    #[test]
    fn test_ring_vertex_count() {
        assert_eq!(ring_vertex_count(&[p(0.0, 0.0), p(1.0, 0.0), p(0.0, 0.0)]), 2);
        assert_eq!(ring_vertex_count(&[p(0.0, 0.0), p(1.0, 0.0)]), 2);
        assert_eq!(ring_vertex_count(&[]), 0);
    }

    #[test]
    fn test_ellipse_canonical_points() {
        let e = EllipseShape::new(p(10.0, 20.0), 4.0, 2.0);
        assert_eq!(e.points()[0], p(6.0, 20.0));
        assert_eq!(e.points()[1], p(10.0, 22.0));
        assert_eq!(e.center(), p(10.0, 20.0));
        assert_eq!(e.radius_x(), 4.0);
        assert_eq!(e.radius_y(), 2.0);
        assert_eq!(e.extent(), Extent::new(6.0, 14.0, 18.0, 22.0));
    }

    #[test]
    fn test_shape_extent_dispatch() {
        let s = Shape::Circle(EllipseShape::circle(p(0.0, 0.0), 1.0));
        assert_eq!(s.extent(), Extent::new(-1.0, 1.0, -1.0, 1.0));
        assert_eq!(s.kind(), "circle");
        let pt = Shape::Point(PointShape::with_angle(p(3.0, 4.0), 90.0));
        assert_eq!(pt.extent(), Extent::from_point(p(3.0, 4.0)));
    }
}
