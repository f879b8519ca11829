use crate::geo::Point;

/// Axis-aligned bounding box. Zero-area boxes (a point or a line) are legal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Extent {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Extent {
    /// Build from two corners in any order
    pub fn new(x0: f64, x1: f64, y0: f64, y1: f64) -> Self {
        Self {
            min_x: x0.min(x1),
            max_x: x0.max(x1),
            min_y: y0.min(y1),
            max_y: y0.max(y1),
        }
    }

    /// Box of a single point
    pub fn from_point(p: Point) -> Self {
        Self::new(p.x, p.x, p.y, p.y)
    }

    /// Tightest box around the points, or `None` for an empty input
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut ext = Self::from_point(*first);
        for p in iter {
            ext.extend_point(*p);
        }
        Some(ext)
    }

    /// Box reaching `half_w`/`half_h` from a center
    pub fn around(center: Point, half_w: f64, half_h: f64) -> Self {
        Self::new(
            center.x - half_w,
            center.x + half_w,
            center.y - half_h,
            center.y + half_h,
        )
    }

    #[inline(always)]
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    #[inline(always)]
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    #[inline(always)]
    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) * 0.5,
            (self.min_y + self.max_y) * 0.5,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.max_x.is_finite()
            && self.min_y.is_finite()
            && self.max_y.is_finite()
    }

    /// Grow in place to cover `p`
    pub fn extend_point(&mut self, p: Point) {
        self.min_x = self.min_x.min(p.x);
        self.max_x = self.max_x.max(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_y = self.max_y.max(p.y);
    }

    pub fn union(&self, other: &Extent) -> Extent {
        Extent {
            min_x: self.min_x.min(other.min_x),
            max_x: self.max_x.max(other.max_x),
            min_y: self.min_y.min(other.min_y),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Closed-interval overlap test: boxes that touch on an edge intersect
    #[inline(always)]
    pub fn intersects(&self, other: &Extent) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    #[inline(always)]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min_x && p.x <= self.max_x && p.y >= self.min_y && p.y <= self.max_y
    }

    /// Copy moved along x by `dx` (longitude shift)
    #[inline(always)]
    pub fn shift_x(&self, dx: f64) -> Extent {
        Extent {
            min_x: self.min_x + dx,
            max_x: self.max_x + dx,
            ..*self
        }
    }

    /// Copy padded by `pad` on every side
    pub fn expand(&self, pad: f64) -> Extent {
        Extent {
            min_x: self.min_x - pad,
            max_x: self.max_x + pad,
            min_y: self.min_y - pad,
            max_y: self.max_y + pad,
        }
    }
}
