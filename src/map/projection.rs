use crate::error::ViewError;
use crate::geo::Point;
use crate::map::extent::Extent;

/// Mapping between map coordinates and screen pixels for one draw extent.
/// Screen y grows downward, map y grows upward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenTransform {
    pub draw_extent: Extent,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl ScreenTransform {
    /// Validate and build. Zero or non-finite scales and non-finite
    /// extents are rejected up front so no transform ever divides by zero.
    pub fn new(draw_extent: Extent, scale_x: f64, scale_y: f64) -> Result<Self, ViewError> {
        if !(scale_x.is_finite() && scale_y.is_finite()) || scale_x == 0.0 || scale_y == 0.0 {
            return Err(ViewError::InvalidScale { scale_x, scale_y });
        }
        if !draw_extent.is_finite() {
            return Err(ViewError::NonFiniteExtent);
        }
        Ok(Self {
            draw_extent,
            scale_x,
            scale_y,
        })
    }

    /// Project a map coordinate to screen pixels
    #[inline(always)]
    pub fn project(&self, x: f64, y: f64) -> (f64, f64) {
        self.project_shifted(x, y, 0.0)
    }

    /// Project with an explicit longitude shift (antimeridian copies)
    #[inline(always)]
    pub fn project_shifted(&self, x: f64, y: f64, lon_shift: f64) -> (f64, f64) {
        let sx = (x + lon_shift - self.draw_extent.min_x) * self.scale_x;
        let sy = (self.draw_extent.max_y - y) * self.scale_y;
        (sx, sy)
    }

    /// Unproject screen pixels back to map coordinates
    #[inline(always)]
    pub fn unproject(&self, sx: f64, sy: f64) -> (f64, f64) {
        self.unproject_shifted(sx, sy, 0.0)
    }

    /// Exact inverse of [`ScreenTransform::project_shifted`]
    #[inline(always)]
    pub fn unproject_shifted(&self, sx: f64, sy: f64, lon_shift: f64) -> (f64, f64) {
        let x = sx / self.scale_x + self.draw_extent.min_x - lon_shift;
        let y = self.draw_extent.max_y - sy / self.scale_y;
        (x, y)
    }

    pub fn project_point(&self, p: Point, lon_shift: f64) -> Point {
        let (sx, sy) = self.project_shifted(p.x, p.y, lon_shift);
        Point::new(sx, sy)
    }

    /// Screen-space box of a map extent
    pub fn project_extent(&self, extent: &Extent, lon_shift: f64) -> Extent {
        let (x0, y0) = self.project_shifted(extent.min_x, extent.max_y, lon_shift);
        let (x1, y1) = self.project_shifted(extent.max_x, extent.min_y, lon_shift);
        Extent::new(x0, x1, y0, y1)
    }

    /// Convert a pixel distance to map units along x
    pub fn pixels_to_map(&self, px: f64) -> f64 {
        px / self.scale_x.abs()
    }
}
