use glam::DVec2;

/// A coordinate pair in either geographic/projected space or screen pixels
pub type Point = DVec2;

/// Fold a longitude into [-180, 180)
#[inline(always)]
pub fn wrap_lon(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// True when both components are finite
#[inline(always)]
pub fn is_finite_point(p: Point) -> bool {
    p.x.is_finite() && p.y.is_finite()
}
