use crate::crs::{Crs, PointReprojector};
use crate::geo::Point;

/// Fold an angle into [0, 360)
#[inline(always)]
pub fn normalize_angle(angle: f64) -> f64 {
    let a = angle.rem_euclid(360.0);
    if a >= 360.0 {
        0.0
    } else {
        a
    }
}

/// Correct a compass direction attached to `from_point` for the local
/// rotation the projection applies at that location.
///
/// A second point `step` units north of `from_point` is reprojected, and
/// the direction of the resulting vector from `to_point` is compared with
/// the direction it would have had without rotation. Where a north step
/// would pass the pole the sample goes south instead, and at the pole
/// itself it goes west. A failed or zero-length sample leaves the angle
/// unchanged.
pub fn reproject_angle<R: PointReprojector + ?Sized>(
    angle: f64,
    from_point: Point,
    to_point: Point,
    from: &Crs,
    to: &Crs,
    reprojector: &R,
    step: f64,
) -> f64 {
    let (sample, reference) = if !from.is_geographic() || from_point.y + step < 90.0 {
        (Point::new(from_point.x, from_point.y + step), 90.0)
    } else if from_point.y < 90.0 {
        (Point::new(from_point.x, from_point.y - step), 270.0)
    } else {
        (Point::new(from_point.x - step, from_point.y), 180.0)
    };

    let Some(projected) = reprojector.reproject_point(sample, from, to) else {
        return angle;
    };
    let d = projected - to_point;
    if !d.is_finite() || d.length_squared() == 0.0 {
        return angle;
    }

    let sampled = d.y.atan2(d.x).to_degrees();
    normalize_angle(angle + reference - sampled)
}
