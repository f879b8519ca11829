use crate::map::extent::Extent;

/// Longitude shifts worth considering for one geometry.
/// At most three copies exist: the original and one world to each side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LonShifts {
    pub zero: bool,
    /// Copy moved one world west (-360)
    pub west: bool,
    /// Copy moved one world east (+360)
    pub east: bool,
}

impl LonShifts {
    /// Only the unshifted copy
    pub const PRIMARY: LonShifts = LonShifts {
        zero: true,
        west: false,
        east: false,
    };

    pub fn contains(&self, shift: f64) -> bool {
        if shift == 0.0 {
            self.zero
        } else if shift == -360.0 {
            self.west
        } else if shift == 360.0 {
            self.east
        } else {
            false
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.zero || self.west || self.east)
    }

    /// Shifts in draw order: original first, then west, then east
    pub fn iter(&self) -> impl Iterator<Item = f64> {
        [(self.zero, 0.0), (self.west, -360.0), (self.east, 360.0)]
            .into_iter()
            .filter_map(|(on, shift)| on.then_some(shift))
    }
}

/// Cheap pruning of the shifts that could possibly bring a copy of
/// `geom` into view. The unshifted copy is kept only when it already
/// intersects; the shifted ones still need [`visible_shifts`].
pub fn candidate_shifts(geom: &Extent, draw: &Extent) -> LonShifts {
    LonShifts {
        zero: geom.intersects(draw),
        west: geom.min_x > -360.0 && geom.max_x > 0.0,
        east: geom.max_x < 360.0 && geom.min_x < 0.0,
    }
}

/// Shifts whose copy actually intersects the draw extent. Outside
/// geographic display mode only the unshifted copy is ever drawn.
pub fn visible_shifts(geom: &Extent, draw: &Extent, geographic: bool) -> LonShifts {
    if !geographic {
        return LonShifts {
            zero: geom.intersects(draw),
            ..LonShifts::default()
        };
    }
    let c = candidate_shifts(geom, draw);
    LonShifts {
        zero: c.zero,
        west: c.west && geom.shift_x(-360.0).intersects(draw),
        east: c.east && geom.shift_x(360.0).intersects(draw),
    }
}
