//! Coordinate reference systems and the point-reprojection seam.
//!
//! The engine never does projection math itself. It talks to a
//! [`PointReprojector`], which reports failure per point. A spherical
//! implementation covering the handful of families below ships with the
//! crate so layers can be reprojected without an external library.

use crate::error::CrsError;
use crate::geo::{is_finite_point, wrap_lon, Point};
use std::f64::consts::PI;

/// Sphere radius used by [`SphericalReprojector`], in meters
pub const EARTH_RADIUS: f64 = 6_378_137.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Projection {
    LongLat,
    Mercator,
    Equirectangular,
    NorthPolarStereographic,
    SouthPolarStereographic,
}

/// Parsed projection definition
#[derive(Clone, Debug)]
pub struct Crs {
    definition: String,
    projection: Projection,
    central_meridian: f64,
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        self.projection == other.projection && self.central_meridian == other.central_meridian
    }
}

impl Crs {
    /// WGS84 longitude/latitude
    pub fn lon_lat() -> Self {
        Self {
            definition: "+proj=longlat +datum=WGS84".to_string(),
            projection: Projection::LongLat,
            central_meridian: 0.0,
        }
    }

    /// Parse a proj4-style string such as `+proj=merc +lon_0=150`.
    /// Unknown parameters are ignored.
    pub fn from_proj4(definition: &str) -> Result<Self, CrsError> {
        let mut proj: Option<&str> = None;
        let mut lon_0 = 0.0;
        let mut lat_0 = 0.0;

        for token in definition.split_whitespace() {
            let token = token.trim_start_matches('+');
            let (key, value) = match token.split_once('=') {
                Some(kv) => kv,
                None => continue,
            };
            match key {
                "proj" => proj = Some(value),
                "lon_0" => lon_0 = parse_param(key, value)?,
                "lat_0" => lat_0 = parse_param(key, value)?,
                _ => {}
            }
        }

        let proj = proj.ok_or_else(|| CrsError::MissingProjection(definition.to_string()))?;
        let projection = match proj {
            "longlat" | "lonlat" | "latlong" | "latlon" => Projection::LongLat,
            "merc" => Projection::Mercator,
            "eqc" => Projection::Equirectangular,
            "stere" if lat_0 == 90.0 => Projection::NorthPolarStereographic,
            "stere" if lat_0 == -90.0 => Projection::SouthPolarStereographic,
            other => return Err(CrsError::UnsupportedProjection(other.to_string())),
        };

        Ok(Self {
            definition: definition.trim().to_string(),
            projection,
            central_meridian: lon_0,
        })
    }

    pub fn definition(&self) -> &str {
        &self.definition
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn central_meridian(&self) -> f64 {
        self.central_meridian
    }

    pub fn is_geographic(&self) -> bool {
        self.projection == Projection::LongLat
    }

    /// Name used to look up pole clipping limits
    pub fn family_name(&self) -> &'static str {
        match self.projection {
            Projection::LongLat => "longlat",
            Projection::Mercator => "merc",
            Projection::Equirectangular => "eqc",
            Projection::NorthPolarStereographic => "npstere",
            Projection::SouthPolarStereographic => "spstere",
        }
    }

    /// Longitude where this projection's domain splits: the antimeridian of
    /// the central meridian. `None` when there is no seam (lon/lat itself,
    /// azimuthal projections).
    pub fn reference_cut_longitude(&self) -> Option<f64> {
        match self.projection {
            Projection::Mercator | Projection::Equirectangular => {
                let lon_0 = self.central_meridian;
                Some(if lon_0 > 0.0 { lon_0 - 180.0 } else { lon_0 + 180.0 })
            }
            _ => None,
        }
    }
}

fn parse_param(key: &str, value: &str) -> Result<f64, CrsError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CrsError::InvalidParameter {
            key: key.to_string(),
            value: value.to_string(),
        })
}

/// Point-level reprojection service. Failure is reported per point.
pub trait PointReprojector {
    fn reproject_points(&self, points: &[Point], from: &Crs, to: &Crs) -> Vec<Option<Point>>;

    fn reproject_point(&self, point: Point, from: &Crs, to: &Crs) -> Option<Point> {
        self.reproject_points(&[point], from, to)
            .into_iter()
            .next()
            .flatten()
    }
}

/// Spherical forward/inverse formulas routed through lon/lat
#[derive(Clone, Copy, Debug, Default)]
pub struct SphericalReprojector;

impl SphericalReprojector {
    fn to_lon_lat(p: Point, crs: &Crs) -> Option<Point> {
        let lon_0 = crs.central_meridian;
        let r = EARTH_RADIUS;
        let out = match crs.projection {
            Projection::LongLat => p,
            Projection::Mercator => {
                let lon = lon_0 + (p.x / r).to_degrees();
                // Inverse Mercator for latitude
                let lat = (p.y / r).sinh().atan().to_degrees();
                Point::new(wrap_lon(lon), lat)
            }
            Projection::Equirectangular => {
                let lon = lon_0 + (p.x / r).to_degrees();
                Point::new(wrap_lon(lon), (p.y / r).to_degrees())
            }
            Projection::NorthPolarStereographic => {
                let rho = p.x.hypot(p.y);
                let lat = 90.0 - 2.0 * (rho / (2.0 * r)).atan().to_degrees();
                let lon = lon_0 + p.x.atan2(-p.y).to_degrees();
                Point::new(wrap_lon(lon), lat)
            }
            Projection::SouthPolarStereographic => {
                let rho = p.x.hypot(p.y);
                let lat = -90.0 + 2.0 * (rho / (2.0 * r)).atan().to_degrees();
                let lon = lon_0 + p.x.atan2(p.y).to_degrees();
                Point::new(wrap_lon(lon), lat)
            }
        };
        is_finite_point(out).then_some(out)
    }

    fn from_lon_lat(p: Point, crs: &Crs) -> Option<Point> {
        if crs.projection == Projection::LongLat {
            return Some(p);
        }
        if !(-90.0..=90.0).contains(&p.y) {
            return None;
        }
        let r = EARTH_RADIUS;
        let dlon = wrap_lon(p.x - crs.central_meridian).to_radians();
        let phi = p.y.to_radians();
        let out = match crs.projection {
            Projection::LongLat => p,
            Projection::Mercator => {
                if p.y.abs() >= 90.0 {
                    return None;
                }
                Point::new(r * dlon, r * (PI / 4.0 + phi / 2.0).tan().ln())
            }
            Projection::Equirectangular => Point::new(r * dlon, r * phi),
            Projection::NorthPolarStereographic => {
                if p.y <= -90.0 {
                    return None;
                }
                if p.y >= 90.0 {
                    return Some(Point::ZERO);
                }
                let rho = 2.0 * r * (PI / 4.0 - phi / 2.0).tan();
                Point::new(rho * dlon.sin(), -rho * dlon.cos())
            }
            Projection::SouthPolarStereographic => {
                if p.y >= 90.0 {
                    return None;
                }
                if p.y <= -90.0 {
                    return Some(Point::ZERO);
                }
                let rho = 2.0 * r * (PI / 4.0 + phi / 2.0).tan();
                Point::new(rho * dlon.sin(), rho * dlon.cos())
            }
        };
        is_finite_point(out).then_some(out)
    }
}

impl PointReprojector for SphericalReprojector {
    fn reproject_points(&self, points: &[Point], from: &Crs, to: &Crs) -> Vec<Option<Point>> {
        if from == to {
            return points.iter().map(|&p| is_finite_point(p).then_some(p)).collect();
        }
        points
            .iter()
            .map(|&p| {
                let ll = Self::to_lon_lat(p, from)?;
                Self::from_lon_lat(ll, to)
            })
            .collect()
    }
}
