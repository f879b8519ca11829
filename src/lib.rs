//! Geographic view engine: screen/map coordinate mapping with antimeridian
//! wraparound, shape reprojection between coordinate reference systems,
//! and greedy collision avoidance for annotations.

pub mod config;
pub mod crs;
pub mod data;
pub mod error;
pub mod geo;
pub mod layer;
pub mod map;
pub mod reproject;
pub mod shape;

pub use config::EngineConfig;
pub use crs::{Crs, PointReprojector, SphericalReprojector};
pub use error::{CrsError, ViewError};
pub use geo::Point;
pub use layer::{change_layer_crs, reproject_for_display, Feature, ReprojectStats, VectorLayer};
pub use map::{Extent, MapRenderer, ScreenTransform, ViewController, ViewState};
pub use reproject::ShapeReprojector;
pub use shape::Shape;
