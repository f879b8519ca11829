mod extent;
mod placement;
mod projection;
mod renderer;
mod spatial;
mod viewport;
mod wrap;

pub use extent::Extent;
pub use placement::{place, AnnotationCandidate, CollisionPlacer, PlacementCache};
pub use projection::ScreenTransform;
pub use renderer::{
    DisplaySettings, FramePlan, Graticule, Hit, ImageLayer, ImageRect, MapRenderer,
    PlacedAnnotation, ScreenPath, Source, MIN_GRATICULE_SPACING,
};
pub use spatial::FeatureGrid;
pub use viewport::{fit, ViewController, ViewState};
pub use wrap::{candidate_shifts, visible_shifts, LonShifts};
