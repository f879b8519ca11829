use thiserror::Error;

/// Precondition violations raised by the view layer. These are caller bugs;
/// the view state is never mutated when one is returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewError {
    #[error("invalid scale: scale_x={scale_x}, scale_y={scale_y}")]
    InvalidScale { scale_x: f64, scale_y: f64 },

    #[error("draw extent has non-finite bounds")]
    NonFiniteExtent,

    #[error("viewport {width}x{height} is below the {min} px minimum")]
    ViewportTooSmall { width: f64, height: f64, min: f64 },

    #[error("view extent has zero width or height")]
    DegenerateExtent,
}

/// Errors produced while building a CRS from its textual definition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CrsError {
    #[error("missing +proj parameter in '{0}'")]
    MissingProjection(String),

    #[error("unsupported projection '{0}'")]
    UnsupportedProjection(String),

    #[error("invalid value for +{key}: '{value}'")]
    InvalidParameter { key: String, value: String },
}
