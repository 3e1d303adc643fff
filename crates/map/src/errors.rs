use thiserror::Error;

/// A result type for spatial primitive errors.
pub type Result<T> = std::result::Result<T, MapError>;

/// An error when building spatial primitives.
#[derive(Error, Debug)]
pub enum MapError {
    /// When bounds corners are inconsistent
    #[error("Invalid bounds: {0}")]
    InvalidBoundsError(String),
    /// When a raster does not cover its bounds
    #[error("Invalid grid: {0}")]
    InvalidGridError(String),
}
