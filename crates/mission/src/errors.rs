use thiserror::Error;

/// A result type for mission errors
pub type Result<T> = std::result::Result<T, MissionError>;

/// An error raised while planning or running a sampling mission
#[derive(Error, Debug)]
pub enum MissionError {
    /// When configuration is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfigError(String),
    /// When belief fitting or querying fails
    #[error("Belief error")]
    GpError(#[from] infosamp_gp::GpError),
    /// When the spatial domain is invalid
    #[error("Map error")]
    MapError(#[from] infosamp_map::MapError),
    /// When IO fails
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    /// When numpy array write fails
    #[error("IO error")]
    WriteNpyError(#[from] ndarray_npy::WriteNpyError),
    /// When error during saving
    #[error("Save error: {0}")]
    JsonError(#[from] serde_json::Error),
}
