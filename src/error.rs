use std::path::PathBuf;
use thiserror::Error;

/// Failures of the I/O collaborators around the numeric core.
#[derive(Error, Debug)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("could not record or load parameters: {0}")]
    Recorder(#[from] burn::record::RecorderError),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("failed to load {}: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },
    #[error("no image pairs found")]
    EmptyDataset,
    #[error("{inputs} input images cannot be paired with {reals} real images")]
    MismatchedPairs { inputs: usize, reals: usize },
    #[error("expected {expected} pixel values, got {actual}")]
    InvalidImageData { expected: usize, actual: usize },
}

impl From<burn::config::ConfigError> for Error {
    fn from(err: burn::config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
