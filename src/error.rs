use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while fitting a smoothing spline to a sample set.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum FitError {
    #[error("spline degree must be between 1 and 5, got {0}")]
    InvalidDegree(usize),

    #[error("smoothing factor must be finite and non-negative, got {0}")]
    InvalidSmoothing(f64),

    #[error("degree {degree} needs at least {required} points, got {found}")]
    TooFewPoints {
        degree: usize,
        required: usize,
        found: usize,
    },

    #[error("non-finite coordinate at sample {index}")]
    NonFinite { index: usize },

    #[error("samples {index} and {} coincide", .index + 1)]
    CoincidentPoints { index: usize },

    #[error("least-squares system is singular ({controls} control points, {samples} samples)")]
    Singular { controls: usize, samples: usize },
}

/// Errors raised by the resampling pipeline and the file-level tooling around it.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ResampleError {
    #[error(transparent)]
    Fit(#[from] FitError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: no coordinate rows found", .path.display())]
    NoCoordinates { path: PathBuf },

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("invalid preset {}: {message}", .path.display())]
    Preset { path: PathBuf, message: String },
}

impl ResampleError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
