//! Error taxonomy for the shadow pipeline.
//!
//! Geometric and extraction failures are deterministic and never retried.
//! An empty cloud mask is not an error: it produces an empty result.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShadowError>;

/// Pipeline stage that raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Extract,
    Project,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Extract => "extract",
            Stage::Project => "project",
            Stage::Write => "write",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ShadowError {
    #[error("{name} = {value} is outside [{min}, {max}]")]
    InputRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("region {0} does not exist in the label image")]
    InvalidRegion(u32),

    #[error("shadow bearing for sun azimuth {azimuth} has no column component")]
    DegenerateBearing { azimuth: f64 },

    #[error("ray from {p0:?} through {p1:?} is parallel to the ground plane")]
    DegenerateRay { p0: [f64; 3], p1: [f64; 3] },

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("cannot read {}: {source}", .path.display())]
    SourceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported raster {}: {reason}", .path.display())]
    Format { path: PathBuf, reason: String },

    #[error("cannot write {}: {reason}", .path.display())]
    Output { path: PathBuf, reason: String },

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<ShadowError>,
    },
}

impl ShadowError {
    /// Tag an error with the pipeline stage it came from.
    pub fn at(self, stage: Stage) -> Self {
        match self {
            already @ ShadowError::Stage { .. } => already,
            other => ShadowError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The error with any stage wrapper removed.
    pub fn root(&self) -> &ShadowError {
        match self {
            ShadowError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(feature = "python")]
impl From<ShadowError> for pyo3::PyErr {
    fn from(err: ShadowError) -> Self {
        use pyo3::exceptions::{PyFileNotFoundError, PyIOError, PyValueError};
        let msg = err.to_string();
        match err.root() {
            ShadowError::SourceIo { source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                PyFileNotFoundError::new_err(msg)
            }
            ShadowError::SourceIo { .. } | ShadowError::Output { .. } => PyIOError::new_err(msg),
            _ => PyValueError::new_err(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_wraps_once() {
        let err = ShadowError::InvalidRegion(4)
            .at(Stage::Extract)
            .at(Stage::Project);
        match &err {
            ShadowError::Stage { stage, .. } => assert_eq!(*stage, Stage::Extract),
            other => panic!("expected stage wrapper, got {other:?}"),
        }
        assert!(matches!(err.root(), ShadowError::InvalidRegion(4)));
        assert_eq!(
            err.to_string(),
            "extract stage failed: region 4 does not exist in the label image"
        );
    }
}
