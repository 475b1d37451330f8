//! Error types.
//!
//! Every subsystem reports its recoverable failures through one of the enums in this module:
//!
//! * [`PoolError`]: image pool lookups naming an unknown preprocessing method.
//! * [`ModelError`]: loading classifier and detector documents.
//! * [`EvalError`]: evaluating a classifier on a window.
//! * [`TrainError`]: training configuration, sample loading and boosting.

use std::{io, path::PathBuf};

/// An error raised by [`ImagePool`][crate::pool::ImagePool] lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("unknown preprocessing method '{method}' in '{id}'")]
    UnknownMethod { id: String, method: String },
}

/// An error raised while building a classifier or detector from its document form.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("missing field '{0}'")]
    MissingField(String),

    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("unknown type '{0}'")]
    UnknownType(String),

    #[error("invalid size {width}x{height} (width and height must be positive and odd)")]
    InvalidSize { width: i32, height: i32 },

    #[error("{child_width}x{child_height} child does not fit into {width}x{height} {parent}")]
    ChildSize {
        parent: &'static str,
        width: i32,
        height: i32,
        child_width: i32,
        child_height: i32,
    },

    #[error("failed to access '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl ModelError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// An error raised while evaluating a classifier on a window.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("integral image '{0}' is not registered in the image pool")]
    MissingIntegral(String),

    #[error("rectangle ({x}, {y}, {width}, {height}) lies outside of the integral image")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },

    #[error("{0} has no classifiers to evaluate")]
    Empty(&'static str),

    #[error("extension classifier failed: {0}")]
    Extension(String),
}

/// An error raised by the training pipeline.
#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid weak classifier line '{line}': {reason}")]
    InvalidWcLine { line: String, reason: String },

    #[error("cannot train next weak classifier (best Z = {best_z})")]
    NoWeakClassifier { best_z: f64 },

    #[error("no positive or negative samples")]
    NoSamples,

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("failed to load image '{}'", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to access '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
