//! Boosted sliding-window object detection.
//!
//! # Overview
//!
//! Detection runs a [`Classifier`] over every window of a multi-scale image pyramid. Classifiers
//! are trees of rectangle-feature leaves (Haar-like stumps and piecewise functions, window means,
//! region-of-interest checks) joined by combinators (cascades, trees, boosted sums, maxima). All
//! leaves read their statistics from integral images held by an [`ImagePool`], which caches the
//! preprocessed variants of the current frame.
//!
//! A [`Detector`] owns a classifier and an image pool. It scans the frame at every configured
//! scale, maps positive windows back to frame coordinates and groups overlapping hits with
//! [`cluster`].
//!
//! The [`train`] module grows cascades and trees of boosted classifiers from directories of
//! positive and negative example images.
//!
//! # Documents
//!
//! Classifiers and detectors are stored as JSON documents. Every node has a `type` string and
//! the fields of that type. A document that is a plain string is a path to another document,
//! resolved relative to the directory of the document containing it. See [`factory`].
//!
//! # Environment Variables
//!
//! * `RUST_LOG`: overrides the log filter installed by [`init_logger!`].
//!
//! [`Classifier`]: classifier::Classifier
//! [`ImagePool`]: pool::ImagePool
//! [`Detector`]: detector::Detector
//! [`cluster`]: cluster::cluster

use log::LevelFilter;

pub mod classifier;
pub mod cluster;
pub mod debug;
pub mod detector;
pub mod error;
pub mod factory;
pub mod iter;
pub mod num;
pub mod pool;
pub mod timer;
pub mod train;

pub use objed_image::{rect, Image, IntegralImage};

#[cfg(test)]
mod test;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .filter(Some("objed_image"), log_level)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and objed will log at *debug* level. `RUST_LOG` can be used to override
/// this.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
