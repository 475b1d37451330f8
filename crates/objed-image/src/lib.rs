//! CPU image primitives for the objed object detector.
//!
//! # Overview
//!
//! ## Images
//!
//! [`Image`] is an owned 8-bit image with one to four interleaved channels. It supports the few
//! operations a sliding-window detector needs: bilinear resizing, cropping and loading from disk
//! (via the [`image`] crate).
//!
//! ## Integral Images
//!
//! [`IntegralImage`] is the summed-area table of an [`Image`]. It allows computing the sum (and
//! mean) of any axis-aligned rectangle in constant time, which is what every rectangle feature
//! classifier is built on.
//!
//! ## Geometry
//!
//! The [`rect`] module provides [`rect::Rect`], [`rect::Point`], [`rect::Size`] and
//! [`rect::Interval`], all generic over their coordinate type.

pub mod num;
pub mod rect;

mod image;
mod integral;

pub use crate::image::*;
pub use integral::*;
