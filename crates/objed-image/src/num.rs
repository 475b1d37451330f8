//! Utilities for numerics.

use std::{cmp::Ordering, fmt, ops};

/// Numeric types usable as coordinates of [`crate::rect::Rect`] and friends.
///
/// Implemented for the built-in signed integer and floating-point types. Division follows the
/// semantics of the underlying type, so halving an odd `i32` width truncates.
pub trait Coord:
    ops::Add<Output = Self>
    + ops::Sub<Output = Self>
    + ops::Mul<Output = Self>
    + ops::Div<Output = Self>
    + PartialOrd
    + Copy
    + Default
    + fmt::Display
{
    /// The additive identity.
    const ZERO: Self;
    /// The value `2`, used for halving sizes.
    const TWO: Self;

    fn min(self, other: Self) -> Self {
        match self.partial_cmp(&other) {
            Some(Ordering::Greater) => other,
            _ => self,
        }
    }

    fn max(self, other: Self) -> Self {
        match self.partial_cmp(&other) {
            Some(Ordering::Less) => other,
            _ => self,
        }
    }
}

macro_rules! coord {
    ($($ty:ty = $zero:literal, $two:literal;)+) => {
        $(
            impl Coord for $ty {
                const ZERO: Self = $zero;
                const TWO: Self = $two;
            }
        )+
    };
}

coord! {
    i32 = 0, 2;
    i64 = 0, 2;
    f32 = 0.0, 2.0;
    f64 = 0.0, 2.0;
}

/// Rounds half-up towards the next integer by truncating `v + 0.5`.
///
/// This matches the rounding used throughout the detector geometry: it truncates towards zero, so
/// negative inputs round differently than [`f64::round`].
#[inline]
pub fn round(v: f64) -> i32 {
    (v + 0.5) as i32
}
