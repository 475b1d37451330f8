//! Utilities for numerics.

pub use objed_image::num::round;

/// Small positive constant used to seed accept/reject decisions and to smooth boosting weights.
pub const EPSILON: f32 = 0.000001;

/// Rounds `v` like [`round`], but never below `1`.
///
/// Used for scan steps, which are configured as fractions of the classifier size.
#[inline]
pub fn round_step(v: f64) -> i32 {
    round(v.max(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_at_least_one() {
        assert_eq!(round_step(0.0), 1);
        assert_eq!(round_step(0.2 * 5.0), 1);
        assert_eq!(round_step(0.5 * 5.0), 3);
        assert_eq!(round_step(-3.0), 1);
    }
}
