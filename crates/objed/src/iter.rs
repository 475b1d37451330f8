//! Iterator helpers.

use std::iter::Zip;

/// Zips two iterators that must have the same length.
///
/// Weight and child lists are kept parallel to each other. [`Iterator::zip`] would silently drop
/// the tail of the longer list if they ever diverged; this panics instead.
#[track_caller]
pub fn zip_exact<A, B>(a: A, b: B) -> Zip<A::IntoIter, B::IntoIter>
where
    A: IntoIterator,
    B: IntoIterator,
    A::IntoIter: ExactSizeIterator,
    B::IntoIter: ExactSizeIterator,
{
    let (a, b) = (a.into_iter(), b.into_iter());
    assert_eq!(
        a.len(),
        b.len(),
        "`zip_exact` called on iterators with different lengths"
    );
    a.zip(b)
}

/// Returns the index and value of the first item that is smaller than all items before it and
/// smaller than `bound`.
///
/// Ties keep the earliest item. `NaN` values never win.
pub fn first_min_below<I>(values: I, bound: f64) -> Option<(usize, f64)>
where
    I: IntoIterator<Item = f64>,
{
    let mut best = None;
    let mut best_value = bound;
    for (i, value) in values.into_iter().enumerate() {
        if value < best_value {
            best = Some((i, value));
            best_value = value;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "different lengths")]
    fn zip_exact_checks_lengths() {
        zip_exact([1, 2], [1]).for_each(drop);
    }

    #[test]
    fn minimum_keeps_the_first_tie() {
        assert_eq!(first_min_below([0.5, 0.2, 0.2, 0.9], 1.0), Some((1, 0.2)));
        assert_eq!(first_min_below([f64::NAN, 0.7], 1.0), Some((1, 0.7)));
        assert_eq!(first_min_below([1.0, 2.0], 1.0), None);
        assert_eq!(first_min_below([], 1.0), None);
    }
}
