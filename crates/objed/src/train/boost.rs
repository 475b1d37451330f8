//! Real AdaBoost weak classifier selection.

use rayon::prelude::*;

use crate::{error::TrainError, iter::first_min_below, num::EPSILON};

use super::{Sample, SampleSet, WeakClassifier};

/// Assigns the initial boosting weights.
///
/// The positives share a total weight of `shift`, the negatives `1 - shift`.
pub fn reset_weights(pos: &mut SampleSet<'_>, neg: &mut SampleSet<'_>, shift: f64) {
    if !pos.is_empty() {
        pos.fill(shift / pos.len() as f64);
    }
    if !neg.is_empty() {
        neg.fill((1.0 - shift) / neg.len() as f64);
    }
}

/// Assigns the boosting weights that make the next weak classifier focus on the samples `respond`
/// gets wrong.
///
/// Starting from [`reset_weights`], every positive weight is multiplied by `exp(-r)` and every
/// negative weight by `exp(r)`, where `r` is the response to the sample. The weights are then
/// normalized to a sum of 1.
pub fn set_weights(
    pos: &mut SampleSet<'_>,
    neg: &mut SampleSet<'_>,
    shift: f64,
    respond: impl Fn(&Sample) -> f32,
) {
    reset_weights(pos, neg, shift);
    pos.scale_by(|s| (-f64::from(respond(s))).exp());
    neg.scale_by(|s| f64::from(respond(s)).exp());

    let total = pos.total_weight() + neg.total_weight();
    if total > 0.0 {
        pos.scale_by(|_| 1.0 / total);
        neg.scale_by(|_| 1.0 / total);
    }
}

/// Trains every candidate on the weighted samples and returns the best one.
///
/// Candidates are trained in parallel. The candidate with the smallest `Z` wins, and ties go to
/// the candidate listed first. Candidates that cannot be evaluated on the samples are skipped.
///
/// Returns the winner (with its trained response) and its `Z`.
pub fn real_ada_boost(
    candidates: &mut [WeakClassifier],
    pos: &SampleSet<'_>,
    neg: &SampleSet<'_>,
) -> Result<(WeakClassifier, f64), TrainError> {
    if candidates.is_empty() {
        return Err(TrainError::NoWeakClassifier { best_z: f64::INFINITY });
    }
    if pos.is_empty() || neg.is_empty() {
        return Err(TrainError::NoSamples);
    }

    let zs: Vec<f64> = candidates
        .par_iter_mut()
        .map(|wc| match wc.train(pos, neg) {
            Ok(z) => z,
            Err(e) => {
                log::trace!("skipping {}: {e}", wc.type_name());
                f64::INFINITY
            }
        })
        .collect();

    let bound = 1.0 + f64::from(EPSILON);
    match first_min_below(zs.iter().copied(), bound) {
        Some((index, z)) if z <= 1.0 => {
            log::debug!(
                "selected {} #{index} of {} with Z = {z:.6}",
                candidates[index].type_name(),
                candidates.len(),
            );
            Ok((candidates[index].clone(), z))
        }
        best => Err(TrainError::NoWeakClassifier {
            best_z: best.map_or_else(
                || zs.iter().copied().fold(f64::INFINITY, f64::min),
                |(_, z)| z,
            ),
        }),
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::{train::WcMaker, Image};

    use super::*;

    fn samples(values: &[u8]) -> Vec<Sample> {
        values
            .iter()
            .map(|&v| Sample::new(&Image::filled(5, 5, 1, v), "mem"))
            .collect()
    }

    #[test]
    fn initial_weights() {
        let (pos, neg) = (samples(&[1, 2]), samples(&[3, 4, 5, 6]));
        let (mut pos, mut neg) = (SampleSet::new(&pos), SampleSet::new(&neg));
        reset_weights(&mut pos, &mut neg, 0.75);
        assert_eq!(pos.weights(), [0.375, 0.375]);
        assert_eq!(neg.weights(), [0.0625; 4]);
    }

    #[test]
    fn misclassified_samples_gain_weight() {
        let (pos, neg) = (samples(&[1, 2]), samples(&[3, 4]));
        let (mut pos, mut neg) = (SampleSet::new(&pos), SampleSet::new(&neg));
        // Everything is scored as positive, so the negatives are wrong.
        set_weights(&mut pos, &mut neg, 0.5, |_| 1.0);
        assert_relative_eq!(pos.total_weight() + neg.total_weight(), 1.0);
        assert!(neg.weights()[0] > pos.weights()[0]);
        let e2 = 1f64.exp().powi(2);
        assert_relative_eq!(neg.weights()[0] / pos.weights()[0], e2, epsilon = 1e-9);
    }

    #[test]
    fn no_candidates_or_samples() {
        let (pos, neg) = (samples(&[200]), samples(&[20]));
        let (pos, neg) = (SampleSet::new(&pos), SampleSet::new(&neg));
        assert!(matches!(
            real_ada_boost(&mut [], &pos, &neg),
            Err(TrainError::NoWeakClassifier { .. })
        ));

        let mut candidates = WcMaker::new(5, 5)
            .make("Haar1StumpWc -preproc=gray -wd=1 -ht=1")
            .unwrap();
        let none: Vec<Sample> = Vec::new();
        let empty = SampleSet::new(&none);
        assert!(matches!(
            real_ada_boost(&mut candidates, &pos, &empty),
            Err(TrainError::NoSamples)
        ));
    }

    #[test]
    fn useless_candidates_are_rejected() {
        // Positives and negatives look the same, so no split beats chance.
        let (mut pos, mut neg) = (samples(&[100, 100]), samples(&[100, 100]));
        let mut candidates = WcMaker::new(5, 5)
            .make("Haar1StumpWc -preproc=gray -wd=1 -ht=1")
            .unwrap();
        for sample in pos.iter_mut().chain(&mut neg) {
            for wc in &candidates {
                wc.prepare(sample.pool_mut()).unwrap();
            }
        }
        let (mut pos, mut neg) = (SampleSet::new(&pos), SampleSet::new(&neg));
        reset_weights(&mut pos, &mut neg, 0.5);
        let result = real_ada_boost(&mut candidates, &pos, &neg);
        assert!(
            matches!(result, Err(TrainError::NoWeakClassifier { best_z }) if best_z >= 1.0),
            "{result:?}"
        );
    }
}
