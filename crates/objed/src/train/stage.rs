//! Strong classifier training.

use rayon::prelude::*;

use crate::{
    classifier::{Additive, Classifier, EvalStats, Max},
    error::{ModelError, TrainError},
};

use super::{
    boost::{real_ada_boost, set_weights},
    Method, Sample, SampleSet, StoppingCriterion, TrainConfig, WcMaker, WeakClassifier,
};

/// Grows one strong classifier (a cascade stage or tree node) by boosting.
#[derive(Debug, Clone)]
pub struct StageTrainer {
    width: i32,
    height: i32,
    candidates: Vec<WeakClassifier>,
    method: Method,
    branch_count: usize,
    weight_shift: f64,
    criterion: StoppingCriterion,
    wc_count: usize,
    false_negative_rate: f64,
    false_positive_rate: f64,
}

/// The strong classifier while it is being grown.
enum Strong {
    Sum(Additive),
    Branches(Vec<Additive>),
}

impl Strong {
    fn response(&self, sample: &Sample) -> f32 {
        match self {
            Strong::Sum(sum) => center_response(sum, sample),
            Strong::Branches(branches) => max_response(branches, sample),
        }
    }

    fn into_classifier(self, width: i32, height: i32) -> Classifier {
        match self {
            Strong::Sum(sum) => sum.into(),
            Strong::Branches(branches) => {
                Max::from_children(width, height, branches.into_iter().map(Classifier::from)).into()
            }
        }
    }
}

/// Evaluation errors count as rejections.
fn center_response(sum: &Additive, sample: &Sample) -> f32 {
    sum.evaluate(
        sample.pool(),
        sum.width() / 2,
        sum.height() / 2,
        &mut EvalStats::new(),
    )
    .unwrap_or(0.0)
}

fn max_response(branches: &[Additive], sample: &Sample) -> f32 {
    branches
        .iter()
        .map(|branch| center_response(branch, sample))
        .fold(-f32::MAX, f32::max)
}

impl StageTrainer {
    /// Creates a trainer using the weak classifier families and stopping rules of `config`.
    pub fn new(config: &TrainConfig) -> Result<Self, TrainError> {
        let (width, height) = config.size();
        let candidates = WcMaker::new(width, height).make_all(&config.wc_line_list)?;
        if candidates.is_empty() {
            return Err(TrainError::InvalidConfig(
                "WcLineList does not produce any weak classifier".into(),
            ));
        }
        log::info!("{} weak classifier candidates", candidates.len());

        Ok(Self {
            width,
            height,
            candidates,
            method: config.method,
            branch_count: config.branch_count()?,
            weight_shift: config.weight_shift,
            criterion: config.stopping_criterion,
            wc_count: config.wc_count,
            false_negative_rate: config.false_negative_rate,
            false_positive_rate: config.false_positive_rate,
        })
    }

    pub fn candidates(&self) -> &[WeakClassifier] {
        &self.candidates
    }

    /// Boosts weak classifiers until the stopping criterion holds.
    ///
    /// Returns an [`Additive`] classifier, or a [`Max`] of additive branches for
    /// [`Method::RealAdaBoostMax`].
    pub fn train(&mut self, pos: &mut [Sample], neg: &mut [Sample]) -> Result<Classifier, TrainError> {
        if pos.is_empty() || neg.is_empty() {
            return Err(TrainError::NoSamples);
        }

        let candidates = &self.candidates;
        pos.par_iter_mut()
            .chain(neg.par_iter_mut())
            .try_for_each(|sample| {
                candidates
                    .iter()
                    .try_for_each(|wc| wc.prepare(sample.pool_mut()))
            })
            .map_err(ModelError::from)?;
        log::debug!(
            "prepared {} candidates on {} samples",
            candidates.len(),
            pos.len() + neg.len()
        );

        let pos = SampleSet::new(&*pos);
        let neg = SampleSet::new(&*neg);
        let (width, height) = (self.width, self.height);
        let mut strong = match self.method {
            Method::RealAdaBoost => Strong::Sum(Additive::new(width, height)),
            Method::RealAdaBoostMax => {
                Strong::Branches(vec![Additive::new(width, height); self.branch_count])
            }
        };

        let mut rounds = 0;
        loop {
            let z = match &mut strong {
                Strong::Sum(sum) => self.boost_sum(sum, &pos, &neg)?,
                Strong::Branches(branches) => self.boost_branches(branches, &pos, &neg)?,
            };
            rounds += 1;

            let rejected = pos.samples().iter().filter(|s| strong.response(s) <= 0.0).count();
            let accepted = neg.samples().iter().filter(|s| strong.response(s) > 0.0).count();
            let fn_rate = rejected as f64 / pos.len() as f64;
            let fp_rate = accepted as f64 / neg.len() as f64;
            log::info!("round {rounds}: Z = {z:.6}, fn = {fn_rate:.6}, fp = {fp_rate:.6}");

            if self.should_stop(rounds, fn_rate, fp_rate) {
                break;
            }
        }

        Ok(strong.into_classifier(width, height))
    }

    fn boost_sum(
        &mut self,
        sum: &mut Additive,
        pos: &SampleSet<'_>,
        neg: &SampleSet<'_>,
    ) -> Result<f64, TrainError> {
        let (mut pos, mut neg) = (pos.clone(), neg.clone());
        set_weights(&mut pos, &mut neg, self.weight_shift, |s| center_response(sum, s));
        let (wc, z) = real_ada_boost(&mut self.candidates, &pos, &neg)?;
        sum.push(wc.into());
        Ok(z)
    }

    /// Adds one weak classifier to every branch, trained on the positives that branch scores
    /// highest. Returns the largest `Z` of the round.
    fn boost_branches(
        &mut self,
        branches: &mut [Additive],
        pos: &SampleSet<'_>,
        neg: &SampleSet<'_>,
    ) -> Result<f64, TrainError> {
        let mut worst_z = 0.0f64;
        for i in 0..branches.len() {
            let mut own = {
                let all: &[Additive] = branches;
                pos.filter(|s| center_response(&all[i], s) >= max_response(all, s))
            };
            if own.is_empty() {
                log::warn!("no positive samples for branch {}, skipping it", i + 1);
                continue;
            }

            let mut neg = neg.clone();
            set_weights(&mut own, &mut neg, self.weight_shift, |s| {
                center_response(&branches[i], s)
            });
            let (wc, z) = real_ada_boost(&mut self.candidates, &own, &neg)?;
            log::debug!("branch {}: {} positives, Z = {z:.6}", i + 1, own.len());
            branches[i].push(wc.into());
            worst_z = worst_z.max(z);
        }
        Ok(worst_z)
    }

    fn should_stop(&self, rounds: usize, fn_rate: f64, fp_rate: f64) -> bool {
        let count = self.wc_count > 0 && rounds >= self.wc_count;
        let rate = fn_rate <= self.false_negative_rate + f64::EPSILON
            && fp_rate <= self.false_positive_rate + f64::EPSILON;
        match self.criterion {
            StoppingCriterion::Any => count || rate,
            StoppingCriterion::Count => count,
            StoppingCriterion::Rate => rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::Image;

    use super::*;

    fn config(extra: serde_json::Value) -> TrainConfig {
        let mut doc = json!({
            "ClassifierPath": "stage.json",
            "ClassifierWidth": 5,
            "ClassifierHeight": 5,
            "PositiveDatasetList": ["pos"],
            "NegativeDatasetList": ["neg"],
            "WcLineList": ["Haar1StumpWc -preproc=gray -wd=1 -ht=1"],
        });
        if let (Some(doc), serde_json::Value::Object(extra)) = (doc.as_object_mut(), extra) {
            doc.extend(extra);
        }
        serde_json::from_value(doc).unwrap()
    }

    fn samples(values: &[u8]) -> Vec<Sample> {
        values
            .iter()
            .map(|&v| Sample::new(&Image::filled(5, 5, 1, v), "mem"))
            .collect()
    }

    #[test]
    fn stopping_rules() {
        let trainer = StageTrainer::new(&config(json!({"WcCount": 3}))).unwrap();
        assert!(!trainer.should_stop(1, 0.5, 0.5));
        assert!(trainer.should_stop(3, 0.5, 0.5));
        assert!(trainer.should_stop(1, 0.0, 0.0));

        let trainer =
            StageTrainer::new(&config(json!({"WcCount": 3, "StoppingCriterion": "Rate"}))).unwrap();
        assert!(!trainer.should_stop(3, 0.5, 0.5));

        let trainer = StageTrainer::new(&config(json!({
            "WcCount": 3,
            "StoppingCriterion": "Count",
            "FalseNegativeRate": 1.0,
            "FalsePositiveRate": 1.0,
        })))
        .unwrap();
        assert!(!trainer.should_stop(2, 0.0, 0.0));
        assert!(trainer.should_stop(3, 1.0, 1.0));
    }

    #[test]
    fn empty_candidate_list() {
        let result = StageTrainer::new(&config(json!({"WcLineList": []})));
        assert!(matches!(result, Err(TrainError::InvalidConfig(_))));
    }

    #[test]
    fn max_of_branches() {
        let mut trainer = StageTrainer::new(&config(json!({
            "Method": "RealAdaBoostMax",
            "MethodParams": "3",
            "WcCount": 1,
        })))
        .unwrap();
        let (mut pos, mut neg) = (samples(&[200, 210]), samples(&[10, 20]));
        let classifier = trainer.train(&mut pos, &mut neg).unwrap();
        let Classifier::Max(max) = &classifier else {
            panic!("expected a max classifier, got {}", classifier.type_name());
        };
        assert_eq!(max.len(), 3);
        for sample in &pos {
            assert!(sample.response(&classifier).unwrap() > 0.0);
        }
        // The untrained branches respond with 0.
        for sample in &neg {
            assert_eq!(sample.response(&classifier).unwrap(), 0.0);
        }
    }

    #[test]
    fn missing_samples() {
        let mut trainer = StageTrainer::new(&config(json!({}))).unwrap();
        let mut pos = samples(&[200]);
        assert!(matches!(
            trainer.train(&mut pos, &mut []),
            Err(TrainError::NoSamples)
        ));
    }
}
