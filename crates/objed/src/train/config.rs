//! Training configuration files.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{classifier::doc, detector::Scales, error::TrainError};

/// Decides when a strong classifier has enough weak classifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoppingCriterion {
    /// Stop when either [`StoppingCriterion::Count`] or [`StoppingCriterion::Rate`] holds.
    #[default]
    #[serde(alias = "any")]
    Any,
    /// Stop after `WcCount` boosting rounds.
    #[serde(alias = "count")]
    Count,
    /// Stop once the false negative and false positive rates are low enough.
    #[serde(alias = "rate")]
    Rate,
}

/// Shape of the strong classifiers built by boosting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    /// A single sum of weak classifiers.
    #[default]
    #[serde(alias = "realadaboost")]
    RealAdaBoost,
    /// The maximum of several sums, each specialized on the positives it scores highest.
    #[serde(alias = "realadaboostmax")]
    RealAdaBoostMax,
}

fn default_classifier_type() -> String {
    "cascadeClassifier".into()
}

fn one() -> f64 {
    1.0
}

fn default_step_scale() -> f64 {
    Scales::DEFAULT_STEP
}

fn default_negative_count() -> usize {
    1000
}

fn default_weight_shift() -> f64 {
    0.5
}

/// Parameters of a training run, read from a JSON file with `PascalCase` keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrainConfig {
    /// `cascadeClassifier` or `treeClassifier`.
    #[serde(default = "default_classifier_type")]
    pub classifier_type: String,
    /// Where the classifier is stored. An existing file is resumed.
    pub classifier_path: PathBuf,
    pub classifier_width: i32,
    pub classifier_height: i32,

    #[serde(default = "one")]
    pub minimum_scale: f64,
    #[serde(default = "one")]
    pub maximum_scale: f64,
    #[serde(default = "default_step_scale")]
    pub step_scale: f64,

    /// Number of negative samples collected for every stage.
    #[serde(default = "default_negative_count")]
    pub negative_count: usize,
    #[serde(default)]
    pub positive_count_threshold: usize,
    #[serde(default)]
    pub negative_count_threshold: usize,

    /// Share of the initial boosting weight given to the positives.
    #[serde(default = "default_weight_shift")]
    pub weight_shift: f64,
    /// Number of cascade stages or tree levels to train. `0` trains until the samples run out.
    #[serde(default)]
    pub level_count: usize,
    /// Number of boosting rounds per strong classifier for [`StoppingCriterion::Count`].
    #[serde(default)]
    pub wc_count: usize,
    #[serde(default)]
    pub false_negative_rate: f64,
    #[serde(default)]
    pub false_positive_rate: f64,
    #[serde(default)]
    pub stopping_criterion: StoppingCriterion,

    #[serde(default)]
    pub method: Method,
    /// Number of branches for [`Method::RealAdaBoostMax`] (default 2).
    #[serde(default)]
    pub method_params: String,

    /// File recording tree nodes that ran out of samples. Only used for trees.
    #[serde(default)]
    pub leaf_list_path: Option<PathBuf>,

    #[serde(default)]
    pub positive_dataset_list: Vec<PathBuf>,
    #[serde(default)]
    pub negative_dataset_list: Vec<PathBuf>,
    /// Weak classifier families, see [`WcMaker`](super::WcMaker).
    #[serde(default)]
    pub wc_line_list: Vec<String>,
}

impl TrainConfig {
    /// Reads and validates a configuration file.
    ///
    /// Relative paths in the file are resolved against the directory containing it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TrainError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| TrainError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = serde_json::from_str(&text)
            .map_err(|e| TrainError::InvalidConfig(format!("{}: {e}", path.display())))?;
        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }
        config.validate()?;
        log::debug!("loaded training configuration from '{}'", path.display());
        Ok(config)
    }

    /// Makes every relative path in the configuration relative to `dir` instead.
    pub fn resolve_paths(&mut self, dir: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = dir.join(&*p);
            }
        };

        resolve(&mut self.classifier_path);
        if self
            .leaf_list_path
            .as_ref()
            .map_or(false, |p| p.as_os_str().is_empty())
        {
            self.leaf_list_path = None;
        }
        if let Some(p) = &mut self.leaf_list_path {
            resolve(p);
        }
        self.positive_dataset_list.iter_mut().for_each(resolve);
        self.negative_dataset_list.iter_mut().for_each(resolve);
    }

    pub fn validate(&self) -> Result<(), TrainError> {
        let invalid = |msg: String| Err(TrainError::InvalidConfig(msg));

        let (w, h) = self.size();
        if !doc::is_valid_size(w, h) {
            return invalid(format!("classifier size {w}x{h} must be positive and odd"));
        }
        if self.minimum_scale <= 0.0 || self.minimum_scale > self.maximum_scale {
            return invalid(format!(
                "invalid scale range {}..={}",
                self.minimum_scale, self.maximum_scale
            ));
        }
        if self.step_scale <= 1.0 {
            return invalid(format!("StepScale {} must be greater than 1", self.step_scale));
        }
        if self.negative_count == 0 {
            return invalid("NegativeCount must be positive".into());
        }
        for (name, rate) in [
            ("FalseNegativeRate", self.false_negative_rate),
            ("FalsePositiveRate", self.false_positive_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return invalid(format!("{name} {rate} is not in [0, 1]"));
            }
        }
        if self.weight_shift <= 0.0 || self.weight_shift >= 1.0 {
            return invalid(format!("WeightShift {} is not in (0, 1)", self.weight_shift));
        }
        if self.positive_dataset_list.is_empty() || self.negative_dataset_list.is_empty() {
            return invalid("positive and negative dataset lists must not be empty".into());
        }
        if self.stopping_criterion == StoppingCriterion::Count && self.wc_count == 0 {
            return invalid("the Count stopping criterion needs a positive WcCount".into());
        }
        self.branch_count()?;
        Ok(())
    }

    /// Returns the classifier width and height.
    pub fn size(&self) -> (i32, i32) {
        (self.classifier_width, self.classifier_height)
    }

    /// Returns the scales of the image pyramid negatives are collected from.
    ///
    /// # Panics
    ///
    /// Panics if the scale parameters do not pass [`TrainConfig::validate`].
    #[track_caller]
    pub fn scales(&self) -> Scales {
        Scales::new(self.minimum_scale, self.maximum_scale, self.step_scale)
    }

    /// Returns the number of strong classifiers combined by [`Method::RealAdaBoostMax`].
    pub fn branch_count(&self) -> Result<usize, TrainError> {
        let params = self.method_params.trim();
        if params.is_empty() {
            return Ok(2);
        }
        match params.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(TrainError::InvalidConfig(format!(
                "MethodParams '{params}' is not a positive branch count"
            ))),
        }
    }
}
