//! Classifier training.
//!
//! Classifiers are grown from a directory of positive images (each showing one object, framed
//! like the classifier window) and a directory of negative images (containing no objects at
//! all). Training is driven by a [`TrainConfig`] and produces either a [`Cascade`] or a [`Tree`]
//! of strong classifiers.
//!
//! Every strong classifier is built by boosting: in each round, all weak classifier candidates
//! generated by [`WcMaker`] are fitted to the weighted samples and the best one is added (see
//! [`real_ada_boost`]). The samples for a stage are those that pass the stages trained before it,
//! so later stages focus on the harder negatives.
//!
//! [`Cascade`]: crate::classifier::Cascade
//! [`Tree`]: crate::classifier::Tree

mod boost;
mod cascade;
mod config;
mod dataset;
mod sample;
mod stage;
mod tree;
mod wc;

use crate::{classifier, error::TrainError};

pub use boost::{real_ada_boost, reset_weights, set_weights};
pub use cascade::train_cascade;
pub use config::{Method, StoppingCriterion, TrainConfig};
pub use dataset::{DatasetProcessor, IMAGE_EXTENSIONS};
pub use sample::{Sample, SampleSet};
pub use stage::StageTrainer;
pub use tree::{
    central_at, load_leaves, save_leaves, set_central_at, train_tree, Label, ParityCascade,
};
pub use wc::{WcMaker, WeakClassifier};

/// Trains the classifier type named by `ClassifierType`.
pub fn train(config: &TrainConfig) -> Result<(), TrainError> {
    match config.classifier_type.as_str() {
        classifier::Cascade::TYPE => train_cascade(config),
        classifier::Tree::TYPE => train_tree(config),
        other => Err(TrainError::InvalidConfig(format!(
            "cannot train a classifier of type '{other}'"
        ))),
    }
}
