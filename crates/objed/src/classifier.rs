//! Composable window classifiers.
//!
//! A [`Classifier`] maps a window of the current frame (given by its center pixel) to a real
//! response. Positive responses accept the window, everything else rejects it.
//!
//! Leaves compute rectangle statistics from integral images of preprocessed frames held by an
//! [`ImagePool`]. Before evaluating a classifier on a pool, [`Classifier::prepare`] must have been
//! called on that pool once, so that every integral image the classifier reads is registered and
//! kept up to date by [`ImagePool::update`].
//!
//! Combinators own their children and decide how child responses are combined and when
//! evaluation can stop early.

mod combine;
pub mod doc;
mod extension;
mod haar;
mod mean;
mod roi;
mod tree;

use std::{fs, path::Path};

use serde_json::Value;

use crate::{
    error::{EvalError, ModelError, PoolError},
    factory::Factory,
    pool::ImagePool,
};

pub use combine::{Additive, Cascade, Linear, Max, Parallel};
pub use extension::ClassifierExtension;
pub use haar::{
    Feature, Haar, Haar1Pw, Haar1Stump, Haar2Pw, Haar2Stump, Haar3Pw, Haar3Stump, OneRect,
    Piecewise, Response, Stump, ThreeRect, TwoRect,
};
pub use mean::{Mean, MeanRange};
pub use roi::Roi;
pub use tree::{Side, Tree};

/// Work counters collected while evaluating a classifier on one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalStats {
    stages: u32,
}

impl EvalStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of strong classifiers ([`Additive`] and [`Linear`] nodes) evaluated.
    pub fn stages(&self) -> u32 {
        self.stages
    }

    pub fn add_stage(&mut self) {
        self.stages += 1;
    }
}

/// A node of a classifier tree.
#[derive(Debug, Clone)]
pub enum Classifier {
    Haar1Stump(Haar1Stump),
    Haar2Stump(Haar2Stump),
    Haar3Stump(Haar3Stump),
    Haar1Pw(Haar1Pw),
    Haar2Pw(Haar2Pw),
    Haar3Pw(Haar3Pw),
    Mean(Mean),
    Roi(Roi),
    Cascade(Cascade),
    Parallel(Parallel),
    Tree(Tree),
    Additive(Additive),
    Linear(Linear),
    Max(Max),
    /// A classifier type registered with a [`Factory`].
    Extension(Box<dyn ClassifierExtension>),
}

macro_rules! dispatch {
    ($this:expr, $c:ident => $e:expr) => {
        dispatch!($this, $c => $e, $c => $e)
    };
    ($this:expr, $c:ident => $e:expr, $x:ident => $xe:expr) => {
        match $this {
            Classifier::Haar1Stump($c) => $e,
            Classifier::Haar2Stump($c) => $e,
            Classifier::Haar3Stump($c) => $e,
            Classifier::Haar1Pw($c) => $e,
            Classifier::Haar2Pw($c) => $e,
            Classifier::Haar3Pw($c) => $e,
            Classifier::Mean($c) => $e,
            Classifier::Roi($c) => $e,
            Classifier::Cascade($c) => $e,
            Classifier::Parallel($c) => $e,
            Classifier::Tree($c) => $e,
            Classifier::Additive($c) => $e,
            Classifier::Linear($c) => $e,
            Classifier::Max($c) => $e,
            Classifier::Extension($x) => $xe,
        }
    };
}

impl Classifier {
    /// Returns the width of the window this classifier looks at.
    pub fn width(&self) -> i32 {
        dispatch!(self, c => c.width())
    }

    /// Returns the height of the window this classifier looks at.
    pub fn height(&self) -> i32 {
        dispatch!(self, c => c.height())
    }

    /// Returns the `type` string of this node's document form.
    pub fn type_name(&self) -> &str {
        dispatch!(self, c => c.type_name())
    }

    /// Registers every integral image this classifier reads in `pool`.
    pub fn prepare(&self, pool: &mut ImagePool) -> Result<(), PoolError> {
        dispatch!(self, c => c.prepare(pool))
    }

    /// Evaluates the classifier on the window centered at `(x, y)` of the frame in `pool`.
    pub fn evaluate(&self, pool: &ImagePool, x: i32, y: i32) -> Result<f32, EvalError> {
        self.evaluate_with_stats(pool, x, y, &mut EvalStats::new())
    }

    /// Evaluates the classifier like [`Classifier::evaluate`], counting work in `stats`.
    pub fn evaluate_with_stats(
        &self,
        pool: &ImagePool,
        x: i32,
        y: i32,
        stats: &mut EvalStats,
    ) -> Result<f32, EvalError> {
        dispatch!(self, c => c.evaluate(pool, x, y, stats))
    }

    /// Returns the document form of this classifier.
    pub fn to_document(&self) -> Value {
        dispatch!(self, c => c.to_document(), x => x.serialize())
    }

    /// Builds a classifier from its document form, resolving path references against `work_dir`.
    ///
    /// Only the built-in classifier types are recognized. Use a [`Factory`] to load documents
    /// containing extension types.
    pub fn from_document(doc: &Value, work_dir: &Path) -> Result<Self, ModelError> {
        Factory::new().create_classifier(doc, work_dir)
    }

    /// Loads a classifier document from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        Factory::new().load_classifier(path)
    }

    /// Writes the document form of this classifier to `path` as pretty-printed JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ModelError> {
        self.save_impl(path.as_ref())
    }

    fn save_impl(&self, path: &Path) -> Result<(), ModelError> {
        let text = serde_json::to_string_pretty(&self.to_document())?;
        fs::write(path, text).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("saved {} to '{}'", self.type_name(), path.display());
        Ok(())
    }

    /// Returns whether this classifier fits into a `width x height` window.
    pub(crate) fn fits(&self, width: i32, height: i32) -> bool {
        self.width() <= width && self.height() <= height
    }
}

macro_rules! impl_from {
    ($($variant:ident),+) => {
        $(
            impl From<$variant> for Classifier {
                fn from(c: $variant) -> Self {
                    Self::$variant(c)
                }
            }
        )+
    };
}

impl_from!(
    Haar1Stump, Haar2Stump, Haar3Stump, Haar1Pw, Haar2Pw, Haar3Pw, Mean, Roi, Cascade, Parallel,
    Tree, Additive, Linear, Max
);

impl From<Box<dyn ClassifierExtension>> for Classifier {
    fn from(c: Box<dyn ClassifierExtension>) -> Self {
        Self::Extension(c)
    }
}

/// Checks that `child` fits into the `width x height` node `parent` when loading a document.
pub(crate) fn check_child(
    parent: &'static str,
    width: i32,
    height: i32,
    child: &Classifier,
    exact: bool,
) -> Result<(), ModelError> {
    let ok = if exact {
        child.width() == width && child.height() == height
    } else {
        child.fits(width, height)
    };
    if ok {
        Ok(())
    } else {
        Err(ModelError::ChildSize {
            parent,
            width,
            height,
            child_width: child.width(),
            child_height: child.height(),
        })
    }
}

/// Panics if `child` does not fit into the `width x height` node `parent`.
#[track_caller]
pub(crate) fn assert_child(
    parent: &'static str,
    width: i32,
    height: i32,
    child: &Classifier,
    exact: bool,
) {
    if let Err(e) = check_child(parent, width, height, child, exact) {
        panic!("{e}");
    }
}

/// Builds every child listed in the `clList` field of `doc`.
fn children_from_document(
    doc: &Value,
    work_dir: &Path,
    factory: &Factory,
) -> Result<Vec<Classifier>, ModelError> {
    doc::array(doc, "clList")?
        .iter()
        .map(|child| factory.create_classifier(child, work_dir))
        .collect()
}

fn children_to_document(children: &[Classifier]) -> Value {
    Value::Array(children.iter().map(Classifier::to_document).collect())
}
