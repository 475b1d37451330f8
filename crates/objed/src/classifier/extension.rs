use std::fmt;

use serde_json::Value;

use crate::{
    error::{EvalError, PoolError},
    pool::ImagePool,
};

use super::EvalStats;

/// A classifier type that is not built into this crate.
///
/// Extensions are created by constructors registered with a [`Factory`] and stored in
/// [`Classifier::Extension`]. They take part in evaluation and serialization like any built-in
/// node.
///
/// [`Factory`]: crate::factory::Factory
/// [`Classifier::Extension`]: super::Classifier::Extension
pub trait ClassifierExtension: fmt::Debug + Send + Sync {
    /// Returns the `type` string this extension was registered under.
    fn type_name(&self) -> &str;

    fn width(&self) -> i32;

    fn height(&self) -> i32;

    /// Registers every pool entry the extension reads.
    fn prepare(&self, pool: &mut ImagePool) -> Result<(), PoolError>;

    /// Evaluates the extension on the window centered at `(x, y)`.
    fn evaluate(
        &self,
        pool: &ImagePool,
        x: i32,
        y: i32,
        stats: &mut EvalStats,
    ) -> Result<f32, EvalError>;

    /// Returns the document form, including the `type`, `width` and `height` fields.
    fn serialize(&self) -> Value;

    fn clone_box(&self) -> Box<dyn ClassifierExtension>;
}

impl Clone for Box<dyn ClassifierExtension> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
