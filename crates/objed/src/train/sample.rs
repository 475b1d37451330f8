use std::path::{Path, PathBuf};

use crate::{
    classifier::Classifier, error::EvalError, iter::zip_exact, pool::ImagePool, Image,
};

/// A classifier-sized training image together with its image pool.
#[derive(Debug, Clone)]
pub struct Sample {
    pool: ImagePool,
    source: PathBuf,
}

impl Sample {
    /// Creates a sample from `image`, which must have the size of the classifier being trained.
    ///
    /// `source` is the file the image was taken from and is only used for diagnostics.
    pub fn new(image: &Image, source: impl Into<PathBuf>) -> Self {
        let mut pool = ImagePool::new();
        pool.update(image);
        Self {
            pool,
            source: source.into(),
        }
    }

    pub fn pool(&self) -> &ImagePool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ImagePool {
        &mut self.pool
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Evaluates `classifier` on the window centered in this sample.
    ///
    /// The classifier must have been prepared on [`Sample::pool_mut`].
    pub fn response(&self, classifier: &Classifier) -> Result<f32, EvalError> {
        classifier.evaluate(&self.pool, classifier.width() / 2, classifier.height() / 2)
    }
}

/// Samples of one class together with their boosting weights.
#[derive(Debug, Clone)]
pub struct SampleSet<'a> {
    samples: Vec<&'a Sample>,
    weights: Vec<f64>,
}

impl<'a> SampleSet<'a> {
    /// Creates a set with all weights zero.
    pub fn new(samples: impl IntoIterator<Item = &'a Sample>) -> Self {
        let samples: Vec<_> = samples.into_iter().collect();
        let weights = vec![0.0; samples.len()];
        Self { samples, weights }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[&'a Sample] {
        &self.samples
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Iterates over the samples and their weights.
    pub fn iter(&self) -> impl Iterator<Item = (&'a Sample, f64)> + '_ {
        zip_exact(self.samples.iter().copied(), self.weights.iter().copied())
    }

    /// Returns the subset of samples matching `pred`, with their weights.
    pub fn filter(&self, mut pred: impl FnMut(&Sample) -> bool) -> Self {
        let (samples, weights) = self.iter().filter(|(s, _)| pred(s)).unzip();
        Self { samples, weights }
    }

    /// Gives every sample the weight `weight`.
    pub fn fill(&mut self, weight: f64) {
        self.weights.fill(weight);
    }

    /// Multiplies the weight of every sample by `factor(sample)`.
    pub fn scale_by(&mut self, mut factor: impl FnMut(&Sample) -> f64) {
        for (sample, weight) in zip_exact(&self.samples, &mut self.weights) {
            *weight *= factor(sample);
        }
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }
}
