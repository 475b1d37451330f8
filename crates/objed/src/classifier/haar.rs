//! Haar-like rectangle features with stump and piecewise responses.

use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{EvalError, ModelError, PoolError},
    pool::ImagePool,
    rect::Rect,
    IntegralImage,
};

use super::{doc, EvalStats};

/// A rectangle statistic computed relative to the window center.
///
/// Statistics of well-formed features lie in `0..=255`.
pub trait Feature:
    fmt::Debug + Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync
{
    /// `type` strings of the stump and the piecewise classifier over this feature.
    const TYPES: [&'static str; 2];

    fn rects(&self) -> Vec<Rect>;

    fn statistic(&self, integral: &IntegralImage, x: i32, y: i32) -> Result<i32, EvalError>;
}

/// Maps a feature statistic to a classifier response.
pub trait Response:
    fmt::Debug + Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync
{
    /// Index into [`Feature::TYPES`].
    const KIND: usize;

    fn respond(&self, statistic: i32) -> f32;

    fn validate(&self) -> Result<(), ModelError>;
}

fn out_of_bounds(r: Rect) -> EvalError {
    EvalError::OutOfBounds {
        x: r.x(),
        y: r.y(),
        width: r.width(),
        height: r.height(),
    }
}

fn sum(integral: &IntegralImage, rect: &Rect, x: i32, y: i32) -> Result<i64, EvalError> {
    let r = rect.move_by(x, y);
    integral
        .rect_sum(r.x(), r.y(), r.width(), r.height())
        .map(i64::from)
        .ok_or_else(|| out_of_bounds(r))
}

fn aver(integral: &IntegralImage, rect: &Rect, x: i32, y: i32) -> Result<i64, EvalError> {
    let r = rect.move_by(x, y);
    integral
        .rect_aver(r.x(), r.y(), r.width(), r.height())
        .map(i64::from)
        .ok_or_else(|| out_of_bounds(r))
}

/// Mean brightness of a single rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneRect {
    rect: Rect,
}

impl OneRect {
    pub fn new(rect: Rect) -> Self {
        Self { rect }
    }
}

impl Feature for OneRect {
    const TYPES: [&'static str; 2] = ["haar1StumpClassifier", "haar1PwClassifier"];

    fn rects(&self) -> Vec<Rect> {
        vec![self.rect]
    }

    fn statistic(&self, integral: &IntegralImage, x: i32, y: i32) -> Result<i32, EvalError> {
        Ok(aver(integral, &self.rect, x, y)? as i32)
    }
}

/// Contrast between two rectangles.
///
/// The normalized form is the share of the first rectangle in the total sum, the unnormalized
/// form the difference of the mean values, both mapped to `0..=255`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwoRect {
    rect0: Rect,
    rect1: Rect,
    #[serde(default)]
    normalize: bool,
}

impl TwoRect {
    pub fn new(rect0: Rect, rect1: Rect, normalize: bool) -> Self {
        Self {
            rect0,
            rect1,
            normalize,
        }
    }
}

impl Feature for TwoRect {
    const TYPES: [&'static str; 2] = ["haar2StumpClassifier", "haar2PwClassifier"];

    fn rects(&self) -> Vec<Rect> {
        vec![self.rect0, self.rect1]
    }

    fn statistic(&self, integral: &IntegralImage, x: i32, y: i32) -> Result<i32, EvalError> {
        let value = if self.normalize {
            let s0 = sum(integral, &self.rect0, x, y)?;
            let s1 = sum(integral, &self.rect1, x, y)?;
            255 * s0 / (s0 + s1 + 1)
        } else {
            let a0 = aver(integral, &self.rect0, x, y)?;
            let a1 = aver(integral, &self.rect1, x, y)?;
            (a0 - a1 + 255) / 2
        };
        Ok(value as i32)
    }
}

/// Contrast between a middle rectangle and the two rectangles flanking it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreeRect {
    rect0: Rect,
    rect1: Rect,
    rect2: Rect,
    #[serde(default)]
    normalize: bool,
}

impl ThreeRect {
    pub fn new(rect0: Rect, rect1: Rect, rect2: Rect, normalize: bool) -> Self {
        Self {
            rect0,
            rect1,
            rect2,
            normalize,
        }
    }
}

impl Feature for ThreeRect {
    const TYPES: [&'static str; 2] = ["haar3StumpClassifier", "haar3PwClassifier"];

    fn rects(&self) -> Vec<Rect> {
        vec![self.rect0, self.rect1, self.rect2]
    }

    fn statistic(&self, integral: &IntegralImage, x: i32, y: i32) -> Result<i32, EvalError> {
        let value = if self.normalize {
            let s0 = sum(integral, &self.rect0, x, y)?;
            let s1 = sum(integral, &self.rect1, x, y)?;
            let s2 = sum(integral, &self.rect2, x, y)?;
            255 * (s0 + s2) / (s0 + s1 + s2 + 1)
        } else {
            let a0 = aver(integral, &self.rect0, x, y)?;
            let a1 = aver(integral, &self.rect1, x, y)?;
            let a2 = aver(integral, &self.rect2, x, y)?;
            (a0 - a1 + a2 + 255) / 3
        };
        Ok(value as i32)
    }
}

/// Two-valued response split at a threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stump {
    threshold: i32,
    values: [f32; 2],
}

impl Stump {
    /// Creates a stump responding with `values[0]` above `threshold` and `values[1]` otherwise.
    pub fn new(threshold: i32, values: [f32; 2]) -> Self {
        Self { threshold, values }
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    pub fn values(&self) -> [f32; 2] {
        self.values
    }
}

impl Response for Stump {
    const KIND: usize = 0;

    #[inline]
    fn respond(&self, statistic: i32) -> f32 {
        if statistic > self.threshold {
            self.values[0]
        } else {
            self.values[1]
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        Ok(())
    }
}

/// Piecewise-constant response over equally sized bins of `0..256`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Piecewise {
    bins: Vec<f32>,
}

impl Piecewise {
    #[track_caller]
    pub fn new(bins: Vec<f32>) -> Self {
        assert!(!bins.is_empty(), "piecewise response needs at least one bin");
        Self { bins }
    }

    pub fn zeros(count: usize) -> Self {
        Self::new(vec![0.0; count])
    }

    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    pub fn bins_mut(&mut self) -> &mut [f32] {
        &mut self.bins
    }

    /// Returns the bin `statistic` falls into when there are `count` bins.
    #[inline]
    pub fn bin(statistic: i32, count: usize) -> usize {
        let count = count as i64;
        (i64::from(statistic) * count / 256).clamp(0, count - 1) as usize
    }
}

impl Response for Piecewise {
    const KIND: usize = 1;

    #[inline]
    fn respond(&self, statistic: i32) -> f32 {
        self.bins
            .get(Self::bin(statistic, self.bins.len()))
            .copied()
            .unwrap_or(0.0)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.bins.is_empty() {
            return Err(ModelError::invalid("bins", "expected at least one bin"));
        }
        Ok(())
    }
}

/// A rectangle feature computed on one preprocessed image, followed by a response function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Haar<F, R> {
    width: i32,
    height: i32,
    preproc: String,
    #[serde(flatten)]
    feature: F,
    #[serde(flatten)]
    response: R,
}

pub type Haar1Stump = Haar<OneRect, Stump>;
pub type Haar2Stump = Haar<TwoRect, Stump>;
pub type Haar3Stump = Haar<ThreeRect, Stump>;
pub type Haar1Pw = Haar<OneRect, Piecewise>;
pub type Haar2Pw = Haar<TwoRect, Piecewise>;
pub type Haar3Pw = Haar<ThreeRect, Piecewise>;

impl<F: Feature, R: Response> Haar<F, R> {
    /// Creates a leaf classifier.
    ///
    /// # Panics
    ///
    /// Panics if the size is not positive and odd.
    #[track_caller]
    pub fn new(width: i32, height: i32, preproc: impl Into<String>, feature: F, response: R) -> Self {
        doc::assert_size(width, height);
        Self {
            width,
            height,
            preproc: preproc.into(),
            feature,
            response,
        }
    }

    pub(crate) fn from_document(doc: &Value) -> Result<Self, ModelError> {
        let haar = Self::deserialize(doc)?;
        doc::check_size(haar.width, haar.height)?;
        ImagePool::validate_id(&haar.preproc)?;
        if haar.feature.rects().iter().any(|r| r.is_empty()) {
            return Err(ModelError::invalid("rect", "feature rectangles must not be empty"));
        }
        haar.response.validate()?;
        Ok(haar)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn type_name(&self) -> &'static str {
        F::TYPES[R::KIND]
    }

    /// Returns the id of the pool image the feature is computed on.
    pub fn preproc(&self) -> &str {
        &self.preproc
    }

    pub fn feature(&self) -> &F {
        &self.feature
    }

    pub fn response(&self) -> &R {
        &self.response
    }

    pub fn set_response(&mut self, response: R) {
        self.response = response;
    }

    pub fn prepare(&self, pool: &mut ImagePool) -> Result<(), PoolError> {
        pool.integral(&self.preproc).map(drop)
    }

    /// Computes the feature statistic of the window centered at `(x, y)`.
    pub fn statistic(&self, pool: &ImagePool, x: i32, y: i32) -> Result<i32, EvalError> {
        let integral = pool
            .cached_integral(&self.preproc)
            .ok_or_else(|| EvalError::MissingIntegral(self.preproc.clone()))?;
        self.feature.statistic(integral, x, y)
    }

    pub fn evaluate(
        &self,
        pool: &ImagePool,
        x: i32,
        y: i32,
        _stats: &mut EvalStats,
    ) -> Result<f32, EvalError> {
        Ok(self.response.respond(self.statistic(pool, x, y)?))
    }

    pub fn to_document(&self) -> Value {
        // Structs of plain numbers and strings always serialize.
        let mut doc = serde_json::to_value(self).unwrap_or_default();
        if let Value::Object(map) = &mut doc {
            map.insert("type".into(), self.type_name().into());
        }
        doc
    }
}
