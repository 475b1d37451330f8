//! Window scanning shared by the sliding-window detectors.

use std::{iter, path::Path};

use serde_json::Value;

use crate::{
    classifier::{doc, Classifier, EvalStats},
    cluster::{cluster, merge_included, Detection},
    debug::DebugInfo,
    error::ModelError,
    factory::Factory,
    num::{round, round_step},
    pool::ImagePool,
    rect::Rect,
    Image,
};

pub const DEFAULT_OVERLAP: f64 = 0.5;

/// A classifier together with the window geometry and grouping parameters of a detector.
///
/// Margins shrink the reported rectangle relative to the classifier window. They are configured
/// as fractions of the classifier size and stored in pixels, like the steps between neighbouring
/// windows.
#[derive(Debug, Clone)]
pub struct Scan {
    classifier: Classifier,
    /// Left, top, right and bottom margin.
    margins: [i32; 4],
    x_step: i32,
    y_step: i32,
    overlap: f64,
    merge_included: bool,
}

impl Scan {
    /// Scans every window with `classifier`, without margins.
    pub fn new(classifier: Classifier) -> Self {
        Self {
            classifier,
            margins: [0; 4],
            x_step: 1,
            y_step: 1,
            overlap: DEFAULT_OVERLAP,
            merge_included: true,
        }
    }

    /// Sets the left, top, right and bottom margin as fractions of the classifier size.
    pub fn with_margins(mut self, [left, top, right, bottom]: [f64; 4]) -> Self {
        let (w, h) = self.classifier_size();
        self.margins = [
            round(left * w),
            round(top * h),
            round(right * w),
            round(bottom * h),
        ];
        self
    }

    /// Sets the distance between neighbouring windows as fractions of the classifier size.
    pub fn with_steps(mut self, x_step: f64, y_step: f64) -> Self {
        let (w, h) = self.classifier_size();
        self.x_step = round_step(x_step * w);
        self.y_step = round_step(y_step * h);
        self
    }

    /// Sets the overlap above which raw detections are grouped.
    pub fn with_overlap(mut self, overlap: f64) -> Self {
        self.overlap = overlap;
        self
    }

    /// Sets whether detections nested in larger ones are merged into them.
    pub fn with_merge_included(mut self, merge_included: bool) -> Self {
        self.merge_included = merge_included;
        self
    }

    pub(crate) fn from_document(
        doc: &Value,
        work_dir: &Path,
        factory: &Factory,
    ) -> Result<Self, ModelError> {
        let classifier = factory.create_classifier(doc::field(doc, "classifier")?, work_dir)?;
        Ok(Self::new(classifier)
            .with_margins([
                doc::f64_or(doc, "leftMargin", 0.0)?,
                doc::f64_or(doc, "topMargin", 0.0)?,
                doc::f64_or(doc, "rightMargin", 0.0)?,
                doc::f64_or(doc, "bottomMargin", 0.0)?,
            ])
            .with_steps(doc::f64_or(doc, "xStep", 0.0)?, doc::f64_or(doc, "yStep", 0.0)?)
            .with_overlap(doc::f64_or(doc, "overlap", DEFAULT_OVERLAP)?)
            .with_merge_included(doc::bool_or(doc, "mergeIncluded", true)?))
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    fn classifier_size(&self) -> (f64, f64) {
        (
            f64::from(self.classifier.width()),
            f64::from(self.classifier.height()),
        )
    }

    /// Registers the classifier's pool entries, returning `false` if that fails.
    pub(crate) fn prepare(&self, pool: &mut ImagePool) -> bool {
        match self.classifier.prepare(pool) {
            Ok(()) => true,
            Err(e) => {
                log::error!("cannot prepare {}: {e}", self.classifier.type_name());
                false
            }
        }
    }

    /// Returns whether the classifier accepts the window centered at `(x, y)`.
    ///
    /// Evaluation errors reject the window.
    pub(crate) fn accepts(
        &self,
        pool: &ImagePool,
        x: i32,
        y: i32,
        debug: Option<&mut DebugInfo>,
    ) -> bool {
        let mut stats = EvalStats::new();
        let accepted = match self.classifier.evaluate_with_stats(pool, x, y, &mut stats) {
            Ok(result) => result > 0.0,
            Err(e) => {
                log::trace!("rejecting window at ({x}, {y}): {e}");
                false
            }
        };
        if let Some(debug) = debug {
            debug.record_window(stats.stages());
        }
        accepted
    }

    /// Maps the window centered at `(x, y)` of a frame scaled down by `scale` back to the
    /// original frame, shifted down by `offset` rows.
    pub(crate) fn map_window(&self, x: i32, y: i32, scale: f64, offset: i32) -> Rect {
        let (w, h) = (self.classifier.width(), self.classifier.height());
        let [left, top, right, bottom] = self.margins;
        Rect::from_top_left(
            round(f64::from(x - w / 2 + left) * scale),
            round(f64::from(y - h / 2 + top) * scale + f64::from(offset)),
            round(f64::from(w - left - right) * scale),
            round(f64::from(h - top - bottom) * scale),
        )
    }

    /// Evaluates every window that fits into the `width x height` frame in `pool` and appends the
    /// accepted ones to `out`.
    pub(crate) fn scan(
        &self,
        pool: &ImagePool,
        (width, height): (i32, i32),
        scale: f64,
        offset: i32,
        mut debug: Option<&mut DebugInfo>,
        out: &mut Vec<Rect>,
    ) {
        let (w2, h2) = (self.classifier.width() / 2, self.classifier.height() / 2);
        for y in (h2..height - h2).step_by(self.y_step as usize) {
            for x in (w2..width - w2).step_by(self.x_step as usize) {
                if self.accepts(pool, x, y, debug.as_deref_mut()) {
                    out.push(self.map_window(x, y, scale, offset));
                }
            }
        }
    }

    pub(crate) fn x_step(&self) -> i32 {
        self.x_step
    }

    pub(crate) fn y_step(&self) -> i32 {
        self.y_step
    }

    /// Groups raw window rectangles into detections.
    pub(crate) fn group(&self, raw: &[Rect]) -> Vec<Detection> {
        let clusters = cluster(raw, self.overlap);
        if self.merge_included {
            merge_included(&clusters)
        } else {
            clusters
        }
    }
}

/// Geometric sequence of scale factors `min, min * step, ...` up to `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scales {
    min: f64,
    max: f64,
    step: f64,
}

impl Scales {
    pub const DEFAULT_STEP: f64 = 1.1;

    /// # Panics
    ///
    /// Panics if `min` is not positive or `step` is not greater than 1.
    #[track_caller]
    pub fn new(min: f64, max: f64, step: f64) -> Self {
        assert!(min > 0.0, "minimum scale must be positive (got {min})");
        assert!(step > 1.0, "scale step must be greater than 1 (got {step})");
        Self { min, max, step }
    }

    pub(crate) fn from_document(doc: &Value) -> Result<Self, ModelError> {
        let min = doc::f64_or(doc, "minScale", 1.0)?;
        let max = doc::f64_or(doc, "maxScale", 1.0)?;
        let step = doc::f64_or(doc, "stpScale", Self::DEFAULT_STEP)?;
        if min <= 0.0 {
            return Err(ModelError::invalid("minScale", format!("{min} is not positive")));
        }
        if step <= 1.0 {
            return Err(ModelError::invalid("stpScale", format!("{step} is not greater than 1")));
        }
        Ok(Self { min, max, step })
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> {
        let Self { min, max, step } = *self;
        iter::successors(Some(min), move |s| Some(s * step)).take_while(move |s| *s <= max)
    }
}

impl Default for Scales {
    fn default() -> Self {
        Self::new(1.0, 1.0, Self::DEFAULT_STEP)
    }
}

/// Returns `image` shrunk by `scale`, each side at least one pixel.
pub(crate) fn scale_image(image: &Image, scale: f64) -> Image {
    let width = round_step(f64::from(image.width()) / scale);
    let height = round_step(f64::from(image.height()) / scale);
    image.resize(width as u32, height as u32)
}

pub(crate) fn size(image: &Image) -> (i32, i32) {
    (image.width() as i32, image.height() as i32)
}
