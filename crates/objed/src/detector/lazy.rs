use std::path::Path;

use serde_json::Value;

use crate::{
    classifier::doc,
    cluster::Detection,
    debug::DebugInfo,
    error::ModelError,
    factory::Factory,
    num::round_step,
    pool::ImagePool,
    rect::Rect,
    Image,
};

use super::scan::{scale_image, size, Scales, Scan};

/// Scans a coarse grid first and refines only around accepted windows.
///
/// Every coarse hit at `(x, y)` triggers a scan with the fine steps over the coarse cell
/// `[x - raw_x / 2, x + raw_x / 2)` x `[y - raw_y / 2, y + raw_y / 2)`, clipped to the frame. Only
/// fine windows are reported.
#[derive(Debug, Clone)]
pub struct Lazy {
    scan: Scan,
    scales: Scales,
    x_raw_step: i32,
    y_raw_step: i32,
}

impl Lazy {
    pub const TYPE: &'static str = "lazyDetector";

    /// Creates a lazy detector whose coarse steps are given as fractions of the classifier size.
    pub fn new(scan: Scan, scales: Scales, x_raw_step: f64, y_raw_step: f64) -> Self {
        let classifier = scan.classifier();
        let x_raw_step = round_step(x_raw_step * f64::from(classifier.width()));
        let y_raw_step = round_step(y_raw_step * f64::from(classifier.height()));
        Self {
            scan,
            scales,
            x_raw_step,
            y_raw_step,
        }
    }

    pub(crate) fn from_document(
        doc: &Value,
        work_dir: &Path,
        factory: &Factory,
    ) -> Result<Self, ModelError> {
        Ok(Self::new(
            Scan::from_document(doc, work_dir, factory)?,
            Scales::from_document(doc)?,
            doc::f64_or(doc, "xRawStep", 0.0)?,
            doc::f64_or(doc, "yRawStep", 0.0)?,
        ))
    }

    pub fn scan(&self) -> &Scan {
        &self.scan
    }

    pub(crate) fn raw_detections(
        &self,
        image: &Image,
        pool: &mut ImagePool,
        mut debug: Option<&mut DebugInfo>,
    ) -> Vec<Rect> {
        let mut raw = Vec::new();
        if !self.scan.prepare(pool) {
            return raw;
        }
        let classifier = self.scan.classifier();
        let (w2, h2) = (classifier.width() / 2, classifier.height() / 2);
        let (x_step, y_step) = (self.scan.x_step() as usize, self.scan.y_step() as usize);

        for scale in self.scales.iter() {
            let scaled = scale_image(image, scale);
            pool.update(&scaled);
            let (width, height) = size(&scaled);

            for y in (h2..height - h2).step_by(self.y_raw_step as usize) {
                for x in (w2..width - w2).step_by(self.x_raw_step as usize) {
                    if !self.scan.accepts(pool, x, y, debug.as_deref_mut()) {
                        continue;
                    }

                    let (dx, dy) = (self.x_raw_step / 2, self.y_raw_step / 2);
                    let xs = w2.max(x - dx)..(x + dx).min(width - w2);
                    let ys = h2.max(y - dy)..(y + dy).min(height - h2);
                    for fy in ys.step_by(y_step) {
                        for fx in xs.clone().step_by(x_step) {
                            if self.scan.accepts(pool, fx, fy, debug.as_deref_mut()) {
                                raw.push(self.scan.map_window(fx, fy, scale, 0));
                            }
                        }
                    }
                }
            }
        }
        raw
    }

    pub(crate) fn detect(
        &self,
        image: &Image,
        pool: &mut ImagePool,
        debug: Option<&mut DebugInfo>,
    ) -> Vec<Detection> {
        self.scan.group(&self.raw_detections(image, pool, debug))
    }
}
