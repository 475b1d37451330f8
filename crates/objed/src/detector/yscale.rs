use std::path::Path;

use serde_json::Value;

use crate::{
    classifier::doc,
    cluster::Detection,
    debug::DebugInfo,
    error::ModelError,
    factory::Factory,
    num::round,
    pool::ImagePool,
    rect::Rect,
    Image,
};

use super::scan::{size, Scan};

/// Scans horizontal bands whose scale depends on their vertical position.
///
/// Useful for fixed cameras, where objects further down the frame appear larger. The scale
/// changes linearly from `y0_scale` at the relative row `y0` to `y1_scale` at `y1`. Band
/// positions form the geometric sequence `y0, y0 * y_stp, ...` below `y1`, and every band covers
/// the rows within one window height of its position.
#[derive(Debug, Clone)]
pub struct YScale {
    scan: Scan,
    y0: f64,
    y1: f64,
    y_stp: f64,
    y0_scale: f64,
    y1_scale: f64,
}

impl YScale {
    pub const TYPE: &'static str = "yScaleDetector";

    /// Creates a detector for bands between the relative rows `y0` and `y1`.
    ///
    /// Out-of-range parameters are clamped: `y0 >= 0`, `y1 >= y0`, `y_stp >= 1` and both scales
    /// `>= 0`.
    pub fn new(
        scan: Scan,
        (y0, y1): (f64, f64),
        y_stp: f64,
        (y0_scale, y1_scale): (f64, f64),
    ) -> Self {
        let y0 = y0.max(0.0);
        Self {
            scan,
            y0,
            y1: y1.max(y0),
            y_stp: y_stp.max(1.0),
            y0_scale: y0_scale.max(0.0),
            y1_scale: y1_scale.max(0.0),
        }
    }

    pub(crate) fn from_document(
        doc: &Value,
        work_dir: &Path,
        factory: &Factory,
    ) -> Result<Self, ModelError> {
        Ok(Self::new(
            Scan::from_document(doc, work_dir, factory)?,
            (doc::f64_or(doc, "y0", 0.0)?, doc::f64_or(doc, "y1", 0.0)?),
            doc::f64_or(doc, "yStp", 0.0)?,
            (
                doc::f64_or(doc, "y0Scale", 0.0)?,
                doc::f64_or(doc, "y1Scale", 0.0)?,
            ),
        ))
    }

    pub fn scan(&self) -> &Scan {
        &self.scan
    }

    /// Returns whether the band sequence is empty or never terminates.
    fn is_degenerate(&self) -> bool {
        (self.y0 == 0.0 && self.y_stp > 1.0) || self.y_stp == 1.0 || self.y1 == self.y0
    }

    pub(crate) fn raw_detections(
        &self,
        image: &Image,
        pool: &mut ImagePool,
        mut debug: Option<&mut DebugInfo>,
    ) -> Vec<Rect> {
        let mut raw = Vec::new();
        if self.is_degenerate() {
            log::debug!("degenerate {} configuration {self:?}, nothing to scan", Self::TYPE);
            return raw;
        }
        if !self.scan.prepare(pool) {
            return raw;
        }

        // scale = k * y + b
        let k = (self.y1_scale - self.y0_scale) / (self.y1 - self.y0);
        let b = (self.y1 * self.y0_scale - self.y0 * self.y1_scale) / (self.y1 - self.y0);
        let classifier = self.scan.classifier();
        let (cl_width, cl_height) = (classifier.width(), classifier.height());
        let (width, height) = size(image);

        let mut next_y = self.y0;
        while next_y < self.y1 {
            let y = next_y;
            next_y *= self.y_stp;

            let scale = k * y + b;
            if scale <= 0.0 {
                continue;
            }
            let y_int = f64::from(round(f64::from(height) * y));
            let span = scale * f64::from(cl_height);
            let prev = round(y_int / self.y_stp - span).max(0);
            let next = round(y_int * self.y_stp + span).min(height - 1);
            if next < prev {
                continue;
            }

            let band = image.crop(Rect::from_top_left(0, prev, width, next - prev + 1));
            let scaled_width = round(f64::from(band.width()) / scale);
            let scaled_height = round(f64::from(band.height()) / scale);
            if scaled_width < cl_width || scaled_height < cl_height {
                continue;
            }
            let scaled = band.resize(scaled_width as u32, scaled_height as u32);
            pool.update(&scaled);
            self.scan.scan(
                pool,
                (scaled_width, scaled_height),
                scale,
                prev,
                debug.as_deref_mut(),
                &mut raw,
            );
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
