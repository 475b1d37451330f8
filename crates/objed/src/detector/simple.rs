use std::path::Path;

use serde_json::Value;

use crate::{
    cluster::Detection, debug::DebugInfo, error::ModelError, factory::Factory, pool::ImagePool,
    rect::Rect, Image,
};

use super::scan::{scale_image, size, Scales, Scan};

/// Scans every window of an image pyramid.
#[derive(Debug, Clone)]
pub struct Simple {
    scan: Scan,
    scales: Scales,
}

impl Simple {
    pub const TYPE: &'static str = "simpleDetector";

    pub fn new(scan: Scan, scales: Scales) -> Self {
        Self { scan, scales }
    }

    pub(crate) fn from_document(
        doc: &Value,
        work_dir: &Path,
        factory: &Factory,
    ) -> Result<Self, ModelError> {
        Ok(Self::new(
            Scan::from_document(doc, work_dir, factory)?,
            Scales::from_document(doc)?,
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
        for scale in self.scales.iter() {
            let scaled = scale_image(image, scale);
            pool.update(&scaled);
            self.scan
                .scan(pool, size(&scaled), scale, 0, debug.as_deref_mut(), &mut raw);
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
