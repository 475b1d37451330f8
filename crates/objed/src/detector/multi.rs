use std::path::Path;

use serde_json::Value;

use crate::{
    classifier::doc,
    cluster::{cluster_clusters, merge_included, Detection},
    debug::DebugInfo,
    error::ModelError,
    factory::Factory,
    pool::ImagePool,
    rect::Rect,
    Image,
};

use super::{scan::DEFAULT_OVERLAP, Detector, DetectorKind};

/// Runs several detectors on one frame and groups their combined detections.
///
/// All child detectors share the image pool of the detector owning this one.
#[derive(Debug, Clone)]
pub struct Multi {
    children: Vec<DetectorKind>,
    overlap: f64,
    merge_included: bool,
}

impl Multi {
    pub const TYPE: &'static str = "multiDetector";

    pub fn new(children: impl IntoIterator<Item = Detector>) -> Self {
        Self {
            children: children.into_iter().map(Detector::into_kind).collect(),
            overlap: DEFAULT_OVERLAP,
            merge_included: true,
        }
    }

    pub fn with_overlap(mut self, overlap: f64) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn with_merge_included(mut self, merge_included: bool) -> Self {
        self.merge_included = merge_included;
        self
    }

    pub(crate) fn from_document(
        doc: &Value,
        work_dir: &Path,
        factory: &Factory,
    ) -> Result<Self, ModelError> {
        let children = match doc::optional(doc, "detectorList") {
            Some(_) => doc::array(doc, "detectorList")?
                .iter()
                .map(|child| factory.create_detector(child, work_dir))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        Ok(Self::new(children)
            .with_overlap(doc::f64_or(doc, "overlap", DEFAULT_OVERLAP)?)
            .with_merge_included(doc::bool_or(doc, "mergeIncluded", true)?))
    }

    pub fn children(&self) -> &[DetectorKind] {
        &self.children
    }

    pub(crate) fn raw_detections(
        &self,
        image: &Image,
        pool: &mut ImagePool,
        mut debug: Option<&mut DebugInfo>,
    ) -> Vec<Rect> {
        let mut raw = Vec::new();
        for child in &self.children {
            raw.extend(child.raw_detections(image, pool, debug.as_deref_mut()));
        }
        raw
    }

    pub(crate) fn detect(
        &self,
        image: &Image,
        pool: &mut ImagePool,
        mut debug: Option<&mut DebugInfo>,
    ) -> Vec<Detection> {
        let mut detections = Vec::new();
        for child in &self.children {
            detections.extend(child.detect(image, pool, debug.as_deref_mut()));
        }
        let clusters = cluster_clusters(&detections, self.overlap);
        if self.merge_included {
            merge_included(&clusters)
        } else {
            clusters
        }
    }
}
