//! Sliding-window object detectors.
//!
//! A [`Detector`] owns a detection strategy ([`DetectorKind`]) and the [`ImagePool`] the strategy
//! evaluates its classifiers on. Every strategy maps accepted windows back into frame coordinates
//! and groups them into [`Detection`]s with [`cluster`](crate::cluster::cluster).
//!
//! Detection never fails: windows whose classifier evaluation fails count as rejected.

mod lazy;
mod multi;
pub mod scan;
mod simple;
mod yscale;

use std::{fmt, path::Path};

use serde_json::Value;

use crate::{
    cluster::Detection, debug::DebugInfo, error::ModelError, factory::Factory, pool::ImagePool,
    rect::Rect, timer::Timer, Image,
};

pub use lazy::Lazy;
pub use multi::Multi;
pub use scan::{Scales, Scan};
pub use simple::Simple;
pub use yscale::YScale;

/// A detector type that is not built into this crate.
///
/// Extensions are created by constructors registered with a [`Factory`].
pub trait DetectorExtension: fmt::Debug + Send + Sync {
    /// Returns the `type` string this extension was registered under.
    fn type_name(&self) -> &str;

    /// Detects objects in `image`, evaluating classifiers on `pool`.
    fn detect(
        &self,
        image: &Image,
        pool: &mut ImagePool,
        debug: Option<&mut DebugInfo>,
    ) -> Vec<Detection>;

    /// Returns the accepted windows before grouping.
    fn raw_detections(
        &self,
        image: &Image,
        pool: &mut ImagePool,
        debug: Option<&mut DebugInfo>,
    ) -> Vec<Rect>;

    fn clone_box(&self) -> Box<dyn DetectorExtension>;
}

impl Clone for Box<dyn DetectorExtension> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// The detection strategies.
#[derive(Debug, Clone)]
pub enum DetectorKind {
    Simple(Simple),
    Lazy(Lazy),
    YScale(YScale),
    Multi(Multi),
    Extension(Box<dyn DetectorExtension>),
}

impl DetectorKind {
    pub fn type_name(&self) -> &str {
        match self {
            Self::Simple(_) => Simple::TYPE,
            Self::Lazy(_) => Lazy::TYPE,
            Self::YScale(_) => YScale::TYPE,
            Self::Multi(_) => Multi::TYPE,
            Self::Extension(ext) => ext.type_name(),
        }
    }

    fn detect(
        &self,
        image: &Image,
        pool: &mut ImagePool,
        debug: Option<&mut DebugInfo>,
    ) -> Vec<Detection> {
        match self {
            Self::Simple(d) => d.detect(image, pool, debug),
            Self::Lazy(d) => d.detect(image, pool, debug),
            Self::YScale(d) => d.detect(image, pool, debug),
            Self::Multi(d) => d.detect(image, pool, debug),
            Self::Extension(d) => d.detect(image, pool, debug),
        }
    }

    fn raw_detections(
        &self,
        image: &Image,
        pool: &mut ImagePool,
        debug: Option<&mut DebugInfo>,
    ) -> Vec<Rect> {
        match self {
            Self::Simple(d) => d.raw_detections(image, pool, debug),
            Self::Lazy(d) => d.raw_detections(image, pool, debug),
            Self::YScale(d) => d.raw_detections(image, pool, debug),
            Self::Multi(d) => d.raw_detections(image, pool, debug),
            Self::Extension(d) => d.raw_detections(image, pool, debug),
        }
    }
}

macro_rules! impl_from {
    ($($variant:ident),+) => {
        $(
            impl From<$variant> for DetectorKind {
                fn from(d: $variant) -> Self {
                    Self::$variant(d)
                }
            }
        )+
    };
}

impl_from!(Simple, Lazy, YScale, Multi);

impl From<Box<dyn DetectorExtension>> for DetectorKind {
    fn from(d: Box<dyn DetectorExtension>) -> Self {
        Self::Extension(d)
    }
}

/// An object detector together with the image pool it works on.
///
/// A detector is used by one thread at a time. Clone it to detect on several threads; clones start
/// out with an empty pool of their own.
#[derive(Debug)]
pub struct Detector {
    kind: DetectorKind,
    pool: ImagePool,
    t_detect: Timer,
    t_raw: Timer,
}

impl Detector {
    pub fn new(kind: impl Into<DetectorKind>) -> Self {
        Self {
            kind: kind.into(),
            pool: ImagePool::new(),
            t_detect: Timer::new("detect"),
            t_raw: Timer::new("raw detections"),
        }
    }

    /// Builds a detector from its document form, resolving path references against `work_dir`.
    ///
    /// Only the built-in detector and classifier types are recognized.
    pub fn from_document(doc: &Value, work_dir: &Path) -> Result<Self, ModelError> {
        Factory::new().create_detector(doc, work_dir)
    }

    /// Loads a detector document from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        Factory::new().load_detector(path)
    }

    pub fn kind(&self) -> &DetectorKind {
        &self.kind
    }

    pub fn into_kind(self) -> DetectorKind {
        self.kind
    }

    pub fn type_name(&self) -> &str {
        self.kind.type_name()
    }

    /// Detects objects in `image`.
    ///
    /// If `debug` is given, per-window evaluation counters are added to it.
    pub fn detect(&mut self, image: &Image, debug: Option<&mut DebugInfo>) -> Vec<Detection> {
        let Self {
            kind,
            pool,
            t_detect,
            ..
        } = self;
        let detections = t_detect.time(|| kind.detect(image, pool, debug));
        log::trace!(
            "{} found {} objects ({t_detect})",
            kind.type_name(),
            detections.len()
        );
        detections
    }

    /// Returns the frame rectangles of all accepted windows, before they are grouped.
    pub fn raw_detections(&mut self, image: &Image, debug: Option<&mut DebugInfo>) -> Vec<Rect> {
        let Self {
            kind, pool, t_raw, ..
        } = self;
        t_raw.time(|| kind.raw_detections(image, pool, debug))
    }

    pub fn image_pool(&self) -> &ImagePool {
        &self.pool
    }

    /// Makes the detector work on `pool`, returning the pool used so far.
    pub fn set_image_pool(&mut self, pool: ImagePool) -> ImagePool {
        std::mem::replace(&mut self.pool, pool)
    }

    /// Gives the detector a new empty pool, returning the pool used so far.
    pub fn reset_image_pool(&mut self) -> ImagePool {
        self.set_image_pool(ImagePool::new())
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_detect, &self.t_raw].into_iter()
    }
}

impl Clone for Detector {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind.clone(),
            pool: ImagePool::new(),
            t_detect: self.t_detect.clone(),
            t_raw: self.t_raw.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{debug::DebugKey, test::stump};

    use super::*;

    /// Dark frame with a bright 3x3 square at (4, 4).
    fn frame() -> Image {
        Image::from_fn(12, 12, |x, y| {
            if (4..7).contains(&x) && (4..7).contains(&y) {
                200
            } else {
                0
            }
        })
    }

    fn simple() -> Detector {
        Detector::new(Simple::new(
            Scan::new(stump(3, 3, 150, [1.0, -1.0])),
            Scales::default(),
        ))
    }

    #[test]
    fn simple_finds_the_square() {
        let mut detector = simple();
        let mut debug = DebugInfo::new();
        let detections = detector.detect(&frame(), Some(&mut debug));
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].rect(), Rect::from_top_left(4, 4, 3, 3));
        assert_eq!(detections[0].power(), 1);
        assert_eq!(debug.get(DebugKey::EvaluationCount), Some(100));
        assert_eq!(debug.get(DebugKey::TotalStageCount), Some(0));
    }

    #[test]
    fn lazy_refines_coarse_hits() {
        // Accepts every window overlapping the square by at least 2x2 pixels.
        let scan = Scan::new(stump(3, 3, 80, [1.0, -1.0]));
        let mut detector = Detector::new(Lazy::new(scan, Scales::default(), 1.0, 1.0));
        let raw = detector.raw_detections(&frame(), None);
        // The coarse grid is 1, 4, 7, 10, so only (4, 4) hits. Its fine cell is [3, 5) x [3, 5).
        assert_eq!(raw, vec![Rect::from_top_left(3, 3, 3, 3)]);
    }

    #[test]
    fn multi_shares_one_pool() {
        let mut detector = Detector::new(Multi::new([simple(), simple()]));
        let raw = detector.raw_detections(&frame(), None);
        assert_eq!(raw.len(), 2);
        let detections = detector.detect(&frame(), None);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].power(), 2);
        assert_eq!(detector.image_pool().integral_names().collect::<Vec<_>>(), ["gray"]);
    }

    #[test]
    fn pools_can_be_swapped() {
        let mut detector = simple();
        detector.detect(&frame(), None);
        let used = detector.reset_image_pool();
        assert_eq!(used.base().width(), 12);
        assert!(detector.image_pool().base().is_empty());

        let previous = detector.set_image_pool(used);
        assert!(previous.base().is_empty());
        assert_eq!(detector.detect(&frame(), None).len(), 1);

        let clone = detector.clone();
        assert!(clone.image_pool().base().is_empty());
        assert_eq!(clone.type_name(), Simple::TYPE);
    }
}
