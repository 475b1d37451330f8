//! Building classifiers and detectors from JSON documents.
//!
//! Every document node is an object with a `type` field naming the node type. A node that is a
//! plain string instead is the path of another document file, relative to the directory of the
//! document that refers to it.
//!
//! Types unknown to this crate can be registered with [`Factory::register_classifier`] and
//! [`Factory::register_detector`]. Registered type names are matched case-insensitively.

use std::{
    collections::HashMap,
    fmt, fs,
    path::{Path, PathBuf},
};

use serde_json::Value;

use crate::{
    classifier::{
        doc, Additive, Cascade, Classifier, ClassifierExtension, Feature, Haar1Pw, Haar1Stump,
        Haar2Pw, Haar2Stump, Haar3Pw, Haar3Stump, Linear, Max, Mean, OneRect, Parallel, Roi,
        ThreeRect, Tree, TwoRect,
    },
    detector::{Detector, DetectorExtension, DetectorKind, Lazy, Multi, Simple, YScale},
    error::ModelError,
};

/// Constructor of an extension classifier.
///
/// Receives the document node, the directory path references are resolved against, and the
/// factory to build child nodes with.
pub type ClassifierConstructor = Box<
    dyn Fn(&Value, &Path, &Factory) -> Result<Box<dyn ClassifierExtension>, ModelError>
        + Send
        + Sync,
>;

/// Constructor of an extension detector.
pub type DetectorConstructor = Box<
    dyn Fn(&Value, &Path, &Factory) -> Result<Box<dyn DetectorExtension>, ModelError>
        + Send
        + Sync,
>;

/// Registry of node types used to build classifiers and detectors from documents.
#[derive(Default)]
pub struct Factory {
    classifiers: HashMap<String, ClassifierConstructor>,
    detectors: HashMap<String, DetectorConstructor>,
}

impl Factory {
    /// Creates a factory that knows only the built-in types.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an extension classifier type.
    ///
    /// Registering a name twice replaces the earlier constructor.
    pub fn register_classifier<F>(&mut self, type_name: &str, constructor: F)
    where
        F: Fn(&Value, &Path, &Factory) -> Result<Box<dyn ClassifierExtension>, ModelError>
            + Send
            + Sync
            + 'static,
    {
        self.classifiers
            .insert(type_name.to_lowercase(), Box::new(constructor));
    }

    /// Registers an extension detector type.
    pub fn register_detector<F>(&mut self, type_name: &str, constructor: F)
    where
        F: Fn(&Value, &Path, &Factory) -> Result<Box<dyn DetectorExtension>, ModelError>
            + Send
            + Sync
            + 'static,
    {
        self.detectors
            .insert(type_name.to_lowercase(), Box::new(constructor));
    }

    /// Builds a classifier from a document node.
    pub fn create_classifier(&self, doc: &Value, work_dir: &Path) -> Result<Classifier, ModelError> {
        if let Value::String(path) = doc {
            return self.load_classifier(work_dir.join(path));
        }

        let classifier = match doc::type_name(doc)? {
            t if t == OneRect::TYPES[0] => Haar1Stump::from_document(doc)?.into(),
            t if t == TwoRect::TYPES[0] => Haar2Stump::from_document(doc)?.into(),
            t if t == ThreeRect::TYPES[0] => Haar3Stump::from_document(doc)?.into(),
            t if t == OneRect::TYPES[1] => Haar1Pw::from_document(doc)?.into(),
            t if t == TwoRect::TYPES[1] => Haar2Pw::from_document(doc)?.into(),
            t if t == ThreeRect::TYPES[1] => Haar3Pw::from_document(doc)?.into(),
            Mean::TYPE => Mean::from_document(doc)?.into(),
            Roi::TYPE => Roi::from_document(doc)?.into(),
            Cascade::TYPE => Cascade::from_document(doc, work_dir, self)?.into(),
            Parallel::TYPE => Parallel::from_document(doc, work_dir, self)?.into(),
            Tree::TYPE => Tree::from_document(doc, work_dir, self)?.into(),
            Additive::TYPE => Additive::from_document(doc, work_dir, self)?.into(),
            Linear::TYPE => Linear::from_document(doc, work_dir, self)?.into(),
            Max::TYPE => Max::from_document(doc, work_dir, self)?.into(),
            other => match self.classifiers.get(&other.to_lowercase()) {
                Some(constructor) => Classifier::Extension(constructor(doc, work_dir, self)?),
                None => return Err(ModelError::UnknownType(other.to_string())),
            },
        };
        Ok(classifier)
    }

    /// Loads a classifier document file, resolving path references against its directory.
    pub fn load_classifier<P: AsRef<Path>>(&self, path: P) -> Result<Classifier, ModelError> {
        let path = path.as_ref();
        let doc = read_document(path)?;
        log::debug!("loading classifier from '{}'", path.display());
        self.create_classifier(&doc, &parent_dir(path))
    }

    /// Builds a detector from a document node.
    pub fn create_detector(&self, doc: &Value, work_dir: &Path) -> Result<Detector, ModelError> {
        if let Value::String(path) = doc {
            return self.load_detector(work_dir.join(path));
        }

        let kind: DetectorKind = match doc::type_name(doc)? {
            Simple::TYPE => Simple::from_document(doc, work_dir, self)?.into(),
            Lazy::TYPE => Lazy::from_document(doc, work_dir, self)?.into(),
            YScale::TYPE => YScale::from_document(doc, work_dir, self)?.into(),
            Multi::TYPE => Multi::from_document(doc, work_dir, self)?.into(),
            other => match self.detectors.get(&other.to_lowercase()) {
                Some(constructor) => DetectorKind::Extension(constructor(doc, work_dir, self)?),
                None => return Err(ModelError::UnknownType(other.to_string())),
            },
        };
        Ok(Detector::new(kind))
    }

    /// Loads a detector document file, resolving path references against its directory.
    pub fn load_detector<P: AsRef<Path>>(&self, path: P) -> Result<Detector, ModelError> {
        let path = path.as_ref();
        let doc = read_document(path)?;
        log::debug!("loading detector from '{}'", path.display());
        self.create_detector(&doc, &parent_dir(path))
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("classifiers", &self.classifiers.keys().collect::<Vec<_>>())
            .field("detectors", &self.detectors.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn read_document(path: &Path) -> Result<Value, ModelError> {
    let text = fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}
