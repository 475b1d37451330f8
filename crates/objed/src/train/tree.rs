//! Tree classifier training.

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    classifier::{Classifier, ClassifierExtension, EvalStats, Side, Tree},
    error::{EvalError, PoolError, TrainError},
    iter::zip_exact,
    num::EPSILON,
    pool::ImagePool,
};

use super::{DatasetProcessor, StageTrainer, TrainConfig};

/// Path from the root of a tree classifier to one of its nodes.
///
/// Labels read like `C`, `CrC`, `CrClC`: every `C` is a node and the letter after it selects the
/// subtree (`r` for [`Side::Right`], `l` for [`Side::Left`]) the path continues in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Label(String);

impl Label {
    pub fn root() -> Self {
        Self("C".into())
    }

    /// Parses a label, returning `None` if it is not of the form `C`, `CrC`, `ClC`, ...
    pub fn parse(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        let valid = bytes.len() % 2 == 1
            && bytes.iter().step_by(2).all(|&b| b == b'C')
            && bytes.iter().skip(1).step_by(2).all(|&b| b == b'r' || b == b'l');
        valid.then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the number of edges between the root and this node.
    pub fn depth(&self) -> usize {
        self.0.len() / 2
    }

    /// Returns the subtrees taken on the way from the root to this node.
    pub fn sides(&self) -> impl Iterator<Item = Side> + '_ {
        self.0.bytes().skip(1).step_by(2).map(|b| match b {
            b'r' => Side::Right,
            _ => Side::Left,
        })
    }

    pub fn child(&self, side: Side) -> Self {
        let step = match side {
            Side::Right => "rC",
            Side::Left => "lC",
        };
        Self(format!("{}{step}", self.0))
    }

    /// Returns the label visited after this one when sweeping a tree level.
    ///
    /// The deepest right turn of the path is replaced by a left turn and everything below it is
    /// dropped. Returns `None` if the path contains no right turn.
    pub fn next_sibling(&self) -> Option<Self> {
        let pos = self.0.rfind("rC")?;
        Some(Self(format!("{}lC", &self.0[..pos])))
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Label {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s).ok_or_else(|| format!("invalid tree label '{s}'"))
    }
}

impl From<Label> for String {
    fn from(label: Label) -> Self {
        label.0
    }
}

fn node_at<'t>(tree: &'t Tree, label: &Label) -> Option<&'t Tree> {
    label.sides().try_fold(tree, |node, side| node.branch(side))
}

/// Returns the central classifier of the node at `label`, if the node exists and has one.
pub fn central_at<'t>(tree: &'t Tree, label: &Label) -> Option<&'t Classifier> {
    node_at(tree, label)?.central()
}

/// Sets the central classifier of the node at `label`, creating missing nodes on the way.
pub fn set_central_at(tree: &mut Tree, label: &Label, central: Classifier) {
    let node = label
        .sides()
        .fold(tree, |node, side| node.branch_or_insert(side));
    node.set_central(central);
}

/// Cascade of the central classifiers along a tree path, with the left turns inverted.
///
/// A window passes a stage if the stage sends it the way the path goes: a positive response for
/// right turns and a negative one for left turns. It is used to select the samples that reach a
/// tree node.
#[derive(Debug, Clone)]
pub struct ParityCascade {
    width: i32,
    height: i32,
    stages: Vec<Classifier>,
    parities: Vec<f32>,
}

impl ParityCascade {
    pub const TYPE: &'static str = "parityCascadeClassifier";

    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            stages: Vec::new(),
            parities: Vec::new(),
        }
    }

    /// Collects the central classifiers on the path from the root of `tree` to `label`.
    ///
    /// Collection stops at the first node without a central classifier.
    pub fn along(tree: &Tree, label: &Label) -> Self {
        let mut this = Self::new(tree.width(), tree.height());
        let mut node = Some(tree);
        for side in label.sides() {
            let Some((current, central)) = node.and_then(|n| Some((n, n.central()?))) else {
                break;
            };
            this.push(central.clone(), side);
            node = current.branch(side);
        }
        this
    }

    /// Appends a stage whose windows continue on `side`.
    pub fn push(&mut self, stage: Classifier, side: Side) {
        self.stages.push(stage);
        self.parities.push(match side {
            Side::Right => 1.0,
            Side::Left => -1.0,
        });
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl ClassifierExtension for ParityCascade {
    fn type_name(&self) -> &str {
        Self::TYPE
    }

    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn prepare(&self, pool: &mut ImagePool) -> Result<(), PoolError> {
        for stage in &self.stages {
            stage.prepare(pool)?;
        }
        Ok(())
    }

    fn evaluate(
        &self,
        pool: &ImagePool,
        x: i32,
        y: i32,
        stats: &mut EvalStats,
    ) -> Result<f32, EvalError> {
        let mut result = EPSILON;
        for (stage, parity) in zip_exact(&self.stages, &self.parities) {
            result = stage.evaluate_with_stats(pool, x, y, stats)? * parity;
            if result < 0.0 {
                break;
            }
        }
        Ok(result)
    }

    fn serialize(&self) -> Value {
        json!({
            "type": Self::TYPE,
            "width": self.width,
            "height": self.height,
            "clList": self.stages.iter().map(Classifier::to_document).collect::<Vec<_>>(),
            "parityList": self.parities,
        })
    }

    fn clone_box(&self) -> Box<dyn ClassifierExtension> {
        Box::new(self.clone())
    }
}

/// Reads the labels of the nodes that ran out of samples.
///
/// A missing file is an empty list.
pub fn load_leaves(path: &Path) -> Result<Vec<Label>, TrainError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path).map_err(|source| TrainError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text)
        .map_err(|e| TrainError::InvalidConfig(format!("{}: {e}", path.display())))
}

pub fn save_leaves(path: &Path, leaves: &[Label]) -> Result<(), TrainError> {
    let text = serde_json::to_string_pretty(leaves)
        .map_err(|e| TrainError::InvalidConfig(e.to_string()))?;
    fs::write(path, text).map_err(|source| TrainError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Result of visiting one tree node.
enum Visit {
    Trained,
    Skipped,
}

struct TreeTrainer<'c> {
    config: &'c TrainConfig,
    dataset: DatasetProcessor,
    stage: StageTrainer,
    tree: Tree,
    leaves: Vec<Label>,
    leaf_path: Option<PathBuf>,
}

/// Grows a tree classifier level by level and stores it at `ClassifierPath`.
///
/// An existing tree at `ClassifierPath` is resumed, together with the leaf list at
/// `LeafListPath`. Every level sweeps the untrained nodes below the trained part of the tree
/// (see [`Label::next_sibling`]). Nodes that run out of samples become leaves and are never
/// visited again. Training ends after `LevelCount` levels or when a level trains nothing.
pub fn train_tree(config: &TrainConfig) -> Result<(), TrainError> {
    let leaf_path = config.leaf_list_path.clone();
    let leaves = match &leaf_path {
        Some(path) => load_leaves(path)?,
        None => Vec::new(),
    };
    let mut trainer = TreeTrainer {
        config,
        dataset: DatasetProcessor::new(config)?,
        stage: StageTrainer::new(config)?,
        tree: resume_tree(config)?,
        leaves,
        leaf_path,
    };

    let mut levels = 0;
    loop {
        let mut label = Label::root();
        let mut trained_any = false;
        loop {
            while central_at(&trainer.tree, &label).is_some() {
                label = label.child(Side::Right);
            }
            if let Visit::Trained = trainer.visit(&label)? {
                trained_any = true;
            }
            trainer.save()?;

            match label.next_sibling() {
                Some(next) => label = next,
                None => break,
            }
        }

        levels += 1;
        if config.level_count > 0 && levels >= config.level_count {
            log::info!("trained the requested {levels} levels");
            break;
        }
        if !trained_any {
            log::info!("tree classifier has been trained");
            break;
        }
    }
    Ok(())
}

fn resume_tree(config: &TrainConfig) -> Result<Tree, TrainError> {
    let (width, height) = config.size();
    let path = &config.classifier_path;
    if !path.exists() {
        return Ok(Tree::new(width, height));
    }
    match Classifier::load(path)? {
        Classifier::Tree(tree) if tree.width() == width && tree.height() == height => {
            log::info!("resuming tree classifier '{}'", path.display());
            Ok(tree)
        }
        other => Err(TrainError::InvalidConfig(format!(
            "'{}' holds a {}x{} {}, expected a {width}x{height} {}",
            path.display(),
            other.width(),
            other.height(),
            other.type_name(),
            Tree::TYPE,
        ))),
    }
}

impl TreeTrainer<'_> {
    fn visit(&mut self, label: &Label) -> Result<Visit, TrainError> {
        if self.leaves.contains(label) {
            log::info!("branch '{label}' is a leaf");
            return Ok(Visit::Skipped);
        }
        log::info!("training node '{label}' of the tree classifier");

        let gate = ParityCascade::along(&self.tree, label);
        let gate = Classifier::from(Box::new(gate) as Box<dyn ClassifierExtension>);

        let mut pos = self.dataset.positives(&gate)?;
        if pos.len() <= self.config.positive_count_threshold {
            log::info!("not enough positive samples for '{label}' ({})", pos.len());
            self.leaves.push(label.clone());
            return Ok(Visit::Skipped);
        }
        let mut neg = self.dataset.negatives(&gate)?;
        if neg.len() <= self.config.negative_count_threshold {
            log::info!("not enough negative samples for '{label}' ({})", neg.len());
            self.leaves.push(label.clone());
            return Ok(Visit::Skipped);
        }

        match self.stage.train(&mut pos, &mut neg) {
            Ok(strong) => {
                set_central_at(&mut self.tree, label, strong);
                Ok(Visit::Trained)
            }
            Err(e @ TrainError::NoWeakClassifier { .. }) => {
                log::error!("cannot train node '{label}': {e}");
                Ok(Visit::Skipped)
            }
            Err(e) => Err(e),
        }
    }

    fn save(&self) -> Result<(), TrainError> {
        Classifier::from(self.tree.clone()).save(&self.config.classifier_path)?;
        if let Some(path) = &self.leaf_path {
            save_leaves(path, &self.leaves)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use crate::test::{constant, uniform_pool};

    use super::*;

    fn label(s: &str) -> Label {
        Label::parse(s).unwrap()
    }

    #[test]
    fn labels() {
        assert_eq!(Label::root().as_str(), "C");
        assert_eq!(Label::root().child(Side::Right).child(Side::Left), label("CrClC"));
        assert_eq!(
            label("CrClC").sides().collect::<Vec<_>>(),
            [Side::Right, Side::Left]
        );
        assert_eq!(label("CrClC").depth(), 2);

        for invalid in ["", "r", "CC", "Cr", "CxC", "rCr"] {
            assert_eq!(Label::parse(invalid), None, "{invalid}");
        }
    }

    #[test]
    fn sibling_sweep() {
        let mut label = label("CrCrC");
        let mut visited = vec![label.to_string()];
        while let Some(next) = label.next_sibling() {
            visited.push(next.to_string());
            label = next;
        }
        assert_eq!(visited, ["CrCrC", "CrClC", "ClC"]);
    }

    #[test]
    fn nodes_by_label() {
        let mut tree = Tree::new(3, 3);
        assert!(central_at(&tree, &Label::root()).is_none());

        set_central_at(&mut tree, &Label::root(), constant(1.0));
        set_central_at(&mut tree, &label("CrClC"), constant(-2.0));
        assert!(central_at(&tree, &Label::root()).is_some());
        assert!(central_at(&tree, &label("CrC")).is_none());
        assert!(central_at(&tree, &label("CrClC")).is_some());
        assert!(central_at(&tree, &label("ClC")).is_none());
    }

    #[test]
    fn parity_cascade() {
        let mut tree = Tree::new(3, 3);
        set_central_at(&mut tree, &Label::root(), constant(1.0));
        set_central_at(&mut tree, &label("CrC"), constant(-2.0));
        let pool = uniform_pool(&constant(0.0), 5, 5, 100);
        let eval = |gate: &ParityCascade| gate.evaluate(&pool, 2, 2, &mut EvalStats::new());

        let gate = ParityCascade::along(&tree, &Label::root());
        assert!(gate.is_empty());
        assert_eq!(eval(&gate), Ok(EPSILON));

        // Right at the root, left at `CrC`: both stages agree with the path.
        let gate = ParityCascade::along(&tree, &label("CrClC"));
        assert_eq!(gate.len(), 2);
        assert_eq!(eval(&gate), Ok(2.0));

        // The root sends every window right, so a left turn there rejects.
        let gate = ParityCascade::along(&tree, &label("ClC"));
        assert_eq!(eval(&gate), Ok(-1.0));

        // Stops at the untrained `CrCrC` node.
        let gate = ParityCascade::along(&tree, &label("CrCrCrC"));
        assert_eq!(gate.len(), 2);
    }

    #[test]
    fn leaf_list_files() {
        let dir = env::temp_dir().join(format!("objed-leaves-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("leaves.json");
        let _ = fs::remove_file(&path);

        assert!(load_leaves(&path).unwrap().is_empty());
        let leaves = [label("CrC"), label("ClClC")];
        save_leaves(&path, &leaves).unwrap();
        assert_eq!(load_leaves(&path).unwrap(), leaves);

        fs::write(&path, r#"["CrX"]"#).unwrap();
        assert!(matches!(load_leaves(&path), Err(TrainError::InvalidConfig(_))));
        fs::remove_dir_all(&dir).unwrap();
    }
}
