use std::path::Path;

use serde_json::{json, Value};

use crate::{
    error::{EvalError, ModelError, PoolError},
    factory::Factory,
    pool::ImagePool,
};

use super::{assert_child, check_child, doc, Classifier, EvalStats};

/// Selects one of the two subtrees of a [`Tree`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Taken when the central classifier rejects the window.
    Left,
    /// Taken when the central classifier accepts the window.
    Right,
}

/// Binary decision tree of classifiers.
///
/// Every node evaluates its central classifier and descends into the right subtree on a positive
/// response and into the left subtree otherwise. If that subtree is missing, the central response
/// is the result.
#[derive(Debug, Clone)]
pub struct Tree {
    width: i32,
    height: i32,
    central: Option<Box<Classifier>>,
    left: Option<Box<Tree>>,
    right: Option<Box<Tree>>,
}

impl Tree {
    pub const TYPE: &'static str = "treeClassifier";

    /// Creates a node without a central classifier or subtrees.
    #[track_caller]
    pub fn new(width: i32, height: i32) -> Self {
        doc::assert_size(width, height);
        Self {
            width,
            height,
            central: None,
            left: None,
            right: None,
        }
    }

    pub(crate) fn from_document(
        doc: &Value,
        work_dir: &Path,
        factory: &Factory,
    ) -> Result<Self, ModelError> {
        let (width, height) = doc::size(doc)?;
        let central = match doc::optional(doc, "centralCl") {
            Some(central) => {
                let central = factory.create_classifier(central, work_dir)?;
                check_child(Self::TYPE, width, height, &central, false)?;
                Some(Box::new(central))
            }
            None => None,
        };
        let subtree = |key: &str| -> Result<Option<Box<Tree>>, ModelError> {
            let Some(child) = doc::optional(doc, key) else {
                return Ok(None);
            };
            match factory.create_classifier(child, work_dir)? {
                Classifier::Tree(tree) => {
                    if tree.width > width || tree.height > height {
                        return Err(ModelError::ChildSize {
                            parent: Self::TYPE,
                            width,
                            height,
                            child_width: tree.width,
                            child_height: tree.height,
                        });
                    }
                    Ok(Some(Box::new(tree)))
                }
                other => Err(ModelError::invalid(
                    key,
                    format!("expected a {}, got a {}", Self::TYPE, other.type_name()),
                )),
            }
        };
        Ok(Self {
            width,
            height,
            central,
            left: subtree("leftCl")?,
            right: subtree("rightCl")?,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn type_name(&self) -> &'static str {
        Self::TYPE
    }

    pub fn central(&self) -> Option<&Classifier> {
        self.central.as_deref()
    }

    /// Replaces the central classifier of this node.
    ///
    /// # Panics
    ///
    /// Panics if the classifier does not fit into this node.
    #[track_caller]
    pub fn set_central(&mut self, central: Classifier) {
        assert_child(Self::TYPE, self.width, self.height, &central, false);
        self.central = Some(Box::new(central));
    }

    pub fn branch(&self, side: Side) -> Option<&Tree> {
        match side {
            Side::Left => self.left.as_deref(),
            Side::Right => self.right.as_deref(),
        }
    }

    /// Returns the subtree on `side`, creating an empty one of the same size if it is missing.
    pub fn branch_or_insert(&mut self, side: Side) -> &mut Tree {
        let (width, height) = (self.width, self.height);
        let slot = match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        };
        slot.get_or_insert_with(|| Box::new(Tree::new(width, height)))
    }

    pub fn prepare(&self, pool: &mut ImagePool) -> Result<(), PoolError> {
        if let Some(central) = &self.central {
            central.prepare(pool)?;
        }
        for subtree in [&self.left, &self.right].into_iter().flatten() {
            subtree.prepare(pool)?;
        }
        Ok(())
    }

    pub fn evaluate(
        &self,
        pool: &ImagePool,
        x: i32,
        y: i32,
        stats: &mut EvalStats,
    ) -> Result<f32, EvalError> {
        let central = self.central.as_ref().ok_or(EvalError::Empty(Self::TYPE))?;
        let result = central.evaluate_with_stats(pool, x, y, stats)?;
        let side = if result > 0.0 { Side::Right } else { Side::Left };
        match self.branch(side) {
            Some(subtree) => subtree.evaluate(pool, x, y, stats),
            None => Ok(result),
        }
    }

    pub fn to_document(&self) -> Value {
        json!({
            "type": Self::TYPE,
            "width": self.width,
            "height": self.height,
            "centralCl": self.central.as_ref().map(|c| c.to_document()),
            "leftCl": self.left.as_ref().map(|t| t.to_document()),
            "rightCl": self.right.as_ref().map(|t| t.to_document()),
        })
    }
}
