//! Combinators over lists of child classifiers.

use std::path::Path;

use serde_json::{json, Value};

use crate::{
    error::{EvalError, ModelError, PoolError},
    factory::Factory,
    iter::zip_exact,
    pool::ImagePool,
};

use super::{
    assert_child, check_child, children_from_document, children_to_document, doc, Classifier,
    EvalStats,
};

macro_rules! list_classifier {
    (
        $(#[$attr:meta])*
        $name:ident = $type_name:literal, exact = $exact:literal
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone)]
        pub struct $name {
            width: i32,
            height: i32,
            children: Vec<Classifier>,
        }

        impl $name {
            pub const TYPE: &'static str = $type_name;

            /// Creates a node without children.
            #[track_caller]
            pub fn new(width: i32, height: i32) -> Self {
                doc::assert_size(width, height);
                Self {
                    width,
                    height,
                    children: Vec::new(),
                }
            }

            /// Creates a node owning `children`.
            #[track_caller]
            pub fn from_children(
                width: i32,
                height: i32,
                children: impl IntoIterator<Item = Classifier>,
            ) -> Self {
                let mut this = Self::new(width, height);
                for child in children {
                    this.push(child);
                }
                this
            }

            pub(crate) fn from_document(
                doc: &Value,
                work_dir: &Path,
                factory: &Factory,
            ) -> Result<Self, ModelError> {
                let (width, height) = doc::size(doc)?;
                let children = children_from_document(doc, work_dir, factory)?;
                for child in &children {
                    check_child(Self::TYPE, width, height, child, $exact)?;
                }
                Ok(Self {
                    width,
                    height,
                    children,
                })
            }

            /// Appends a child.
            ///
            /// # Panics
            ///
            /// Panics if the child does not fit into this node.
            #[track_caller]
            pub fn push(&mut self, child: Classifier) {
                assert_child(Self::TYPE, self.width, self.height, &child, $exact);
                self.children.push(child);
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

            pub fn children(&self) -> &[Classifier] {
                &self.children
            }

            pub fn len(&self) -> usize {
                self.children.len()
            }

            pub fn is_empty(&self) -> bool {
                self.children.is_empty()
            }

            pub fn prepare(&self, pool: &mut ImagePool) -> Result<(), PoolError> {
                for child in &self.children {
                    child.prepare(pool)?;
                }
                Ok(())
            }

            pub fn to_document(&self) -> Value {
                json!({
                    "type": Self::TYPE,
                    "width": self.width,
                    "height": self.height,
                    "clList": children_to_document(&self.children),
                })
            }
        }
    };
}

list_classifier! {
    /// Sequential conjunction: a window is accepted only if every child accepts it.
    ///
    /// Children are evaluated in order until one responds negatively. The response is that of the
    /// last evaluated child.
    Cascade = "cascadeClassifier", exact = false
}

list_classifier! {
    /// Sequential disjunction: a window is accepted if any child accepts it.
    ///
    /// Children are evaluated in order until one responds positively. The response is that of the
    /// last evaluated child. All children must have the size of this node.
    Parallel = "parallelClassifier", exact = true
}

list_classifier! {
    /// Sum of the child responses, usually a strong classifier built by boosting.
    Additive = "additiveClassifier", exact = false
}

list_classifier! {
    /// Maximum of the child responses.
    Max = "maxClassifier", exact = false
}

impl Cascade {
    pub fn evaluate(
        &self,
        pool: &ImagePool,
        x: i32,
        y: i32,
        stats: &mut EvalStats,
    ) -> Result<f32, EvalError> {
        if self.children.is_empty() {
            return Err(EvalError::Empty(Self::TYPE));
        }
        let mut result = 0.0;
        for child in &self.children {
            result = child.evaluate_with_stats(pool, x, y, stats)?;
            if result < 0.0 {
                break;
            }
        }
        Ok(result)
    }
}

impl Parallel {
    pub fn evaluate(
        &self,
        pool: &ImagePool,
        x: i32,
        y: i32,
        stats: &mut EvalStats,
    ) -> Result<f32, EvalError> {
        if self.children.is_empty() {
            return Err(EvalError::Empty(Self::TYPE));
        }
        let mut result = 0.0;
        for child in &self.children {
            result = child.evaluate_with_stats(pool, x, y, stats)?;
            if result > 0.0 {
                break;
            }
        }
        Ok(result)
    }
}

impl Additive {
    pub fn evaluate(
        &self,
        pool: &ImagePool,
        x: i32,
        y: i32,
        stats: &mut EvalStats,
    ) -> Result<f32, EvalError> {
        stats.add_stage();
        let mut sum = 0.0;
        for child in &self.children {
            sum += child.evaluate_with_stats(pool, x, y, stats)?;
        }
        Ok(sum)
    }
}

impl Max {
    pub fn evaluate(
        &self,
        pool: &ImagePool,
        x: i32,
        y: i32,
        stats: &mut EvalStats,
    ) -> Result<f32, EvalError> {
        let mut max = -f32::MAX;
        for child in &self.children {
            max = max.max(child.evaluate_with_stats(pool, x, y, stats)?);
        }
        Ok(max)
    }
}

/// Weighted sum of the child responses.
#[derive(Debug, Clone)]
pub struct Linear {
    width: i32,
    height: i32,
    children: Vec<Classifier>,
    alphas: Vec<f32>,
}

impl Linear {
    pub const TYPE: &'static str = "linearClassifier";

    #[track_caller]
    pub fn new(width: i32, height: i32) -> Self {
        doc::assert_size(width, height);
        Self {
            width,
            height,
            children: Vec::new(),
            alphas: Vec::new(),
        }
    }

    pub(crate) fn from_document(
        doc: &Value,
        work_dir: &Path,
        factory: &Factory,
    ) -> Result<Self, ModelError> {
        let (width, height) = doc::size(doc)?;
        let children = children_from_document(doc, work_dir, factory)?;
        for child in &children {
            check_child(Self::TYPE, width, height, child, false)?;
        }
        let alphas = doc::array(doc, "alphaList")?
            .iter()
            .map(|alpha| {
                alpha
                    .as_f64()
                    .map(|a| a as f32)
                    .ok_or_else(|| ModelError::invalid("alphaList", format!("{alpha} is not a number")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if alphas.len() != children.len() {
            return Err(ModelError::invalid(
                "alphaList",
                format!("expected {} weights, got {}", children.len(), alphas.len()),
            ));
        }
        Ok(Self {
            width,
            height,
            children,
            alphas,
        })
    }

    /// Appends a child weighted by `alpha`.
    ///
    /// # Panics
    ///
    /// Panics if the child does not fit into this node.
    #[track_caller]
    pub fn push(&mut self, child: Classifier, alpha: f32) {
        assert_child(Self::TYPE, self.width, self.height, &child, false);
        self.children.push(child);
        self.alphas.push(alpha);
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

    pub fn children(&self) -> &[Classifier] {
        &self.children
    }

    pub fn alphas(&self) -> &[f32] {
        &self.alphas
    }

    pub fn prepare(&self, pool: &mut ImagePool) -> Result<(), PoolError> {
        for child in &self.children {
            child.prepare(pool)?;
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
        stats.add_stage();
        let mut sum = 0.0;
        for (child, alpha) in zip_exact(&self.children, &self.alphas) {
            sum += alpha * child.evaluate_with_stats(pool, x, y, stats)?;
        }
        Ok(sum)
    }

    pub fn to_document(&self) -> Value {
        json!({
            "type": Self::TYPE,
            "width": self.width,
            "height": self.height,
            "clList": children_to_document(&self.children),
            "alphaList": self.alphas,
        })
    }
}
