use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{EvalError, ModelError, PoolError},
    pool::ImagePool,
    rect::Interval,
};

use super::{doc, EvalStats};

/// Accepted range of the mean value of one preprocessed image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanRange {
    #[serde(flatten)]
    range: Interval,
    preproc: String,
}

impl MeanRange {
    pub fn new(min: i32, max: i32, preproc: impl Into<String>) -> Self {
        Self {
            range: Interval::new(min, max),
            preproc: preproc.into(),
        }
    }

    pub fn range(&self) -> Interval {
        self.range
    }

    pub fn preproc(&self) -> &str {
        &self.preproc
    }
}

/// Accepts windows whose mean values all lie inside their ranges.
///
/// Responds with `1` if every range contains the mean of the whole window over its
/// preprocessed image, and with `-1` otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mean {
    width: i32,
    height: i32,
    #[serde(rename = "meanList", default)]
    ranges: Vec<MeanRange>,
}

impl Mean {
    pub const TYPE: &'static str = "meanClassifier";

    #[track_caller]
    pub fn new(width: i32, height: i32, ranges: Vec<MeanRange>) -> Self {
        doc::assert_size(width, height);
        Self {
            width,
            height,
            ranges,
        }
    }

    pub(crate) fn from_document(doc: &Value) -> Result<Self, ModelError> {
        let mean = Self::deserialize(doc)?;
        doc::check_size(mean.width, mean.height)?;
        for range in &mean.ranges {
            ImagePool::validate_id(&range.preproc)?;
        }
        Ok(mean)
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

    pub fn ranges(&self) -> &[MeanRange] {
        &self.ranges
    }

    pub fn prepare(&self, pool: &mut ImagePool) -> Result<(), PoolError> {
        for range in &self.ranges {
            pool.integral(&range.preproc)?;
        }
        Ok(())
    }

    pub fn evaluate(
        &self,
        pool: &ImagePool,
        x: i32,
        y: i32,
        _stats: &mut EvalStats,
    ) -> Result<f32, EvalError> {
        let (left, top) = (x - self.width / 2, y - self.height / 2);
        for range in &self.ranges {
            let integral = pool
                .cached_integral(&range.preproc)
                .ok_or_else(|| EvalError::MissingIntegral(range.preproc.clone()))?;
            let mean = integral
                .rect_aver(left, top, self.width, self.height)
                .ok_or(EvalError::OutOfBounds {
                    x: left,
                    y: top,
                    width: self.width,
                    height: self.height,
                })?;
            if !range.range.contains(mean) {
                return Ok(-1.0);
            }
        }
        Ok(1.0)
    }

    pub fn to_document(&self) -> Value {
        let mut doc = serde_json::to_value(self).unwrap_or_default();
        if let Value::Object(map) = &mut doc {
            map.insert("type".into(), Self::TYPE.into());
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::{classifier::Classifier, test::prepared_pool, Image};

    use super::*;

    #[test]
    fn ranges_are_closed() {
        let image = Image::filled(5, 5, 1, 100);
        for (min, max, expected) in [(100, 100, 1.0), (90, 99, -1.0), (101, 200, -1.0)] {
            let mean = Classifier::from(Mean::new(3, 3, vec![MeanRange::new(min, max, "gray")]));
            let pool = prepared_pool(&mean, &image);
            assert_eq!(mean.evaluate(&pool, 2, 2), Ok(expected), "[{min}, {max}]");
        }
    }

    #[test]
    fn every_range_must_match() {
        let image = Image::from_fn(5, 5, |x, _| if x == 2 { 255 } else { 0 });
        let mean = Classifier::from(Mean::new(
            3,
            3,
            vec![
                MeanRange::new(80, 90, "gray"),
                MeanRange::new(0, 10, "gray|filter255"),
            ],
        ));
        let pool = prepared_pool(&mean, &image);
        assert_eq!(mean.evaluate(&pool, 1, 2), Ok(-1.0));

        let mean = Classifier::from(Mean::new(
            3,
            3,
            vec![
                MeanRange::new(80, 90, "gray"),
                MeanRange::new(80, 90, "gray|filter255"),
            ],
        ));
        let pool = prepared_pool(&mean, &image);
        assert_eq!(mean.evaluate(&pool, 2, 2), Ok(1.0));
        assert!(mean.evaluate(&pool, 0, 2).is_err());
    }

    #[test]
    fn documents() {
        let doc = json!({
            "type": "meanClassifier",
            "width": 3,
            "height": 5,
            "meanList": [{"min": 10, "max": 20, "preproc": "gray"}],
        });
        let mean = Mean::from_document(&doc).unwrap();
        assert_eq!(mean.ranges()[0].range(), Interval::new(10, 20));
        assert_eq!(mean.to_document(), doc);

        let empty = Mean::from_document(&json!({"width": 1, "height": 1})).unwrap();
        assert!(empty.ranges().is_empty());

        let bad = json!({"width": 1, "height": 1, "meanList": [{"min": 0, "max": 1, "preproc": "x"}]});
        assert!(Mean::from_document(&bad).is_err());
    }
}
