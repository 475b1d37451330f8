use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::{EvalError, ModelError, PoolError},
    pool::ImagePool,
    rect::{Point, Rect},
};

use super::{doc, EvalStats};

fn whole_frame() -> Rect<f64> {
    Rect::from_top_left(0.0, 0.0, 1.0, 1.0)
}

/// Restricts where in the frame a window may lie.
///
/// All regions are given as fractions of the frame size. A window is accepted (`1`) if it lies
/// inside `object_roi` and the midpoints of its left, top, right and bottom edges lie inside the
/// respective border regions. Otherwise the response is `-1`. Every region defaults to the whole
/// frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Roi {
    width: i32,
    height: i32,
    #[serde(default = "whole_frame")]
    object_roi: Rect<f64>,
    #[serde(default = "whole_frame")]
    left_border_roi: Rect<f64>,
    #[serde(default = "whole_frame")]
    top_border_roi: Rect<f64>,
    #[serde(default = "whole_frame")]
    right_border_roi: Rect<f64>,
    #[serde(default = "whole_frame")]
    bottom_border_roi: Rect<f64>,
}

impl Roi {
    pub const TYPE: &'static str = "roiClassifier";

    /// Creates a classifier that accepts every window of the frame.
    #[track_caller]
    pub fn new(width: i32, height: i32) -> Self {
        doc::assert_size(width, height);
        Self {
            width,
            height,
            object_roi: whole_frame(),
            left_border_roi: whole_frame(),
            top_border_roi: whole_frame(),
            right_border_roi: whole_frame(),
            bottom_border_roi: whole_frame(),
        }
    }

    pub fn with_object_roi(mut self, roi: Rect<f64>) -> Self {
        self.object_roi = roi;
        self
    }

    /// Sets the regions of the left, top, right and bottom edge midpoints.
    pub fn with_border_rois(mut self, rois: [Rect<f64>; 4]) -> Self {
        let [left, top, right, bottom] = rois;
        self.left_border_roi = left;
        self.top_border_roi = top;
        self.right_border_roi = right;
        self.bottom_border_roi = bottom;
        self
    }

    pub(crate) fn from_document(doc: &Value) -> Result<Self, ModelError> {
        let roi = Self::deserialize(doc)?;
        doc::check_size(roi.width, roi.height)?;
        Ok(roi)
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

    pub fn prepare(&self, _pool: &mut ImagePool) -> Result<(), PoolError> {
        Ok(())
    }

    pub fn evaluate(
        &self,
        pool: &ImagePool,
        x: i32,
        y: i32,
        _stats: &mut EvalStats,
    ) -> Result<f32, EvalError> {
        let base = pool.base();
        if base.is_empty() {
            return Ok(-1.0);
        }
        let (frame_w, frame_h) = (f64::from(base.width()), f64::from(base.height()));
        let object = Rect::from_top_left(
            f64::from(x - self.width / 2) / frame_w,
            f64::from(y - self.height / 2) / frame_h,
            f64::from(self.width) / frame_w,
            f64::from(self.height) / frame_h,
        );
        let (mid_x, mid_y) = (
            object.x() + object.width() / 2.0,
            object.y() + object.height() / 2.0,
        );

        let accepted = self.object_roi.contains_rect(&object)
            && self
                .left_border_roi
                .contains_point(Point::new(object.x(), mid_y))
            && self
                .top_border_roi
                .contains_point(Point::new(mid_x, object.y()))
            && self
                .right_border_roi
                .contains_point(Point::new(object.right(), mid_y))
            && self
                .bottom_border_roi
                .contains_point(Point::new(mid_x, object.bottom()));
        Ok(if accepted { 1.0 } else { -1.0 })
    }

    pub fn to_document(&self) -> Value {
        let mut doc = serde_json::to_value(self).unwrap_or_default();
        if let Value::Object(map) = &mut doc {
            map.insert("type".into(), Self::TYPE.into());
        }
        doc
    }
}
