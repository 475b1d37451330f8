//! Per-window evaluation counters.
//!
//! Passing a [`DebugInfo`] to [`Detector::detect`] records how much work the classifier did on
//! every scanned window. A *stage* is one strong classifier ([`Additive`] or [`Linear`]) evaluated
//! on the window, so for a cascade of boosted stages the stage count tells how deep a window got
//! before it was rejected.
//!
//! [`Detector::detect`]: crate::detector::Detector::detect
//! [`Additive`]: crate::classifier::Additive
//! [`Linear`]: crate::classifier::Linear

use std::collections::BTreeMap;

/// Identifies a counter in [`DebugInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DebugKey {
    /// Sum of the stage counts of all evaluated windows.
    TotalStageCount,
    /// Smallest stage count of any evaluated window.
    MinStageCount,
    /// Largest stage count of any evaluated window.
    MaxStageCount,
    /// Number of evaluated windows.
    EvaluationCount,
}

/// Accumulated detector counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugInfo {
    values: BTreeMap<DebugKey, i64>,
}

impl DebugInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of `key`, or `None` if nothing was recorded for it yet.
    pub fn get(&self, key: DebugKey) -> Option<i64> {
        self.values.get(&key).copied()
    }

    /// Returns all recorded counters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (DebugKey, i64)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Records one evaluated window that went through `stages` strong classifiers.
    pub fn record_window(&mut self, stages: u32) {
        let stages = i64::from(stages);
        let min = self.values.entry(DebugKey::MinStageCount).or_insert(stages);
        *min = (*min).min(stages);
        let max = self.values.entry(DebugKey::MaxStageCount).or_insert(stages);
        *max = (*max).max(stages);
        *self.values.entry(DebugKey::TotalStageCount).or_insert(0) += stages;
        *self.values.entry(DebugKey::EvaluationCount).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_windows() {
        let mut info = DebugInfo::new();
        assert_eq!(info.get(DebugKey::EvaluationCount), None);

        info.record_window(3);
        info.record_window(1);
        info.record_window(5);
        assert_eq!(info.get(DebugKey::MinStageCount), Some(1));
        assert_eq!(info.get(DebugKey::MaxStageCount), Some(5));
        assert_eq!(info.get(DebugKey::TotalStageCount), Some(9));
        assert_eq!(info.get(DebugKey::EvaluationCount), Some(3));
        assert_eq!(info.iter().count(), 4);

        info.clear();
        assert_eq!(info.get(DebugKey::TotalStageCount), None);
    }

    #[test]
    fn zero_stage_windows_count() {
        let mut info = DebugInfo::new();
        info.record_window(0);
        assert_eq!(info.get(DebugKey::MinStageCount), Some(0));
        assert_eq!(info.get(DebugKey::EvaluationCount), Some(1));
    }
}
