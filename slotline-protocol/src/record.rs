use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::benchmark::Benchmark;
use crate::checkpoint::Checkpoint;
use crate::day::DayKey;
use crate::schedule::PriorityTier;

/// Goal used when none has been stored for a day.
pub const DEFAULT_GOAL: f64 = 35.0;

/// History keyed by business day.
pub type HistoryMap = BTreeMap<DayKey, DailyRecord>;

/// Which write path produced a history entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Re-derived after every mutation of the active day.
    #[default]
    Live,
    /// Frozen by reconciliation.
    Final,
    /// Overwritten from the archive view.
    Edited,
}

/// One day's entry in the history map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyRecord {
    pub date: DayKey,
    pub revenue: f64,
    pub goal: f64,
    pub slots_reached: u8,
    pub weighted_projection: f64,
    pub benchmark: Benchmark,
    #[serde(default)]
    pub posted_slots: BTreeSet<u8>,
    #[serde(default)]
    pub checkpoint_log: Vec<Checkpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<PriorityTier>,
    #[serde(default)]
    pub kind: RecordKind,
    pub recorded_at: DateTime<Utc>,
}

impl DailyRecord {
    pub fn is_final(&self) -> bool {
        matches!(self.kind, RecordKind::Final)
    }

    pub fn met_goal(&self) -> bool {
        self.revenue >= self.goal
    }
}

/// Running total and goal of one business day, persisted under `daily:<day>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayState {
    #[serde(default)]
    pub revenue_so_far: f64,
    #[serde(default = "default_goal")]
    pub daily_goal: f64,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl DayState {
    pub fn with_goal(goal: f64) -> Self {
        Self {
            revenue_so_far: 0.0,
            daily_goal: goal,
            last_updated: None,
        }
    }
}

impl Default for DayState {
    fn default() -> Self {
        Self::with_goal(DEFAULT_GOAL)
    }
}

fn default_goal() -> f64 {
    DEFAULT_GOAL
}

/// A finished day awaiting an operator-confirmed final total.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingReconciliation {
    pub date: DayKey,
    pub last_revenue: f64,
    pub goal: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn day_state_defaults_missing_fields() {
        let state: DayState = serde_json::from_value(json!({"revenue_so_far": 12.5})).unwrap();
        assert_eq!(state.revenue_so_far, 12.5);
        assert_eq!(state.daily_goal, DEFAULT_GOAL);
        assert!(state.last_updated.is_none());
    }

    #[test]
    fn record_kind_defaults_to_live() {
        let record: DailyRecord = serde_json::from_value(json!({
            "date": "2024-05-01",
            "revenue": 40.0,
            "goal": 35.0,
            "slots_reached": 9,
            "weighted_projection": 61.2,
            "benchmark": "Strong Day",
            "recorded_at": "2024-05-01T18:00:00Z"
        }))
        .unwrap();
        assert_eq!(record.kind, RecordKind::Live);
        assert!(record.met_goal());
        assert!(record.checkpoint_log.is_empty());
    }
}
