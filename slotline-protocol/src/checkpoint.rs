use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamped observation of cumulative revenue within one business day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub time: DateTime<Utc>,
    pub slot: u8,
    pub revenue: f64,
    pub delta: f64,
    /// Weighted projection at the moment the checkpoint was written.
    #[serde(default)]
    pub projected: f64,
    /// Set on the synthetic entry appended when a day is reconciled.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub closing: bool,
}

impl Checkpoint {
    pub fn new(time: DateTime<Utc>, slot: u8, revenue: f64, delta: f64, projected: f64) -> Self {
        Self {
            time,
            slot,
            revenue,
            delta,
            projected,
            closing: false,
        }
    }
}
