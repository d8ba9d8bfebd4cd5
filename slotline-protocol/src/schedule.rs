use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of slots in one business day.
pub const SLOT_COUNT: u8 = 18;

/// Audience priority attached to each slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriorityTier {
    Red,
    Blue,
    Yellow,
    Green,
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PriorityTier::Red => "RED",
            PriorityTier::Blue => "BLUE",
            PriorityTier::Yellow => "YELLOW",
            PriorityTier::Green => "GREEN",
        };
        f.write_str(label)
    }
}

/// One fixed window of the business day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slot {
    pub index: u8,
    pub start_label: String,
    pub geo_tag: String,
    pub priority: PriorityTier,
    pub expectation: String,
    pub weight: f64,
}

impl Slot {
    pub fn new(
        index: u8,
        start_label: &str,
        geo_tag: &str,
        priority: PriorityTier,
        expectation: &str,
        weight: f64,
    ) -> Self {
        Self {
            index,
            start_label: start_label.to_string(),
            geo_tag: geo_tag.to_string(),
            priority,
            expectation: expectation.to_string(),
            weight,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ScheduleError {
    #[error("schedule must contain {expected} slots, got {actual}")]
    WrongLength { expected: u8, actual: usize },
    #[error("slot at position {position} has index {index}")]
    OutOfOrder { position: usize, index: u8 },
    #[error("slot {index} has non-positive weight {weight}")]
    InvalidWeight { index: u8, weight: f64 },
}

/// Ordered, immutable slot table.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    slots: Vec<Slot>,
    total_weight: f64,
}

impl Schedule {
    /// Validates and wraps a slot table: exactly 18 entries, indexed 1..=18, positive weights.
    pub fn new(slots: Vec<Slot>) -> Result<Self, ScheduleError> {
        if slots.len() != SLOT_COUNT as usize {
            return Err(ScheduleError::WrongLength {
                expected: SLOT_COUNT,
                actual: slots.len(),
            });
        }
        for (position, slot) in slots.iter().enumerate() {
            if slot.index as usize != position + 1 {
                return Err(ScheduleError::OutOfOrder {
                    position,
                    index: slot.index,
                });
            }
            if !(slot.weight.is_finite() && slot.weight > 0.0) {
                return Err(ScheduleError::InvalidWeight {
                    index: slot.index,
                    weight: slot.weight,
                });
            }
        }
        Ok(Self::from_slots(slots))
    }

    fn from_slots(slots: Vec<Slot>) -> Self {
        let total_weight = slots.iter().map(|slot| slot.weight).sum();
        Self {
            slots,
            total_weight,
        }
    }

    /// The process-wide standard table, built once.
    pub fn standard() -> &'static Schedule {
        static STANDARD: OnceLock<Schedule> = OnceLock::new();
        STANDARD.get_or_init(|| Schedule::from_slots(standard_slots()))
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Slot by 1-based index.
    pub fn slot(&self, index: u8) -> Option<&Slot> {
        index
            .checked_sub(1)
            .and_then(|position| self.slots.get(position as usize))
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Sum of the weights of the first `count` slots.
    pub fn weight_through(&self, count: u8) -> f64 {
        self.slots
            .iter()
            .take(count as usize)
            .map(|slot| slot.weight)
            .sum()
    }
}

fn standard_slots() -> Vec<Slot> {
    use PriorityTier::*;
    vec![
        Slot::new(1, "9:00 AM", "AU/NZ", Blue, "High CPM", 1.0),
        Slot::new(2, "10:20 AM", "AU/NZ", Blue, "High CPM", 1.0),
        Slot::new(3, "11:40 AM", "Mixed", Yellow, "Transition", 0.9),
        Slot::new(4, "1:00 PM", "ID/PH/IN", Green, "Volume Only", 0.6),
        Slot::new(5, "2:20 PM", "ID/PH/IN", Green, "Volume Only", 0.6),
        Slot::new(6, "3:40 PM", "ID/PH/IN", Green, "Volume Only", 0.6),
        Slot::new(7, "5:00 PM", "UK/EU", Blue, "High CPM", 1.0),
        Slot::new(8, "6:20 PM", "UK/EU", Blue, "High CPM", 1.0),
        Slot::new(9, "7:40 PM", "UK/EU", Blue, "High CPM", 1.0),
        Slot::new(10, "9:00 PM", "UK/EU", Blue, "High CPM", 1.0),
        Slot::new(11, "10:20 PM", "US Seeding", Yellow, "Prep", 0.9),
        Slot::new(12, "11:40 PM", "US Seeding", Yellow, "Prep", 0.9),
        Slot::new(13, "1:00 AM", "US Growing", Yellow, "Rising", 0.9),
        Slot::new(14, "2:20 AM", "US Strong", Blue, "High", 1.0),
        Slot::new(15, "3:40 AM", "US PRIME", Red, "MAX MONEY", 1.6),
        Slot::new(16, "5:00 AM", "US PRIME", Red, "MAX MONEY", 1.6),
        Slot::new(17, "6:20 AM", "US PRIME", Red, "MAX MONEY", 1.6),
        Slot::new(18, "7:40 AM", "Low/Taper", Green, "Filler", 0.6),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_shape() {
        let schedule = Schedule::standard();
        assert_eq!(schedule.slots().len(), 18);
        assert!((schedule.total_weight() - 17.8).abs() < 1e-9);
        assert!((schedule.weight_through(6) - 4.7).abs() < 1e-9);
        assert_eq!(schedule.slot(15).map(|s| s.priority), Some(PriorityTier::Red));
        assert!(schedule.slot(0).is_none());
        assert!(schedule.slot(19).is_none());
    }

    #[test]
    fn rejects_invalid_tables() {
        assert!(Schedule::new(standard_slots()).is_ok());

        let mut slots = standard_slots();
        slots.pop();
        assert!(matches!(
            Schedule::new(slots),
            Err(ScheduleError::WrongLength { actual: 17, .. })
        ));

        let mut slots = standard_slots();
        slots[4].weight = 0.0;
        assert!(matches!(
            Schedule::new(slots),
            Err(ScheduleError::InvalidWeight { index: 5, .. })
        ));
    }
}
