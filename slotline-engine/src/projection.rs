use serde::{Deserialize, Serialize};
use slotline_protocol::prelude::{Benchmark, PriorityTier, Schedule, SLOT_COUNT};

/// Display hint derived from how much of the day has been observed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn from_slots(slots_completed: u8) -> Self {
        match slots_completed {
            0..=6 => Confidence::Low,
            7..=12 => Confidence::Medium,
            _ => Confidence::High,
        }
    }
}

/// End-of-day estimates for a partial day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Projection {
    pub linear: f64,
    pub weighted: f64,
    pub benchmark: Benchmark,
    pub confidence: Confidence,
    pub red_slots_remaining: usize,
    /// Percentage of the goal reached, capped at 100.
    pub goal_progress: f64,
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

pub fn linear_projection(slots_completed: u8, revenue: f64) -> f64 {
    if slots_completed == 0 {
        return 0.0;
    }
    finite_or_zero(revenue / f64::from(slots_completed) * f64::from(SLOT_COUNT))
}

/// Extrapolates revenue-per-weight across the weight of the slots still ahead.
pub fn weighted_projection(slots_completed: u8, revenue: f64, schedule: &Schedule) -> f64 {
    let completed = schedule.weight_through(slots_completed);
    let remaining = schedule.total_weight() - completed;
    let per_weight = if completed > 0.0 {
        revenue / completed
    } else {
        0.0
    };
    finite_or_zero(revenue + per_weight * remaining)
}

pub fn goal_progress(revenue: f64, goal: f64) -> f64 {
    if goal <= 0.0 {
        return 0.0;
    }
    finite_or_zero(revenue / goal * 100.0).min(100.0)
}

pub fn red_slots_remaining(slots_completed: u8, schedule: &Schedule) -> usize {
    schedule
        .slots()
        .iter()
        .skip(usize::from(slots_completed))
        .filter(|slot| slot.priority == PriorityTier::Red)
        .count()
}

pub fn project(slots_completed: u8, revenue: f64, goal: f64, schedule: &Schedule) -> Projection {
    let slots_completed = slots_completed.min(SLOT_COUNT);
    let revenue = finite_or_zero(revenue);
    let weighted = weighted_projection(slots_completed, revenue, schedule);

    Projection {
        linear: linear_projection(slots_completed, revenue),
        weighted,
        benchmark: Benchmark::classify(weighted),
        confidence: Confidence::from_slots(slots_completed),
        red_slots_remaining: red_slots_remaining(slots_completed, schedule),
        goal_progress: goal_progress(revenue, goal),
    }
}
