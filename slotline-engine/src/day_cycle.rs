//! Day boundary detection and reconciliation.
//!
//! A day is `Active` until the computed day key moves past the last observed
//! one. The finished day then waits as a [`PendingReconciliation`] until the
//! operator confirms its final total, which freezes it into history.

use chrono::{DateTime, Utc};
use serde::Serialize;
use slotline_core::keys;
use slotline_core::modified::mark_local_modified;
use slotline_core::store::{load, load_or_default, save, SharedStore};
use slotline_protocol::prelude::{
    Benchmark, Checkpoint, DailyRecord, DayKey, DayState, PendingReconciliation, RecordKind,
    SLOT_COUNT,
};
use tracing::{debug, info};

use crate::archive::{load_history, save_history};
use crate::error::{EngineError, Result};
use crate::input::clamp_amount;
use crate::ledger::Ledger;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CycleState {
    Active { day: DayKey },
    PendingReconciliation(PendingReconciliation),
}

/// Emitted once when the day key changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayTransition {
    pub from: DayKey,
    pub to: DayKey,
    pub pending: Option<PendingReconciliation>,
}

pub struct DayCycleController {
    store: SharedStore,
    default_goal: f64,
}

impl DayCycleController {
    pub fn new(store: SharedStore, default_goal: f64) -> Self {
        Self {
            store,
            default_goal,
        }
    }

    pub fn last_day(&self) -> Option<DayKey> {
        load(self.store.as_ref(), keys::LAST_DAY_KEY)
    }

    pub fn pending(&self) -> Option<PendingReconciliation> {
        load(self.store.as_ref(), keys::PENDING_RECONCILIATION)
    }

    pub fn state(&self, today: DayKey) -> CycleState {
        match self.pending() {
            Some(pending) => CycleState::PendingReconciliation(pending),
            None => CycleState::Active { day: today },
        }
    }

    /// Compares `today` with the last observed day key and handles a rollover.
    ///
    /// A pending reconciliation is captured for the finished day unless it
    /// already has a final record; any older pending entry is superseded.
    pub fn observe(&self, today: DayKey) -> Result<Option<DayTransition>> {
        let store = self.store.as_ref();
        let previous = match self.last_day() {
            Some(previous) if previous == today => return Ok(None),
            Some(previous) => previous,
            None => {
                debug!(day = %today, "first observed business day");
                save(store, keys::LAST_DAY_KEY, &today)?;
                return Ok(None);
            }
        };

        if let Some(stale) = self.pending().filter(|pending| pending.date != previous) {
            // never reconciled; its working keys would otherwise be mirrored forever
            store.remove(&keys::daily(stale.date))?;
            store.remove(&keys::posted(stale.date))?;
            store.remove(&keys::checkpoints(stale.date))?;
            info!(day = %stale.date, "unreconciled day superseded");
        }

        let already_final = load_history(store)
            .get(&previous)
            .map(DailyRecord::is_final)
            .unwrap_or(false);

        let pending = if already_final {
            store.remove(keys::PENDING_RECONCILIATION)?;
            None
        } else {
            let state: Option<DayState> = load(store, &keys::daily(previous));
            let pending = PendingReconciliation {
                date: previous,
                last_revenue: state.as_ref().map_or(0.0, |s| s.revenue_so_far),
                goal: state.map_or(self.default_goal, |s| s.daily_goal),
            };
            save(store, keys::PENDING_RECONCILIATION, &pending)?;
            Some(pending)
        };

        save(store, keys::LAST_DAY_KEY, &today)?;
        store.remove(keys::ALERT_DISMISSED)?;

        info!(
            from = %previous,
            to = %today,
            awaiting_reconciliation = pending.is_some(),
            "business day rolled over"
        );

        Ok(Some(DayTransition {
            from: previous,
            to: today,
            pending,
        }))
    }

    /// Freezes the pending day with the confirmed `final_total`.
    pub fn confirm(&self, final_total: f64, now: DateTime<Utc>) -> Result<DailyRecord> {
        let store = self.store.as_ref();
        let pending = self.pending().ok_or(EngineError::NothingToReconcile)?;
        let final_total = clamp_amount(final_total)?.value;
        let day = pending.date;

        let entries: Vec<Checkpoint> = load_or_default(store, &keys::checkpoints(day));
        let mut ledger = Ledger::from_entries(entries);
        let closing = ledger.close(final_total, now);

        let record = DailyRecord {
            date: day,
            revenue: final_total,
            goal: pending.goal,
            slots_reached: SLOT_COUNT,
            weighted_projection: final_total,
            benchmark: Benchmark::classify(final_total),
            posted_slots: (1..=SLOT_COUNT).collect(),
            checkpoint_log: ledger.into_entries(),
            priority: None,
            kind: RecordKind::Final,
            recorded_at: now,
        };

        let mut history = load_history(store);
        history.insert(day, record.clone());
        save_history(store, &history)?;

        store.remove(&keys::daily(day))?;
        store.remove(&keys::posted(day))?;
        store.remove(&keys::checkpoints(day))?;
        store.remove(keys::PENDING_RECONCILIATION)?;
        mark_local_modified(store, now)?;

        info!(
            day = %day,
            revenue = final_total,
            benchmark = %record.benchmark,
            closing_delta = closing.map(|c| c.delta),
            "day reconciled"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use slotline_core::store::MemoryStore;

    fn day(d: u32) -> DayKey {
        DayKey::from_ymd(2024, 5, d).unwrap()
    }

    fn seeded(previous: DayKey) -> (SharedStore, DayCycleController) {
        let store = MemoryStore::shared();
        let t = Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap();
        save(store.as_ref(), keys::LAST_DAY_KEY, &previous).unwrap();
        save(
            store.as_ref(),
            &keys::daily(previous),
            &DayState {
                revenue_so_far: 40.0,
                daily_goal: 50.0,
                last_updated: Some(t),
            },
        )
        .unwrap();
        save(
            store.as_ref(),
            &keys::posted(previous),
            &vec![1u8, 12],
        )
        .unwrap();
        save(
            store.as_ref(),
            &keys::checkpoints(previous),
            &vec![Checkpoint::new(t, 12, 40.0, 40.0, 52.0)],
        )
        .unwrap();
        let controller = DayCycleController::new(store.clone(), 35.0);
        (store, controller)
    }

    #[test]
    fn first_observation_only_remembers_the_day() {
        let store = MemoryStore::shared();
        let controller = DayCycleController::new(store, 35.0);
        assert!(controller.observe(day(1)).unwrap().is_none());
        assert_eq!(controller.last_day(), Some(day(1)));
        assert!(controller.observe(day(1)).unwrap().is_none());
    }

    #[test]
    fn rollover_captures_previous_day() {
        let (_store, controller) = seeded(day(1));
        let transition = controller.observe(day(2)).unwrap().unwrap();

        let expected = PendingReconciliation {
            date: day(1),
            last_revenue: 40.0,
            goal: 50.0,
        };
        assert_eq!(transition.pending.as_ref(), Some(&expected));
        assert_eq!(controller.state(day(2)), CycleState::PendingReconciliation(expected));
        assert!(controller.observe(day(2)).unwrap().is_none());
    }

    #[test]
    fn superseded_pending_day_drops_its_working_keys() {
        let (store, controller) = seeded(day(1));
        controller.observe(day(2)).unwrap();
        save(store.as_ref(), &keys::daily(day(2)), &DayState::with_goal(35.0)).unwrap();

        let transition = controller.observe(day(3)).unwrap().unwrap();
        assert_eq!(transition.pending.map(|p| p.date), Some(day(2)));

        let store = store.as_ref();
        assert!(store.get(&keys::daily(day(1))).is_none());
        assert!(store.get(&keys::posted(day(1))).is_none());
        assert!(store.get(&keys::checkpoints(day(1))).is_none());
        assert!(store.get(&keys::daily(day(2))).is_some());
    }

    #[test]
    fn confirmation_freezes_the_day() {
        let (store, controller) = seeded(day(1));
        controller.observe(day(2)).unwrap();

        let now = Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap();
        let record = controller.confirm(45.0, now).unwrap();

        assert_eq!(record.revenue, 45.0);
        assert_eq!(record.posted_slots.len(), 18);
        assert_eq!(record.benchmark, Benchmark::GoodDay);
        assert!(record.is_final());
        let closing = record.checkpoint_log.last().unwrap();
        assert!(closing.closing);
        assert_eq!(closing.delta, 5.0);

        let store = store.as_ref();
        assert!(store.get(&keys::daily(day(1))).is_none());
        assert!(store.get(&keys::posted(day(1))).is_none());
        assert!(store.get(&keys::checkpoints(day(1))).is_none());
        assert!(controller.pending().is_none());
        assert_eq!(load_history(store).len(), 1);
        assert!(store.get(keys::LOCAL_LAST_MODIFIED).is_some());
    }

    #[test]
    fn confirmation_without_higher_total_adds_no_closing_entry() {
        let (_store, controller) = seeded(day(1));
        controller.observe(day(2)).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap();

        let record = controller.confirm(38.0, now).unwrap();
        assert_eq!(record.checkpoint_log.len(), 1);
        assert!(!record.checkpoint_log[0].closing);
    }

    #[test]
    fn nothing_to_confirm() {
        let (_store, controller) = seeded(day(1));
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap();
        assert!(matches!(
            controller.confirm(45.0, now),
            Err(EngineError::NothingToReconcile)
        ));
    }

    #[test]
    fn final_days_are_not_reopened() {
        let (store, controller) = seeded(day(1));
        controller.observe(day(2)).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).unwrap();
        controller.confirm(45.0, now).unwrap();

        save(store.as_ref(), keys::LAST_DAY_KEY, &day(1)).unwrap();
        let transition = controller.observe(day(2)).unwrap().unwrap();
        assert!(transition.pending.is_none());
    }

    #[test]
    fn newer_transition_supersedes_pending() {
        let (_store, controller) = seeded(day(1));
        controller.observe(day(2)).unwrap();
        controller.observe(day(3)).unwrap();

        let pending = controller.pending().unwrap();
        assert_eq!(pending.date, day(2));
        assert_eq!(pending.last_revenue, 0.0);
        assert_eq!(pending.goal, 35.0);
    }
}
