use chrono::{DateTime, Utc};
use slotline_protocol::prelude::{Checkpoint, SLOT_COUNT};
use tracing::debug;

/// Per-day checkpoint log holding at most one entry per slot, ordered by time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    entries: Vec<Checkpoint>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a ledger from persisted entries, restoring its invariants.
    ///
    /// Duplicate slots keep the latest entry; the result is time-ordered and capped.
    pub fn from_entries(entries: Vec<Checkpoint>) -> Self {
        let mut ledger = Self::new();
        let mut entries = entries;
        entries.sort_by_key(|entry| entry.time);
        for entry in entries {
            ledger.insert(entry);
        }
        ledger
    }

    pub fn entries(&self) -> &[Checkpoint] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<Checkpoint> {
        self.entries
    }

    pub fn last(&self) -> Option<&Checkpoint> {
        self.entries.last()
    }

    pub fn last_revenue(&self) -> Option<f64> {
        self.last().map(|entry| entry.revenue)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records an observation for `slot`, superseding any earlier entry for the same slot.
    ///
    /// The delta is taken against the last entry at call time, 0 when empty.
    pub fn record(
        &mut self,
        revenue: f64,
        slot: u8,
        time: DateTime<Utc>,
        projected: f64,
    ) -> Checkpoint {
        let delta = revenue - self.last_revenue().unwrap_or(0.0);
        let checkpoint = Checkpoint::new(time, slot, revenue, delta, projected);
        self.insert(checkpoint.clone());
        debug!(slot, revenue, delta, entries = self.entries.len(), "checkpoint recorded");
        checkpoint
    }

    /// Appends the closing entry for a confirmed final total.
    ///
    /// Nothing is written when the final total does not exceed the last entry.
    pub fn close(&mut self, final_revenue: f64, time: DateTime<Utc>) -> Option<Checkpoint> {
        let last = self.last_revenue();
        if matches!(last, Some(last) if final_revenue <= last) {
            return None;
        }
        let delta = final_revenue - last.unwrap_or(0.0);
        let mut checkpoint = Checkpoint::new(time, SLOT_COUNT, final_revenue, delta, final_revenue);
        checkpoint.closing = true;
        self.insert(checkpoint.clone());
        Some(checkpoint)
    }

    fn insert(&mut self, checkpoint: Checkpoint) {
        self.entries.retain(|entry| entry.slot != checkpoint.slot);
        self.entries.push(checkpoint);
        self.entries.sort_by_key(|entry| entry.time);
        let cap = usize::from(SLOT_COUNT);
        if self.entries.len() > cap {
            let excess = self.entries.len() - cap;
            self.entries.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn deltas_follow_the_last_entry() {
        let mut ledger = Ledger::new();
        let first = ledger.record(10.0, 1, at(10), 0.0);
        let second = ledger.record(25.0, 2, at(90), 0.0);
        assert_eq!(first.delta, 10.0);
        assert_eq!(second.delta, 15.0);
    }

    #[test]
    fn same_slot_supersedes() {
        let mut ledger = Ledger::new();
        ledger.record(10.0, 3, at(170), 0.0);
        let replacement = ledger.record(14.0, 3, at(200), 0.0);

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.last(), Some(&replacement));
        assert_eq!(replacement.delta, 4.0);
    }

    #[test]
    fn never_exceeds_slot_count() {
        let mut ledger = Ledger::new();
        for slot in 1..=SLOT_COUNT {
            ledger.record(f64::from(slot), slot, at(i64::from(slot) * 80), 0.0);
        }
        for slot in 1..=SLOT_COUNT {
            ledger.record(f64::from(slot) * 2.0, slot, at(2000 + i64::from(slot)), 0.0);
        }
        assert_eq!(ledger.len(), usize::from(SLOT_COUNT));
        assert!(ledger.entries().windows(2).all(|pair| pair[0].time <= pair[1].time));
    }

    #[test]
    fn closing_entry_only_when_final_is_higher() {
        let mut ledger = Ledger::new();
        ledger.record(40.0, 12, at(900), 52.0);

        assert!(ledger.close(40.0, at(1500)).is_none());
        let closing = ledger.close(45.0, at(1500)).unwrap();
        assert_eq!(closing.delta, 5.0);
        assert_eq!(closing.slot, SLOT_COUNT);
        assert!(closing.closing);
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn closing_an_empty_ledger() {
        let mut ledger = Ledger::new();
        let closing = ledger.close(0.0, at(1500)).unwrap();
        assert_eq!(closing.delta, 0.0);
        assert_eq!(closing.revenue, 0.0);
    }

    #[test]
    fn rebuild_dedupes_persisted_entries() {
        let entries = vec![
            Checkpoint::new(at(200), 3, 14.0, 4.0, 0.0),
            Checkpoint::new(at(10), 1, 5.0, 5.0, 0.0),
            Checkpoint::new(at(170), 3, 10.0, 5.0, 0.0),
        ];
        let ledger = Ledger::from_entries(entries);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.last_revenue(), Some(14.0));
    }
}
