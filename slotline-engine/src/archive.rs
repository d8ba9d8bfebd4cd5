//! History maintenance: edits, backups and calendar export.

use chrono::{DateTime, Utc};
use serde_json::Value;
use slotline_core::keys;
use slotline_core::modified::mark_local_modified;
use slotline_core::serde_utils::to_pretty_json;
use slotline_core::store::{load_or_default, save, KeyValueStore};
use slotline_protocol::prelude::{
    BackupDocument, Benchmark, DailyRecord, DayKey, HistoryMap, RecordKind, BACKUP_APP_TAG,
};
use tracing::{info, warn};

use crate::error::{EngineError, Result};
use crate::input::clamp_amount;

const CALENDAR_PRODID: &str = "-//Slotline//NONSGML v1.0//EN";

pub fn load_history(store: &dyn KeyValueStore) -> HistoryMap {
    load_or_default(store, keys::HISTORY)
}

pub fn save_history(store: &dyn KeyValueStore, history: &HistoryMap) -> Result<()> {
    save(store, keys::HISTORY, history)?;
    Ok(())
}

/// Overwrites revenue and goal of one history entry and relabels its benchmark.
pub fn edit_record(
    store: &dyn KeyValueStore,
    date: DayKey,
    revenue: f64,
    goal: f64,
    now: DateTime<Utc>,
) -> Result<DailyRecord> {
    let mut history = load_history(store);
    let record = history
        .get_mut(&date)
        .ok_or(EngineError::RecordNotFound(date))?;
    record.revenue = clamp_amount(revenue)?.value;
    record.goal = clamp_amount(goal)?.value;
    record.benchmark = Benchmark::classify(record.revenue);
    record.kind = RecordKind::Edited;
    record.recorded_at = now;
    let updated = record.clone();

    save_history(store, &history)?;
    mark_local_modified(store, now)?;
    info!(day = %date, revenue = updated.revenue, goal = updated.goal, "history record edited");
    Ok(updated)
}

pub fn delete_record(store: &dyn KeyValueStore, date: DayKey, now: DateTime<Utc>) -> Result<DailyRecord> {
    let mut history = load_history(store);
    let removed = history
        .remove(&date)
        .ok_or(EngineError::RecordNotFound(date))?;
    save_history(store, &history)?;
    mark_local_modified(store, now)?;
    info!(day = %date, "history record deleted");
    Ok(removed)
}

pub fn export_backup(store: &dyn KeyValueStore, now: DateTime<Utc>) -> BackupDocument {
    BackupDocument::new(&load_history(store), now)
}

pub fn export_backup_json(store: &dyn KeyValueStore, now: DateTime<Utc>) -> Result<String> {
    Ok(to_pretty_json(&export_backup(store, now))?)
}

/// Replaces the history map with the `raw` map of a backup document.
///
/// The document is validated completely before anything is written.
pub fn import_backup(store: &dyn KeyValueStore, text: &str, now: DateTime<Utc>) -> Result<usize> {
    let document: Value = serde_json::from_str(text).map_err(|err| {
        warn!(%err, "backup is not valid JSON");
        EngineError::BackupRejected(format!("unreadable document: {err}"))
    })?;

    if document.get("app").and_then(Value::as_str) != Some(BACKUP_APP_TAG) {
        return Err(EngineError::BackupRejected(format!(
            "not a {BACKUP_APP_TAG} backup"
        )));
    }
    let raw = document
        .get("raw")
        .filter(|raw| !raw.is_null())
        .cloned()
        .ok_or_else(|| EngineError::BackupRejected("missing raw history".to_string()))?;
    let history: HistoryMap = serde_json::from_value(raw)
        .map_err(|err| EngineError::BackupRejected(format!("malformed history: {err}")))?;

    save_history(store, &history)?;
    mark_local_modified(store, now)?;
    info!(days = history.len(), "backup imported");
    Ok(history.len())
}

/// Renders the history as an iCalendar document, one all-day event per day.
pub fn export_calendar(history: &HistoryMap) -> String {
    let mut lines = vec![
        "BEGIN:VCALENDAR".to_string(),
        "VERSION:2.0".to_string(),
        format!("PRODID:{CALENDAR_PRODID}"),
    ];
    for record in history.values() {
        lines.push("BEGIN:VEVENT".to_string());
        lines.push(format!("DTSTART;VALUE=DATE:{}", record.date.compact()));
        lines.push(format!("SUMMARY:Revenue: ${}", record.revenue));
        lines.push(format!(
            "DESCRIPTION:Goal: ${} | Slots: {} | Projection: ${:.2} | Status: {}",
            record.goal, record.slots_reached, record.weighted_projection, record.benchmark
        ));
        lines.push("END:VEVENT".to_string());
    }
    lines.push("END:VCALENDAR".to_string());
    lines.join("\r\n")
}
