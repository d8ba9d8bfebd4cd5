//! Maps wall-clock instants onto business days and slots.
//!
//! A business day starts at a fixed hour in a fixed reference zone and is cut
//! into [`SLOT_COUNT`] windows of equal length. Everything here is pure.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, NaiveDateTime, Timelike, Utc};
use regex::Regex;
use slotline_protocol::prelude::{DayKey, SLOT_COUNT};

pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Reference zone, anchor hour and slot length of the business day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayAnchor {
    /// Offset of the reference zone from UTC, in minutes.
    pub reference_offset_minutes: i32,
    pub day_start_hour: u32,
    pub slot_minutes: u32,
}

impl Default for DayAnchor {
    fn default() -> Self {
        Self::standard()
    }
}

impl DayAnchor {
    /// UTC+01:00, day starting at 09:00, 80-minute slots.
    pub const fn standard() -> Self {
        Self {
            reference_offset_minutes: 60,
            day_start_hour: 9,
            slot_minutes: 80,
        }
    }

    pub fn start_minute(&self) -> u32 {
        self.day_start_hour * 60
    }

    fn reference_time(&self, timestamp: DateTime<Utc>) -> NaiveDateTime {
        timestamp.naive_utc() + Duration::minutes(i64::from(self.reference_offset_minutes))
    }

    /// Time of day in the reference zone, in `[0, 1440)`.
    pub fn to_reference_minutes(&self, timestamp: DateTime<Utc>) -> u32 {
        let time = self.reference_time(timestamp);
        time.hour() * 60 + time.minute()
    }

    /// Minutes elapsed since the start of the business day.
    pub fn relative_minutes(&self, reference_minutes: u32) -> u32 {
        (reference_minutes % MINUTES_PER_DAY + MINUTES_PER_DAY - self.start_minute()) % MINUTES_PER_DAY
    }

    pub fn map_to_slot(&self, reference_minutes: u32) -> u8 {
        let slot = self.relative_minutes(reference_minutes) / self.slot_minutes + 1;
        slot.clamp(1, u32::from(SLOT_COUNT)) as u8
    }

    /// Reference minute at which a 1-based slot begins.
    pub fn slot_start_minute(&self, slot: u8) -> u32 {
        let offset = u32::from(slot.saturating_sub(1)) * self.slot_minutes;
        (self.start_minute() + offset) % MINUTES_PER_DAY
    }

    /// Business day containing `timestamp`. Hours before the anchor belong to the previous date.
    pub fn day_key(&self, timestamp: DateTime<Utc>) -> DayKey {
        let time = self.reference_time(timestamp);
        let key = DayKey::new(time.date());
        if time.hour() < self.day_start_hour {
            key.previous()
        } else {
            key
        }
    }

    pub fn minutes_until_next_slot(&self, reference_minutes: u32) -> u32 {
        self.slot_minutes - self.relative_minutes(reference_minutes) % self.slot_minutes
    }

    /// Minutes used for slot computation: the parsed override if it parses, else the live clock.
    pub fn effective_minutes(&self, now: DateTime<Utc>, time_override: Option<&str>) -> u32 {
        time_override
            .and_then(parse_time_override)
            .unwrap_or_else(|| self.to_reference_minutes(now))
    }
}

/// Renders a countdown as `"{h}h {m}m"` or `"{m}m"`.
pub fn format_countdown(minutes: u32) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    if hours > 0 {
        format!("{hours}h {rest}m")
    } else {
        format!("{rest}m")
    }
}

fn twelve_hour() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d{1,2})(?::(\d{2}))?\s*(AM|PM)$").ok())
        .as_ref()
}

fn twenty_four_hour() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(\d{1,2})(?::(\d{2}))?$").ok())
        .as_ref()
}

/// Parses `"3:20 PM"`, `"11am"`, `"15:20"` or `"7"` into minutes of the day.
///
/// Returns `None` for anything else; callers fall back to the live clock.
pub fn parse_time_override(text: &str) -> Option<u32> {
    let normalized = text.trim().to_uppercase();
    if normalized.is_empty() {
        return None;
    }

    if let Some(caps) = twelve_hour().and_then(|re| re.captures(&normalized)) {
        let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
        let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
        if !(1..=12).contains(&hour) || minute >= 60 {
            return None;
        }
        let base = hour % 12;
        let hour = if &caps[3] == "PM" { base + 12 } else { base };
        return Some(hour * 60 + minute);
    }

    let caps = twenty_four_hour().and_then(|re| re.captures(&normalized))?;
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
    if hour >= 24 || minute >= 60 {
        return None;
    }
    Some(hour * 60 + minute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    #[test_case(540 => 1 ; "anchor minute")]
    #[test_case(600 => 1 ; "inside first slot")]
    #[test_case(620 => 2 ; "second slot boundary")]
    #[test_case(1350 => 11 ; "evening slot")]
    #[test_case(539 => 18 ; "minute before anchor")]
    #[test_case(0 => 12 ; "midnight")]
    fn maps_minutes_to_slots(minutes: u32) -> u8 {
        DayAnchor::standard().map_to_slot(minutes)
    }

    #[test]
    fn slot_mapping_is_a_step_function_within_a_day() {
        let anchor = DayAnchor::standard();
        let mut previous = 0;
        for relative in 0..MINUTES_PER_DAY {
            let minutes = (anchor.start_minute() + relative) % MINUTES_PER_DAY;
            let slot = anchor.map_to_slot(minutes);
            assert!((1..=SLOT_COUNT).contains(&slot));
            assert!(slot >= previous);
            previous = slot;
        }
        assert_eq!(previous, SLOT_COUNT);
    }

    #[test]
    fn reference_minutes_apply_offset_and_wrap() {
        let anchor = DayAnchor::standard();
        let late = Utc.with_ymd_and_hms(2024, 5, 1, 23, 30, 0).unwrap();
        assert_eq!(anchor.to_reference_minutes(late), 30);
        let morning = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        assert_eq!(anchor.to_reference_minutes(morning), 540);
    }

    #[test]
    fn day_key_rolls_over_at_anchor_hour() {
        let anchor = DayAnchor::standard();
        let before = Utc.with_ymd_and_hms(2024, 5, 2, 7, 59, 59).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap();

        assert_eq!(anchor.day_key(before).to_string(), "2024-05-01");
        assert_eq!(anchor.day_key(at).to_string(), "2024-05-02");
        assert_eq!(anchor.day_key(at), anchor.day_key(at));
    }

    #[test]
    fn day_key_changes_once_per_day() {
        let anchor = DayAnchor::standard();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let mut changes = 0;
        let mut current = anchor.day_key(start);
        for step in 1..=(24 * 60) {
            let key = anchor.day_key(start + Duration::minutes(step));
            if key != current {
                changes += 1;
                assert!(key > current);
                current = key;
            }
        }
        assert_eq!(changes, 1);
    }

    #[test]
    fn countdown_to_next_slot() {
        let anchor = DayAnchor::standard();
        assert_eq!(anchor.minutes_until_next_slot(540), 80);
        assert_eq!(anchor.minutes_until_next_slot(600), 20);
        assert_eq!(format_countdown(80), "1h 20m");
        assert_eq!(format_countdown(20), "20m");
    }

    #[test]
    fn slot_start_minutes_wrap_past_midnight() {
        let anchor = DayAnchor::standard();
        assert_eq!(anchor.slot_start_minute(1), 540);
        assert_eq!(anchor.slot_start_minute(15), 1660 % MINUTES_PER_DAY);
    }

    #[test_case("3:20 PM" => Some(920))]
    #[test_case("11am" => Some(660))]
    #[test_case("12:05 am" => Some(5))]
    #[test_case("15:20" => Some(920))]
    #[test_case("7" => Some(420))]
    #[test_case("24:00" => None)]
    #[test_case("13 PM" => None)]
    #[test_case("noonish" => None)]
    #[test_case("" => None)]
    fn parses_overrides(text: &str) -> Option<u32> {
        parse_time_override(text)
    }

    #[test]
    fn bad_override_falls_back_to_live_clock() {
        let anchor = DayAnchor::standard();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(anchor.effective_minutes(now, Some("garbage")), 780);
        assert_eq!(anchor.effective_minutes(now, Some("10:00")), 600);
        assert_eq!(anchor.effective_minutes(now, None), 780);
    }
}
