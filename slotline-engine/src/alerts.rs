use serde::Serialize;
use slotline_protocol::prelude::Settings;

use crate::clock::{DayAnchor, MINUTES_PER_DAY};

/// Lead time of the warning raised before an alarmed slot starts.
pub const PRE_ALERT_MINUTES: u32 = 20;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum AlertKind {
    PreStart,
    Start,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct SlotAlert {
    pub slot: u8,
    pub kind: AlertKind,
    /// Reference minute the alert is scheduled for.
    pub minute: u32,
}

/// Alerts scheduled exactly at `minute`.
pub fn due_at(anchor: &DayAnchor, minute: u32, settings: &Settings) -> Vec<SlotAlert> {
    let mut alerts = Vec::new();
    for &slot in &settings.enabled_alarms {
        let start = anchor.slot_start_minute(slot);
        let warning = (start + MINUTES_PER_DAY - PRE_ALERT_MINUTES) % MINUTES_PER_DAY;
        if minute == warning {
            alerts.push(SlotAlert {
                slot,
                kind: AlertKind::PreStart,
                minute,
            });
        }
        if settings.notifications && minute == start {
            alerts.push(SlotAlert {
                slot,
                kind: AlertKind::Start,
                minute,
            });
        }
    }
    alerts
}

/// Alerts scheduled in `(previous, current]`, wrapping past midnight.
///
/// With no previous tick only `current` itself is checked.
pub fn due_between(
    anchor: &DayAnchor,
    previous: Option<u32>,
    current: u32,
    settings: &Settings,
) -> Vec<SlotAlert> {
    let current = current % MINUTES_PER_DAY;
    let Some(previous) = previous else {
        return due_at(anchor, current, settings);
    };
    let span = (current + MINUTES_PER_DAY - previous % MINUTES_PER_DAY) % MINUTES_PER_DAY;
    (1..=span)
        .map(|step| (previous + step) % MINUTES_PER_DAY)
        .flat_map(|minute| due_at(anchor, minute, settings))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_alarms_warn_before_prime_slots() {
        let anchor = DayAnchor::standard();
        let settings = Settings::default();
        // slot 15 starts at 03:40 reference time
        let alerts = due_at(&anchor, 200, &settings);
        assert_eq!(
            alerts,
            vec![SlotAlert {
                slot: 15,
                kind: AlertKind::PreStart,
                minute: 200
            }]
        );
        assert!(due_at(&anchor, 220, &settings).is_empty());
    }

    #[test]
    fn start_alerts_need_notifications() {
        let anchor = DayAnchor::standard();
        let settings = Settings {
            notifications: true,
            ..Settings::default()
        };
        let alerts = due_at(&anchor, 220, &settings);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Start);
    }

    #[test]
    fn coarse_ticks_do_not_skip_alerts() {
        let anchor = DayAnchor::standard();
        let settings = Settings::default();
        let alerts = due_between(&anchor, Some(150), 290, &settings);
        let slots: Vec<u8> = alerts.iter().map(|alert| alert.slot).collect();
        assert_eq!(slots, vec![15, 16]);
    }

    #[test]
    fn range_wraps_past_midnight() {
        let anchor = DayAnchor::standard();
        let settings = Settings {
            enabled_alarms: [13].into_iter().collect(),
            ..Settings::default()
        };
        // slot 13 starts at 01:00, warning at 00:40
        let alerts = due_between(&anchor, Some(1430), 50, &settings);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].minute, 40);
        assert!(due_between(&anchor, Some(50), 50, &settings).is_empty());
    }
}
