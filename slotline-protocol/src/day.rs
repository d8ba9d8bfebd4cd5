use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const DAY_KEY_FORMAT: &str = "%Y-%m-%d";

/// Calendar date identifying one business day (`YYYY-MM-DD`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    pub fn previous(&self) -> Self {
        Self(self.0 - Duration::days(1))
    }

    /// Compact form used by calendar exports (`YYYYMMDD`).
    pub fn compact(&self) -> String {
        self.0.format("%Y%m%d").to_string()
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_KEY_FORMAT))
    }
}

impl FromStr for DayKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), DAY_KEY_FORMAT).map(Self)
    }
}

impl Serialize for DayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DayKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn keys_order_by_date_and_work_as_map_keys() {
        let a = DayKey::from_ymd(2024, 12, 31).unwrap();
        let b: DayKey = "2025-01-01".parse().unwrap();
        assert!(a < b);
        assert_eq!(b.previous(), a);
        assert_eq!(b.compact(), "20250101");

        let mut map = BTreeMap::new();
        map.insert(b, 2);
        map.insert(a, 1);
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"2024-12-31":1,"2025-01-01":2}"#);
        let back: BTreeMap<DayKey, i32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!("2024-13-01".parse::<DayKey>().is_err());
        assert!(serde_json::from_str::<DayKey>("\"yesterday\"").is_err());
    }
}
