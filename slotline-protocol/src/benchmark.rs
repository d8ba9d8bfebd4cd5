use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a (projected or final) day total.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Benchmark {
    #[serde(rename = "Bad Day")]
    BadDay,
    #[serde(rename = "Standard")]
    Standard,
    #[serde(rename = "Good Day")]
    GoodDay,
    #[serde(rename = "Strong Day")]
    StrongDay,
    #[serde(rename = "Exceptional")]
    Exceptional,
}

/// A half-open `[min, max)` range; `max == None` is unbounded above.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    pub min: f64,
    pub max: Option<f64>,
    pub benchmark: Benchmark,
}

impl Threshold {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && self.max.map_or(true, |max| value < max)
    }
}

/// Contiguous, exhaustive threshold table ordered by `min`.
pub const THRESHOLDS: [Threshold; 5] = [
    Threshold {
        min: 0.0,
        max: Some(15.0),
        benchmark: Benchmark::BadDay,
    },
    Threshold {
        min: 15.0,
        max: Some(35.0),
        benchmark: Benchmark::Standard,
    },
    Threshold {
        min: 35.0,
        max: Some(50.0),
        benchmark: Benchmark::GoodDay,
    },
    Threshold {
        min: 50.0,
        max: Some(75.0),
        benchmark: Benchmark::StrongDay,
    },
    Threshold {
        min: 75.0,
        max: None,
        benchmark: Benchmark::Exceptional,
    },
];

impl Benchmark {
    /// First threshold containing `value`; values below the table fall back to the first entry.
    pub fn classify(value: f64) -> Benchmark {
        THRESHOLDS
            .iter()
            .find(|threshold| threshold.contains(value))
            .map(|threshold| threshold.benchmark)
            .unwrap_or(THRESHOLDS[0].benchmark)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Benchmark::BadDay => "Bad Day",
            Benchmark::Standard => "Standard",
            Benchmark::GoodDay => "Good Day",
            Benchmark::StrongDay => "Strong Day",
            Benchmark::Exceptional => "Exceptional",
        }
    }
}

impl fmt::Display for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_are_half_open() {
        assert_eq!(Benchmark::classify(0.0), Benchmark::BadDay);
        assert_eq!(Benchmark::classify(14.99), Benchmark::BadDay);
        assert_eq!(Benchmark::classify(15.0), Benchmark::Standard);
        assert_eq!(Benchmark::classify(35.0), Benchmark::GoodDay);
        assert_eq!(Benchmark::classify(74.9), Benchmark::StrongDay);
        assert_eq!(Benchmark::classify(75.0), Benchmark::Exceptional);
        assert_eq!(Benchmark::classify(1e9), Benchmark::Exceptional);
    }

    #[test]
    fn out_of_table_values_use_first_entry() {
        assert_eq!(Benchmark::classify(-3.0), Benchmark::BadDay);
        assert_eq!(Benchmark::classify(f64::NAN), Benchmark::BadDay);
    }

    #[test]
    fn serializes_as_label() {
        let json = serde_json::to_string(&Benchmark::GoodDay).unwrap();
        assert_eq!(json, "\"Good Day\"");
    }
}
