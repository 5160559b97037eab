//! Env-driven configuration.

use chrono::Utc;
use serde::Serialize;

use crate::bar::Period;
use crate::timeline::Timestamp;

/// Default bounded length for every series.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Bounded length for every series the feeds create.
    pub capacity: usize,
    /// Symbols a live feed should track.
    pub symbols: Vec<String>,
    /// Analysis periods per instrument.
    pub periods: Vec<Period>,
}

impl Config {
    pub fn from_env() -> Self {
        let capacity = std::env::var("SERIES_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&c| c > 0)
            .unwrap_or(DEFAULT_CAPACITY);
        let symbols = std::env::var("SYMBOLS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let periods = std::env::var("PERIODS")
            .map(|v| {
                v.split(',')
                    .filter_map(|s| Period::parse(s).ok())
                    .collect::<Vec<_>>()
            })
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(default_periods);
        Self {
            capacity,
            symbols,
            periods,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            symbols: Vec::new(),
            periods: default_periods(),
        }
    }
}

fn default_periods() -> Vec<Period> {
    vec![
        Period::FiveMinute,
        Period::FifteenMinute,
        Period::ThirtyMinute,
        Period::Hour,
        Period::Day,
    ]
}

pub fn now_ts() -> Timestamp {
    Utc::now().timestamp()
}
