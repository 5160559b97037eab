//! OHLCV bars and analysis periods.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::InvalidBar;
use crate::timeline::Timestamp;

/// Fixed bar period. A bar carries its period so feeds can route it to the
/// right series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Second,
    Minute,
    FiveMinute,
    FifteenMinute,
    ThirtyMinute,
    Hour,
    Day,
    Week,
}

impl Period {
    pub fn secs(self) -> i64 {
        match self {
            Period::Second => 1,
            Period::Minute => 60,
            Period::FiveMinute => 5 * 60,
            Period::FifteenMinute => 15 * 60,
            Period::ThirtyMinute => 30 * 60,
            Period::Hour => 60 * 60,
            Period::Day => 24 * 60 * 60,
            Period::Week => 7 * 24 * 60 * 60,
        }
    }

    /// Floors `ts` to the start of its period.
    pub fn align(self, ts: Timestamp) -> Timestamp {
        ts - ts.rem_euclid(self.secs())
    }

    /// Seconds until the next period boundary after `now`.
    pub fn until_next(self, now: Timestamp) -> i64 {
        let next = (now.div_euclid(self.secs()) + 1) * self.secs();
        next - now
    }

    pub fn parse(s: &str) -> Result<Self, &'static str> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1s" => Ok(Period::Second),
            "1m" => Ok(Period::Minute),
            "5m" => Ok(Period::FiveMinute),
            "15m" => Ok(Period::FifteenMinute),
            "30m" => Ok(Period::ThirtyMinute),
            "1h" => Ok(Period::Hour),
            "1d" => Ok(Period::Day),
            "1w" => Ok(Period::Week),
            _ => Err("unsupported period (use 1s/1m/5m/15m/30m/1h/1d/1w)"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Period::Second => "1s",
            Period::Minute => "1m",
            Period::FiveMinute => "5m",
            Period::FifteenMinute => "15m",
            Period::ThirtyMinute => "30m",
            Period::Hour => "1h",
            Period::Day => "1d",
            Period::Week => "1w",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One OHLCV aggregate over a fixed period.
///
/// `extra` holds ad-hoc named fields (turnover, open interest, ...) a
/// provider may attach; composite series fan them into child series lazily.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub ts: Timestamp,
    pub period: Period,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adj_close: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, f64>,
}

impl Bar {
    pub fn new(
        ts: Timestamp,
        period: Period,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, InvalidBar> {
        let reason = if high < low {
            Some("high < low")
        } else if high < open {
            Some("high < open")
        } else if high < close {
            Some("high < close")
        } else if low > open {
            Some("low > open")
        } else if low > close {
            Some("low > close")
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(InvalidBar { ts, reason });
        }
        Ok(Self {
            ts,
            period,
            open,
            high,
            low,
            close,
            volume,
            adj_close: None,
            extra: BTreeMap::new(),
        })
    }

    pub fn with_adj_close(mut self, adj_close: f64) -> Self {
        self.adj_close = Some(adj_close);
        self
    }

    pub fn with_extra(mut self, name: &str, value: f64) -> Self {
        self.extra.insert(name.to_string(), value);
        self
    }

    /// Close price, or adjusted close when requested and present.
    pub fn price(&self, use_adjusted: bool) -> f64 {
        if use_adjusted {
            self.adj_close.unwrap_or(self.close)
        } else {
            self.close
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inconsistent_ohlc() {
        assert!(Bar::new(1, Period::Hour, 10.0, 9.0, 8.0, 9.5, 1.0).is_err());
        let err = Bar::new(1, Period::Hour, 10.0, 12.0, 11.0, 11.5, 1.0).unwrap_err();
        assert_eq!(err.reason, "low > open");
        assert!(Bar::new(1, Period::Hour, 10.0, 12.0, 9.0, 11.0, 1.0).is_ok());
    }

    #[test]
    fn period_alignment() {
        assert_eq!(Period::FiveMinute.align(301), 300);
        assert_eq!(Period::FiveMinute.align(300), 300);
        assert_eq!(Period::Hour.until_next(3599), 1);
        assert_eq!(Period::Hour.until_next(3600), 3600);
    }

    #[test]
    fn period_parse_round_trips() {
        for p in [
            Period::Second,
            Period::Minute,
            Period::FiveMinute,
            Period::FifteenMinute,
            Period::ThirtyMinute,
            Period::Hour,
            Period::Day,
            Period::Week,
        ] {
            assert_eq!(Period::parse(p.as_str()).unwrap(), p);
        }
        assert!(Period::parse("3m").is_err());
    }

    #[test]
    fn price_prefers_adjusted_when_asked() {
        let bar = Bar::new(1, Period::Day, 10.0, 11.0, 9.0, 10.5, 100.0)
            .unwrap()
            .with_adj_close(10.2);
        assert_eq!(bar.price(false), 10.5);
        assert_eq!(bar.price(true), 10.2);

        let plain = Bar::new(1, Period::Day, 10.0, 11.0, 9.0, 10.5, 100.0).unwrap();
        assert_eq!(plain.price(true), 10.5);
    }
}
