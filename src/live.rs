//! Live polling: instruments with per-period bar series, driven by a
//! reconciliation collaborator.
//!
//! Each `step()` asks the collaborator for a verdict per (symbol, period):
//! nothing new, a freshly opened bar, or a revision of the open bar. The
//! collaborator owns reconciliation against its provider; the feed owns
//! routing and the append/revise protocol check.

use std::collections::BTreeMap;

use crate::bar::{Bar, Period};
use crate::bar_series::BarSeries;
use crate::config::Config;
use crate::error::FeedError;
use crate::logging::{self, log_bar, log_no_data};

/// Live reconciliation collaborator, called once per (symbol, period) per
/// `step()`.
///
/// Returns `(None, _)` when nothing changed since the last poll,
/// `(Some(bar), false)` when a new period opened, and `(Some(bar), true)`
/// when the still-open bar was revised by a quote tick.
pub trait QuoteSource {
    fn next_bar(&mut self, symbol: &str, period: Period) -> anyhow::Result<(Option<Bar>, bool)>;
}

/// One tracked symbol: a bar series per analysis period.
///
/// The period set is fixed at construction; bars route by their `period`
/// field.
pub struct Instrument {
    symbol: String,
    periods: Vec<Period>,
    series: BTreeMap<Period, BarSeries>,
    last_price: Option<f64>,
}

impl Instrument {
    pub fn new(symbol: &str, periods: &[Period], capacity: usize) -> Self {
        let series = periods
            .iter()
            .map(|&period| {
                let name = format!("{symbol}@{period}");
                (period, BarSeries::new(&name, capacity))
            })
            .collect();
        Self {
            symbol: symbol.to_string(),
            periods: periods.to_vec(),
            series,
            last_price: None,
        }
    }

    pub fn from_config(symbol: &str, cfg: &Config) -> Self {
        Self::new(symbol, &cfg.periods, cfg.capacity)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    /// Close of the most recent bar seen on any period.
    pub fn last_price(&self) -> Option<f64> {
        self.last_price
    }

    pub fn series(&self, period: Period) -> Option<&BarSeries> {
        self.series.get(&period)
    }

    pub fn series_mut(&mut self, period: Period) -> Option<&mut BarSeries> {
        self.series.get_mut(&period)
    }

    pub fn append(&mut self, bar: Bar) -> Result<(), FeedError> {
        self.last_price = Some(bar.close);
        self.period_series(bar.period)?.append(bar)?;
        Ok(())
    }

    pub fn revise(&mut self, bar: Bar) -> Result<(), FeedError> {
        self.last_price = Some(bar.close);
        self.period_series(bar.period)?.revise(bar)?;
        Ok(())
    }

    fn period_series(&mut self, period: Period) -> Result<&mut BarSeries, FeedError> {
        let symbol = self.symbol.clone();
        self.series
            .get_mut(&period)
            .ok_or(FeedError::UnregisteredPeriod { symbol, period })
    }

    /// Commits every open bar across all periods.
    pub fn finalize(&mut self) {
        for series in self.series.values_mut() {
            series.finalize();
        }
    }
}

pub type BarHandler = Box<dyn FnMut(&str, &Bar, bool)>;

pub struct LiveFeed<S: QuoteSource> {
    source: S,
    instruments: BTreeMap<String, Instrument>,
    handlers: Vec<BarHandler>,
}

impl<S: QuoteSource> LiveFeed<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            instruments: BTreeMap::new(),
            handlers: Vec::new(),
        }
    }

    /// Instruments must be added before stepping; the tracked set does not
    /// change while the feed runs.
    pub fn add_instrument(&mut self, instrument: Instrument) {
        self.instruments
            .insert(instrument.symbol().to_string(), instrument);
    }

    pub fn instrument(&self, symbol: &str) -> Option<&Instrument> {
        self.instruments.get(symbol)
    }

    pub fn instrument_mut(&mut self, symbol: &str) -> Option<&mut Instrument> {
        self.instruments.get_mut(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.instruments.keys().map(String::as_str)
    }

    /// Handler receives `(symbol, bar, is_revision)` after each applied bar.
    pub fn on_bar(&mut self, handler: impl FnMut(&str, &Bar, bool) + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Polls every (symbol, period) pair once. Returns whether any bar was
    /// applied.
    ///
    /// Protocol check: a bar at the open point's timestamp with different
    /// content but no revision flag is a collaborator bug and fails with
    /// `InconsistentRevision`; an identical bar is treated as "no change".
    pub fn step(&mut self) -> Result<bool, FeedError> {
        let mut dispatched = false;
        for (symbol, instrument) in self.instruments.iter_mut() {
            for period in instrument.periods().to_vec() {
                let (bar, is_revision) = self.source.next_bar(symbol, period)?;
                let Some(bar) = bar else {
                    log_no_data(symbol, period);
                    continue;
                };
                if is_revision {
                    instrument.revise(bar.clone())?;
                } else {
                    let open = instrument
                        .series(period)
                        .and_then(|s| s.bars().open_point());
                    if let Some(open) = open {
                        if open.ts == bar.ts {
                            if open.value == bar {
                                continue;
                            }
                            return Err(FeedError::InconsistentRevision {
                                symbol: symbol.clone(),
                                period,
                                ts: bar.ts,
                            });
                        }
                    }
                    instrument.append(bar.clone())?;
                }
                log_bar(symbol, &bar, is_revision);
                for handler in self.handlers.iter_mut() {
                    handler(symbol, &bar, is_revision);
                }
                dispatched = true;
            }
        }
        Ok(dispatched)
    }

    /// Commits every open bar so the last live period is not lost when the
    /// caller stops stepping.
    pub fn finalize(&mut self) {
        for instrument in self.instruments.values_mut() {
            instrument.finalize();
        }
        logging::log_finalize("live_feed", self.instruments.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::ScriptedQuotes;

    fn bar(ts: i64, period: Period, close: f64) -> Bar {
        Bar::new(ts, period, close, close + 1.0, close - 1.0, close, 100.0)
            .expect("valid test bar")
    }

    fn single_period_feed(script: ScriptedQuotes) -> LiveFeed<ScriptedQuotes> {
        let mut feed = LiveFeed::new(script);
        feed.add_instrument(Instrument::new("BTCUSDT", &[Period::FiveMinute], 16));
        feed
    }

    #[test]
    fn no_verdict_means_no_mutation() {
        let mut script = ScriptedQuotes::new();
        script.push("BTCUSDT", Period::FiveMinute, None, false);
        let mut feed = single_period_feed(script);

        assert!(!feed.step().unwrap());
        let series = feed.instrument("BTCUSDT").unwrap().series(Period::FiveMinute).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn append_then_revisions_then_next_period() {
        let mut script = ScriptedQuotes::new();
        let p = Period::FiveMinute;
        script.push("BTCUSDT", p, Some(bar(300, p, 100.0)), false);
        script.push("BTCUSDT", p, Some(bar(300, p, 101.0)), true);
        script.push("BTCUSDT", p, Some(bar(300, p, 102.0)), true);
        script.push("BTCUSDT", p, Some(bar(600, p, 103.0)), false);
        let mut feed = single_period_feed(script);

        for _ in 0..4 {
            assert!(feed.step().unwrap());
        }
        let inst = feed.instrument("BTCUSDT").unwrap();
        let bars = inst.series(p).unwrap().bars();
        // 300 committed by the 600 append; 600 still open.
        assert_eq!(bars.len(), 1);
        assert_eq!(bars.get(-1).map(|b| b.close).unwrap(), 102.0);
        assert_eq!(bars.open_point().map(|p| p.value.close), Some(103.0));
        assert_eq!(inst.last_price(), Some(103.0));
    }

    #[test]
    fn unflagged_same_timestamp_change_is_inconsistent() {
        let mut script = ScriptedQuotes::new();
        let p = Period::FiveMinute;
        script.push("BTCUSDT", p, Some(bar(300, p, 100.0)), false);
        script.push("BTCUSDT", p, Some(bar(300, p, 105.0)), false);
        let mut feed = single_period_feed(script);

        assert!(feed.step().unwrap());
        let err = feed.step().unwrap_err();
        assert!(matches!(
            err,
            FeedError::InconsistentRevision { ts: 300, .. }
        ));
        // The open bar is untouched.
        let series = feed.instrument("BTCUSDT").unwrap().series(p).unwrap();
        assert_eq!(series.bars().open_point().map(|p| p.value.close), Some(100.0));
    }

    #[test]
    fn unflagged_identical_bar_is_a_noop() {
        let mut script = ScriptedQuotes::new();
        let p = Period::FiveMinute;
        script.push("BTCUSDT", p, Some(bar(300, p, 100.0)), false);
        script.push("BTCUSDT", p, Some(bar(300, p, 100.0)), false);
        let mut feed = single_period_feed(script);

        assert!(feed.step().unwrap());
        assert!(!feed.step().unwrap());
    }

    #[test]
    fn bars_route_by_period() {
        let mut script = ScriptedQuotes::new();
        script.push("BTCUSDT", Period::FiveMinute, Some(bar(300, Period::FiveMinute, 100.0)), false);
        script.push("BTCUSDT", Period::Hour, Some(bar(0, Period::Hour, 99.0)), false);
        let mut feed = LiveFeed::new(script);
        feed.add_instrument(Instrument::new(
            "BTCUSDT",
            &[Period::FiveMinute, Period::Hour],
            16,
        ));

        assert!(feed.step().unwrap());
        let inst = feed.instrument("BTCUSDT").unwrap();
        let m5 = inst.series(Period::FiveMinute).unwrap().bars();
        let h1 = inst.series(Period::Hour).unwrap().bars();
        assert_eq!(m5.open_point().map(|p| p.ts), Some(300));
        assert_eq!(h1.open_point().map(|p| p.ts), Some(0));
    }

    #[test]
    fn bar_for_untracked_period_is_rejected() {
        let mut inst = Instrument::new("BTCUSDT", &[Period::FiveMinute], 16);
        let err = inst.append(bar(0, Period::Hour, 100.0)).unwrap_err();
        assert!(matches!(err, FeedError::UnregisteredPeriod { period: Period::Hour, .. }));
    }

    #[test]
    fn on_bar_handlers_see_applied_bars_only() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let mut script = ScriptedQuotes::new();
        let p = Period::FiveMinute;
        script.push("BTCUSDT", p, None, false);
        script.push("BTCUSDT", p, Some(bar(300, p, 100.0)), false);
        script.push("BTCUSDT", p, Some(bar(300, p, 101.0)), true);
        let mut feed = single_period_feed(script);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        feed.on_bar(move |symbol, bar, revision| {
            sink.borrow_mut().push((symbol.to_string(), bar.close, revision));
        });

        feed.step().unwrap();
        feed.step().unwrap();
        feed.step().unwrap();
        assert_eq!(
            seen.borrow().as_slice(),
            &[
                ("BTCUSDT".to_string(), 100.0, false),
                ("BTCUSDT".to_string(), 101.0, true),
            ]
        );
    }

    #[test]
    fn finalize_commits_open_bars() {
        let mut script = ScriptedQuotes::new();
        let p = Period::FiveMinute;
        script.push("BTCUSDT", p, Some(bar(300, p, 100.0)), false);
        let mut feed = single_period_feed(script);
        feed.step().unwrap();
        feed.finalize();

        let series = feed.instrument("BTCUSDT").unwrap().series(p).unwrap();
        assert_eq!(series.len(), 1);
        assert!(series.bars().open_point().is_none());
    }
}
