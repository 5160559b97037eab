//! In-memory collaborators: replay and synthetic sources.
//!
//! `VecSource` has the shape a historical loader produces (ordered rows,
//! already reconciled). `ScriptedQuotes` and `RandomWalkBars` exist for
//! tests and soak runs; real providers live outside this crate.

use std::collections::{BTreeMap, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bar::{Bar, Period};
use crate::feed::TickSource;
use crate::live::QuoteSource;
use crate::timeline::Timestamp;

/// Replays pre-built rows in order, then reports exhaustion.
pub struct VecSource<V> {
    rows: VecDeque<(Timestamp, BTreeMap<String, V>)>,
}

impl<V> VecSource<V> {
    pub fn new(rows: Vec<(Timestamp, BTreeMap<String, V>)>) -> Self {
        Self {
            rows: rows.into(),
        }
    }

    /// Convenience for single-key replays.
    pub fn single_key(key: &str, rows: Vec<(Timestamp, V)>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|(ts, value)| {
                    let mut values = BTreeMap::new();
                    values.insert(key.to_string(), value);
                    (ts, values)
                })
                .collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl<V> TickSource for VecSource<V> {
    type Value = V;

    fn next_values(
        &mut self,
    ) -> anyhow::Result<Option<(Timestamp, BTreeMap<String, V>)>> {
        Ok(self.rows.pop_front())
    }
}

/// Scripted reconciliation verdicts per (symbol, period), consumed in push
/// order. An empty queue answers "no change".
#[derive(Default)]
pub struct ScriptedQuotes {
    script: BTreeMap<(String, Period), VecDeque<(Option<Bar>, bool)>>,
}

impl ScriptedQuotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, symbol: &str, period: Period, bar: Option<Bar>, is_revision: bool) {
        self.script
            .entry((symbol.to_string(), period))
            .or_default()
            .push_back((bar, is_revision));
    }
}

impl QuoteSource for ScriptedQuotes {
    fn next_bar(&mut self, symbol: &str, period: Period) -> anyhow::Result<(Option<Bar>, bool)> {
        let verdict = self
            .script
            .get_mut(&(symbol.to_string(), period))
            .and_then(|queue| queue.pop_front())
            .unwrap_or((None, false));
        Ok(verdict)
    }
}

/// Seeded random-walk bar generator: `count` bars for one symbol at one
/// period, each opening at the previous close.
pub struct RandomWalkBars {
    rng: StdRng,
    symbol: String,
    period: Period,
    price: f64,
    next_ts: Timestamp,
    remaining: usize,
}

impl RandomWalkBars {
    pub fn new(seed: u64, symbol: &str, period: Period, start_price: f64, count: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            symbol: symbol.to_string(),
            period,
            price: start_price,
            next_ts: period.secs(),
            remaining: count,
        }
    }
}

impl TickSource for RandomWalkBars {
    type Value = Bar;

    fn next_values(
        &mut self,
    ) -> anyhow::Result<Option<(Timestamp, BTreeMap<String, Bar>)>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;

        let open = self.price;
        let close = open * (1.0 + self.rng.gen_range(-0.01..0.01));
        let high = open.max(close) * (1.0 + self.rng.gen_range(0.0..0.002));
        let low = open.min(close) * (1.0 - self.rng.gen_range(0.0..0.002));
        let volume = self.rng.gen_range(1.0..1000.0);
        let ts = self.next_ts;

        self.price = close;
        self.next_ts += self.period.secs();

        let bar = Bar::new(ts, self.period, open, high, low, close, volume)?;
        let mut values = BTreeMap::new();
        values.insert(self.symbol.clone(), bar);
        Ok(Some((ts, values)))
    }
}
