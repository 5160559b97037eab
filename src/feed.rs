//! Keyed feed: drives per-key series from a pull-based tick source.
//!
//! One `step()` pulls one timestep from the collaborator, applies it to
//! every key's series (created lazily on first sight), then emits a single
//! aggregate event. The feed never retries; gap-filling and backoff belong
//! to the source.

use std::collections::BTreeMap;

use crate::config::Config;
use crate::error::FeedError;
use crate::logging::{self, log_step};
use crate::series::Series;
use crate::timeline::Timestamp;

/// Pull-based tick collaborator. Called once per `step()`.
pub trait TickSource {
    type Value;

    /// One timestep of keyed values, or `None` when nothing is available.
    fn next_values(
        &mut self,
    ) -> anyhow::Result<Option<(Timestamp, BTreeMap<String, Self::Value>)>>;
}

pub type StepHandler<V> = Box<dyn FnMut(Timestamp, &BTreeMap<String, V>)>;

pub struct Feed<S: TickSource> {
    capacity: usize,
    source: S,
    series: BTreeMap<String, Series<S::Value>>,
    handlers: Vec<StepHandler<S::Value>>,
}

impl<S: TickSource> Feed<S>
where
    S::Value: Clone + 'static,
{
    pub fn new(source: S, capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self {
            capacity,
            source,
            series: BTreeMap::new(),
            handlers: Vec::new(),
        }
    }

    pub fn from_config(source: S, cfg: &Config) -> Self {
        Self::new(source, cfg.capacity)
    }

    /// Creates the series for `key` ahead of the first tick mentioning it.
    pub fn register(&mut self, key: &str) {
        if !self.series.contains_key(key) {
            self.series
                .insert(key.to_string(), Series::new(key, self.capacity));
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.series.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn series(&self, key: &str) -> Option<&Series<S::Value>> {
        self.series.get(key)
    }

    /// Mutable access, e.g. for attaching derived filters to a key.
    pub fn series_mut(&mut self, key: &str) -> Option<&mut Series<S::Value>> {
        self.series.get_mut(key)
    }

    /// Registers a handler for the aggregate per-step event.
    pub fn on_step(&mut self, handler: impl FnMut(Timestamp, &BTreeMap<String, S::Value>) + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Pulls and applies one timestep. Returns whether data was produced;
    /// `Ok(false)` means the source had nothing and nothing was emitted.
    pub fn step(&mut self) -> Result<bool, FeedError> {
        let Some((ts, values)) = self.source.next_values()? else {
            return Ok(false);
        };
        for (key, value) in &values {
            let series = self
                .series
                .entry(key.clone())
                .or_insert_with(|| Series::new(key, self.capacity));
            series.append(ts, value.clone())?;
        }
        for handler in self.handlers.iter_mut() {
            handler(ts, &values);
        }
        log_step(ts, values.len());
        Ok(true)
    }

    /// Steps until the source runs dry, then finalizes every series so the
    /// last open point is not lost. Returns the number of applied steps.
    pub fn drain(&mut self) -> Result<usize, FeedError> {
        let mut steps = 0;
        while self.step()? {
            steps += 1;
        }
        self.finalize();
        Ok(steps)
    }

    /// Commits every series' open point.
    pub fn finalize(&mut self) {
        let mut committed = 0;
        for series in self.series.values_mut() {
            if series.finalize() {
                committed += 1;
            }
        }
        logging::log_finalize("feed", committed);
    }

    /// Drops all data but keeps registered keys (with fresh series).
    pub fn reset(&mut self) {
        let keys: Vec<String> = self.series.keys().cloned().collect();
        self.series.clear();
        for key in keys {
            self.series
                .insert(key.clone(), Series::new(&key, self.capacity));
        }
    }
}
