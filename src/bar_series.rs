//! Composite bar series: one parent `Series<Bar>` fanned into per-field
//! `f64` children kept in lockstep.
//!
//! Children are appended/revised in a fixed order: open, high, low, close,
//! volume, adjusted close, then extra fields by name. A missing adjusted
//! close is stored as NaN so children never fall out of step with the
//! parent. The parent is mutated first; if it rejects the operation no
//! child is touched.

use std::collections::BTreeMap;

use crate::bar::Bar;
use crate::error::TimelineError;
use crate::series::Series;
use crate::timeline::Timestamp;

pub struct BarSeries {
    bars: Series<Bar>,
    open: Series<f64>,
    high: Series<f64>,
    low: Series<f64>,
    close: Series<f64>,
    volume: Series<f64>,
    adj_close: Series<f64>,
    extra: BTreeMap<String, Series<f64>>,
    use_adjusted: bool,
    capacity: usize,
}

impl BarSeries {
    pub fn new(name: &str, capacity: usize) -> Self {
        let child = |field: &str| Series::new(&format!("{name}.{field}"), capacity);
        Self {
            bars: Series::new(name, capacity),
            open: child("open"),
            high: child("high"),
            low: child("low"),
            close: child("close"),
            volume: child("volume"),
            adj_close: child("adj_close"),
            extra: BTreeMap::new(),
            use_adjusted: false,
            capacity,
        }
    }

    pub fn name(&self) -> &str {
        self.bars.name()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// When set, `price_series` resolves to the adjusted-close child.
    pub fn set_use_adjusted(&mut self, use_adjusted: bool) {
        self.use_adjusted = use_adjusted;
    }

    pub fn append(&mut self, bar: Bar) -> Result<(), TimelineError> {
        let ts = bar.ts;
        let fields = ScalarFields::of(&bar);
        self.bars.append(ts, bar)?;
        self.fan_out(ts, fields, Op::Append)
    }

    pub fn revise(&mut self, bar: Bar) -> Result<(), TimelineError> {
        let ts = bar.ts;
        let fields = ScalarFields::of(&bar);
        self.bars.revise(ts, bar)?;
        self.fan_out(ts, fields, Op::Revise)
    }

    /// Commits every open point (parent and children).
    pub fn finalize(&mut self) {
        self.bars.finalize();
        self.open.finalize();
        self.high.finalize();
        self.low.finalize();
        self.close.finalize();
        self.volume.finalize();
        self.adj_close.finalize();
        for series in self.extra.values_mut() {
            series.finalize();
        }
    }

    fn fan_out(&mut self, ts: Timestamp, fields: ScalarFields, op: Op) -> Result<(), TimelineError> {
        let apply = |series: &mut Series<f64>, value: f64| match op {
            Op::Append => series.append(ts, value),
            Op::Revise => series.revise(ts, value),
        };
        apply(&mut self.open, fields.open)?;
        apply(&mut self.high, fields.high)?;
        apply(&mut self.low, fields.low)?;
        apply(&mut self.close, fields.close)?;
        apply(&mut self.volume, fields.volume)?;
        apply(&mut self.adj_close, fields.adj_close)?;
        for (name, value) in fields.extra {
            let capacity = self.capacity;
            let series = self
                .extra
                .entry(name.clone())
                .or_insert_with(|| Series::new(&format!("{}.{name}", self.bars.name()), capacity));
            // An intermittent field has no open point at this timestamp to
            // revise: its history simply resumes here.
            let open_ts = series.open_point().map(|p| p.ts);
            if matches!(op, Op::Revise) && open_ts != Some(ts) {
                series.append(ts, value)?;
            } else {
                apply(series, value)?;
            }
        }
        Ok(())
    }

    pub fn bars(&self) -> &Series<Bar> {
        &self.bars
    }

    pub fn bars_mut(&mut self) -> &mut Series<Bar> {
        &mut self.bars
    }

    pub fn open_series(&self) -> &Series<f64> {
        &self.open
    }

    pub fn open_series_mut(&mut self) -> &mut Series<f64> {
        &mut self.open
    }

    pub fn high_series(&self) -> &Series<f64> {
        &self.high
    }

    pub fn high_series_mut(&mut self) -> &mut Series<f64> {
        &mut self.high
    }

    pub fn low_series(&self) -> &Series<f64> {
        &self.low
    }

    pub fn low_series_mut(&mut self) -> &mut Series<f64> {
        &mut self.low
    }

    pub fn close_series(&self) -> &Series<f64> {
        &self.close
    }

    pub fn close_series_mut(&mut self) -> &mut Series<f64> {
        &mut self.close
    }

    pub fn volume_series(&self) -> &Series<f64> {
        &self.volume
    }

    pub fn volume_series_mut(&mut self) -> &mut Series<f64> {
        &mut self.volume
    }

    pub fn adj_close_series(&self) -> &Series<f64> {
        &self.adj_close
    }

    pub fn adj_close_series_mut(&mut self) -> &mut Series<f64> {
        &mut self.adj_close
    }

    /// Close or adjusted-close child, per `set_use_adjusted`.
    pub fn price_series(&self) -> &Series<f64> {
        if self.use_adjusted {
            &self.adj_close
        } else {
            &self.close
        }
    }

    pub fn price_series_mut(&mut self) -> &mut Series<f64> {
        if self.use_adjusted {
            &mut self.adj_close
        } else {
            &mut self.close
        }
    }

    /// Child for an extra field, if that field has been seen.
    pub fn extra_series(&self, name: &str) -> Option<&Series<f64>> {
        self.extra.get(name)
    }

    pub fn extra_series_mut(&mut self, name: &str) -> Option<&mut Series<f64>> {
        self.extra.get_mut(name)
    }

    pub fn extra_names(&self) -> impl Iterator<Item = &str> {
        self.extra.keys().map(String::as_str)
    }
}

#[derive(Clone, Copy)]
enum Op {
    Append,
    Revise,
}

struct ScalarFields {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    adj_close: f64,
    extra: BTreeMap<String, f64>,
}

impl ScalarFields {
    fn of(bar: &Bar) -> Self {
        Self {
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            adj_close: bar.adj_close.unwrap_or(f64::NAN),
            extra: bar.extra.clone(),
        }
    }
}
