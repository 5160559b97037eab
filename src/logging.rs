//! Structured logging for the series engine.
//!
//! JSON lines to stdout, env-gated by level (`LOG_LEVEL`) and domain
//! (`LOG_DOMAINS`, comma-separated or "all"). When `LOG_DIR` is set (or
//! `set_log_dir` is called) the same lines also land in
//! `<dir>/barflow.jsonl` for replay correlation.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use crate::bar::{Bar, Period};
use crate::timeline::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Series, // append/revise traffic
    Window, // derived filters
    Feed,   // historical/replay dispatch
    Live,   // live polling
    System, // startup, shutdown, finalization
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Series => "series",
            Domain::Window => "window",
            Domain::Feed => "feed",
            Domain::Live => "live",
            Domain::System => "system",
        }
    }

    pub fn is_enabled(&self) -> bool {
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static SINK: OnceLock<Mutex<Sink>> = OnceLock::new();

struct Sink {
    writer: Option<BufWriter<File>>,
}

impl Sink {
    fn from_env() -> Self {
        let writer = std::env::var("LOG_DIR")
            .ok()
            .and_then(|dir| open_sink(Path::new(&dir)).ok());
        Self { writer }
    }
}

fn open_sink(dir: &Path) -> std::io::Result<BufWriter<File>> {
    create_dir_all(dir)?;
    let mut path = PathBuf::from(dir);
    path.push("barflow.jsonl");
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

fn sink() -> &'static Mutex<Sink> {
    SINK.get_or_init(|| Mutex::new(Sink::from_env()))
}

/// Routes the file sink to `dir`, replacing any env-derived one.
pub fn set_log_dir(dir: &Path) -> std::io::Result<()> {
    let writer = open_sink(dir)?;
    if let Ok(mut sink) = sink().lock() {
        sink.writer = Some(writer);
    }
    Ok(())
}

/// RFC3339 timestamp with milliseconds.
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Emit one structured record.
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    if level < Level::from_env() || !domain.is_enabled() {
        return;
    }
    let entry = json!({
        "ts": ts_now(),
        "seq": LOG_SEQ.fetch_add(1, Ordering::SeqCst),
        "lvl": level.as_str(),
        "domain": domain.as_str(),
        "event": event,
        "data": Value::Object(fields),
    });
    let line = entry.to_string();
    println!("{}", line);
    if let Ok(mut sink) = sink().lock() {
        if let Some(writer) = sink.writer.as_mut() {
            let _ = writeln!(writer, "{}", line);
            let _ = writer.flush();
        }
    }
}

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

pub fn log_step(ts: Timestamp, keys: usize) {
    log(
        Level::Trace,
        Domain::Feed,
        "step",
        obj(&[("step_ts", json!(ts)), ("keys", json!(keys))]),
    );
}

pub fn log_bar(symbol: &str, bar: &Bar, revision: bool) {
    log(
        Level::Trace,
        Domain::Live,
        if revision { "bar_revised" } else { "bar_appended" },
        obj(&[
            ("symbol", v_str(symbol)),
            ("period", v_str(bar.period.as_str())),
            ("bar_ts", json!(bar.ts)),
            ("o", v_num(bar.open)),
            ("h", v_num(bar.high)),
            ("l", v_num(bar.low)),
            ("c", v_num(bar.close)),
            ("v", v_num(bar.volume)),
        ]),
    );
}

pub fn log_finalize(scope: &str, committed: usize) {
    log(
        Level::Debug,
        Domain::System,
        "finalize",
        obj(&[("scope", v_str(scope)), ("committed", json!(committed))]),
    );
}

pub fn log_no_data(symbol: &str, period: Period) {
    log(
        Level::Trace,
        Domain::Live,
        "no_data",
        obj(&[("symbol", v_str(symbol)), ("period", v_str(period.as_str()))]),
    );
}
