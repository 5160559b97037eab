use thiserror::Error;

use crate::bar::Period;
use crate::timeline::Timestamp;

/// Errors from timeline mutation and random access.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum TimelineError {
    #[error("out of order: {got} must be greater than {last}")]
    OutOfOrder { last: Timestamp, got: Timestamp },
    #[error("no open point to revise")]
    NoOpenPoint,
    #[error("revise targets {got} but the open point is at {open}")]
    TimestampMismatch { open: Timestamp, got: Timestamp },
    #[error("index {index} out of range for {len} points")]
    IndexOutOfRange { index: i64, len: usize },
}

/// An aggregation was asked for before its window filled up.
///
/// Raised by aggregators that need a full window; the engine itself never
/// checks this.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("window holds {len} of {required} required values")]
pub struct InsufficientData {
    pub len: usize,
    pub required: usize,
}

/// OHLC sanity violation at bar construction.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("invalid bar at {ts}: {reason}")]
pub struct InvalidBar {
    pub ts: Timestamp,
    pub reason: &'static str,
}

/// Errors surfaced by feed dispatch.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Timeline(#[from] TimelineError),
    /// The live collaborator reported a same-timestamp bar with different
    /// content but did not flag it as a revision.
    #[error("inconsistent revision for {symbol}/{period} at {ts}: content changed without revision flag")]
    InconsistentRevision {
        symbol: String,
        period: Period,
        ts: Timestamp,
    },
    /// A bar was routed to an instrument that does not track its period.
    #[error("{symbol} does not track period {period}")]
    UnregisteredPeriod { symbol: String, period: Period },
    #[error("source error: {0}")]
    Source(#[from] anyhow::Error),
}
