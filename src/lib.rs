//! Streaming time-series engine for financial bar/quote data.
//!
//! Bounded, timestamp-ordered series with an open/committed state machine:
//! history appends once per period, live polling revises the open point as
//! many times as quotes arrive. Subscribers (derived windows, indicator
//! filters) are dispatched synchronously in dependency order, so every
//! derived series is consistent with its source after each tick.
//!
//! Everything here is single-threaded and push-from-outside: a feed's
//! `step()` is the only place that touches an external collaborator.

pub mod bar;
pub mod bar_series;
pub mod config;
pub mod error;
pub mod feed;
pub mod live;
pub mod logging;
pub mod series;
pub mod sources;
pub mod timeline;
pub mod window;

pub use bar::{Bar, Period};
pub use bar_series::BarSeries;
pub use config::{now_ts, Config, DEFAULT_CAPACITY};
pub use error::{FeedError, InsufficientData, InvalidBar, TimelineError};
pub use feed::{Feed, TickSource};
pub use live::{Instrument, LiveFeed, QuoteSource};
pub use series::{Series, SubscriptionId};
pub use sources::{RandomWalkBars, ScriptedQuotes, VecSource};
pub use timeline::{BoundedTimeline, TimePoint, Timestamp};
pub use window::{Aggregator, DerivedFilter, Window};
