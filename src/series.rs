//! Named series: a bounded timeline plus synchronous event dispatch.
//!
//! Handlers run on the calling thread, in registration order, and only after
//! the mutation is reflected in the timeline. Handlers must not call back
//! into `append`/`revise` on the series that is emitting to them; that
//! reentrancy is a documented precondition, not checked at runtime.

use std::fmt;

use crate::error::TimelineError;
use crate::timeline::{BoundedTimeline, TimePoint, Timestamp};

pub type Handler<V> = Box<dyn FnMut(Timestamp, &V)>;

/// Opaque handle for one subscription edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber<V> {
    id: SubscriptionId,
    on_appended: Handler<V>,
    on_revised: Handler<V>,
}

pub struct Series<V> {
    name: String,
    timeline: BoundedTimeline<V>,
    subscribers: Vec<Subscriber<V>>,
    next_subscription: u64,
}

impl<V> fmt::Debug for Series<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Series")
            .field("name", &self.name)
            .field("len", &self.timeline.len())
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}

impl<V> Series<V> {
    pub fn new(name: &str, capacity: usize) -> Self {
        Self {
            name: name.to_string(),
            timeline: BoundedTimeline::new(capacity),
            subscribers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeline(&self) -> &BoundedTimeline<V> {
        &self.timeline
    }

    /// Appends a point and, on success, emits `Appended` to all subscribers.
    pub fn append(&mut self, ts: Timestamp, value: V) -> Result<(), TimelineError> {
        self.timeline.append(ts, value)?;
        if let Some(open) = self.timeline.open_point() {
            for sub in self.subscribers.iter_mut() {
                (sub.on_appended)(open.ts, &open.value);
            }
        }
        Ok(())
    }

    /// Revises the open point and, on success, emits `Revised`.
    pub fn revise(&mut self, ts: Timestamp, value: V) -> Result<(), TimelineError> {
        self.timeline.revise(ts, value)?;
        if let Some(open) = self.timeline.open_point() {
            for sub in self.subscribers.iter_mut() {
                (sub.on_revised)(open.ts, &open.value);
            }
        }
        Ok(())
    }

    /// Commits the open point without emitting. Returns whether one existed.
    pub fn finalize(&mut self) -> bool {
        self.timeline.finalize()
    }

    pub fn subscribe(
        &mut self,
        on_appended: impl FnMut(Timestamp, &V) + 'static,
        on_revised: impl FnMut(Timestamp, &V) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push(Subscriber {
            id,
            on_appended: Box::new(on_appended),
            on_revised: Box::new(on_revised),
        });
        id
    }

    /// Idempotent: unknown or already-removed ids are a no-op.
    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscribers.retain(|sub| sub.id != id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    // Timeline pass-throughs.

    pub fn capacity(&self) -> usize {
        self.timeline.capacity()
    }

    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    pub fn get(&self, index: i64) -> Result<&V, TimelineError> {
        self.timeline.get(index)
    }

    pub fn get_with_open(&self, index: i64) -> Result<&V, TimelineError> {
        self.timeline.get_with_open(index)
    }

    pub fn open_point(&self) -> Option<&TimePoint<V>> {
        self.timeline.open_point()
    }

    pub fn last_committed(&self) -> Option<&TimePoint<V>> {
        self.timeline.last_committed()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimePoint<V>> {
        self.timeline.iter()
    }

    pub fn iter_with_open(&self) -> impl Iterator<Item = &TimePoint<V>> {
        self.timeline.iter_with_open()
    }

    pub fn slice(&self, start: i64, end: i64) -> impl Iterator<Item = &TimePoint<V>> {
        self.timeline.slice(start, end)
    }
}
