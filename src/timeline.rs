//! Bounded, timestamp-ordered storage with an open/committed state machine.
//!
//! Committed points are immutable history in a capacity ring (oldest evicted
//! on overflow). At most one trailing *open* point exists and may be revised
//! in place any number of times; it is committed when a strictly greater
//! timestamp arrives, or when the owner calls `finalize`.

use std::collections::VecDeque;

use crate::error::TimelineError;

/// Epoch timestamp in seconds.
pub type Timestamp = i64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimePoint<V> {
    pub ts: Timestamp,
    pub value: V,
}

#[derive(Debug, Clone)]
pub struct BoundedTimeline<V> {
    capacity: usize,
    committed: VecDeque<TimePoint<V>>,
    open: Option<TimePoint<V>>,
}

impl<V> BoundedTimeline<V> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be > 0");
        Self {
            capacity,
            committed: VecDeque::with_capacity(capacity),
            open: None,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of committed points. The open point is not counted.
    #[inline]
    pub fn len(&self) -> usize {
        self.committed.len()
    }

    /// Committed points plus the open point, if any.
    #[inline]
    pub fn total_len(&self) -> usize {
        self.committed.len() + usize::from(self.open.is_some())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    pub fn open_point(&self) -> Option<&TimePoint<V>> {
        self.open.as_ref()
    }

    pub fn last_committed(&self) -> Option<&TimePoint<V>> {
        self.committed.back()
    }

    /// Timestamp of the open point, or of the last committed point.
    pub fn last_ts(&self) -> Option<Timestamp> {
        self.open
            .as_ref()
            .map(|p| p.ts)
            .or_else(|| self.committed.back().map(|p| p.ts))
    }

    /// Opens a new point at `ts`, committing the previous open point first.
    ///
    /// Fails with `OutOfOrder` when `ts` is not strictly greater than the
    /// open point (or, with no open point, the last committed one). On
    /// failure the timeline is unchanged.
    pub fn append(&mut self, ts: Timestamp, value: V) -> Result<(), TimelineError> {
        if let Some(last) = self.last_ts() {
            if ts <= last {
                return Err(TimelineError::OutOfOrder { last, got: ts });
            }
        }
        if let Some(open) = self.open.take() {
            self.commit(open);
        }
        self.open = Some(TimePoint { ts, value });
        Ok(())
    }

    /// Replaces the open point's value in place. Never commits, evicts, or
    /// changes the timestamp.
    pub fn revise(&mut self, ts: Timestamp, value: V) -> Result<(), TimelineError> {
        match self.open.as_mut() {
            None => Err(TimelineError::NoOpenPoint),
            Some(open) if open.ts != ts => Err(TimelineError::TimestampMismatch {
                open: open.ts,
                got: ts,
            }),
            Some(open) => {
                open.value = value;
                Ok(())
            }
        }
    }

    /// Commits the open point unconditionally. Returns whether one existed.
    pub fn finalize(&mut self) -> bool {
        match self.open.take() {
            Some(point) => {
                self.commit(point);
                true
            }
            None => false,
        }
    }

    fn commit(&mut self, point: TimePoint<V>) {
        if self.committed.len() == self.capacity {
            self.committed.pop_front();
        }
        self.committed.push_back(point);
    }

    /// Committed point by index; negative indexes from the end.
    pub fn point(&self, index: i64) -> Result<&TimePoint<V>, TimelineError> {
        let i = resolve_index(index, self.committed.len())?;
        self.committed
            .get(i)
            .ok_or(TimelineError::IndexOutOfRange {
                index,
                len: self.committed.len(),
            })
    }

    /// Committed value by index; negative indexes from the end.
    pub fn get(&self, index: i64) -> Result<&V, TimelineError> {
        self.point(index).map(|p| &p.value)
    }

    /// Like `get`, but the open point is addressable as the last element.
    pub fn get_with_open(&self, index: i64) -> Result<&V, TimelineError> {
        let len = self.total_len();
        let i = resolve_index(index, len)?;
        if let Some(point) = self.committed.get(i) {
            return Ok(&point.value);
        }
        self.open
            .as_ref()
            .map(|p| &p.value)
            .ok_or(TimelineError::IndexOutOfRange { index, len })
    }

    /// Committed points, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &TimePoint<V>> {
        self.committed.iter()
    }

    /// Committed points followed by the open point, oldest first.
    pub fn iter_with_open(&self) -> impl Iterator<Item = &TimePoint<V>> {
        self.committed.iter().chain(self.open.iter())
    }

    /// Lazy slice of committed points with Python-style clamping; negative
    /// bounds index from the end.
    pub fn slice(&self, start: i64, end: i64) -> impl Iterator<Item = &TimePoint<V>> {
        let len = self.committed.len();
        let start = clamp_bound(start, len);
        let end = clamp_bound(end, len).max(start);
        self.committed.iter().skip(start).take(end - start)
    }

    pub fn timestamps(&self) -> impl Iterator<Item = Timestamp> + '_ {
        self.committed.iter().map(|p| p.ts)
    }
}

fn resolve_index(index: i64, len: usize) -> Result<usize, TimelineError> {
    let adjusted = if index < 0 { index + len as i64 } else { index };
    if adjusted < 0 || adjusted >= len as i64 {
        return Err(TimelineError::IndexOutOfRange { index, len });
    }
    Ok(adjusted as usize)
}

fn clamp_bound(bound: i64, len: usize) -> usize {
    let adjusted = if bound < 0 { bound + len as i64 } else { bound };
    adjusted.clamp(0, len as i64) as usize
}
