//! Sliding windows and event-driven derived series.
//!
//! A `Window` mirrors a series' trailing values without timestamps; a
//! `DerivedFilter` subscribes a window plus an `Aggregator` to a source
//! series and maintains an output series in one-for-one lockstep with it,
//! for both the append and the revise path. Chaining filters therefore
//! needs no special casing: an output series is a source like any other.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::InsufficientData;
use crate::logging::{self, obj, v_num, v_str, Domain, Level};
use crate::series::{Series, SubscriptionId};
use crate::timeline::Timestamp;

/// Fixed-size ring of the most recent values from a series.
#[derive(Debug, Clone)]
pub struct Window<V> {
    size: usize,
    values: VecDeque<V>,
}

impl<V> Window<V> {
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "window size must be > 0");
        Self {
            size,
            values: VecDeque::with_capacity(size),
        }
    }

    /// Pushes a value, evicting the oldest when the ring is full.
    pub fn on_append(&mut self, value: V) {
        self.values.push_back(value);
        if self.values.len() > self.size {
            self.values.pop_front();
        }
    }

    /// Replaces the most recently pushed value. Never grows or evicts.
    pub fn on_revise(&mut self, value: V) {
        if let Some(last) = self.values.back_mut() {
            *last = value;
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.size
    }

    /// Values oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &V> {
        self.values.iter()
    }

    pub fn latest(&self) -> Option<&V> {
        self.values.back()
    }

    /// Fails unless the ring has reached its configured size. For
    /// aggregators that need a full window.
    pub fn require_full(&self) -> Result<(), InsufficientData> {
        if self.is_full() {
            Ok(())
        } else {
            Err(InsufficientData {
                len: self.values.len(),
                required: self.size,
            })
        }
    }
}

/// Pure aggregation hook over a window's current contents.
pub trait Aggregator<V> {
    type Output;

    fn calculate(&self, window: &Window<V>) -> Result<Self::Output, InsufficientData>;
}

/// Binds a source series to a window and an aggregator, producing an output
/// series that mirrors the source's open/committed structure one-for-one.
///
/// An aggregation that reports `InsufficientData` contributes `None`, so the
/// output never falls out of step during warm-up.
pub struct DerivedFilter<V, A: Aggregator<V>> {
    window: Rc<RefCell<Window<V>>>,
    output: Rc<RefCell<Series<Option<A::Output>>>>,
    subscription: SubscriptionId,
}

impl<V, A> DerivedFilter<V, A>
where
    V: Clone + 'static,
    A: Aggregator<V> + 'static,
    A::Output: 'static,
{
    /// Subscribes to `source` and starts maintaining `name` as the output
    /// series, with the same capacity discipline as any other series.
    pub fn attach(
        name: &str,
        source: &mut Series<V>,
        window_size: usize,
        aggregator: A,
        capacity: usize,
    ) -> Self {
        let window = Rc::new(RefCell::new(Window::new(window_size)));
        let output = Rc::new(RefCell::new(Series::new(name, capacity)));
        let aggregator = Rc::new(aggregator);

        let on_appended = {
            let window = Rc::clone(&window);
            let output = Rc::clone(&output);
            let aggregator = Rc::clone(&aggregator);
            move |ts: Timestamp, value: &V| {
                let mut window = window.borrow_mut();
                window.on_append(value.clone());
                let result = aggregator.calculate(&window).ok();
                drop(window);
                let applied = output.borrow_mut().append(ts, result);
                if let Err(err) = applied {
                    report_desync(&output.borrow(), "append", ts, &err);
                }
            }
        };
        let on_revised = {
            let window = Rc::clone(&window);
            let output = Rc::clone(&output);
            let aggregator = Rc::clone(&aggregator);
            move |ts: Timestamp, value: &V| {
                let mut window = window.borrow_mut();
                window.on_revise(value.clone());
                let result = aggregator.calculate(&window).ok();
                drop(window);
                let applied = output.borrow_mut().revise(ts, result);
                if let Err(err) = applied {
                    report_desync(&output.borrow(), "revise", ts, &err);
                }
            }
        };

        let subscription = source.subscribe(on_appended, on_revised);
        Self {
            window,
            output,
            subscription,
        }
    }

    /// The maintained output series. Borrow it mutably to attach further
    /// filters downstream.
    pub fn output(&self) -> Rc<RefCell<Series<Option<A::Output>>>> {
        Rc::clone(&self.output)
    }

    pub fn is_full(&self) -> bool {
        self.window.borrow().is_full()
    }

    pub fn window_len(&self) -> usize {
        self.window.borrow().len()
    }

    /// Handle for detaching from the source series.
    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    /// Commits the output's open point (source finalization does not emit).
    pub fn finalize(&self) {
        self.output.borrow_mut().finalize();
    }
}

// An output rejecting a mirrored mutation means someone mutated it outside
// the filter; the source already accepted the event, so only report.
fn report_desync<R>(output: &Series<R>, op: &str, ts: Timestamp, err: &crate::error::TimelineError) {
    logging::log(
        Level::Error,
        Domain::Window,
        "output_desync",
        obj(&[
            ("series", v_str(output.name())),
            ("op", v_str(op)),
            ("ts", v_num(ts as f64)),
            ("error", v_str(&err.to_string())),
        ]),
    );
}
