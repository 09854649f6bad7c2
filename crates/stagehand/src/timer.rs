//! One-shot timer scheduler.
//!
//! The scheduler holds pending one-shot entries keyed by [`TimerId`] and hands
//! back the due ones when the host advances time. It is generic over a payload
//! type so consumers can store whatever routes a firing back to its task —
//! an enum, an id, or a boxed callback.
//!
//! # Determinism
//!
//! Due entries are returned ordered by (fire time, timer id), so two runs that
//! advance the clock by the same deltas observe the same firing order.

use std::collections::BTreeMap;
use std::fmt;

/// Handle to a scheduled one-shot timer.
///
/// Handles are never reused within a scheduler's lifetime, so a stale handle
/// cancels nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl TimerId {
    /// Returns the raw value of this handle.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer:{}", self.0)
    }
}

struct Entry<T> {
    fire_at: f64,
    payload: T,
}

/// One-shot timer scheduler.
///
/// # Example
///
/// ```
/// use stagehand::timer::Scheduler;
///
/// let mut timers: Scheduler<u32> = Scheduler::new();
/// let a = timers.schedule_once(1.0, 1);
/// let _b = timers.schedule_once(0.5, 2);
///
/// timers.cancel(a);
///
/// let due = timers.advance(2.0);
/// assert_eq!(due.len(), 1);
/// assert_eq!(due[0].1, 2);
/// ```
pub struct Scheduler<T> {
    entries: BTreeMap<TimerId, Entry<T>>,
    now: f64,
    next_id: u64,
}

impl<T> Scheduler<T> {
    /// Creates an empty scheduler at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            now: 0.0,
            next_id: 0,
        }
    }

    /// Returns the scheduler's current time in seconds.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Schedules a one-shot timer `delay` seconds from now.
    ///
    /// A non-positive delay fires on the next [`advance`](Self::advance),
    /// including `advance(0.0)`.
    pub fn schedule_once(&mut self, delay: f64, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id,
            Entry {
                fire_at: self.now + delay.max(0.0),
                payload,
            },
        );
        id
    }

    /// Cancels a pending timer. Returns true if it was still pending.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Returns true if the given timer is still pending.
    #[must_use]
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Returns the number of pending timers.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    /// Advances the scheduler to `now` and removes all due entries.
    ///
    /// Due entries are returned ordered by (fire time, timer id). Timers
    /// scheduled by the caller while processing the returned entries fire on
    /// a later `advance`, never retroactively within the same call.
    pub fn advance(&mut self, now: f64) -> Vec<(TimerId, T)> {
        if now > self.now {
            self.now = now;
        }
        let due_ids: Vec<TimerId> = self
            .entries
            .iter()
            .filter(|(_, e)| e.fire_at <= self.now)
            .map(|(id, _)| *id)
            .collect();

        let mut due: Vec<(TimerId, Entry<T>)> = due_ids
            .into_iter()
            .filter_map(|id| self.entries.remove(&id).map(|e| (id, e)))
            .collect();
        due.sort_by(|(a_id, a), (b_id, b)| {
            a.fire_at
                .partial_cmp(&b.fire_at)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a_id.cmp(b_id))
        });

        if !due.is_empty() {
            tracing::trace!(count = due.len(), now = self.now, "timers fired");
        }
        due.into_iter().map(|(id, e)| (id, e.payload)).collect()
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Scheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.entries.len())
            .field("now", &self.now)
            .finish()
    }
}
