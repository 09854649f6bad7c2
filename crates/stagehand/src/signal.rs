//! Single-threaded observer registration.
//!
//! A [`Signal`] is a bindable callback slot: observers subscribe with a
//! boxed closure and receive every subsequent emission until they
//! unsubscribe. This is the delegate mechanism actors use to notify tasks
//! (for example, a pushee pausing its proximity scan).
//!
//! Emission is reentrancy-safe: a callback may subscribe or unsubscribe
//! (including itself) while the signal is being emitted. Subscriptions added
//! during an emission only see later emissions.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Handle identifying one subscription on a [`Signal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Subscription(u64);

type Callback<T> = Box<dyn FnMut(T)>;

struct SignalInner<T> {
    subscribers: BTreeMap<u64, Callback<T>>,
    /// Id of the callback currently being invoked, if any.
    running: Option<u64>,
    /// Set when the running callback unsubscribed itself.
    running_retired: bool,
    next_id: u64,
}

/// A single-threaded multicast callback slot.
///
/// # Example
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use stagehand::signal::Signal;
///
/// let signal: Signal<bool> = Signal::new();
/// let seen = Rc::new(Cell::new(false));
///
/// let seen_in_cb = Rc::clone(&seen);
/// let sub = signal.subscribe(Box::new(move |value| seen_in_cb.set(value)));
///
/// signal.emit(true);
/// assert!(seen.get());
///
/// signal.unsubscribe(sub);
/// signal.emit(false);
/// assert!(seen.get());
/// ```
pub struct Signal<T: Copy> {
    inner: Rc<RefCell<SignalInner<T>>>,
}

impl<T: Copy> Signal<T> {
    /// Creates a signal with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SignalInner {
                subscribers: BTreeMap::new(),
                running: None,
                running_retired: false,
                next_id: 0,
            })),
        }
    }

    /// Registers a callback, returning a handle for [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe(&self, callback: Callback<T>) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.insert(id, callback);
        Subscription(id)
    }

    /// Removes a subscription. Returns true if it was still registered.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.subscribers.remove(&subscription.0).is_some() {
            return true;
        }
        // The callback being emitted right now is temporarily out of the map;
        // mark it retired so it is not restored afterwards.
        if inner.running == Some(subscription.0) && !inner.running_retired {
            inner.running_retired = true;
            return true;
        }
        false
    }

    /// Returns the number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Invokes every subscriber registered at the start of the emission.
    ///
    /// Each callback is temporarily removed from the registry while it runs,
    /// so it may freely touch the signal; it is restored afterwards unless it
    /// unsubscribed itself.
    pub fn emit(&self, value: T) {
        let ids: Vec<u64> = self.inner.borrow().subscribers.keys().copied().collect();
        for id in ids {
            let callback = {
                let mut inner = self.inner.borrow_mut();
                inner.running = Some(id);
                inner.running_retired = false;
                inner.subscribers.remove(&id)
            };
            if let Some(mut callback) = callback {
                callback(value);
                let mut inner = self.inner.borrow_mut();
                if !inner.running_retired {
                    inner.subscribers.insert(id, callback);
                }
            }
            let mut inner = self.inner.borrow_mut();
            inner.running = None;
            inner.running_retired = false;
        }
    }
}

impl<T: Copy> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Copy> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
