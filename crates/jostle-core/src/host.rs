//! Host context: the bundle of services the push pipeline runs against.
//!
//! Everything is single-threaded and cooperatively scheduled: services are
//! shared through `Rc<RefCell<_>>`, and each entry point borrows what it
//! needs for the duration of one synchronous step. The "loop" of the scan
//! pipeline is a chain of one-shot timer callbacks drained by
//! [`HostContext::advance`]; suspension means a callback was not scheduled,
//! never that a thread blocks.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use stagehand::clock::VirtualClock;
use stagehand::timer::Scheduler;
use stagehand::world::World;

use crate::directory::ActorDirectory;
use crate::sync::{NetRole, ReplicationBus};

/// A deferred unit of work scheduled on the host's timer service.
pub type TimerCallback = Box<dyn FnOnce(&HostContext)>;

/// Shared handles to the host services one simulation side owns.
///
/// Cloning is cheap (reference counts only) and clones observe the same
/// underlying services.
///
/// # Example
///
/// ```
/// use jostle_core::host::HostContext;
/// use jostle_core::sync::NetRole;
///
/// let ctx = HostContext::new(NetRole::Standalone, 42);
/// ctx.advance(0.5);
/// assert!((ctx.now() - 0.5).abs() < 1e-9);
/// ```
#[derive(Clone)]
pub struct HostContext {
    /// Virtual clock.
    pub clock: Rc<RefCell<VirtualClock>>,
    /// One-shot timer service.
    pub timers: Rc<RefCell<Scheduler<TimerCallback>>>,
    /// Actor world for spatial queries.
    pub world: Rc<RefCell<World>>,
    /// Capability registry.
    pub directory: Rc<RefCell<ActorDirectory>>,
    /// Replicated-event channel for net sync barriers.
    pub bus: Rc<RefCell<ReplicationBus>>,
    /// Deterministic RNG for the random-direction fallback.
    pub rng: Rc<RefCell<ChaCha8Rng>>,
    /// Network role of this simulation side.
    pub role: NetRole,
}

impl HostContext {
    /// Creates a context with fresh services and a seeded RNG.
    #[must_use]
    pub fn new(role: NetRole, seed: u64) -> Self {
        Self {
            clock: Rc::new(RefCell::new(VirtualClock::new())),
            timers: Rc::new(RefCell::new(Scheduler::new())),
            world: Rc::new(RefCell::new(World::new())),
            directory: Rc::new(RefCell::new(ActorDirectory::new())),
            bus: Rc::new(RefCell::new(ReplicationBus::new())),
            rng: Rc::new(RefCell::new(ChaCha8Rng::seed_from_u64(seed))),
            role,
        }
    }

    /// Creates a context sharing another side's replication bus, for tests
    /// and hosts that simulate both ends of the connection in one process.
    #[must_use]
    pub fn new_with_bus(role: NetRole, seed: u64, bus: Rc<RefCell<ReplicationBus>>) -> Self {
        Self {
            bus,
            ..Self::new(role, seed)
        }
    }

    /// Current time in seconds.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.clock.borrow().now()
    }

    /// Advances time by `dt` seconds and pumps due work.
    pub fn advance(&self, dt: f64) {
        self.clock.borrow_mut().advance(dt);
        self.pump();
    }

    /// Drains resolved net-sync waiters and due timers without advancing
    /// time.
    ///
    /// Waiters run first: a resolved barrier reschedules scanning before the
    /// timers that depend on it are examined. Callbacks are invoked outside
    /// any service borrow, so they may freely schedule, cancel, or post.
    pub fn pump(&self) {
        loop {
            let ready = self.bus.borrow_mut().take_ready();
            if ready.is_empty() {
                break;
            }
            for callback in ready {
                callback(self);
            }
        }

        let now = self.now();
        let due = self.timers.borrow_mut().advance(now);
        for (_, callback) in due {
            callback(self);
        }
    }
}

impl fmt::Debug for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostContext")
            .field("now", &self.now())
            .field("role", &self.role)
            .field("pending_timers", &self.timers.borrow().pending())
            .finish()
    }
}
