//! Client/server convergence for predicted pushes.
//!
//! Push displacement is applied locally before server confirmation for
//! responsiveness. Each predicted push can leave a small discrepancy between
//! the client's and the server's simulation, and without a forced
//! convergence point those discrepancies accumulate without bound. The
//! [`SyncGate`] decides *when* to converge — trading bandwidth and latency
//! against drift tolerance — and a [`SyncBarrier`] is the convergence point
//! itself: a spawned sub-task that resolves once both sides have reached it.
//!
//! The barrier is asymmetric, mirroring prediction: the autonomous client
//! posts its signal and proceeds immediately, while the authority waits for
//! the client's signal before resuming. Scanning is fully suspended between
//! barrier entry and resolution.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use stagehand::world::ActorId;

use crate::host::HostContext;

/// Network role of the simulation this subsystem runs inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetRole {
    /// No network boundary; barriers resolve immediately.
    Standalone,
    /// Server-side simulation for a remote client; barriers wait for the
    /// client's signal.
    Authority,
    /// Locally-predicted client; barriers post a signal and proceed.
    AutonomousProxy,
}

/// Thresholds governing when a net sync is forced.
///
/// All delays are in seconds; a zero delay or count disables that rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Master switch; disabled means scanning never waits for a sync.
    pub wait_for_net_sync: bool,
    /// Don't sync while a push happened more recently than this — syncing
    /// mid-burst costs the most and helps the least.
    pub min_net_sync_delay: f32,
    /// Sync once this much time has passed since the last push, provided
    /// pushes occurred since the previous sync.
    pub net_sync_delay_after_push: f32,
    /// Sync after this much idle time without any push since the last sync.
    pub net_sync_delay_without_push: f32,
    /// Sync when more than this many pushes accumulated since the last sync.
    pub max_pushes_until_net_sync: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            wait_for_net_sync: true,
            min_net_sync_delay: 1.0,
            net_sync_delay_after_push: 5.0,
            net_sync_delay_without_push: 10.0,
            max_pushes_until_net_sync: 6,
        }
    }
}

/// Per-ability sync bookkeeping and policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncGate {
    settings: SyncSettings,
    last_push_time: Option<f64>,
    last_sync_time: f64,
    triggered_pushes_since_last_sync: u32,
}

impl SyncGate {
    /// Creates a gate; `now` seeds the last-sync timestamp so the idle rule
    /// measures from activation.
    #[must_use]
    pub fn new(settings: SyncSettings, now: f64) -> Self {
        Self {
            settings,
            last_push_time: None,
            last_sync_time: now,
            triggered_pushes_since_last_sync: 0,
        }
    }

    /// Records one triggered push.
    pub fn record_push(&mut self, now: f64) {
        self.triggered_pushes_since_last_sync += 1;
        self.last_push_time = Some(now);
    }

    /// Number of pushes since the last sync.
    #[must_use]
    pub fn pushes_since_last_sync(&self) -> u32 {
        self.triggered_pushes_since_last_sync
    }

    /// Time of the last push, if any occurred since the last sync.
    #[must_use]
    pub fn last_push_time(&self) -> Option<f64> {
        self.last_push_time
    }

    /// Whether a sync barrier should be entered before the next scan.
    #[must_use]
    pub fn should_sync(&self, now: f64) -> bool {
        let s = &self.settings;
        if !s.wait_for_net_sync {
            return false;
        }

        if let Some(last_push) = self.last_push_time {
            // A push happened very recently; don't sync mid-burst.
            if s.min_net_sync_delay > 0.0 && now - last_push < f64::from(s.min_net_sync_delay) {
                return false;
            }
            // The burst is over; converge.
            if s.net_sync_delay_after_push > 0.0
                && self.triggered_pushes_since_last_sync > 0
                && now - last_push >= f64::from(s.net_sync_delay_after_push)
            {
                return true;
            }
        } else if s.net_sync_delay_without_push > 0.0
            && now - self.last_sync_time >= f64::from(s.net_sync_delay_without_push)
        {
            // Nothing pushed for a long while; cheap moment to converge.
            return true;
        }

        if s.max_pushes_until_net_sync == 0 {
            return false;
        }
        self.triggered_pushes_since_last_sync > s.max_pushes_until_net_sync
    }

    /// Consumes the pending sync: zeroes the push count, clears the last
    /// push, and stamps the last-sync time. Called exactly once per barrier
    /// entry; calling it again without an intervening push is a no-op apart
    /// from the timestamp.
    pub fn consume(&mut self, now: f64) {
        self.triggered_pushes_since_last_sync = 0;
        self.last_push_time = None;
        self.last_sync_time = now;
    }
}

/// Callback invoked when a barrier resolves.
pub type BarrierCallback = Box<dyn FnOnce(&HostContext)>;

/// Handle to a registered barrier waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WaiterId(u64);

/// The replicated-event channel between client and server.
///
/// In a shipping game this is the network; here it is a mailbox the host
/// drives. Client signals are keyed by the ability's owning actor. A signal
/// that arrives before anyone waits for it is banked and consumed by the
/// next waiter, so ordering between the two sides doesn't matter.
#[derive(Default)]
pub struct ReplicationBus {
    banked_signals: BTreeMap<ActorId, u32>,
    waiter_keys: BTreeMap<WaiterId, ActorId>,
    waiter_callbacks: BTreeMap<WaiterId, BarrierCallback>,
    ready: Vec<BarrierCallback>,
    next_id: u64,
}

impl ReplicationBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a client signal for `key`.
    ///
    /// The oldest waiter on `key` becomes ready; with no waiter the signal
    /// is banked.
    pub fn post_client_signal(&mut self, key: ActorId) {
        let waiter = self
            .waiter_keys
            .iter()
            .find(|(_, k)| **k == key)
            .map(|(id, _)| *id);
        match waiter {
            Some(id) => {
                self.waiter_keys.remove(&id);
                if let Some(callback) = self.waiter_callbacks.remove(&id) {
                    self.ready.push(callback);
                }
            }
            None => {
                *self.banked_signals.entry(key).or_insert(0) += 1;
            }
        }
    }

    /// Consumes a banked signal for `key`, if one exists.
    pub fn consume_signal(&mut self, key: ActorId) -> bool {
        match self.banked_signals.get_mut(&key) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    }

    /// Registers a waiter resolved by the next client signal on `key`.
    pub fn register_waiter(&mut self, key: ActorId, callback: BarrierCallback) -> WaiterId {
        let id = WaiterId(self.next_id);
        self.next_id += 1;
        self.waiter_keys.insert(id, key);
        self.waiter_callbacks.insert(id, callback);
        id
    }

    /// Cancels a registered waiter. Returns true if it was still pending.
    pub fn cancel_waiter(&mut self, id: WaiterId) -> bool {
        self.waiter_keys.remove(&id);
        self.waiter_callbacks.remove(&id).is_some()
    }

    /// Number of waiters still pending.
    #[must_use]
    pub fn pending_waiters(&self) -> usize {
        self.waiter_callbacks.len()
    }

    /// Takes the callbacks whose signals have arrived. The host invokes
    /// them outside the bus borrow.
    pub fn take_ready(&mut self) -> Vec<BarrierCallback> {
        std::mem::take(&mut self.ready)
    }
}

impl fmt::Debug for ReplicationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicationBus")
            .field("banked_signals", &self.banked_signals)
            .field("pending_waiters", &self.waiter_callbacks.len())
            .field("ready", &self.ready.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BarrierState {
    Pending,
    Resolved,
    Ended,
}

/// One cross-network synchronization point.
///
/// Spawned per barrier entry; resolves when both sides have reached it, and
/// invokes its callback with host context so the owner can resume scanning.
/// Ending an unresolved barrier (owner teardown) deregisters the waiter and
/// drops the callback without invoking it.
pub struct SyncBarrier {
    key: ActorId,
    state: Rc<Cell<BarrierState>>,
    waiter: Option<WaiterId>,
}

impl SyncBarrier {
    /// Spawns a barrier keyed by the owning actor.
    ///
    /// Depending on the context's [`NetRole`], this resolves synchronously
    /// (standalone; autonomous proxy, which also posts its client signal) or
    /// stays pending until the client signal arrives (authority).
    pub fn spawn(ctx: &HostContext, key: ActorId, on_resolved: BarrierCallback) -> Self {
        let state = Rc::new(Cell::new(BarrierState::Pending));

        match ctx.role {
            NetRole::Standalone => {
                state.set(BarrierState::Resolved);
                on_resolved(ctx);
                Self {
                    key,
                    state,
                    waiter: None,
                }
            }
            NetRole::AutonomousProxy => {
                // Signal the server and proceed; prediction must not block.
                ctx.bus.borrow_mut().post_client_signal(key);
                state.set(BarrierState::Resolved);
                on_resolved(ctx);
                Self {
                    key,
                    state,
                    waiter: None,
                }
            }
            NetRole::Authority => {
                if ctx.bus.borrow_mut().consume_signal(key) {
                    state.set(BarrierState::Resolved);
                    on_resolved(ctx);
                    return Self {
                        key,
                        state,
                        waiter: None,
                    };
                }
                let state_in_cb = Rc::clone(&state);
                let waiter = ctx.bus.borrow_mut().register_waiter(
                    key,
                    Box::new(move |ctx| {
                        state_in_cb.set(BarrierState::Resolved);
                        on_resolved(ctx);
                    }),
                );
                tracing::debug!(actor = %key, "waiting for net sync");
                Self {
                    key,
                    state,
                    waiter: Some(waiter),
                }
            }
        }
    }

    /// The actor this barrier is keyed by.
    #[must_use]
    pub fn key(&self) -> ActorId {
        self.key
    }

    /// True once both sides reached the barrier.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.state.get() == BarrierState::Resolved
    }

    /// True while the barrier still waits on the remote side.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state.get() == BarrierState::Pending
    }

    /// Force-ends the barrier. A pending waiter is deregistered and its
    /// callback dropped; a resolved barrier is unaffected.
    pub fn end(mut self, ctx: &HostContext) {
        if let Some(waiter) = self.waiter.take() {
            if ctx.bus.borrow_mut().cancel_waiter(waiter) {
                self.state.set(BarrierState::Ended);
            }
        }
    }
}

impl fmt::Debug for SyncBarrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncBarrier")
            .field("key", &self.key)
            .field("state", &self.state.get())
            .finish()
    }
}
