//! The self-rescheduling proximity scan.
//!
//! [`ScanTask`] is the polling loop at the center of the push pipeline. Each
//! tick it sweeps a motion-scaled shape around the scanning actor, gathers
//! push options from whatever it hit, filters them down to the currently
//! activatable set, and notifies its delegate when that set changed — then
//! reschedules itself. The loop is not a `while`: it is a chain of one-shot
//! timer callbacks, so it interleaves with the host's frame scheduler and
//! "suspending" it just means not scheduling the next callback.
//!
//! Per-tick failures are soft. A missing avatar, an uninitialized actor, a
//! missing capability, or a degenerate collision shape skips the tick and
//! reschedules on the failure-delay path; only destroying the task stops the
//! loop.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::warn;

use stagehand::signal::{Signal, Subscription};
use stagehand::timer::TimerId;
use stagehand::world::ActorId;

use crate::capability::PusherHandle;
use crate::error::ScanFault;
use crate::host::{HostContext, TimerCallback};
use crate::mechanics;
use crate::option::{PushActivation, PushOption, PushQuery};
use crate::params::ScanParams;
use crate::sync::SyncBarrier;
use crate::ability::{AbilityClassId, AbilityHandle};

/// Why the next scan is being delayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PauseKind {
    /// Normal rescheduling at the current scan rate.
    #[default]
    NotPaused,
    /// A precondition failed this tick; retry after the failure delay
    /// instead of hammering the normal interval during initialization.
    ActivationFailed,
}

/// The owning ability's view of the scan loop.
///
/// The task calls up through this seam at its two decision points: whether
/// to insert a net-sync barrier before the next scan, and what to do when
/// the candidate set changed.
pub trait ScanDelegate {
    /// Whether a net-sync barrier must be entered before the next scan.
    fn should_wait_for_net_sync(&self, now: f64) -> bool;

    /// Consumes the pending sync condition; called exactly once per barrier
    /// entry, before the barrier is spawned.
    fn consume_wait_for_net_sync(&mut self, now: f64);

    /// The filtered, ordered candidate set differs from the previous tick's.
    fn push_candidates_changed(&mut self, options: &[PushOption], ctx: &HostContext);
}

struct ScanTaskState {
    params: ScanParams,
    query: PushQuery,
    base_scan_range: f32,
    activation_failure_delay: f32,
    delegate: Weak<RefCell<dyn ScanDelegate>>,
    current_scan_rate: f32,
    timer: Option<TimerId>,
    pause_binding: Option<(Signal<bool>, Subscription)>,
    sync_waits: Vec<SyncBarrier>,
    current_options: Vec<PushOption>,
    grant_cache: BTreeMap<AbilityClassId, AbilityHandle>,
    suspended: bool,
    destroyed: bool,
}

/// The periodic proximity scan for one scanning ability instance.
///
/// Created by the scan ability at activation, destroyed with it. All state
/// is owned by this instance — including the ability-grant cache, which is
/// deliberately not shared across instances to keep one player's grants from
/// contaminating another's.
pub struct ScanTask {
    state: Rc<RefCell<ScanTaskState>>,
}

impl ScanTask {
    /// Creates an inactive scan task. Call [`activate`](Self::activate) to
    /// start the loop.
    #[must_use]
    pub fn new(
        params: ScanParams,
        query: PushQuery,
        base_scan_range: f32,
        activation_failure_delay: f32,
        delegate: Weak<RefCell<dyn ScanDelegate>>,
    ) -> Self {
        let current_scan_rate = params.scan_rate;
        Self {
            state: Rc::new(RefCell::new(ScanTaskState {
                params,
                query,
                base_scan_range,
                activation_failure_delay,
                delegate,
                current_scan_rate,
                timer: None,
                pause_binding: None,
                sync_waits: Vec::new(),
                current_options: Vec::new(),
                grant_cache: BTreeMap::new(),
                suspended: false,
                destroyed: false,
            })),
        }
    }

    /// Starts the scan loop: the first tick fires after one scan interval.
    pub fn activate(&self, ctx: &HostContext) {
        Self::schedule_next(&self.state, ctx, PauseKind::NotPaused);
        eprintln!("DBG after activate has_timer={}", self.state.borrow().timer.is_some());
    }

    /// Stops the loop permanently: cancels the outstanding timer, unbinds
    /// the pause delegate, and force-ends outstanding sync barriers.
    /// Idempotent.
    pub fn destroy(&self, ctx: &HostContext) {
        let (timer, binding, barriers) = {
            let mut s = self.state.borrow_mut();
            if s.destroyed {
                return;
            }
            s.destroyed = true;
            (
                s.timer.take(),
                s.pause_binding.take(),
                std::mem::take(&mut s.sync_waits),
            )
        };

        if let Some(timer) = timer {
            ctx.timers.borrow_mut().cancel(timer);
        }
        if let Some((signal, subscription)) = binding {
            signal.unsubscribe(subscription);
        }
        for barrier in barriers {
            barrier.end(ctx);
        }
        self.state.borrow_mut().current_options.clear();
    }

    /// The candidate set from the most recent tick.
    #[must_use]
    pub fn current_options(&self) -> Vec<PushOption> {
        self.state.borrow().current_options.clone()
    }

    /// The interval the loop last scheduled with.
    #[must_use]
    pub fn current_scan_rate(&self) -> f32 {
        self.state.borrow().current_scan_rate
    }

    /// True while a pause signal holds the loop.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.state.borrow().suspended
    }

    /// True while a scan timer is outstanding.
    #[must_use]
    pub fn has_pending_timer(&self) -> bool {
        self.state.borrow().timer.is_some()
    }

    /// Number of sync barriers still waiting on the remote side.
    #[must_use]
    pub fn pending_sync_barriers(&self) -> usize {
        self.state
            .borrow()
            .sync_waits
            .iter()
            .filter(|b| b.is_pending())
            .count()
    }

    /// Schedules the next tick, inserting a net-sync barrier first when the
    /// delegate asks for one.
    fn schedule_next(state: &Rc<RefCell<ScanTaskState>>, ctx: &HostContext, pause: PauseKind) {
        {
            let s = state.borrow();
            if s.destroyed || s.suspended {
                return;
            }
        }

        let avatar = state.borrow().query.requesting_avatar;
        let delegate = state.borrow().delegate.clone();

        let wants_sync = delegate
            .upgrade()
            .map_or(false, |d| d.borrow().should_wait_for_net_sync(ctx.now()));
        if wants_sync {
            // Without an avatar there is nothing to synchronize against;
            // fall back to the failure-delay path rather than hanging.
            if !ctx.world.borrow().contains(avatar) {
                Self::schedule_timer(state, ctx, PauseKind::ActivationFailed);
                return;
            }
            if let Some(d) = delegate.upgrade() {
                d.borrow_mut().consume_wait_for_net_sync(ctx.now());
            }

            let weak = Rc::downgrade(state);
            let barrier = SyncBarrier::spawn(
                ctx,
                avatar,
                Box::new(move |ctx| {
                    if let Some(state) = weak.upgrade() {
                        Self::on_sync_resolved(&state, ctx);
                    }
                }),
            );
            // A barrier that resolved synchronously has already re-entered
            // this path; only outstanding ones need tracking for teardown.
            if barrier.is_pending() {
                state.borrow_mut().sync_waits.push(barrier);
            }
            return;
        }

        Self::bind_pause_delegate(state, ctx);
        Self::schedule_timer(state, ctx, pause);
    }

    /// A barrier resolved; drop completed barriers and resume scanning.
    fn on_sync_resolved(state: &Rc<RefCell<ScanTaskState>>, ctx: &HostContext) {
        state
            .borrow_mut()
            .sync_waits
            .retain(SyncBarrier::is_pending);
        Self::schedule_next(state, ctx, PauseKind::NotPaused);
    }

    /// Binds to the pushee's pause notifier, once.
    fn bind_pause_delegate(state: &Rc<RefCell<ScanTaskState>>, ctx: &HostContext) {
        if state.borrow().pause_binding.is_some() {
            return;
        }
        let avatar = state.borrow().query.requesting_avatar;
        let Some(pushee) = ctx.directory.borrow().pushee(avatar) else {
            return;
        };
        let Some(signal) = pushee.scan_pause_signal() else {
            return;
        };

        let weak = Rc::downgrade(state);
        let timers = Rc::clone(&ctx.timers);
        let subscription = signal.subscribe(Box::new(move |paused| {
            let Some(state) = weak.upgrade() else {
                return;
            };
            if paused {
                let timer = {
                    let mut s = state.borrow_mut();
                    s.suspended = true;
                    s.timer.take()
                };
                if let Some(timer) = timer {
                    timers.borrow_mut().cancel(timer);
                }
                tracing::debug!("scan paused");
            } else {
                state.borrow_mut().suspended = false;
                tracing::debug!("scan resumed");
                // Resume through a zero-delay timer so the scheduling path
                // runs with full host context on the next pump.
                let weak_resume = weak.clone();
                let callback: TimerCallback = Box::new(move |ctx: &HostContext| {
                    if let Some(state) = weak_resume.upgrade() {
                        ScanTask::schedule_next(&state, ctx, PauseKind::NotPaused);
                    }
                });
                let timer = timers.borrow_mut().schedule_once(0.0, callback);
                state.borrow_mut().timer = Some(timer);
            }
        }));

        state.borrow_mut().pause_binding = Some((signal, subscription));
    }

    /// Arms the one-shot timer for the next tick.
    fn schedule_timer(state: &Rc<RefCell<ScanTaskState>>, ctx: &HostContext, pause: PauseKind) {
        let (rate, delay) = {
            let s = state.borrow();
            let avatar = s.query.requesting_avatar;
            // Falls back to the base rate while the avatar is unresolved.
            let rate = if ctx.world.borrow().contains(avatar) {
                ctx.directory
                    .borrow()
                    .pushee(avatar)
                    .map_or(s.params.scan_rate, |p| {
                        mechanics::pushee_scan_rate(&*p, &s.params)
                    })
            } else {
                s.params.scan_rate
            };
            let delay = match pause {
                PauseKind::NotPaused => f64::from(rate),
                PauseKind::ActivationFailed => f64::from(s.activation_failure_delay),
            };
            (rate, delay)
        };

        let weak = Rc::downgrade(state);
        let callback: TimerCallback = Box::new(move |ctx: &HostContext| {
            if let Some(state) = weak.upgrade() {
                ScanTask::perform_scan(&state, ctx);
            }
        });
        let timer = ctx.timers.borrow_mut().schedule_once(delay, callback);
        eprintln!("DBG schedule_timer delay={delay} now={} pending={}", ctx.now(), ctx.timers.borrow().pending());

        let mut s = state.borrow_mut();
        s.current_scan_rate = rate;
        if let Some(old) = s.timer.replace(timer) {
            ctx.timers.borrow_mut().cancel(old);
        }
    }

    /// One scan tick: validate, sweep, gather, filter, notify, reschedule.
    fn perform_scan(state: &Rc<RefCell<ScanTaskState>>, ctx: &HostContext) {
        eprintln!("DBG perform_scan entered");
        {
            let mut s = state.borrow_mut();
            s.timer = None;
            if s.destroyed || s.suspended {
                eprintln!("DBG perform_scan early return destroyed={} suspended={}", s.destroyed, s.suspended);
                return;
            }
        }
        let avatar = state.borrow().query.requesting_avatar;

        // Preconditions. Every failure here is transient: skip the tick and
        // retry after the failure delay.
        let origin = {
            let world = ctx.world.borrow();
            match world.actor(avatar) {
                None => {
                    Self::fault(state, ctx, ScanFault::MissingAvatar);
                    return;
                }
                Some(actor) if !actor.has_begun_play => {
                    Self::fault(state, ctx, ScanFault::NotBegunPlay);
                    return;
                }
                Some(actor) => actor.position,
            }
        };
        let Some(pushee) = ctx.directory.borrow().pushee(avatar) else {
            Self::fault(state, ctx, ScanFault::MissingPusheeCapability);
            return;
        };
        let (base_shape, shape_rotation) = pushee.collision_shape();
        if !base_shape.is_valid() {
            Self::fault(state, ctx, ScanFault::InvalidCollisionShape);
            return;
        }

        // Widen the traced shape with the pushee's motion state: faster and
        // actively accelerating pawns look further ahead.
        let accelerating = mechanics::is_accelerating(pushee.acceleration());
        let ground_speed = mechanics::pushee_ground_speed(&*pushee);
        let (scan_shape, max_range) = {
            let s = state.borrow();
            (
                mechanics::scaled_scan_shape(&base_shape, &s.params, accelerating, ground_speed),
                mechanics::scan_range(accelerating, s.base_scan_range, &s.params),
            )
        };

        let channel = state.borrow().params.channel;
        let hits = ctx
            .world
            .borrow()
            .sweep(origin, shape_rotation, channel, &scan_shape, &[avatar]);
        eprintln!("DBG perform_scan origin={origin:?} shape={scan_shape:?} max_range={max_range} channel={channel:?} hits={hits:?}");

        // Push targets come from the first hit within range; an actor and
        // its components may each contribute one, deduplicated upstream.
        let targets: Vec<PusherHandle> = hits
            .iter()
            .find(|hit| hit.distance <= max_range)
            .map(|hit| ctx.directory.borrow().push_targets(hit.actor))
            .unwrap_or_default();

        Self::update_push_options(state, ctx, &targets);

        // The loop continues whether or not anything was found.
        Self::schedule_next(state, ctx, PauseKind::NotPaused);
    }

    /// Logs a transient fault and reschedules on the failure-delay path.
    fn fault(state: &Rc<RefCell<ScanTaskState>>, ctx: &HostContext, fault: ScanFault) {
        let avatar = state.borrow().query.requesting_avatar;
        warn!(avatar = %avatar, %fault, "scan tick skipped");
        Self::schedule_timer(state, ctx, PauseKind::ActivationFailed);
    }

    /// Gathers options from the targets, filters them to the activatable
    /// set, and notifies the delegate if the set changed.
    fn update_push_options(
        state: &Rc<RefCell<ScanTaskState>>,
        ctx: &HostContext,
        targets: &[PusherHandle],
    ) {
        let query = state.borrow().query.clone();

        let mut new_options: Vec<PushOption> = Vec::new();
        for handle in targets {
            let mut gathered = Vec::new();
            {
                let mut builder = crate::option::PushOptionBuilder::new(handle, &mut gathered);
                handle.target.gather_push_options(&query, &mut builder);
            }
            for mut option in gathered {
                if Self::resolve_activation(state, ctx, &mut option) {
                    new_options.push(option);
                }
            }
        }

        // The sort exists so two same-length sets can be compared
        // positionally; it is not a priority.
        new_options.sort_by_key(PushOption::sort_key);
        let changed = {
            let s = state.borrow();
            s.current_options.len() != new_options.len()
                || s.current_options
                    .iter()
                    .zip(&new_options)
                    .any(|(current, new)| current != new)
        };
        if !changed {
            return;
        }

        state.borrow_mut().current_options = new_options.clone();
        let delegate = state.borrow().delegate.clone();
        if let Some(delegate) = delegate.upgrade() {
            delegate
                .borrow_mut()
                .push_candidates_changed(&new_options, ctx);
        }
    }

    /// Resolves an option to a concrete, currently-activatable ability.
    ///
    /// Options carrying a remote system/handle pair are checked as-is.
    /// Grant-class options are resolved against the scanning side's own
    /// ability system, granting lazily and caching the handle per class so
    /// repeated scans don't re-grant.
    fn resolve_activation(
        state: &Rc<RefCell<ScanTaskState>>,
        ctx: &HostContext,
        option: &mut PushOption,
    ) -> bool {
        match option.activation.clone() {
            PushActivation::Remote { system, handle } => ctx
                .directory
                .borrow()
                .ability_system(system)
                .map_or(false, |sys| {
                    let sys = sys.borrow();
                    sys.has_handle(handle) && sys.can_activate(handle)
                }),
            PushActivation::Grant(class) => {
                let avatar = state.borrow().query.requesting_avatar;
                let Some(sys) = ctx.directory.borrow().ability_system(avatar) else {
                    return false;
                };

                let cached = state.borrow().grant_cache.get(&class).copied();
                let handle = match cached {
                    Some(handle) => handle,
                    None => {
                        let existing = sys.borrow().find_handle(&class);
                        let handle =
                            existing.unwrap_or_else(|| sys.borrow_mut().grant(&class));
                        state.borrow_mut().grant_cache.insert(class, handle);
                        handle
                    }
                };

                if sys.borrow().can_activate(handle) {
                    option.activation = PushActivation::Remote {
                        system: avatar,
                        handle,
                    };
                    true
                } else {
                    false
                }
            }
        }
    }
}

impl fmt::Debug for ScanTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.state.borrow();
        f.debug_struct("ScanTask")
            .field("avatar", &s.query.requesting_avatar)
            .field("current_scan_rate", &s.current_scan_rate)
            .field("suspended", &s.suspended)
            .field("destroyed", &s.destroyed)
            .field("options", &s.current_options.len())
            .finish()
    }
}
