//! Time-bounded motion modifiers on a pushee's movement simulation.
//!
//! [`PushForceTask`] turns a direction, strength, and duration into a
//! constant-force motion modifier installed into the pushee's
//! [`MovementSystem`], schedules its own removal, and guarantees the modifier
//! never outlives the owning ability: destroying the task removes the
//! modifier immediately and broadcasts a finished signal, whatever time is
//! left on the clock. A pushed character must never be stuck with a stale,
//! unremovable force because its ability was interrupted mid-replication.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use bitflags::bitflags;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use stagehand::signal::Signal;
use stagehand::timer::TimerId;

use crate::curve::Curve;
use crate::error::ForceError;
use crate::host::HostContext;

/// Default priority of push force modifiers.
pub const DEFAULT_FORCE_PRIORITY: u8 = 2;

bitflags! {
    /// Settings flags for a motion modifier.
    ///
    /// Serde impls come from the `bitflags` serde feature.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct ForceFlags: u8 {
        /// Keep gravity in charge of the vertical axis: the modifier's Z
        /// contribution is not accumulated.
        const IGNORE_Z_ACCUMULATE = 0b0000_0001;
    }
}

/// How a modifier combines with other motion sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AccumulateMode {
    /// Adds on top of other motion.
    #[default]
    Additive,
    /// Replaces other motion of lower priority.
    Override,
}

/// Identifier of an installed motion modifier, issued by the movement system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModifierId(u64);

impl ModifierId {
    /// Creates a modifier id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value of this identifier.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// A constant-force motion modifier specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceSpec {
    /// Normalized world direction of the force.
    pub direction: Vec3,
    /// Force magnitude.
    pub strength: f32,
    /// Seconds the modifier stays installed.
    pub duration: f32,
    /// Accumulation behavior.
    pub accumulate: AccumulateMode,
    /// Priority relative to other motion sources.
    pub priority: u8,
    /// Settings flags.
    pub flags: ForceFlags,
    /// Optional strength-over-lifetime curve.
    pub strength_over_time: Option<Curve>,
}

impl ForceSpec {
    /// Creates an additive spec with default priority and no flags. The
    /// direction is normalized; a zero direction stays zero.
    #[must_use]
    pub fn new(direction: Vec3, strength: f32, duration: f32) -> Self {
        Self {
            direction: direction.normalize_or_zero(),
            strength,
            duration,
            accumulate: AccumulateMode::default(),
            priority: DEFAULT_FORCE_PRIORITY,
            flags: ForceFlags::empty(),
            strength_over_time: None,
        }
    }

    /// Sets the accumulation mode.
    #[must_use]
    pub fn with_accumulate(mut self, accumulate: AccumulateMode) -> Self {
        self.accumulate = accumulate;
        self
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the settings flags.
    #[must_use]
    pub fn with_flags(mut self, flags: ForceFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the strength-over-lifetime curve.
    #[must_use]
    pub fn with_strength_over_time(mut self, curve: Curve) -> Self {
        self.strength_over_time = Some(curve);
        self
    }

    /// The force vector (direction times strength).
    #[must_use]
    pub fn force(&self) -> Vec3 {
        self.direction * self.strength
    }
}

/// Host-provided movement simulation for one actor.
pub trait MovementSystem {
    /// Installs a motion modifier. `None` means the movement simulation
    /// rejected it.
    fn apply_force(&mut self, spec: &ForceSpec) -> Option<ModifierId>;

    /// Removes an installed modifier. Unknown ids are ignored.
    fn remove_force(&mut self, id: ModifierId);

    /// Whether the movement simulation considers the modifier finished.
    /// Unknown ids count as finished.
    fn is_force_finished(&self, id: ModifierId) -> bool;

    /// Whether movement is enabled at all (a disabled mode rejects pushes).
    fn is_movement_enabled(&self) -> bool {
        true
    }
}

struct ForceState {
    movement: Weak<RefCell<dyn MovementSystem>>,
    modifier: Option<ModifierId>,
    timer: Option<TimerId>,
    finished: bool,
    on_finished: Signal<()>,
}

/// A bounded-duration, continuously-removable push force.
///
/// The task ends through whichever comes first: its own removal timer, the
/// movement system finishing the modifier, or [`destroy`](Self::destroy).
/// All paths are idempotent and all of them broadcast the finished signal
/// exactly once.
pub struct PushForceTask {
    state: Rc<RefCell<ForceState>>,
}

impl PushForceTask {
    /// Installs `spec` into `movement` and schedules its removal after
    /// `spec.duration`.
    ///
    /// # Errors
    ///
    /// [`ForceError::Rejected`] when the movement simulation refuses the
    /// modifier.
    pub fn apply(
        ctx: &HostContext,
        movement: &Rc<RefCell<dyn MovementSystem>>,
        spec: &ForceSpec,
    ) -> Result<Self, ForceError> {
        let Some(modifier) = movement.borrow_mut().apply_force(spec) else {
            tracing::warn!("movement system rejected push force");
            return Err(ForceError::Rejected);
        };

        let state = Rc::new(RefCell::new(ForceState {
            movement: Rc::downgrade(movement),
            modifier: Some(modifier),
            timer: None,
            finished: false,
            on_finished: Signal::new(),
        }));

        let weak = Rc::downgrade(&state);
        let timer = ctx.timers.borrow_mut().schedule_once(
            f64::from(spec.duration),
            Box::new(move |ctx: &HostContext| {
                if let Some(state) = weak.upgrade() {
                    Self::end(&state, ctx);
                }
            }),
        );
        state.borrow_mut().timer = Some(timer);

        Ok(Self { state })
    }

    /// The finished signal; emitted exactly once when the force ends.
    #[must_use]
    pub fn finished_signal(&self) -> Signal<()> {
        self.state.borrow().on_finished.clone()
    }

    /// True once the force has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.borrow().finished
    }

    /// True when the effect is over by either signal: the task ended, or the
    /// movement system reports the modifier finished on its own.
    #[must_use]
    pub fn has_timed_out(&self) -> bool {
        let state = self.state.borrow();
        if state.finished {
            return true;
        }
        let Some(movement) = state.movement.upgrade() else {
            return true;
        };
        state
            .modifier
            .map_or(true, |id| movement.borrow().is_force_finished(id))
    }

    /// Ends the force now: removes the modifier regardless of remaining
    /// duration, cancels the removal timer, and broadcasts the finished
    /// signal. Safe to call more than once.
    pub fn destroy(&self, ctx: &HostContext) {
        Self::end(&self.state, ctx);
    }

    fn end(state: &Rc<RefCell<ForceState>>, ctx: &HostContext) {
        let (modifier, movement, timer, on_finished) = {
            let mut s = state.borrow_mut();
            if s.finished {
                return;
            }
            s.finished = true;
            (
                s.modifier.take(),
                s.movement.upgrade(),
                s.timer.take(),
                s.on_finished.clone(),
            )
        };

        if let Some(timer) = timer {
            ctx.timers.borrow_mut().cancel(timer);
        }
        if let (Some(id), Some(movement)) = (modifier, movement) {
            movement.borrow_mut().remove_force(id);
        }
        on_finished.emit(());
    }
}

impl fmt::Debug for PushForceTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("PushForceTask")
            .field("modifier", &state.modifier)
            .field("finished", &state.finished)
            .finish()
    }
}
