//! The scanning ability: owns the scan loop and triggers winning pushes.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use stagehand::shape::NEARLY_ZERO_EXTENT;
use stagehand::world::ActorId;

use crate::error::ActivationError;
use crate::host::HostContext;
use crate::option::{PushOption, PushQuery};
use crate::params::ScanParams;
use crate::scan::{ScanDelegate, ScanTask};
use crate::sync::{SyncGate, SyncSettings};
use crate::trigger;

/// Configuration of one scan ability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanAbilityConfig {
    /// Scan behavior.
    pub scan: ScanParams,
    /// Net-sync policy thresholds.
    pub sync: SyncSettings,
    /// Retry delay after a failed scan tick, in seconds.
    pub activation_failure_delay: f32,
    /// Base scan range override. `None` derives it from the pushee's
    /// collision shape (its largest extent) at activation.
    pub base_scan_range: Option<f32>,
}

impl Default for ScanAbilityConfig {
    fn default() -> Self {
        Self {
            scan: ScanParams::default(),
            sync: SyncSettings::default(),
            activation_failure_delay: 0.5,
            base_scan_range: None,
        }
    }
}

/// Listener invoked whenever the candidate set changes.
pub type OptionsListener = Box<dyn FnMut(&[PushOption])>;

struct ScanAbilityState {
    avatar: ActorId,
    config: ScanAbilityConfig,
    gate: SyncGate,
    current_options: Vec<PushOption>,
    listener: Option<OptionsListener>,
}

impl ScanDelegate for ScanAbilityState {
    fn should_wait_for_net_sync(&self, now: f64) -> bool {
        self.gate.should_sync(now)
    }

    fn consume_wait_for_net_sync(&mut self, now: f64) {
        self.gate.consume(now);
    }

    fn push_candidates_changed(&mut self, options: &[PushOption], ctx: &HostContext) {
        self.current_options = options.to_vec();
        if let Some(listener) = &mut self.listener {
            listener(options);
        }

        // Trigger the winner immediately. The set is ordered for comparison,
        // not priority, so "first" is simply a consistent tie-break.
        if let Some(winner) = self.current_options.first().cloned() {
            let pushed = trigger::trigger_push(self.avatar, &winner, &self.config.scan, ctx);
            if pushed {
                self.gate.record_push(ctx.now());
            }
        }
    }
}

/// The pushee-side scanning ability.
///
/// Activation wires up a [`ScanTask`]; from then on the ability reacts to
/// candidate-set changes by dispatching a push for the winning option, and
/// paces net syncs through its [`SyncGate`]. Ending the ability tears the
/// task down, cancelling timers, delegates, and barriers.
///
/// One instance serves one avatar actor for its whole lifetime.
pub struct PushScanAbility {
    state: Rc<RefCell<ScanAbilityState>>,
    task: Option<ScanTask>,
}

impl PushScanAbility {
    /// Creates an inactive ability for `avatar`.
    #[must_use]
    pub fn new(avatar: ActorId, config: ScanAbilityConfig) -> Self {
        let gate = SyncGate::new(config.sync, 0.0);
        Self {
            state: Rc::new(RefCell::new(ScanAbilityState {
                avatar,
                config,
                gate,
                current_options: Vec::new(),
                listener: None,
            })),
            task: None,
        }
    }

    /// Registers a listener for candidate-set changes.
    pub fn set_options_listener(&self, listener: OptionsListener) {
        self.state.borrow_mut().listener = Some(listener);
    }

    /// Activates the ability and starts scanning.
    ///
    /// # Errors
    ///
    /// [`ActivationError::ZeroScanRange`] when the resolved base scan range
    /// is (near) zero — scanning can never succeed, so rather than retrying
    /// forever the activation itself is aborted. Also fails on invalid
    /// parameters.
    pub fn activate(&mut self, ctx: &HostContext) -> Result<(), ActivationError> {
        let (avatar, config) = {
            let s = self.state.borrow();
            (s.avatar, s.config.clone())
        };
        config.scan.validate()?;

        let base_scan_range = config.base_scan_range.unwrap_or_else(|| {
            ctx.directory
                .borrow()
                .pushee(avatar)
                .map_or(0.0, |pushee| pushee.collision_shape().0.max_extent())
        });
        if base_scan_range < NEARLY_ZERO_EXTENT {
            return Err(ActivationError::ZeroScanRange);
        }

        // The idle-sync rule measures from activation, not from time zero.
        self.state.borrow_mut().gate = SyncGate::new(config.sync, ctx.now());

        let state: Rc<RefCell<dyn ScanDelegate>> = self.state.clone();
        let delegate: Weak<RefCell<dyn ScanDelegate>> = Rc::downgrade(&state);
        let task = ScanTask::new(
            config.scan,
            PushQuery::new(avatar),
            base_scan_range,
            config.activation_failure_delay,
            delegate,
        );
        task.activate(ctx);
        self.task = Some(task);
        Ok(())
    }

    /// Ends the ability, tearing down the scan loop. Idempotent.
    pub fn end(&mut self, ctx: &HostContext) {
        if let Some(task) = self.task.take() {
            task.destroy(ctx);
        }
        self.state.borrow_mut().current_options.clear();
    }

    /// True while the scan loop is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    /// The avatar this ability scans for.
    #[must_use]
    pub fn avatar(&self) -> ActorId {
        self.state.borrow().avatar
    }

    /// The candidate set from the most recent tick.
    #[must_use]
    pub fn current_options(&self) -> Vec<PushOption> {
        self.state.borrow().current_options.clone()
    }

    /// Pushes triggered since the last net sync.
    #[must_use]
    pub fn pushes_since_last_sync(&self) -> u32 {
        self.state.borrow().gate.pushes_since_last_sync()
    }

    /// The underlying scan task, while active.
    #[must_use]
    pub fn task(&self) -> Option<&ScanTask> {
        self.task.as_ref()
    }
}

impl fmt::Debug for PushScanAbility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.state.borrow();
        f.debug_struct("PushScanAbility")
            .field("avatar", &s.avatar)
            .field("active", &self.task.is_some())
            .field("options", &s.current_options.len())
            .finish()
    }
}
