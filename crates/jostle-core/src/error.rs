//! Error types for the push subsystem.
//!
//! The taxonomy is deliberately small: one configuration error that is fatal
//! to an activation ([`ActivationError::ZeroScanRange`] can never self-correct
//! by waiting), action-time errors that cancel a single push ability
//! activation, and [`ScanFault`] — the transient per-tick faults that are
//! logged and absorbed by rescheduling, never propagated.

use stagehand::world::ActorId;
use thiserror::Error;

/// Parameter validation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamsError {
    /// A scalar or interval field was negative.
    #[error("`{field}` must be non-negative, got {value}")]
    Negative {
        /// The offending field name.
        field: &'static str,
        /// The rejected value.
        value: f32,
    },
}

/// Failure to activate a scan ability.
///
/// These are the only errors that propagate out of the subsystem; everything
/// that can recover by waiting is handled internally by rescheduling.
#[derive(Debug, Error)]
pub enum ActivationError {
    /// The base scan range resolved to zero. Scanning would never find
    /// anything, so the activation is aborted rather than retried.
    #[error("base scan range is zero; the scan can never succeed")]
    ZeroScanRange,

    /// Configuration carried an invalid parameter.
    #[error("invalid parameters: {0}")]
    InvalidParams(#[from] ParamsError),
}

/// Failure to apply a push force.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForceError {
    /// The movement system rejected the motion modifier.
    #[error("movement system rejected the motion modifier")]
    Rejected,

    /// The movement system was destroyed before the force could be applied.
    #[error("movement system is no longer alive")]
    MovementGone,
}

/// Failure to activate a push action from a dispatched event.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The event payload carried no push target data.
    #[error("event payload carries no push target data")]
    MissingTargetData,

    /// The pushee does not expose the pushee capability.
    #[error("actor {0} does not expose the pushee capability")]
    MissingPusheeCapability(ActorId),

    /// The pushee has no movement system, or its movement is disabled.
    #[error("actor {0} has no usable movement system")]
    MovementUnavailable(ActorId),

    /// The force could not be installed.
    #[error(transparent)]
    Force(#[from] ForceError),
}

/// Transient per-tick scan faults.
///
/// These never terminate the scan loop; the tick is skipped and the scan is
/// rescheduled on the failure-delay path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScanFault {
    /// The avatar actor is missing from the world.
    #[error("avatar actor is missing")]
    MissingAvatar,

    /// The avatar actor has not finished initialization yet.
    #[error("avatar actor has not begun play")]
    NotBegunPlay,

    /// The avatar does not expose the pushee capability.
    #[error("avatar does not expose the pushee capability")]
    MissingPusheeCapability,

    /// The pushee's collision shape is degenerate.
    #[error("pushee collision shape is invalid")]
    InvalidCollisionShape,
}
