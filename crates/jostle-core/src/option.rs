//! Push options and queries — the ephemeral per-tick candidate values.
//!
//! A [`PushOption`] is one proposed push interaction produced by one pusher
//! target during one scan tick. Options are created fresh every tick,
//! compared against the previous tick's set, and discarded; nothing here
//! outlives the tick that allocated it.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use glam::Vec3;

use crate::ability::{AbilityClassId, AbilityHandle};
use crate::capability::{PusherHandle, TargetId};
use stagehand::world::ActorId;

/// Positional tolerance for option equality, matching the "rough position"
/// semantics of candidate comparison.
pub const LOCATION_TOLERANCE: f32 = 1e-4;

/// How a push option activates when it wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushActivation {
    /// Grant this ability class on the scanning (pushee-side) ability system
    /// and trigger it there. The filter resolves this to `Remote` once the
    /// grant exists.
    Grant(AbilityClassId),
    /// Trigger a pre-granted ability on a remote system.
    Remote {
        /// Actor whose ability system hosts the ability.
        system: ActorId,
        /// Handle of the granted ability.
        handle: AbilityHandle,
    },
}

impl PushActivation {
    /// A stable secondary sort key; meaningful only for set comparison.
    #[must_use]
    pub fn sort_key(&self) -> u64 {
        match self {
            Self::Remote { handle, .. } => handle.as_u64(),
            Self::Grant(_) => u64::MAX,
        }
    }
}

/// The query passed into each target's candidate gathering call.
///
/// Owned by the scan tick; targets must not retain it. The avatar reference
/// is an id whose liveness is re-checked against the world, never an owning
/// pointer.
#[derive(Clone)]
pub struct PushQuery {
    /// The pawn requesting pushes (the one that will be displaced).
    pub requesting_avatar: ActorId,
    /// Optional opaque data a host wants to pass through to targets.
    pub payload: Option<Rc<dyn Any>>,
}

impl PushQuery {
    /// Creates a query for the given avatar with no extra payload.
    #[must_use]
    pub fn new(requesting_avatar: ActorId) -> Self {
        Self {
            requesting_avatar,
            payload: None,
        }
    }
}

impl fmt::Debug for PushQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushQuery")
            .field("requesting_avatar", &self.requesting_avatar)
            .field("has_payload", &self.payload.is_some())
            .finish()
    }
}

/// The fields a pusher target fills in when proposing a push.
///
/// The builder stamps the proposing target onto the finished [`PushOption`].
#[derive(Debug, Clone, PartialEq)]
pub struct PushProposal {
    /// World location of the pushee at proposal time.
    pub pushee_location: Vec3,
    /// Pushee forward vector; only used as the last-resort push direction.
    pub pushee_forward: Vec3,
    /// World location of the pusher at proposal time.
    pub pusher_location: Vec3,
    /// How the push activates.
    pub activation: PushActivation,
}

/// One candidate push interaction.
#[derive(Clone)]
pub struct PushOption {
    /// The pusher target that proposed this option — the one that will do
    /// the pushing, not the ability instigator.
    pub pusher: PusherHandle,
    /// World location of the pushee at proposal time.
    pub pushee_location: Vec3,
    /// Pushee forward vector; only used as the last-resort push direction.
    pub pushee_forward: Vec3,
    /// World location of the pusher at proposal time.
    pub pusher_location: Vec3,
    /// How the push activates.
    pub activation: PushActivation,
}

impl PushOption {
    /// A stable sort key for change detection: target identity first, then
    /// the activation handle. Not a priority.
    #[must_use]
    pub fn sort_key(&self) -> (TargetId, u64) {
        (self.pusher.id, self.activation.sort_key())
    }
}

impl PartialEq for PushOption {
    fn eq(&self, other: &Self) -> bool {
        self.pusher == other.pusher
            && self.activation == other.activation
            && self
                .pushee_location
                .abs_diff_eq(other.pushee_location, LOCATION_TOLERANCE)
            && self
                .pusher_location
                .abs_diff_eq(other.pusher_location, LOCATION_TOLERANCE)
    }
}

impl fmt::Debug for PushOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PushOption")
            .field("pusher", &self.pusher)
            .field("pushee_location", &self.pushee_location)
            .field("pusher_location", &self.pusher_location)
            .field("activation", &self.activation)
            .finish()
    }
}

/// Builder handed to
/// [`PusherTarget::gather_push_options`](crate::capability::PusherTarget::gather_push_options);
/// collects proposals and stamps the proposing target onto each.
pub struct PushOptionBuilder<'a> {
    scope: &'a PusherHandle,
    options: &'a mut Vec<PushOption>,
}

impl<'a> PushOptionBuilder<'a> {
    /// Creates a builder that appends to `options` on behalf of `scope`.
    #[must_use]
    pub fn new(scope: &'a PusherHandle, options: &'a mut Vec<PushOption>) -> Self {
        Self { scope, options }
    }

    /// Adds one proposal, attributed to the builder's target.
    pub fn add(&mut self, proposal: PushProposal) {
        self.options.push(PushOption {
            pusher: self.scope.clone(),
            pushee_location: proposal.pushee_location,
            pushee_forward: proposal.pushee_forward,
            pusher_location: proposal.pusher_location,
            activation: proposal.activation,
        });
    }
}
