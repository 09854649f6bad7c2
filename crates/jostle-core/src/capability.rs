//! Pushee and pusher-target capabilities.
//!
//! Push behavior is expressed as two independent capability sets rather than
//! a common base class: anything can be a [`Pushee`] (it gets displaced),
//! anything can be a [`PusherTarget`] (it offers pushes), and an actor can be
//! both. Optional members carry default bodies so implementors only write
//! what they care about.

use std::fmt;
use std::rc::Rc;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use stagehand::shape::CollisionShape;
use stagehand::signal::Signal;
use stagehand::world::ActorId;

use crate::ability::EventTag;
use crate::option::{PushOptionBuilder, PushQuery};
use crate::payload::EventPayload;

/// Capability of an actor that can be displaced by pushes.
pub trait Pushee {
    /// Whether this actor can be pushed by anyone at all right now.
    ///
    /// Gate cheap global conditions here (dead, despawning, movement
    /// disabled) to prevent unnecessary ability activation.
    fn is_pushable(&self) -> bool;

    /// Whether this actor can currently be pushed by `pusher`.
    fn can_be_pushed_by(&self, pusher: ActorId) -> bool;

    /// Whether the pushee is moving on the ground (not airborne).
    fn is_moving_on_ground(&self) -> bool;

    /// The pushee's collision footprint and its world rotation.
    ///
    /// Use the default (spawn-time) shape: a footprint that changes at
    /// runtime — crouching, say — desyncs the predicted scan between peers.
    fn collision_shape(&self) -> (CollisionShape, Quat);

    /// Runtime strength scaling applied to pushes received.
    fn strength_scalar(&self) -> f32 {
        1.0
    }

    /// Strength override; `Some` replaces the strength computation.
    fn strength_override(&self) -> Option<f32> {
        None
    }

    /// Current acceleration; normalized after retrieval.
    fn acceleration(&self) -> Vec3 {
        Vec3::ZERO
    }

    /// Current velocity.
    fn velocity(&self) -> Vec3 {
        Vec3::ZERO
    }

    /// Optional pause notifier for the proximity scan.
    ///
    /// Return a signal and emit `true`/`false` on it to suspend and resume
    /// scanning — useful when significance, relevancy, or distance culling
    /// says nobody is around to push. The scan binds to it once and
    /// unsubscribes at teardown.
    fn scan_pause_signal(&self) -> Option<Signal<bool>> {
        None
    }
}

/// Capability of an actor (or one of its components) that offers pushes to
/// nearby pushees.
pub trait PusherTarget {
    /// Whether this target can push anyone at all right now.
    fn is_push_capable(&self) -> bool;

    /// Whether this target can currently push `pushee`.
    fn can_push(&self, pushee: ActorId) -> bool;

    /// Contributes zero or more push options for the querying pushee.
    fn gather_push_options(&self, query: &PushQuery, builder: &mut PushOptionBuilder<'_>);

    /// Lets the target rewrite the event payload before dispatch.
    fn customize_event_payload(&self, tag: &EventTag, payload: &mut EventPayload) {
        let _ = (tag, payload);
    }

    /// Runtime strength scaling applied to pushes this target causes.
    fn strength_scalar(&self) -> f32 {
        1.0
    }

    /// Strength override; `Some` replaces the strength computation.
    fn strength_override(&self) -> Option<f32> {
        None
    }
}

/// Stable identity of one registered pusher target.
///
/// Identities are assigned at registration and never reused, which makes
/// them usable as a stable sort key when comparing candidate sets across
/// ticks. The ordering carries no gameplay meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetId(u64);

impl TargetId {
    /// Creates a target id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value of this identity.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target:{}", self.0)
    }
}

/// A resolved reference to one pusher target: the capability object, its
/// stable identity, and the actor it belongs to.
#[derive(Clone)]
pub struct PusherHandle {
    /// Actor the target belongs to.
    pub actor: ActorId,
    /// Stable identity of the registration.
    pub id: TargetId,
    /// The capability object itself.
    pub target: Rc<dyn PusherTarget>,
}

impl PartialEq for PusherHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PusherHandle {}

impl fmt::Debug for PusherHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PusherHandle")
            .field("actor", &self.actor)
            .field("id", &self.id)
            .finish()
    }
}
