//! Actor world with channel-filtered shape sweeps.
//!
//! The world is the host-engine stand-in for scene and physics state: a
//! registry of actor poses and collision footprints that shape sweeps run
//! against. Storage is a `BTreeMap` so iteration — and therefore hit order
//! among equidistant actors — is deterministic.

use std::collections::BTreeMap;
use std::fmt;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::shape::{shapes_overlap, CollisionShape};

/// Unique identifier for an actor.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(u64);

impl ActorId {
    /// Creates an `ActorId` from a raw value.
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

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorId({})", self.0)
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ActorId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

/// Collision channel a query or actor participates in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CollisionChannel {
    /// Default scene visibility channel.
    #[default]
    Visibility,
    /// Character/pawn channel.
    Pawn,
    /// Game-defined custom channel.
    Custom(u8),
}

/// Pose and collision state of one actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorState {
    /// World position.
    pub position: Vec3,
    /// World rotation.
    pub rotation: Quat,
    /// Collision footprint.
    pub shape: CollisionShape,
    /// Channel this actor blocks.
    pub channel: CollisionChannel,
    /// Whether the actor has finished initialization.
    pub has_begun_play: bool,
}

impl ActorState {
    /// Creates an actor state at a position with a shape, on the default
    /// channel, already initialized.
    #[must_use]
    pub fn new(position: Vec3, shape: CollisionShape) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            shape,
            channel: CollisionChannel::default(),
            has_begun_play: true,
        }
    }

    /// Sets the collision channel.
    #[must_use]
    pub fn with_channel(mut self, channel: CollisionChannel) -> Self {
        self.channel = channel;
        self
    }

    /// Sets the rotation.
    #[must_use]
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Marks the actor as not yet initialized.
    #[must_use]
    pub fn not_begun_play(mut self) -> Self {
        self.has_begun_play = false;
        self
    }

    /// Returns the actor's forward vector (local +X).
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::X
    }
}

/// One sweep hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepHit {
    /// The actor that was hit.
    pub actor: ActorId,
    /// Distance from the sweep origin to the actor's center.
    pub distance: f32,
    /// The hit actor's center at sweep time.
    pub location: Vec3,
}

/// Registry of actors with spatial sweep queries.
///
/// # Example
///
/// ```
/// use glam::Vec3;
/// use stagehand::shape::CollisionShape;
/// use stagehand::world::{ActorId, ActorState, CollisionChannel, World};
///
/// let mut world = World::new();
/// let a = world.spawn(ActorState::new(Vec3::ZERO, CollisionShape::capsule(34.0, 88.0)));
/// let b = world.spawn(ActorState::new(
///     Vec3::new(50.0, 0.0, 0.0),
///     CollisionShape::capsule(34.0, 88.0),
/// ));
///
/// let hits = world.sweep(
///     Vec3::ZERO,
///     glam::Quat::IDENTITY,
///     CollisionChannel::Visibility,
///     &CollisionShape::sphere(60.0),
///     &[a],
/// );
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].actor, b);
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct World {
    actors: BTreeMap<ActorId, ActorState>,
    next_id: u64,
}

impl World {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self {
            actors: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// Spawns an actor, returning its id.
    pub fn spawn(&mut self, state: ActorState) -> ActorId {
        let id = ActorId::new(self.next_id);
        self.next_id += 1;
        self.actors.insert(id, state);
        id
    }

    /// Removes an actor. Returns true if it existed.
    pub fn despawn(&mut self, id: ActorId) -> bool {
        self.actors.remove(&id).is_some()
    }

    /// Returns an actor's state, if alive.
    #[must_use]
    pub fn actor(&self, id: ActorId) -> Option<&ActorState> {
        self.actors.get(&id)
    }

    /// Returns a mutable reference to an actor's state, if alive.
    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut ActorState> {
        self.actors.get_mut(&id)
    }

    /// Returns true if the actor exists.
    #[must_use]
    pub fn contains(&self, id: ActorId) -> bool {
        self.actors.contains_key(&id)
    }

    /// Returns the number of actors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// Returns true if the world has no actors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Sweeps a shape at `origin` against all actors on `channel`.
    ///
    /// The sweep itself covers a negligible distance (the caller nudges the
    /// end point so static queries still register), so the test reduces to an
    /// overlap at the origin. Hits are ordered by (distance, actor id).
    /// `rotation` is accepted for interface parity; upright capsules and
    /// bounding-sphere boxes make it a no-op here.
    #[must_use]
    pub fn sweep(
        &self,
        origin: Vec3,
        rotation: Quat,
        channel: CollisionChannel,
        shape: &CollisionShape,
        ignore: &[ActorId],
    ) -> Vec<SweepHit> {
        let _ = rotation;
        if !shape.is_valid() {
            return Vec::new();
        }

        let mut hits: Vec<SweepHit> = self
            .actors
            .iter()
            .filter(|(id, _)| !ignore.contains(id))
            .filter(|(_, state)| state.channel == channel)
            .filter(|(_, state)| shapes_overlap(shape, origin, &state.shape, state.position))
            .map(|(id, state)| SweepHit {
                actor: *id,
                distance: origin.distance(state.position),
                location: state.position,
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.actor.cmp(&b.actor))
        });
        hits
    }
}
