//! Capability registry for actors.
//!
//! The host engine resolves "does this actor support X" dynamically; here
//! that is an explicit registry. Capabilities are registered once per actor
//! (pushers may also be registered per component, so an actor can expose
//! several) and looked up by [`ActorId`]. Lookups hand out `Rc` clones — the
//! registry stays the owner, and callers drop their clones at the end of the
//! tick.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use stagehand::world::ActorId;

use crate::ability::AbilitySystem;
use crate::capability::{Pushee, PusherHandle, PusherTarget, TargetId};
use crate::force::MovementSystem;

/// Registry mapping actors to their capabilities and systems.
///
/// # Example
///
/// ```
/// use std::rc::Rc;
/// use glam::Quat;
/// use stagehand::shape::CollisionShape;
/// use stagehand::world::ActorId;
/// use jostle_core::capability::Pushee;
/// use jostle_core::directory::ActorDirectory;
///
/// struct Crate;
///
/// impl Pushee for Crate {
///     fn is_pushable(&self) -> bool { true }
///     fn can_be_pushed_by(&self, _pusher: ActorId) -> bool { true }
///     fn is_moving_on_ground(&self) -> bool { true }
///     fn collision_shape(&self) -> (CollisionShape, Quat) {
///         (CollisionShape::sphere(20.0), Quat::IDENTITY)
///     }
/// }
///
/// let mut directory = ActorDirectory::new();
/// let actor = ActorId::new(1);
/// directory.register_pushee(actor, Rc::new(Crate));
/// assert!(directory.pushee(actor).is_some());
/// ```
#[derive(Default)]
pub struct ActorDirectory {
    pushees: BTreeMap<ActorId, Rc<dyn Pushee>>,
    pushers: BTreeMap<ActorId, Vec<(TargetId, Rc<dyn PusherTarget>)>>,
    ability_systems: BTreeMap<ActorId, Rc<RefCell<dyn AbilitySystem>>>,
    movement_systems: BTreeMap<ActorId, Rc<RefCell<dyn MovementSystem>>>,
    next_target_id: u64,
}

impl ActorDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the pushee capability for an actor, replacing any previous
    /// registration.
    pub fn register_pushee(&mut self, actor: ActorId, pushee: Rc<dyn Pushee>) {
        self.pushees.insert(actor, pushee);
    }

    /// Returns the pushee capability of an actor, if registered.
    #[must_use]
    pub fn pushee(&self, actor: ActorId) -> Option<Rc<dyn Pushee>> {
        self.pushees.get(&actor).cloned()
    }

    /// Registers a pusher target on an actor.
    ///
    /// An actor may carry several — one on the actor itself and one per
    /// component — each with its own stable [`TargetId`].
    pub fn register_pusher(&mut self, actor: ActorId, target: Rc<dyn PusherTarget>) -> TargetId {
        let id = TargetId::new(self.next_target_id);
        self.next_target_id += 1;
        self.pushers.entry(actor).or_default().push((id, target));
        id
    }

    /// Returns every pusher target registered on an actor, in registration
    /// order. Each registration appears at most once.
    #[must_use]
    pub fn push_targets(&self, actor: ActorId) -> Vec<PusherHandle> {
        self.pushers
            .get(&actor)
            .map(|targets| {
                targets
                    .iter()
                    .map(|(id, target)| PusherHandle {
                        actor,
                        id: *id,
                        target: Rc::clone(target),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Registers the ability system for an actor.
    pub fn register_ability_system(
        &mut self,
        actor: ActorId,
        system: Rc<RefCell<dyn AbilitySystem>>,
    ) {
        self.ability_systems.insert(actor, system);
    }

    /// Returns the ability system of an actor, if registered.
    #[must_use]
    pub fn ability_system(&self, actor: ActorId) -> Option<Rc<RefCell<dyn AbilitySystem>>> {
        self.ability_systems.get(&actor).cloned()
    }

    /// Registers the movement system for an actor.
    pub fn register_movement(&mut self, actor: ActorId, movement: Rc<RefCell<dyn MovementSystem>>) {
        self.movement_systems.insert(actor, movement);
    }

    /// Returns the movement system of an actor, if registered.
    #[must_use]
    pub fn movement(&self, actor: ActorId) -> Option<Rc<RefCell<dyn MovementSystem>>> {
        self.movement_systems.get(&actor).cloned()
    }

    /// Drops every registration for an actor.
    pub fn unregister_actor(&mut self, actor: ActorId) {
        self.pushees.remove(&actor);
        self.pushers.remove(&actor);
        self.ability_systems.remove(&actor);
        self.movement_systems.remove(&actor);
    }
}

impl fmt::Debug for ActorDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorDirectory")
            .field("pushees", &self.pushees.len())
            .field("pushers", &self.pushers.len())
            .field("ability_systems", &self.ability_systems.len())
            .field("movement_systems", &self.movement_systems.len())
            .finish()
    }
}
