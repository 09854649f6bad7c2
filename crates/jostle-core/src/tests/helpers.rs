//! Shared fixtures for integration tests.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use glam::{Quat, Vec3};

use crate::ability::{
    AbilityClassId, AbilityHandle, AbilitySystem, ActorInfo, EventTag,
};
use crate::capability::{Pushee, PusherTarget};
use crate::force::{ForceSpec, ModifierId, MovementSystem};
use crate::host::HostContext;
use crate::option::{PushActivation, PushOptionBuilder, PushProposal, PushQuery};
use crate::payload::EventPayload;
use crate::sync::NetRole;
use stagehand::shape::CollisionShape;
use stagehand::signal::Signal;
use stagehand::world::{ActorId, ActorState, CollisionChannel, World};

/// Default character footprint used across tests.
pub fn character_shape() -> CollisionShape {
    CollisionShape::capsule(34.0, 88.0)
}

/// Pushee with externally adjustable motion state.
pub struct TestPushee {
    pub pushable: Cell<bool>,
    pub velocity: Cell<Vec3>,
    pub acceleration: Cell<Vec3>,
    pub pause: Signal<bool>,
    pub shape: CollisionShape,
}

impl TestPushee {
    pub fn new() -> Self {
        Self {
            pushable: Cell::new(true),
            velocity: Cell::new(Vec3::ZERO),
            acceleration: Cell::new(Vec3::ZERO),
            pause: Signal::new(),
            shape: character_shape(),
        }
    }
}

impl Pushee for TestPushee {
    fn is_pushable(&self) -> bool {
        self.pushable.get()
    }

    fn can_be_pushed_by(&self, _pusher: ActorId) -> bool {
        true
    }

    fn is_moving_on_ground(&self) -> bool {
        true
    }

    fn collision_shape(&self) -> (CollisionShape, Quat) {
        (self.shape, Quat::IDENTITY)
    }

    fn velocity(&self) -> Vec3 {
        self.velocity.get()
    }

    fn acceleration(&self) -> Vec3 {
        self.acceleration.get()
    }

    fn scan_pause_signal(&self) -> Option<Signal<bool>> {
        Some(self.pause.clone())
    }
}

/// Pusher target proposing one option with live world positions.
///
/// The activation is either a grant-class (resolved on the scanning side)
/// or a pre-granted remote handle, covering both dispatch patterns.
pub struct TestPusher {
    pub actor: ActorId,
    pub world: Rc<RefCell<World>>,
    pub activation: PushActivation,
    pub capable: Cell<bool>,
}

impl PusherTarget for TestPusher {
    fn is_push_capable(&self) -> bool {
        self.capable.get()
    }

    fn can_push(&self, _pushee: ActorId) -> bool {
        true
    }

    fn gather_push_options(&self, query: &PushQuery, builder: &mut PushOptionBuilder<'_>) {
        let world = self.world.borrow();
        let (Some(pushee), Some(pusher)) = (
            world.actor(query.requesting_avatar),
            world.actor(self.actor),
        ) else {
            return;
        };
        builder.add(PushProposal {
            pushee_location: pushee.position,
            pushee_forward: pushee.forward(),
            pusher_location: pusher.position,
            activation: self.activation.clone(),
        });
    }
}

/// Ability system that grants handles and records dispatched events.
#[derive(Default)]
pub struct TestAbilitySystem {
    next: u64,
    pub grants: u32,
    pub activatable: bool,
    granted: BTreeMap<AbilityClassId, AbilityHandle>,
    pub events: Vec<(AbilityHandle, ActorInfo, EventPayload)>,
}

impl TestAbilitySystem {
    pub fn new() -> Self {
        Self {
            activatable: true,
            ..Self::default()
        }
    }

    /// Pre-grants a class, as a host would for the grant-on-target pattern.
    pub fn pre_grant(&mut self, class: &AbilityClassId) -> AbilityHandle {
        self.grant(class)
    }
}

impl AbilitySystem for TestAbilitySystem {
    fn grant(&mut self, class: &AbilityClassId) -> AbilityHandle {
        self.grants += 1;
        let handle = AbilityHandle::new(self.next);
        self.next += 1;
        self.granted.insert(class.clone(), handle);
        handle
    }

    fn find_handle(&self, class: &AbilityClassId) -> Option<AbilityHandle> {
        self.granted.get(class).copied()
    }

    fn has_handle(&self, handle: AbilityHandle) -> bool {
        self.granted.values().any(|h| *h == handle)
    }

    fn can_activate(&self, _handle: AbilityHandle) -> bool {
        self.activatable
    }

    fn trigger_event(
        &mut self,
        handle: AbilityHandle,
        actor_info: &ActorInfo,
        _tag: &EventTag,
        payload: &EventPayload,
    ) -> bool {
        self.events.push((handle, *actor_info, payload.clone()));
        true
    }
}

/// Movement system that records installed force specs.
#[derive(Default)]
pub struct TestMovement {
    next: u64,
    pub active: Vec<(ModifierId, ForceSpec)>,
}

impl MovementSystem for TestMovement {
    fn apply_force(&mut self, spec: &ForceSpec) -> Option<ModifierId> {
        let id = ModifierId::new(self.next);
        self.next += 1;
        self.active.push((id, spec.clone()));
        Some(id)
    }

    fn remove_force(&mut self, id: ModifierId) {
        self.active.retain(|(active, _)| *active != id);
    }

    fn is_force_finished(&self, id: ModifierId) -> bool {
        !self.active.iter().any(|(active, _)| *active == id)
    }
}

/// One fully wired character: world actor, pushee capability, ability
/// system, and movement system.
pub struct Character {
    pub actor: ActorId,
    pub pushee: Rc<TestPushee>,
    pub system: Rc<RefCell<TestAbilitySystem>>,
    pub movement: Rc<RefCell<TestMovement>>,
}

/// Spawns a character at `position` with every capability registered.
pub fn spawn_character(ctx: &HostContext, position: Vec3) -> Character {
    let actor = ctx.world.borrow_mut().spawn(
        ActorState::new(position, character_shape()).with_channel(CollisionChannel::Pawn),
    );

    let pushee = Rc::new(TestPushee::new());
    let system = Rc::new(RefCell::new(TestAbilitySystem::new()));
    let movement = Rc::new(RefCell::new(TestMovement::default()));
    {
        let mut directory = ctx.directory.borrow_mut();
        directory.register_pushee(actor, pushee.clone());
        directory.register_ability_system(actor, system.clone());
        directory.register_movement(actor, movement.clone());
    }

    Character {
        actor,
        pushee,
        system,
        movement,
    }
}

/// Registers a pusher target on `character` offering `activation`.
pub fn register_pusher(
    ctx: &HostContext,
    character: &Character,
    activation: PushActivation,
) -> Rc<TestPusher> {
    let pusher = Rc::new(TestPusher {
        actor: character.actor,
        world: Rc::clone(&ctx.world),
        activation,
        capable: Cell::new(true),
    });
    ctx.directory
        .borrow_mut()
        .register_pusher(character.actor, pusher.clone());
    pusher
}

/// Host context on the pawn channel with a fixed seed.
pub fn standalone_ctx() -> HostContext {
    init_tracing();
    HostContext::new(NetRole::Standalone, 0xC0FFEE)
}

/// Installs a test log subscriber; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
