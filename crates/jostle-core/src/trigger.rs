//! Push triggering: turn the winning candidate into a dispatched event.
//!
//! The direction and strength are computed here, once, and shipped inside
//! the payload. Recomputing them later from the payload's actors would let
//! the two network sides observe different positions and desync.

use tracing::{debug, warn};

use crate::ability::{ActorInfo, PUSH_ABILITY_ACTIVATE};
use crate::host::HostContext;
use crate::mechanics;
use crate::option::{PushActivation, PushOption};
use crate::params::ScanParams;
use crate::payload::{EventPayload, PushTargetData, QuantizedNormal, StrengthData};
use stagehand::world::ActorId;

/// Strength scalars this close to 1.0 are left off the wire.
const IDENTITY_STRENGTH_TOLERANCE: f32 = 1e-4;

/// Dispatches a push for the winning candidate.
///
/// Returns true when the event was dispatched — the caller counts that as a
/// triggered push whether or not the target ability then activated
/// (ineligible abilities were already filtered out; late activation failure
/// is the host's concern). Returns false when either side's capability gate
/// refused, which silently skips this tick: the next scan re-evaluates.
pub fn trigger_push(
    pushee_actor: ActorId,
    option: &PushOption,
    params: &ScanParams,
    ctx: &HostContext,
) -> bool {
    let pusher_actor = option.pusher.actor;

    let Some(pushee) = ctx.directory.borrow().pushee(pushee_actor) else {
        return false;
    };

    // Both capability gates must agree. These are opaque, game-defined
    // checks; refusal is not an error.
    if !pushee.is_pushable() || !pushee.can_be_pushed_by(pusher_actor) {
        return false;
    }
    let pusher = &option.pusher.target;
    if !pusher.is_push_capable() || !pusher.can_push(pushee_actor) {
        return false;
    }

    let direction = {
        let mut rng = ctx.rng.borrow_mut();
        mechanics::push_direction(
            option.pushee_location,
            option.pusher_location,
            params.direction_is_2d,
            option.pushee_forward,
            &mut *rng,
        )
    };
    let distance = option.pushee_location.distance(option.pusher_location);

    let (scalar, overridden) = mechanics::combine_strength(
        pushee.strength_scalar(),
        pushee.strength_override(),
        pusher.strength_scalar(),
        pusher.strength_override(),
        params.override_handling,
    );

    // Leave the strength field off the wire when it carries no information.
    let strength = (overridden || (scalar - 1.0).abs() > IDENTITY_STRENGTH_TOLERANCE)
        .then_some(StrengthData {
            scalar,
            override_strength: overridden,
        });

    let mut payload = EventPayload::new(PUSH_ABILITY_ACTIVATE, pushee_actor, pusher_actor)
        .with_data(PushTargetData {
            direction: QuantizedNormal::from_vec3(direction),
            distance: Some(distance),
            strength,
        });

    // Escape hatch: the target may attach data only it knows about.
    option
        .pusher
        .target
        .customize_event_payload(&PUSH_ABILITY_ACTIVATE, &mut payload);

    let PushActivation::Remote { system, handle } = option.activation.clone() else {
        // The filter resolves every surviving option; an unresolved one here
        // is a host bug, not a recoverable condition.
        warn!(pushee = %pushee_actor, "winning push option was never resolved");
        return false;
    };
    let Some(target_system) = ctx.directory.borrow().ability_system(system) else {
        return false;
    };

    // The push is triggered through the pusher's ability graph: the target
    // actor from the (possibly customized) payload acts as the avatar.
    let actor_info = ActorInfo {
        owner_actor: pusher_actor,
        avatar_actor: payload.target,
    };
    let activated = target_system.borrow_mut().trigger_event(
        handle,
        &actor_info,
        &PUSH_ABILITY_ACTIVATE,
        &payload,
    );
    debug!(
        pushee = %pushee_actor,
        pusher = %pusher_actor,
        activated,
        "push dispatched"
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::{AbilityHandle, AbilitySystem, EventTag};
    use crate::capability::{Pushee, PusherHandle, PusherTarget, TargetId};
    use crate::option::{PushOptionBuilder, PushQuery};
    use crate::sync::NetRole;
    use glam::{Quat, Vec3};
    use stagehand::shape::CollisionShape;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct TestPushee {
        pushable: bool,
        scalar: f32,
        override_scalar: Option<f32>,
    }

    impl Default for TestPushee {
        fn default() -> Self {
            Self {
                pushable: true,
                scalar: 1.0,
                override_scalar: None,
            }
        }
    }

    impl Pushee for TestPushee {
        fn is_pushable(&self) -> bool {
            self.pushable
        }

        fn can_be_pushed_by(&self, _pusher: ActorId) -> bool {
            true
        }

        fn is_moving_on_ground(&self) -> bool {
            true
        }

        fn collision_shape(&self) -> (CollisionShape, Quat) {
            (CollisionShape::capsule(34.0, 88.0), Quat::IDENTITY)
        }

        fn strength_scalar(&self) -> f32 {
            self.scalar
        }

        fn strength_override(&self) -> Option<f32> {
            self.override_scalar
        }
    }

    struct TestPusher {
        capable: bool,
        annotate: bool,
    }

    impl Default for TestPusher {
        fn default() -> Self {
            Self {
                capable: true,
                annotate: false,
            }
        }
    }

    impl PusherTarget for TestPusher {
        fn is_push_capable(&self) -> bool {
            self.capable
        }

        fn can_push(&self, _pushee: ActorId) -> bool {
            true
        }

        fn gather_push_options(&self, _query: &PushQuery, _builder: &mut PushOptionBuilder<'_>) {}

        fn customize_event_payload(&self, _tag: &EventTag, payload: &mut EventPayload) {
            if self.annotate {
                payload.annotations.insert("stagger".to_string(), 1.0);
            }
        }
    }

    #[derive(Default)]
    struct RecordingSystem {
        events: Vec<(AbilityHandle, ActorInfo, EventPayload)>,
    }

    impl AbilitySystem for RecordingSystem {
        fn grant(&mut self, _class: &crate::ability::AbilityClassId) -> AbilityHandle {
            AbilityHandle::new(0)
        }

        fn find_handle(&self, _class: &crate::ability::AbilityClassId) -> Option<AbilityHandle> {
            None
        }

        fn has_handle(&self, _handle: AbilityHandle) -> bool {
            true
        }

        fn can_activate(&self, _handle: AbilityHandle) -> bool {
            true
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

    struct Fixture {
        ctx: HostContext,
        pushee: ActorId,
        pusher: ActorId,
        system: Rc<RefCell<RecordingSystem>>,
        option: PushOption,
    }

    fn fixture(pushee: TestPushee, pusher: TestPusher) -> Fixture {
        let ctx = HostContext::new(NetRole::Standalone, 99);
        let pushee_actor = ActorId::new(1);
        let pusher_actor = ActorId::new(2);

        let system = Rc::new(RefCell::new(RecordingSystem::default()));
        let pusher_rc: Rc<dyn PusherTarget> = Rc::new(pusher);
        {
            let mut directory = ctx.directory.borrow_mut();
            directory.register_pushee(pushee_actor, Rc::new(pushee));
            directory.register_ability_system(pusher_actor, system.clone());
        }

        let option = PushOption {
            pusher: PusherHandle {
                actor: pusher_actor,
                id: TargetId::new(1),
                target: pusher_rc,
            },
            pushee_location: Vec3::ZERO,
            pushee_forward: Vec3::X,
            pusher_location: Vec3::new(200.0, 0.0, 0.0),
            activation: PushActivation::Remote {
                system: pusher_actor,
                handle: AbilityHandle::new(5),
            },
        };

        Fixture {
            ctx,
            pushee: pushee_actor,
            pusher: pusher_actor,
            system,
            option,
        }
    }

    #[test]
    fn dispatches_with_direction_away_from_pusher() {
        let f = fixture(TestPushee::default(), TestPusher::default());
        let pushed = trigger_push(f.pushee, &f.option, &ScanParams::default(), &f.ctx);
        assert!(pushed);

        let events = &f.system.borrow().events;
        assert_eq!(events.len(), 1);
        let (handle, actor_info, payload) = &events[0];
        assert_eq!(*handle, AbilityHandle::new(5));
        assert_eq!(actor_info.owner_actor, f.pusher);
        assert_eq!(actor_info.avatar_actor, f.pusher);

        let data = payload.data.unwrap();
        assert!(data
            .direction
            .to_vec3()
            .abs_diff_eq(Vec3::new(-1.0, 0.0, 0.0), 1e-3));
        assert_eq!(data.distance, Some(200.0));
    }

    #[test]
    fn identity_strength_is_omitted() {
        let f = fixture(TestPushee::default(), TestPusher::default());
        trigger_push(f.pushee, &f.option, &ScanParams::default(), &f.ctx);

        let payload = &f.system.borrow().events[0].2;
        assert!(payload.data.unwrap().strength.is_none());
        assert_eq!(payload.effective_strength(), (1.0, false));
    }

    #[test]
    fn non_identity_strength_is_carried() {
        let f = fixture(
            TestPushee {
                scalar: 2.0,
                ..TestPushee::default()
            },
            TestPusher::default(),
        );
        trigger_push(f.pushee, &f.option, &ScanParams::default(), &f.ctx);

        let payload = &f.system.borrow().events[0].2;
        let strength = payload.data.unwrap().strength.unwrap();
        assert_eq!(strength.scalar, 2.0);
        assert!(!strength.override_strength);
    }

    #[test]
    fn override_is_flagged() {
        let f = fixture(
            TestPushee {
                override_scalar: Some(1.0),
                ..TestPushee::default()
            },
            TestPusher::default(),
        );
        trigger_push(f.pushee, &f.option, &ScanParams::default(), &f.ctx);

        // Scalar 1.0 with an active override must still ship.
        let payload = &f.system.borrow().events[0].2;
        let strength = payload.data.unwrap().strength.unwrap();
        assert_eq!(strength.scalar, 1.0);
        assert!(strength.override_strength);
    }

    #[test]
    fn refusing_pushee_skips_silently() {
        let f = fixture(
            TestPushee {
                pushable: false,
                ..TestPushee::default()
            },
            TestPusher::default(),
        );
        assert!(!trigger_push(
            f.pushee,
            &f.option,
            &ScanParams::default(),
            &f.ctx
        ));
        assert!(f.system.borrow().events.is_empty());
    }

    #[test]
    fn refusing_pusher_skips_silently() {
        let f = fixture(
            TestPushee::default(),
            TestPusher {
                capable: false,
                ..TestPusher::default()
            },
        );
        assert!(!trigger_push(
            f.pushee,
            &f.option,
            &ScanParams::default(),
            &f.ctx
        ));
    }

    #[test]
    fn target_customization_reaches_the_payload() {
        let f = fixture(
            TestPushee::default(),
            TestPusher {
                annotate: true,
                ..TestPusher::default()
            },
        );
        trigger_push(f.pushee, &f.option, &ScanParams::default(), &f.ctx);

        let payload = &f.system.borrow().events[0].2;
        assert_eq!(payload.annotations.get("stagger"), Some(&1.0));
    }

    #[test]
    fn coincident_actors_still_get_a_unit_direction() {
        let mut f = fixture(TestPushee::default(), TestPusher::default());
        f.option.pusher_location = Vec3::ZERO;
        trigger_push(f.pushee, &f.option, &ScanParams::default(), &f.ctx);

        let data = f.system.borrow().events[0].2.data.unwrap();
        let direction = data.direction.to_vec3();
        assert!((direction.length() - 1.0).abs() < 1e-3);
    }
}
