//! The push action: event payload in, force on the pushee out.

use glam::Vec3;

use crate::error::ActionError;
use crate::force::{AccumulateMode, ForceFlags, ForceSpec, PushForceTask};
use crate::host::HostContext;
use crate::mechanics;
use crate::params::ActionParams;
use crate::payload::EventPayload;
use stagehand::shape::CollisionShape;
use stagehand::world::ActorId;

/// Priority of the force a push action installs; above the default so a
/// push wins against ambient modifiers.
pub const ACTION_FORCE_PRIORITY: u8 = 5;

/// The ability that executes a push on the pushee when the dispatched event
/// arrives.
///
/// The event carries everything position-dependent (direction, distance,
/// strength data) precomputed by the trigger side; this ability only folds
/// in its own strength curves and installs the force. Pushes displace along
/// the ground plane and leave gravity alone.
#[derive(Debug, Clone, PartialEq)]
pub struct PushActionAbility {
    params: ActionParams,
}

impl PushActionAbility {
    /// Creates an action ability with the given parameters.
    #[must_use]
    pub fn new(params: ActionParams) -> Self {
        Self { params }
    }

    /// The configured parameters.
    #[must_use]
    pub fn params(&self) -> &ActionParams {
        &self.params
    }

    /// Whether this ability could activate for `avatar` at all.
    #[must_use]
    pub fn can_activate(&self, avatar: ActorId, ctx: &HostContext) -> bool {
        ctx.directory
            .borrow()
            .pushee(avatar)
            .map_or(false, |pushee| pushee.is_pushable())
    }

    /// Activates the push from a dispatched event payload, installing a
    /// bounded-duration force on the pushee's movement.
    ///
    /// # Errors
    ///
    /// Fails when the payload carries no target data, when the pushee lacks
    /// the capability or a usable movement system, or when the movement
    /// simulation rejects the force. All of these cancel this activation
    /// only; nothing is retried.
    pub fn activate_from_event(
        &self,
        payload: &EventPayload,
        ctx: &HostContext,
    ) -> Result<PushForceTask, ActionError> {
        // The pushee is the event instigator; the pusher is the target.
        let pushee_actor = payload.instigator;
        let pusher_actor = payload.target;

        let pushee = ctx
            .directory
            .borrow()
            .pushee(pushee_actor)
            .ok_or(ActionError::MissingPusheeCapability(pushee_actor))?;
        let movement = ctx
            .directory
            .borrow()
            .movement(pushee_actor)
            .ok_or(ActionError::MovementUnavailable(pushee_actor))?;
        if !movement.borrow().is_movement_enabled() {
            return Err(ActionError::MovementUnavailable(pushee_actor));
        }

        let data = payload.data.ok_or(ActionError::MissingTargetData)?;

        // Pushes displace along the ground plane.
        let direction = {
            let d = data.direction.to_vec3();
            Vec3::new(d.x, d.y, 0.0).normalize_or_zero()
        };

        let normalized_distance = {
            let world = ctx.world.borrow();
            let shape_of = |actor: ActorId| {
                world
                    .actor(actor)
                    .map_or(CollisionShape::None, |state| state.shape)
            };
            mechanics::normalized_push_distance(
                &shape_of(pushee_actor),
                &shape_of(pusher_actor),
                data.distance.unwrap_or(0.0),
            )
        };

        let (payload_scalar, payload_overrides) = payload.effective_strength();
        let strength = mechanics::calculate_push_strength(
            mechanics::pushee_ground_speed(&*pushee),
            normalized_distance,
            payload_scalar,
            payload_overrides,
            &self.params,
        );

        let spec = ForceSpec::new(direction, strength, self.params.duration)
            .with_accumulate(AccumulateMode::Additive)
            .with_priority(ACTION_FORCE_PRIORITY)
            .with_flags(ForceFlags::IGNORE_Z_ACCUMULATE);

        Ok(PushForceTask::apply(ctx, &movement, &spec)?)
    }
}
