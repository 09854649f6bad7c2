//! End-to-end pipeline tests: scan → candidates → trigger → force.

use std::cell::Cell;
use std::rc::Rc;

use glam::Vec3;

use super::helpers::{register_pusher, spawn_character, standalone_ctx};
use crate::abilities::{PushActionAbility, PushScanAbility, ScanAbilityConfig};
use crate::ability::AbilityClassId;
use crate::force::ForceFlags;
use crate::option::PushActivation;
use crate::params::{ActionParams, ScanParams};
use stagehand::world::CollisionChannel;

const SHOVE: AbilityClassId = AbilityClassId::from_static("shove");

fn scan_config() -> ScanAbilityConfig {
    ScanAbilityConfig {
        scan: ScanParams {
            channel: CollisionChannel::Pawn,
            ..ScanParams::default()
        },
        ..ScanAbilityConfig::default()
    }
}

#[test]
fn grant_to_self_pattern_pushes_the_scanning_pawn() {
    let ctx = standalone_ctx();
    let pushee = spawn_character(&ctx, Vec3::ZERO);
    let pusher = spawn_character(&ctx, Vec3::new(50.0, 0.0, 0.0));
    register_pusher(&ctx, &pusher, PushActivation::Grant(SHOVE));

    let mut scan = PushScanAbility::new(pushee.actor, scan_config());
    scan.activate(&ctx).unwrap();

    // One scan interval elapses; the pusher is found and the push event is
    // dispatched through the scanning side's own (lazily granted) ability.
    ctx.advance(0.1);

    assert_eq!(pushee.system.borrow().grants, 1);
    let events = pushee.system.borrow().events.clone();
    assert_eq!(events.len(), 1);

    let (_, actor_info, payload) = &events[0];
    // Triggered through the pusher's actor info, not the scanning pawn's.
    assert_eq!(actor_info.owner_actor, pusher.actor);
    assert_eq!(payload.instigator, pushee.actor);
    assert_eq!(payload.target, pusher.actor);

    // The host routes the event into the action ability, which installs the
    // force on the pushee's movement.
    let action = PushActionAbility::new(ActionParams::default());
    let task = action.activate_from_event(payload, &ctx).unwrap();

    let movement = pushee.movement.borrow();
    assert_eq!(movement.active.len(), 1);
    let (_, spec) = &movement.active[0];
    // Pushed away from the pusher: straight down the negative X axis.
    assert!(spec.direction.abs_diff_eq(Vec3::new(-1.0, 0.0, 0.0), 1e-3));
    assert!(spec.flags.contains(ForceFlags::IGNORE_Z_ACCUMULATE));
    drop(movement);

    // The force removes itself once its duration elapses.
    ctx.advance(0.25);
    assert!(task.is_finished());
    assert!(pushee.movement.borrow().active.is_empty());

    assert_eq!(scan.pushes_since_last_sync(), 1);
}

#[test]
fn pre_granted_remote_pattern_triggers_on_the_target() {
    let ctx = standalone_ctx();
    let pushee = spawn_character(&ctx, Vec3::ZERO);
    let pusher = spawn_character(&ctx, Vec3::new(50.0, 0.0, 0.0));

    // The triggering ability lives on the pusher, granted ahead of time.
    let handle = pusher.system.borrow_mut().pre_grant(&SHOVE);
    register_pusher(
        &ctx,
        &pusher,
        PushActivation::Remote {
            system: pusher.actor,
            handle,
        },
    );

    let mut scan = PushScanAbility::new(pushee.actor, scan_config());
    scan.activate(&ctx).unwrap();
    ctx.advance(0.1);

    // Dispatched to the pusher's system; nothing was granted to the pushee.
    assert_eq!(pusher.system.borrow().events.len(), 1);
    assert_eq!(pushee.system.borrow().grants, 0);
    assert_eq!(pusher.system.borrow().events[0].0, handle);
}

#[test]
fn ineligible_abilities_are_filtered_out() {
    let ctx = standalone_ctx();
    let pushee = spawn_character(&ctx, Vec3::ZERO);
    let pusher = spawn_character(&ctx, Vec3::new(50.0, 0.0, 0.0));
    register_pusher(&ctx, &pusher, PushActivation::Grant(SHOVE));

    // Cooldown, cost, tags — whatever the reason, the ability reports it
    // cannot activate right now.
    pushee.system.borrow_mut().activatable = false;

    let mut scan = PushScanAbility::new(pushee.actor, scan_config());
    scan.activate(&ctx).unwrap();
    ctx.advance(0.1);
    ctx.advance(0.1);

    assert!(scan.current_options().is_empty());
    assert!(pushee.system.borrow().events.is_empty());
}

#[test]
fn candidate_listener_hears_only_changes() {
    let ctx = standalone_ctx();
    let pushee = spawn_character(&ctx, Vec3::ZERO);
    let pusher = spawn_character(&ctx, Vec3::new(50.0, 0.0, 0.0));
    let target = register_pusher(&ctx, &pusher, PushActivation::Grant(SHOVE));

    let mut scan = PushScanAbility::new(pushee.actor, scan_config());
    let notifications = Rc::new(Cell::new(0u32));
    let notifications_in_cb = Rc::clone(&notifications);
    scan.set_options_listener(Box::new(move |_| {
        notifications_in_cb.set(notifications_in_cb.get() + 1);
    }));
    scan.activate(&ctx).unwrap();

    // Target appears once, then stays; one notification.
    ctx.advance(0.1);
    ctx.advance(0.1);
    ctx.advance(0.1);
    assert_eq!(notifications.get(), 1);

    // The target becomes incapable of pushing: candidate set is unchanged
    // (capability gates run at trigger time, not filter time), so still no
    // new notification.
    target.capable.set(false);
    ctx.advance(0.1);
    assert_eq!(notifications.get(), 1);

    // The target's actor leaves the world; the set shrinks to empty.
    ctx.world.borrow_mut().despawn(pusher.actor);
    ctx.advance(0.1);
    assert_eq!(notifications.get(), 2);
    assert!(scan.current_options().is_empty());
}

#[test]
fn refused_gate_skips_the_push_but_keeps_scanning() {
    let ctx = standalone_ctx();
    let pushee = spawn_character(&ctx, Vec3::ZERO);
    let pusher = spawn_character(&ctx, Vec3::new(50.0, 0.0, 0.0));
    let target = register_pusher(&ctx, &pusher, PushActivation::Grant(SHOVE));

    // The gate refuses at trigger time.
    target.capable.set(false);

    let mut scan = PushScanAbility::new(pushee.actor, scan_config());
    scan.activate(&ctx).unwrap();
    ctx.advance(0.1);

    // Candidate exists, but no push was dispatched and none was counted.
    assert_eq!(scan.current_options().len(), 1);
    assert!(pushee.system.borrow().events.is_empty());
    assert_eq!(scan.pushes_since_last_sync(), 0);

    // The gate opens again; the *next change* triggers. Re-admitting the
    // same set is not a change, so flush it empty first.
    target.capable.set(true);
    ctx.world.borrow_mut().actor_mut(pusher.actor).unwrap().position =
        Vec3::new(5_000.0, 0.0, 0.0);
    ctx.advance(0.1);
    ctx.world.borrow_mut().actor_mut(pusher.actor).unwrap().position =
        Vec3::new(50.0, 0.0, 0.0);
    ctx.advance(0.1);

    assert_eq!(pushee.system.borrow().events.len(), 1);
    assert_eq!(scan.pushes_since_last_sync(), 1);
}

#[test]
fn ending_the_ability_mid_flight_stops_everything() {
    let ctx = standalone_ctx();
    let pushee = spawn_character(&ctx, Vec3::ZERO);
    let pusher = spawn_character(&ctx, Vec3::new(50.0, 0.0, 0.0));
    register_pusher(&ctx, &pusher, PushActivation::Grant(SHOVE));

    let mut scan = PushScanAbility::new(pushee.actor, scan_config());
    scan.activate(&ctx).unwrap();
    ctx.advance(0.1);
    assert_eq!(pushee.system.borrow().events.len(), 1);

    scan.end(&ctx);
    ctx.advance(1.0);

    // No further ticks, no further events.
    assert_eq!(pushee.system.borrow().events.len(), 1);
    assert_eq!(ctx.timers.borrow().pending(), 0);
}

#[test]
fn moving_pusher_updates_the_candidate_positions() {
    let ctx = standalone_ctx();
    let pushee = spawn_character(&ctx, Vec3::ZERO);
    let pusher = spawn_character(&ctx, Vec3::new(50.0, 0.0, 0.0));
    register_pusher(&ctx, &pusher, PushActivation::Grant(SHOVE));

    let mut scan = PushScanAbility::new(pushee.actor, scan_config());
    scan.activate(&ctx).unwrap();
    ctx.advance(0.1);
    let first = scan.current_options();

    // The pusher sidesteps; same target, new position — that is a change.
    ctx.world.borrow_mut().actor_mut(pusher.actor).unwrap().position =
        Vec3::new(0.0, 50.0, 0.0);
    ctx.advance(0.1);
    let second = scan.current_options();

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_ne!(first[0], second[0]);
    assert!(second[0]
        .pusher_location
        .abs_diff_eq(Vec3::new(0.0, 50.0, 0.0), 1e-4));
}
