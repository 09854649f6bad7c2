//! Shared push math: directions, strengths, adaptive scan rates and ranges.
//!
//! These are free functions so the scan task, the trigger path, and the
//! action ability all compute the same numbers. Several of them exist to keep
//! predicted clients and the server in agreement — most notably
//! [`push_direction`], which is evaluated once at trigger time and shipped in
//! the payload rather than recomputed on each side.

use glam::Vec3;
use rand::Rng;
use stagehand::shape::CollisionShape;

use crate::capability::Pushee;
use crate::params::{ActionParams, OverrideHandling, ScanParams};

/// Acceleration below this (after normalization) counts as "not accelerating".
pub const ACCELERATION_TOLERANCE: f32 = 0.1;

/// Pusher/pushee separations under this are treated as co-located.
pub const COINCIDENT_TOLERANCE: f32 = 2.5;

/// Velocity with the vertical component dropped when airborne.
///
/// Incline is part of ground movement, so the full velocity counts while on
/// the ground; in the air only the planar part does.
#[must_use]
pub fn ground_velocity(velocity: Vec3, moving_on_ground: bool) -> Vec3 {
    if moving_on_ground {
        velocity
    } else {
        Vec3::new(velocity.x, velocity.y, 0.0)
    }
}

/// The pushee's ground velocity.
#[must_use]
pub fn pushee_ground_velocity(pushee: &dyn Pushee) -> Vec3 {
    ground_velocity(pushee.velocity(), pushee.is_moving_on_ground())
}

/// The pushee's ground speed.
#[must_use]
pub fn pushee_ground_speed(pushee: &dyn Pushee) -> f32 {
    pushee_ground_velocity(pushee).length()
}

/// Whether an acceleration vector represents active acceleration.
#[must_use]
pub fn is_accelerating(acceleration: Vec3) -> bool {
    acceleration.normalize_or_zero().length() > ACCELERATION_TOLERANCE
}

/// The scan interval for the current motion state.
#[must_use]
pub fn scan_rate(accelerating: bool, params: &ScanParams) -> f32 {
    if accelerating {
        params.scan_rate_accel
    } else {
        params.scan_rate
    }
}

/// The scan interval for a pushee.
#[must_use]
pub fn pushee_scan_rate(pushee: &dyn Pushee, params: &ScanParams) -> f32 {
    scan_rate(is_accelerating(pushee.acceleration()), params)
}

/// The effective scan range for the current motion state.
#[must_use]
pub fn scan_range(accelerating: bool, base_scan_range: f32, params: &ScanParams) -> f32 {
    let scalar = if accelerating {
        params.scan_range_accel_scalar
    } else {
        params.scan_range_scalar
    };
    base_scan_range * scalar
}

/// The traced-shape radius scalar for the current motion state.
#[must_use]
pub fn radius_scalar(accelerating: bool, params: &ScanParams) -> f32 {
    if accelerating {
        params.pushee_radius_accel_scalar
    } else {
        params.pushee_radius_scalar
    }
}

/// The shape a scan tick traces: the pushee's own footprint inflated by the
/// motion-state radius scalar and the velocity curve.
#[must_use]
pub fn scaled_scan_shape(
    base: &CollisionShape,
    params: &ScanParams,
    accelerating: bool,
    ground_speed: f32,
) -> CollisionShape {
    let velocity_scalar = params
        .radius_velocity_curve
        .as_ref()
        .map_or(1.0, |curve| curve.evaluate(ground_speed));
    base.scaled_by(radius_scalar(accelerating, params) * velocity_scalar)
}

/// Distance between pusher and pushee normalized by their combined planar
/// collision radii. A zero combined radius yields 0.
#[must_use]
pub fn normalized_push_distance(
    pushee_shape: &CollisionShape,
    pusher_shape: &CollisionShape,
    distance: f32,
) -> f32 {
    let combined = pushee_shape.planar_radius() + pusher_shape.planar_radius();
    if combined <= f32::EPSILON {
        return 0.0;
    }
    distance / combined
}

/// Combines the two sides' strength contributions into the payload's
/// `(scalar, override)` pair.
///
/// With no overrides the plain scalars multiply. A single-sided override is
/// used alone; two overrides combine per `handling`.
#[must_use]
pub fn combine_strength(
    pushee_scalar: f32,
    pushee_override: Option<f32>,
    pusher_scalar: f32,
    pusher_override: Option<f32>,
    handling: OverrideHandling,
) -> (f32, bool) {
    match (pushee_override, pusher_override) {
        (Some(a), Some(b)) => {
            let combined = match handling {
                OverrideHandling::Average => (a + b) * 0.5,
                OverrideHandling::Max => a.max(b),
                OverrideHandling::Min => a.min(b),
                OverrideHandling::Multiply => a * b,
            };
            (combined, true)
        }
        (Some(a), None) => (a, true),
        (None, Some(b)) => (b, true),
        (None, None) => (pushee_scalar * pusher_scalar, false),
    }
}

/// Final push strength on the action side.
///
/// An overriding payload scalar replaces the whole computation. Otherwise the
/// strength is the product of the configured curves (each defaulting to 1
/// when absent), the action's own strength scalar, and the payload scalar.
#[must_use]
pub fn calculate_push_strength(
    ground_speed: f32,
    normalized_distance: f32,
    payload_scalar: f32,
    payload_overrides: bool,
    params: &ActionParams,
) -> f32 {
    if payload_overrides {
        return payload_scalar;
    }
    let velocity_factor = params
        .velocity_to_strength
        .as_ref()
        .map_or(1.0, |curve| curve.evaluate(ground_speed));
    let distance_factor = params
        .distance_to_strength
        .as_ref()
        .map_or(1.0, |curve| curve.evaluate(normalized_distance));
    velocity_factor * distance_factor * params.strength_scalar * payload_scalar
}

/// The push direction from pusher to pushee. Total: always returns a finite
/// unit vector.
///
/// Co-located actors (typically at spawn) get a uniformly random planar
/// angle instead of an undefined direction — deterministic fallbacks there
/// make coincident spawns shove each other along the same line forever. If
/// the direction still fails to normalize, the pushee is pushed straight
/// backwards.
#[must_use]
pub fn push_direction<R: Rng + ?Sized>(
    pushee_location: Vec3,
    pusher_location: Vec3,
    direction_is_2d: bool,
    pushee_forward: Vec3,
    rng: &mut R,
) -> Vec3 {
    let raw = pushee_location - pusher_location;
    let projected = if direction_is_2d {
        Vec3::new(raw.x, raw.y, 0.0)
    } else {
        raw
    };
    let mut direction = projected.normalize_or_zero();

    // Way too close to get a meaningful difference in direction.
    if raw.abs().max_element() < COINCIDENT_TOLERANCE {
        let angle = rng.gen_range(0.0..std::f32::consts::TAU);
        direction = Vec3::new(angle.cos(), angle.sin(), 0.0);
    }

    if direction.is_normalized() {
        direction
    } else {
        (-pushee_forward).try_normalize().unwrap_or(Vec3::NEG_X)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::Curve;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    mod ground_motion {
        use super::*;

        #[test]
        fn airborne_velocity_is_flattened() {
            let v = Vec3::new(3.0, 4.0, 12.0);
            assert_eq!(ground_velocity(v, true), v);
            assert_eq!(ground_velocity(v, false), Vec3::new(3.0, 4.0, 0.0));
        }

        #[test]
        fn acceleration_threshold() {
            assert!(!is_accelerating(Vec3::ZERO));
            assert!(is_accelerating(Vec3::new(100.0, 0.0, 0.0)));
        }
    }

    mod scan_scaling {
        use super::*;

        #[test]
        fn rate_follows_motion_state() {
            let params = ScanParams::default();
            assert_eq!(scan_rate(false, &params), 0.1);
            assert_eq!(scan_rate(true, &params), 0.05);
        }

        #[test]
        fn range_scales_linearly_with_scalar() {
            for (scalar, accel_scalar) in [(0.0, 0.0), (0.5, 1.0), (1.0, 2.0), (2.5, 4.0)] {
                let params = ScanParams {
                    scan_range_scalar: scalar,
                    scan_range_accel_scalar: accel_scalar,
                    ..ScanParams::default()
                };
                assert!((scan_range(false, 100.0, &params) - 100.0 * scalar).abs() < 1e-4);
                assert!((scan_range(true, 100.0, &params) - 100.0 * accel_scalar).abs() < 1e-4);
            }
        }

        #[test]
        fn traced_shape_scales_with_radius_scalar_and_curve() {
            let params = ScanParams {
                pushee_radius_scalar: 0.5,
                radius_velocity_curve: Some(Curve::new(vec![(0.0, 1.0), (600.0, 3.0)])),
                ..ScanParams::default()
            };
            let base = CollisionShape::sphere(10.0);

            // At rest: 10 * 0.5 * 1.0.
            let rest = scaled_scan_shape(&base, &params, false, 0.0);
            assert_eq!(rest, CollisionShape::sphere(5.0));

            // At 600 speed: 10 * 0.5 * 3.0.
            let fast = scaled_scan_shape(&base, &params, false, 600.0);
            assert_eq!(fast, CollisionShape::sphere(15.0));
        }

        #[test]
        fn traced_shape_uses_accel_scalar_when_accelerating() {
            let params = ScanParams {
                pushee_radius_scalar: 1.0,
                pushee_radius_accel_scalar: 2.0,
                ..ScanParams::default()
            };
            let base = CollisionShape::sphere(10.0);
            assert_eq!(
                scaled_scan_shape(&base, &params, true, 0.0),
                CollisionShape::sphere(20.0)
            );
        }
    }

    mod distance {
        use super::*;

        #[test]
        fn normalizes_by_combined_radii() {
            let pushee = CollisionShape::capsule(30.0, 90.0);
            let pusher = CollisionShape::capsule(20.0, 90.0);
            assert!((normalized_push_distance(&pushee, &pusher, 100.0) - 2.0).abs() < 1e-5);
        }

        #[test]
        fn zero_combined_radius_yields_zero() {
            let none = CollisionShape::None;
            assert_eq!(normalized_push_distance(&none, &none, 100.0), 0.0);
        }
    }

    mod strength {
        use super::*;

        #[test]
        fn no_overrides_multiply_scalars() {
            assert_eq!(
                combine_strength(2.0, None, 3.0, None, OverrideHandling::Min),
                (6.0, false)
            );
        }

        #[test]
        fn single_override_wins_alone() {
            assert_eq!(
                combine_strength(2.0, Some(5.0), 3.0, None, OverrideHandling::Min),
                (5.0, true)
            );
            assert_eq!(
                combine_strength(2.0, None, 3.0, Some(7.0), OverrideHandling::Max),
                (7.0, true)
            );
        }

        #[test]
        fn double_override_follows_policy() {
            let cases = [
                (OverrideHandling::Average, 5.0),
                (OverrideHandling::Max, 6.0),
                (OverrideHandling::Min, 4.0),
                (OverrideHandling::Multiply, 24.0),
            ];
            for (handling, expected) in cases {
                assert_eq!(
                    combine_strength(1.0, Some(4.0), 1.0, Some(6.0), handling),
                    (expected, true)
                );
            }
        }

        #[test]
        fn action_strength_without_curves_is_scalar_times_payload() {
            let params = ActionParams {
                strength_scalar: 3.0,
                ..ActionParams::default()
            };
            assert_eq!(calculate_push_strength(0.0, 0.0, 2.0, false, &params), 6.0);
        }

        #[test]
        fn action_strength_override_replaces_computation() {
            let params = ActionParams {
                velocity_to_strength: Some(Curve::constant(100.0)),
                strength_scalar: 3.0,
                ..ActionParams::default()
            };
            assert_eq!(calculate_push_strength(50.0, 0.0, 2.0, true, &params), 2.0);
        }

        #[test]
        fn action_strength_applies_curves() {
            let params = ActionParams {
                velocity_to_strength: Some(Curve::new(vec![(0.0, 1.0), (100.0, 2.0)])),
                distance_to_strength: Some(Curve::new(vec![(0.0, 1.0), (1.0, 0.5)])),
                strength_scalar: 10.0,
                ..ActionParams::default()
            };
            // velocity factor 2.0 * distance factor 0.5 * scalar 10 * payload 1.
            assert_eq!(calculate_push_strength(100.0, 1.0, 1.0, false, &params), 10.0);
        }
    }

    mod direction {
        use super::*;

        #[test]
        fn separated_actors_push_along_the_separation_axis() {
            let mut rng = rng();
            let dir = push_direction(
                Vec3::ZERO,
                Vec3::new(200.0, 0.0, 0.0),
                true,
                Vec3::X,
                &mut rng,
            );
            assert!(dir.abs_diff_eq(Vec3::new(-1.0, 0.0, 0.0), 1e-5));
        }

        #[test]
        fn coincident_actors_get_a_random_planar_direction() {
            let mut rng = rng();
            let dir = push_direction(Vec3::ZERO, Vec3::ZERO, true, Vec3::X, &mut rng);
            assert!((dir.length() - 1.0).abs() < 1e-5);
            assert_eq!(dir.z, 0.0);
        }

        #[test]
        fn coincident_angles_are_roughly_uniform() {
            let mut rng = rng();
            const TRIALS: usize = 12_000;
            const BUCKETS: usize = 12;
            let mut histogram = [0u32; BUCKETS];

            for _ in 0..TRIALS {
                let dir = push_direction(Vec3::ZERO, Vec3::ZERO, true, Vec3::X, &mut rng);
                let angle = dir.y.atan2(dir.x).rem_euclid(std::f32::consts::TAU);
                let bucket =
                    ((angle / std::f32::consts::TAU) * BUCKETS as f32) as usize % BUCKETS;
                histogram[bucket] += 1;
            }

            let expected = (TRIALS / BUCKETS) as f32;
            for (bucket, &count) in histogram.iter().enumerate() {
                let deviation = (count as f32 - expected).abs() / expected;
                assert!(
                    deviation < 0.25,
                    "bucket {bucket} had {count} samples, expected ~{expected}"
                );
            }
        }

        #[test]
        fn degenerate_direction_falls_back_to_negated_forward() {
            let mut rng = rng();
            // 3D mode with purely vertical separation beyond the coincidence
            // window, projected to 2D: the 2D projection is zero but the raw
            // offset is not, so the random fallback does not apply.
            let dir = push_direction(
                Vec3::new(0.0, 0.0, 100.0),
                Vec3::ZERO,
                true,
                Vec3::X,
                &mut rng,
            );
            assert!(dir.abs_diff_eq(Vec3::NEG_X, 1e-5));
        }

        #[test]
        fn totality_with_zero_forward() {
            let mut rng = rng();
            let dir = push_direction(
                Vec3::new(0.0, 0.0, 100.0),
                Vec3::ZERO,
                true,
                Vec3::ZERO,
                &mut rng,
            );
            assert!((dir.length() - 1.0).abs() < 1e-5);
        }

        proptest! {
            #[test]
            fn direction_is_always_a_finite_unit_vector(
                px in -1000.0f32..1000.0,
                py in -1000.0f32..1000.0,
                pz in -1000.0f32..1000.0,
                qx in -1000.0f32..1000.0,
                qy in -1000.0f32..1000.0,
                qz in -1000.0f32..1000.0,
                two_d in proptest::bool::ANY,
                seed in proptest::num::u64::ANY,
            ) {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let dir = push_direction(
                    Vec3::new(px, py, pz),
                    Vec3::new(qx, qy, qz),
                    two_d,
                    Vec3::X,
                    &mut rng,
                );
                prop_assert!(dir.is_finite());
                prop_assert!((dir.length() - 1.0).abs() < 1e-3);
            }
        }
    }
}
