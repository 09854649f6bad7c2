//! Per-ability configuration for scanning and push actions.

use serde::{Deserialize, Serialize};
use stagehand::world::CollisionChannel;

use crate::curve::Curve;
use crate::error::ParamsError;

/// How two strength overrides are combined when both the pushee and the
/// pusher declare one.
///
/// When only one side declares an override, that side's value is used alone;
/// when neither does, the two sides' plain scalars multiply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverrideHandling {
    /// Arithmetic mean of the two overrides.
    Average,
    /// Larger of the two overrides.
    Max,
    /// Smaller of the two overrides.
    #[default]
    Min,
    /// Product of the two overrides.
    Multiply,
}

/// Immutable per-ability scan configuration.
///
/// Adjusts how aggressively a pushee looks for nearby pushers: the traced
/// shape is the pushee's own collision shape inflated by the radius scalars
/// (and optionally a velocity-driven curve), and the scan repeats at
/// `scan_rate` — or `scan_rate_accel` while the pushee is actively
/// accelerating, when responsiveness matters more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanParams {
    /// Project push directions onto the XY plane.
    pub direction_is_2d: bool,
    /// Collision channel the scan traces against.
    pub channel: CollisionChannel,
    /// Scan range scalar while idle or coasting.
    pub scan_range_scalar: f32,
    /// Scan range scalar while accelerating.
    pub scan_range_accel_scalar: f32,
    /// Traced-shape radius scalar while idle or coasting.
    pub pushee_radius_scalar: f32,
    /// Traced-shape radius scalar while accelerating.
    pub pushee_radius_accel_scalar: f32,
    /// Optional ground-speed to radius-scalar curve.
    pub radius_velocity_curve: Option<Curve>,
    /// Seconds between scans while idle or coasting.
    pub scan_rate: f32,
    /// Seconds between scans while accelerating.
    pub scan_rate_accel: f32,
    /// Combination policy when both sides override strength.
    pub override_handling: OverrideHandling,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            direction_is_2d: true,
            channel: CollisionChannel::Visibility,
            scan_range_scalar: 0.8,
            scan_range_accel_scalar: 1.1,
            pushee_radius_scalar: 0.8,
            pushee_radius_accel_scalar: 1.0,
            radius_velocity_curve: None,
            scan_rate: 0.1,
            scan_rate_accel: 0.05,
            override_handling: OverrideHandling::default(),
        }
    }
}

impl ScanParams {
    /// Checks the non-negativity invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ParamsError::Negative`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let fields = [
            ("scan_range_scalar", self.scan_range_scalar),
            ("scan_range_accel_scalar", self.scan_range_accel_scalar),
            ("pushee_radius_scalar", self.pushee_radius_scalar),
            ("pushee_radius_accel_scalar", self.pushee_radius_accel_scalar),
            ("scan_rate", self.scan_rate),
            ("scan_rate_accel", self.scan_rate_accel),
        ];
        for (field, value) in fields {
            if value < 0.0 {
                return Err(ParamsError::Negative { field, value });
            }
        }
        Ok(())
    }
}

/// Per-action push configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionParams {
    /// Optional pushee ground-speed to strength curve.
    pub velocity_to_strength: Option<Curve>,
    /// Optional normalized-distance to strength curve.
    pub distance_to_strength: Option<Curve>,
    /// Seconds the force stays installed.
    pub duration: f32,
    /// Strength scalar; the direct strength when no curve is supplied.
    pub strength_scalar: f32,
}

impl Default for ActionParams {
    fn default() -> Self {
        Self {
            velocity_to_strength: None,
            distance_to_strength: None,
            duration: 0.25,
            strength_scalar: 1.0,
        }
    }
}

impl ActionParams {
    /// Checks the non-negativity invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ParamsError::Negative`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.duration < 0.0 {
            return Err(ParamsError::Negative {
                field: "duration",
                value: self.duration,
            });
        }
        if self.strength_scalar < 0.0 {
            return Err(ParamsError::Negative {
                field: "strength_scalar",
                value: self.strength_scalar,
            });
        }
        Ok(())
    }
}
