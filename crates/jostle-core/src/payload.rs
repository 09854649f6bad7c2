//! Push event payloads and their wire representation.
//!
//! The payload is the one bit-relevant external surface of the subsystem: a
//! quantized normalized direction, an optional raw distance, and an optional
//! strength field. The strength field is deliberately *omitted* when it
//! carries the identity value with no override — consumers must treat an
//! absent field as "scalar = 1.0, no override". Skipping the field is a wire
//! cost decision, not a semantic one.

use std::collections::BTreeMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use stagehand::world::ActorId;

use crate::ability::EventTag;

/// Quantization scale for one direction component (16-bit fixed point).
const QUANT_SCALE: f32 = 32767.0;

/// A unit vector quantized to 16 bits per component for replication.
///
/// # Example
///
/// ```
/// use glam::Vec3;
/// use jostle_core::payload::QuantizedNormal;
///
/// let q = QuantizedNormal::from_vec3(Vec3::new(-1.0, 0.0, 0.0));
/// let v = q.to_vec3();
/// assert!(v.abs_diff_eq(Vec3::new(-1.0, 0.0, 0.0), 1e-3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuantizedNormal([i16; 3]);

impl QuantizedNormal {
    /// Quantizes a direction. The input is normalized first; a zero vector
    /// quantizes to zero.
    #[must_use]
    pub fn from_vec3(direction: Vec3) -> Self {
        let unit = direction.normalize_or_zero();
        let quantize = |c: f32| (c.clamp(-1.0, 1.0) * QUANT_SCALE).round() as i16;
        Self([quantize(unit.x), quantize(unit.y), quantize(unit.z)])
    }

    /// Reconstructs the direction, re-normalized to counter quantization
    /// error. A zero quantization reconstructs to zero.
    #[must_use]
    pub fn to_vec3(self) -> Vec3 {
        let raw = Vec3::new(
            f32::from(self.0[0]) / QUANT_SCALE,
            f32::from(self.0[1]) / QUANT_SCALE,
            f32::from(self.0[2]) / QUANT_SCALE,
        );
        raw.normalize_or_zero()
    }
}

impl From<Vec3> for QuantizedNormal {
    fn from(direction: Vec3) -> Self {
        Self::from_vec3(direction)
    }
}

/// Replicated strength data; present only when it differs from the identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrengthData {
    /// Scalar to apply to the push strength.
    pub scalar: f32,
    /// When true, `scalar` replaces the strength computation instead of
    /// multiplying into it.
    pub override_strength: bool,
}

/// Target data carried by a push event.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PushTargetData {
    /// Normalized push direction.
    pub direction: QuantizedNormal,
    /// Distance between pusher and pushee at trigger time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    /// Strength data; absent means scalar 1.0 with no override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<StrengthData>,
}

impl PushTargetData {
    /// Returns the effective `(scalar, override)` pair, defaulting an absent
    /// strength field to `(1.0, false)`.
    #[must_use]
    pub fn effective_strength(&self) -> (f32, bool) {
        self.strength
            .map_or((1.0, false), |s| (s.scalar, s.override_strength))
    }
}

/// A gameplay event dispatched to a target's ability system.
///
/// `instigator` is the pushee (the actor being displaced); `target` is the
/// pusher. The `annotations` map is the customization escape hatch: a pusher
/// target may write arbitrary named values into it before dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    /// Event tag this payload activates.
    pub tag: EventTag,
    /// The pushee.
    pub instigator: ActorId,
    /// The pusher.
    pub target: ActorId,
    /// Push target data, when the event carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<PushTargetData>,
    /// Free-form values written by the pusher target's customization hook.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, f64>,
}

impl EventPayload {
    /// Creates a payload with no target data.
    #[must_use]
    pub fn new(tag: EventTag, instigator: ActorId, target: ActorId) -> Self {
        Self {
            tag,
            instigator,
            target,
            data: None,
            annotations: BTreeMap::new(),
        }
    }

    /// Attaches push target data.
    #[must_use]
    pub fn with_data(mut self, data: PushTargetData) -> Self {
        self.data = Some(data);
        self
    }

    /// Returns the effective `(scalar, override)` pair from the target data,
    /// `(1.0, false)` when absent.
    #[must_use]
    pub fn effective_strength(&self) -> (f32, bool) {
        self.data
            .as_ref()
            .map_or((1.0, false), PushTargetData::effective_strength)
    }
}
