//! Collision shapes and pairwise overlap tests.
//!
//! Shapes describe an actor's physical footprint for spatial queries. The
//! overlap tests assume characters stand upright: capsules are aligned to the
//! world Z axis, and boxes are tested conservatively through their bounding
//! sphere. That is sufficient for proximity scans, which deliberately trace
//! slightly inflated shapes anyway.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Extent below which a shape is considered degenerate.
pub const NEARLY_ZERO_EXTENT: f32 = 1e-4;

/// An actor's collision footprint.
///
/// `None` and all-near-zero extents are invalid for scanning; see
/// [`CollisionShape::is_valid`].
///
/// # Example
///
/// ```
/// use stagehand::shape::CollisionShape;
///
/// let capsule = CollisionShape::capsule(34.0, 88.0);
/// assert!(capsule.is_valid());
/// assert_eq!(capsule.max_extent(), 88.0);
///
/// let scaled = capsule.scaled_by(2.0);
/// assert_eq!(scaled.planar_radius(), 68.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum CollisionShape {
    /// No footprint; never valid for scanning.
    #[default]
    None,
    /// Upright capsule.
    Capsule {
        /// Radius of the capsule in the XY plane.
        radius: f32,
        /// Half the total height, including the caps.
        half_height: f32,
    },
    /// Axis-aligned box.
    Box {
        /// Half extent along each axis.
        half_extent: Vec3,
    },
    /// Sphere.
    Sphere {
        /// Sphere radius.
        radius: f32,
    },
}

impl CollisionShape {
    /// Creates a capsule shape.
    #[must_use]
    pub const fn capsule(radius: f32, half_height: f32) -> Self {
        Self::Capsule {
            radius,
            half_height,
        }
    }

    /// Creates a box shape.
    #[must_use]
    pub const fn boxed(half_extent: Vec3) -> Self {
        Self::Box { half_extent }
    }

    /// Creates a sphere shape.
    #[must_use]
    pub const fn sphere(radius: f32) -> Self {
        Self::Sphere { radius }
    }

    /// Returns true if every extent is near zero (or the shape is `None`).
    #[must_use]
    pub fn is_nearly_zero(&self) -> bool {
        match *self {
            Self::None => true,
            Self::Capsule {
                radius,
                half_height,
            } => radius < NEARLY_ZERO_EXTENT && half_height < NEARLY_ZERO_EXTENT,
            Self::Box { half_extent } => half_extent.max_element() < NEARLY_ZERO_EXTENT,
            Self::Sphere { radius } => radius < NEARLY_ZERO_EXTENT,
        }
    }

    /// Returns true if this shape can be swept against the world.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_nearly_zero()
    }

    /// Returns the largest single extent of the shape.
    #[must_use]
    pub fn max_extent(&self) -> f32 {
        match *self {
            Self::None => 0.0,
            Self::Capsule {
                radius,
                half_height,
            } => radius.max(half_height),
            Self::Box { half_extent } => half_extent.abs().max_element(),
            Self::Sphere { radius } => radius,
        }
    }

    /// Returns the radius of the smallest sphere containing the shape.
    #[must_use]
    pub fn bounding_radius(&self) -> f32 {
        match *self {
            Self::None => 0.0,
            Self::Capsule {
                radius,
                half_height,
            } => radius.max(half_height),
            Self::Box { half_extent } => half_extent.length(),
            Self::Sphere { radius } => radius,
        }
    }

    /// Returns the planar (XY) radius of the shape.
    #[must_use]
    pub fn planar_radius(&self) -> f32 {
        match *self {
            Self::None => 0.0,
            Self::Capsule { radius, .. } => radius,
            Self::Box { half_extent } => half_extent.x.hypot(half_extent.y),
            Self::Sphere { radius } => radius,
        }
    }

    /// Returns the shape with its radial extents multiplied by `scalar`.
    ///
    /// Capsule and sphere radii and box XY half extents scale; capsule half
    /// height and box Z are left alone, matching how a proximity scan widens
    /// around a character without growing above or below it.
    #[must_use]
    pub fn scaled_by(&self, scalar: f32) -> Self {
        match *self {
            Self::None => Self::None,
            Self::Capsule {
                radius,
                half_height,
            } => Self::Capsule {
                radius: radius * scalar,
                half_height,
            },
            Self::Box { half_extent } => Self::Box {
                half_extent: Vec3::new(half_extent.x * scalar, half_extent.y * scalar, half_extent.z),
            },
            Self::Sphere { radius } => Self::Sphere {
                radius: radius * scalar,
            },
        }
    }
}

/// Distance between two vertical segments, used for capsule tests.
fn vertical_segment_distance(a: Vec3, a_half: f32, b: Vec3, b_half: f32) -> f32 {
    let planar = Vec3::new(a.x - b.x, a.y - b.y, 0.0).length();
    let a_lo = a.z - a_half;
    let a_hi = a.z + a_half;
    let b_lo = b.z - b_half;
    let b_hi = b.z + b_half;
    // Gap between the Z intervals, zero when they overlap.
    let z_gap = (b_lo - a_hi).max(a_lo - b_hi).max(0.0);
    planar.hypot(z_gap)
}

/// Core segment half-length of an upright capsule (height minus the caps).
fn capsule_core(radius: f32, half_height: f32) -> f32 {
    (half_height - radius).max(0.0)
}

/// Tests whether two shapes at the given centers overlap.
///
/// Boxes are approximated by their bounding spheres; capsules are treated as
/// world-upright. Invalid shapes never overlap anything.
#[must_use]
pub fn shapes_overlap(a: &CollisionShape, a_center: Vec3, b: &CollisionShape, b_center: Vec3) -> bool {
    if !a.is_valid() || !b.is_valid() {
        return false;
    }

    // Reduce every pairing to sphere-vs-sphere or capsule-vs-capsule by
    // treating spheres and boxes as zero-length capsules.
    let (ar, ah) = reduce(a);
    let (br, bh) = reduce(b);
    vertical_segment_distance(a_center, ah, b_center, bh) <= ar + br
}

fn reduce(shape: &CollisionShape) -> (f32, f32) {
    match *shape {
        CollisionShape::None => (0.0, 0.0),
        CollisionShape::Capsule {
            radius,
            half_height,
        } => (radius, capsule_core(radius, half_height)),
        CollisionShape::Box { half_extent } => (half_extent.length(), 0.0),
        CollisionShape::Sphere { radius } => (radius, 0.0),
    }
}
