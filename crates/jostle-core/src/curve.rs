//! Piecewise-linear float curves.
//!
//! Curves map one scalar to another — velocity to a radius scalar, distance
//! to a strength factor. Keys are kept sorted; evaluation interpolates
//! linearly between neighbours and clamps to the end values outside the key
//! range.

use serde::{Deserialize, Serialize};

/// A piecewise-linear curve over `f32`.
///
/// # Example
///
/// ```
/// use jostle_core::curve::Curve;
///
/// let curve = Curve::new(vec![(0.0, 1.0), (600.0, 2.0)]);
/// assert_eq!(curve.evaluate(0.0), 1.0);
/// assert_eq!(curve.evaluate(300.0), 1.5);
/// // Clamped outside the key range.
/// assert_eq!(curve.evaluate(-100.0), 1.0);
/// assert_eq!(curve.evaluate(900.0), 2.0);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Curve {
    keys: Vec<(f32, f32)>,
}

impl Curve {
    /// Creates a curve from `(input, output)` keys. Keys are sorted by input.
    #[must_use]
    pub fn new(mut keys: Vec<(f32, f32)>) -> Self {
        keys.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        Self { keys }
    }

    /// Creates a curve that evaluates to `value` everywhere.
    #[must_use]
    pub fn constant(value: f32) -> Self {
        Self {
            keys: vec![(0.0, value)],
        }
    }

    /// Returns true if the curve has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Evaluates the curve at `x`.
    ///
    /// An empty curve evaluates to 0.
    #[must_use]
    pub fn evaluate(&self, x: f32) -> f32 {
        let Some(first) = self.keys.first() else {
            return 0.0;
        };
        if x <= first.0 {
            return first.1;
        }
        let last = self.keys[self.keys.len() - 1];
        if x >= last.0 {
            return last.1;
        }

        // x is strictly between two keys.
        let upper = self.keys.partition_point(|(k, _)| *k <= x);
        let (x0, y0) = self.keys[upper - 1];
        let (x1, y1) = self.keys[upper];
        let span = x1 - x0;
        if span <= f32::EPSILON {
            return y0;
        }
        let t = (x - x0) / span;
        y0 + (y1 - y0) * t
    }
}
