//! Temporal smoothing of tracked values.

use nalgebra::Point3;

/// A filter for values of type `V`.
pub trait Filter<V> {
    /// Adds a new value to the filter, returning the filtered value.
    fn push(&mut self, value: V) -> V;

    /// Resets the accumulated history and state of the filter to be identical to the state just
    /// after construction.
    fn reset(&mut self);
}

/// Fraction of the remaining distance [`PositionSmoother`] moves per pushed value.
pub const BLEND_FACTOR: f32 = 0.5;

/// Damps frame-to-frame jitter of an object's position.
///
/// Every pushed target moves the smoothed position [`BLEND_FACTOR`] of the way from the last
/// emitted position towards the target (linear interpolation). Unlike an [`Ema`] that starts at
/// the first value it sees, the smoother starts at a fixed rest position, so the first detection
/// only moves the object half way.
///
/// [`Ema`]: https://en.wikipedia.org/wiki/Exponential_smoothing
#[derive(Debug, Clone)]
pub struct PositionSmoother {
    rest: Point3<f32>,
    last: Point3<f32>,
}

impl PositionSmoother {
    /// Creates a smoother whose output starts at `rest`.
    pub fn new(rest: Point3<f32>) -> Self {
        Self { rest, last: rest }
    }

    /// Returns the last emitted position.
    #[inline]
    pub fn position(&self) -> Point3<f32> {
        self.last
    }
}

impl Filter<Point3<f32>> for PositionSmoother {
    fn push(&mut self, target: Point3<f32>) -> Point3<f32> {
        self.last = self.last.lerp(&target, BLEND_FACTOR);
        self.last
    }

    fn reset(&mut self) {
        self.last = self.rest;
    }
}
