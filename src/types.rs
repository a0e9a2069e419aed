//! Core types for callback-driven point streaming.
//!
//! Provides the device-agnostic laser point and the fill-request contract
//! between the streaming engine and the user-supplied point generator.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// A single point to be sent to a laser DAC.
///
/// All channels are normalized `f32` values:
/// - x: -1.0 (left) to 1.0 (right)
/// - y: -1.0 (bottom) to 1.0 (top)
/// - r, g, b: colour channels, 0.0 to 1.0
/// - i: intensity/brightness, 0.0 to 1.0
/// - u1, u2: user channels for extension (waveforms, safety masks), 0.0 to 1.0
///
/// Out-of-range values are clamped during wire encoding, not here.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LaserPoint {
    /// X coordinate, -1.0 to 1.0
    pub x: f32,
    /// Y coordinate, -1.0 to 1.0
    pub y: f32,
    /// Red channel, 0.0 to 1.0
    pub r: f32,
    /// Green channel, 0.0 to 1.0
    pub g: f32,
    /// Blue channel, 0.0 to 1.0
    pub b: f32,
    /// Intensity, 0.0 to 1.0
    pub i: f32,
    /// First user channel, 0.0 to 1.0
    pub u1: f32,
    /// Second user channel, 0.0 to 1.0
    pub u2: f32,
}

impl LaserPoint {
    /// Creates a new laser point with both user channels zeroed.
    pub fn new(x: f32, y: f32, r: f32, g: f32, b: f32, i: f32) -> Self {
        Self {
            x,
            y,
            r,
            g,
            b,
            i,
            ..Default::default()
        }
    }

    /// Creates a blanked point (laser off) at the given position.
    pub fn blanked(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            ..Default::default()
        }
    }
}

/// Information provided when the engine asks the generator for new points.
#[derive(Debug, Clone, Copy)]
pub struct PointFillRequest {
    /// Minimum number of points the callback must produce. May be zero.
    pub minimum_points_required: usize,

    /// Maximum number of points the callback should produce; free space in
    /// the device FIFO. A value of 0 means "no upper bound".
    pub maximum_points_required: usize,

    /// Host-side estimate of when the first point of this batch will reach
    /// the mirrors. Advisory; generators can ignore it or use it for
    /// scheduling.
    pub estimated_first_point_render_time: Instant,

    /// Absolute running counter of points requested across the stream.
    pub point_index: u64,
}

impl PointFillRequest {
    /// Whether this request is worth forwarding to the generator: either
    /// bound exceeding `threshold` indicates the engine should ask.
    pub fn needs_points(&self, threshold: usize) -> bool {
        self.minimum_points_required > threshold || self.maximum_points_required > threshold
    }
}

/// Callback contract for point generation.
///
/// The callback must append points to the output buffer:
/// - produce at least `request.minimum_points_required` points;
/// - produce no more than `request.maximum_points_required` when it is
///   non-zero;
/// - never shrink the buffer or reserve extra capacity (the engine
///   pre-sizes it to keep the realtime path allocation-free).
///
/// The engine reads the buffer length after the call to learn how many
/// points were written, and never invokes the callback from more than one
/// thread concurrently.
pub type FillCallback = Box<dyn FnMut(&PointFillRequest, &mut Vec<LaserPoint>) + Send>;

#[cfg(test)]
mod tests {
    use super::*;

    fn request(min: usize, max: usize) -> PointFillRequest {
        PointFillRequest {
            minimum_points_required: min,
            maximum_points_required: max,
            estimated_first_point_render_time: Instant::now(),
            point_index: 0,
        }
    }

    #[test]
    fn needs_points_checks_either_bound() {
        // Deficit alone is enough.
        assert!(request(200, 0).needs_points(150));
        // Free space alone is enough even with no deficit.
        assert!(request(0, 600).needs_points(150));
        // Neither bound above the threshold.
        assert!(!request(0, 0).needs_points(150));
        assert!(!request(150, 150).needs_points(150));
    }

    #[test]
    fn blanked_point_has_zero_channels() {
        let p = LaserPoint::blanked(0.25, -0.5);
        assert_eq!(p.x, 0.25);
        assert_eq!(p.y, -0.5);
        assert_eq!(
            (p.r, p.g, p.b, p.i, p.u1, p.u2),
            (0.0, 0.0, 0.0, 0.0, 0.0, 0.0)
        );
    }
}
