//! Steering toward a tracked target.
//!
//! Turns the horizontal position of a detected target in a camera frame
//! into motor commands: rotate toward it while it is off to one side,
//! stop once it is centered.

use crate::command::Command;
use std::collections::VecDeque;

/// Number of positions averaged by [`PositionSmoother`]
pub const SMOOTHING_WINDOW: usize = 5;

/// Pixel distances from the frame center
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingThresholds {
    /// Target further left than this turns counterclockwise
    pub left: i32,
    /// Target further right than this turns clockwise
    pub right: i32,
    /// Target closer than this stops the motor
    pub center: i32,
}

impl Default for TrackingThresholds {
    fn default() -> Self {
        Self {
            left: 100,
            right: 100,
            center: 50,
        }
    }
}

/// Moving average over the last few target positions
#[derive(Debug, Clone)]
pub struct PositionSmoother {
    window: VecDeque<i32>,
    capacity: usize,
}

impl Default for PositionSmoother {
    fn default() -> Self {
        Self::new(SMOOTHING_WINDOW)
    }
}

impl PositionSmoother {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a position and return the truncated mean of the window
    pub fn push(&mut self, x: i32) -> i32 {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(x);

        let sum: i64 = self.window.iter().map(|&v| v as i64).sum();
        (sum / self.window.len() as i64) as i32
    }
}

/// Pick a command for a (smoothed) target position.
///
/// Between the center band and the side thresholds nothing is sent and
/// the motor keeps its last command. Threshold arithmetic saturates.
pub fn steer(x: i32, frame_width: i32, thresholds: &TrackingThresholds) -> Option<Command> {
    let center = frame_width / 2;

    if x < center.saturating_sub(thresholds.left) {
        Some(Command::CounterClockwise)
    } else if x > center.saturating_add(thresholds.right) {
        Some(Command::Clockwise)
    } else if center.saturating_sub(thresholds.center) < x && x < center.saturating_add(thresholds.center) {
        Some(Command::Stop)
    } else {
        None
    }
}
