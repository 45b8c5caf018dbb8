//! Blending of shared objects toward authoritative remote state.
//!
//! A correction is spread over `n` fixed ticks instead of applied at once,
//! where `n` grows with the size of the discrepancy:
//!
//! ```text
//! n = clamp(floor(max(d * position_scale, angle_scale * |da|)), 1, max_steps)
//! ```
//!
//! Each tick moves every channel by `1 / steps_left` of the remaining gap, so
//! the object lands exactly on the target at the final step.

use crate::config::InterpolationConfig;
use crate::physics::guard::SharedGuard;
use crate::physics::obstacle::{Obstacle, Vec2};

/// The interpolated channels of one object
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct KinematicState {
    pub position: Vec2,
    pub velocity: Vec2,
    pub angle: f32,
    pub angular_velocity: f32,
}

impl KinematicState {
    pub fn of(obstacle: &Obstacle) -> Self {
        Self {
            position: obstacle.position(),
            velocity: obstacle.linear_velocity(),
            angle: obstacle.angle(),
            angular_velocity: obstacle.angular_velocity(),
        }
    }
}

/// Number of blend steps for moving `current` to `target`
pub fn step_count(config: &InterpolationConfig, current: &KinematicState, target: &KinematicState) -> u32 {
    let distance = current.position.distance(target.position);
    let angular = config.angle_scale * (current.angle - target.angle).abs();
    let raw = (distance * config.position_scale).max(angular).floor();

    // `as` saturates and maps NaN to 0
    (raw as u32).clamp(1, config.max_steps.max(1))
}

/// An in-flight correction for one object
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationTarget {
    pub end: KinematicState,
    pub current_step: u32,
    pub total_steps: u32,
    /// Sum of positional gaps observed at each step
    pub accumulated_error: f32,
    pub error_samples: u32,
}

impl InterpolationTarget {
    pub fn new(end: KinematicState, total_steps: u32) -> Self {
        Self {
            end,
            current_step: 0,
            total_steps: total_steps.max(1),
            accumulated_error: 0.0,
            error_samples: 0,
        }
    }

    /// Carries the error integrator of a target being replaced
    pub fn inherit(&mut self, previous: &InterpolationTarget) {
        self.accumulated_error = previous.accumulated_error;
        self.error_samples = previous.error_samples;
    }

    pub fn steps_left(&self) -> u32 {
        self.total_steps.saturating_sub(self.current_step)
    }

    pub fn average_error(&self) -> f32 {
        if self.error_samples == 0 {
            0.0
        } else {
            self.accumulated_error / self.error_samples as f32
        }
    }

    /// Moves `obstacle` one step toward the end state.
    ///
    /// Returns `true` once the obstacle has been snapped onto the end state
    /// and the target is finished.
    pub fn advance(&mut self, obstacle: &mut Obstacle) -> bool {
        let steps_left = self.steps_left();
        let mut body = SharedGuard::new(obstacle);

        let position = body.position();
        self.accumulated_error += position.distance(self.end.position);
        self.error_samples += 1;

        if steps_left <= 1 {
            body.set_position(self.end.position);
            body.set_linear_velocity(self.end.velocity);
            body.set_angle(self.end.angle);
            body.set_angular_velocity(self.end.angular_velocity);
            self.current_step = self.total_steps;
            return true;
        }

        let k = 1.0 / steps_left as f32;
        let velocity = body.linear_velocity();
        let angle = body.angle();
        let angular_velocity = body.angular_velocity();

        body.set_position(position + (self.end.position - position) * k);
        body.set_linear_velocity(velocity + (self.end.velocity - velocity) * k);
        body.set_angle(angle + (self.end.angle - angle) * k);
        body.set_angular_velocity(angular_velocity + (self.end.angular_velocity - angular_velocity) * k);

        self.current_step += 1;
        false
    }
}
