//! Micromouse core - Trapezoidal motion profile
//!
//! One profile per axis (forward in mm, rotation in degrees). The control
//! tick calls [`MotionProfile::update`] once per period; the result is the
//! speed and position the controllers should be tracking.
//!
//! A move accelerates toward its cruise speed until the remaining distance,
//! one period ahead, is less than the braking distance. It then follows the
//! braking curve down to the exit speed, arriving with only the completion
//! window left to cover. A zero exit speed is replaced by a small creep
//! speed so the profile always reaches its target. Once finished the
//! profile keeps integrating at the exit speed, which is how continuous
//! search motion chains moves.

use crate::snapshot::ProfileSnapshot;
use crate::types::*;

/// Moves shorter than this finish immediately
pub const MIN_DISTANCE: f32 = 1.0;

/// Remaining distance at which a move counts as complete
pub const COMPLETION_EPSILON: f32 = 0.125;

/// Speed used in place of a zero exit speed while braking
pub const CREEP_SPEED: f32 = 5.0;

/// Per-axis trapezoidal speed profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionProfile {
    state: ProfileState,
    speed: f32,
    position: f32,
    sign: f32,
    acceleration: f32,
    one_over_acc: f32,
    target_speed: f32,
    final_speed: f32,
    final_position: f32,
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionProfile {
    /// Idle profile at rest
    pub const fn new() -> Self {
        Self {
            state: ProfileState::Idle,
            speed: 0.0,
            position: 0.0,
            sign: 1.0,
            acceleration: 0.0,
            one_over_acc: 1.0,
            target_speed: 0.0,
            final_speed: 0.0,
            final_position: 0.0,
        }
    }

    /// Back to idle at rest
    pub fn reset(&mut self) {
        self.position = 0.0;
        self.speed = 0.0;
        self.target_speed = 0.0;
        self.state = ProfileState::Idle;
    }

    /// Begin a move
    ///
    /// The sign of `distance` sets the direction; speeds and acceleration
    /// are taken as magnitudes. The exit speed is clamped to the cruise
    /// speed.
    pub fn start(&mut self, distance: f32, top_speed: f32, final_speed: f32, acceleration: f32) {
        self.sign = if distance < 0.0 { -1.0 } else { 1.0 };
        let distance = distance.abs();
        if distance < MIN_DISTANCE {
            self.position = 0.0;
            self.state = ProfileState::Finished;
            return;
        }
        let final_speed = final_speed.min(top_speed);

        self.position = 0.0;
        self.final_position = distance;
        self.target_speed = self.sign * top_speed.abs();
        self.final_speed = self.sign * final_speed.abs();
        self.acceleration = acceleration.abs();
        self.one_over_acc = if self.acceleration >= 1.0 {
            1.0 / self.acceleration
        } else {
            1.0
        };
        self.state = ProfileState::Accelerating;
    }

    /// Bring the speed to zero and finish
    pub fn stop(&mut self) {
        self.target_speed = 0.0;
        self.finish();
    }

    /// Jump to the target speed and finish
    pub fn finish(&mut self) {
        self.speed = self.target_speed;
        self.state = ProfileState::Finished;
    }

    /// Force the phase
    pub fn set_state(&mut self, state: ProfileState) {
        self.state = state;
    }

    /// Overwrite the current speed
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    /// Overwrite the speed being approached
    pub fn set_target_speed(&mut self, speed: f32) {
        self.target_speed = speed;
    }

    /// Shift the position, e.g. to re-reference at a cell boundary
    pub fn adjust_position(&mut self, adjustment: f32) {
        self.position += adjustment;
    }

    /// Overwrite the position
    pub fn set_position(&mut self, position: f32) {
        self.position = position;
    }

    /// Distance needed to go from the current speed to the exit speed
    pub fn braking_distance(&self) -> f32 {
        (self.speed * self.speed - self.final_speed * self.final_speed).abs()
            * 0.5
            * self.one_over_acc
    }

    /// Advance one control period
    pub fn update(&mut self) {
        if self.state == ProfileState::Idle {
            return;
        }
        let delta_v = self.acceleration * LOOP_INTERVAL;
        let remaining = self.final_position.abs() - self.position.abs();
        if self.state == ProfileState::Accelerating
            && remaining < self.braking_distance() + self.increment().abs()
        {
            self.state = ProfileState::Braking;
            self.target_speed = if self.final_speed == 0.0 {
                self.sign * CREEP_SPEED
            } else {
                self.final_speed
            };
        }

        if self.state == ProfileState::Braking {
            self.speed = self.sign * self.braking_speed(remaining, delta_v);
        } else {
            if self.speed < self.target_speed {
                self.speed = (self.speed + delta_v).min(self.target_speed);
            }
            if self.speed > self.target_speed {
                self.speed = (self.speed - delta_v).max(self.target_speed);
            }
        }

        self.position += self.speed * LOOP_INTERVAL;
        if self.state != ProfileState::Finished && remaining < COMPLETION_EPSILON {
            self.state = ProfileState::Finished;
            self.target_speed = self.final_speed;
        }
    }

    // Next speed magnitude while braking. Holds speed until the deceleration
    // needed to land on the exit speed exceeds the nominal rate, then sheds
    // what is needed, at most twice the nominal rate.
    fn braking_speed(&self, remaining: f32, delta_v: f32) -> f32 {
        let speed = self.sign * self.speed;
        let exit = self.target_speed.abs();
        if speed < exit {
            return (speed + delta_v).min(exit);
        }
        let room = remaining - COMPLETION_EPSILON;
        let needed = if room > 0.0 {
            (speed * speed - exit * exit) / (2.0 * room)
        } else {
            2.0 * self.acceleration
        };
        if needed <= self.acceleration {
            return speed;
        }
        (speed - needed.min(2.0 * self.acceleration) * LOOP_INTERVAL).max(exit)
    }

    /// Distance covered in one period at the current speed
    pub fn increment(&self) -> f32 {
        self.speed * LOOP_INTERVAL
    }

    /// Phase
    pub fn state(&self) -> ProfileState {
        self.state
    }

    /// True once the target has been covered
    pub fn is_finished(&self) -> bool {
        self.state == ProfileState::Finished
    }

    /// Position along the axis
    pub fn position(&self) -> f32 {
        self.position
    }

    /// Current speed
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Speed being approached
    pub fn target_speed(&self) -> f32 {
        self.target_speed
    }

    /// Exit speed
    pub fn final_speed(&self) -> f32 {
        self.final_speed
    }

    /// Acceleration magnitude
    pub fn acceleration(&self) -> f32 {
        self.acceleration
    }

    /// Copy for publication
    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            state: self.state,
            position: self.position,
            speed: self.speed,
            target_speed: self.target_speed,
            final_speed: self.final_speed,
            acceleration: self.acceleration,
        }
    }
}
