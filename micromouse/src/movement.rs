//! Micromouse core - Movement
//!
//! [`Movement`] is the set of physical manoeuvres the navigator needs,
//! expressed in maze terms. [`ProfiledMovement`] implements them on the
//! real control loop by queueing profile commands through
//! [`SharedState`] and polling the published snapshots.
//!
//! Search moves start and end at the sensing point, [`SENSING_POSITION`]
//! on the forward profile, just short of the next cell boundary. Run moves
//! start and end at cell centres or boundaries.

use crate::config::{Config, MoveConfig};
use crate::hal::Platform;
use crate::shared::{Command, ProfileHandle, SharedState};
use crate::snapshot::{ProfileSnapshot, WallState};
use crate::types::*;

/// Forward position of the sensing point, relative to the cell entered
/// at [`HALF_CELL`]
pub const SENSING_POSITION: f32 = FULL_CELL - 10.0;

/// Longest a single blocking wait may take
pub const MOVE_TIMEOUT_MS: u32 = 10_000;

const POLL_MS: u32 = 2;
const SEND_RETRIES: u32 = 50;

// back into the wall behind the start cell
const ALIGN_DISTANCE: f32 = -60.0;
const ALIGN_SPEED: f32 = 120.0;
const ALIGN_ACCEL: f32 = 1000.0;

// search turns begin past the boundary by this much plus the run-in
const TURN_OVERSHOOT: f32 = 10.0;

// exit speed when stopping in a cell, slow enough to creep up to a wall
const CREEP_TO_CENTER: f32 = 30.0;

/// Where a search begins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum StartPosition {
    /// Tail against the wall behind the cell
    BackWall {
        /// Reverse into the wall first
        align: bool,
    },
    /// Stopped in the middle of the cell, already facing an exit
    CellCenter,
}

// ============================================================================
// Movement Trait
// ============================================================================

/// Manoeuvres used by the navigator
pub trait Movement {
    /// Walls seen from the sensing point, relative to the heading
    fn walls(&mut self) -> WallState;

    /// Front sensor reading
    fn front_sensor(&mut self) -> i32;

    /// Forward profile position
    fn position(&mut self) -> f32;

    /// User button held
    fn button_pressed(&mut self) -> bool;

    /// Drive the indicator
    fn set_indicator(&mut self, on: bool);

    /// Wait
    fn delay_ms(&mut self, ms: u32);

    /// Speeds and turn geometry
    fn moves(&self) -> MoveConfig;

    /// Sensors on, drive reset, controllers on
    fn begin(&mut self) -> Result<()>;

    /// Switch wall steering
    fn set_steering(&mut self, enabled: bool) -> Result<()>;

    /// Move from a start position to the first sensing point
    fn leave_start(&mut self, start: StartPosition) -> Result<()>;

    /// Carry straight on to the next sensing point
    fn search_forward(&mut self) -> Result<()>;

    /// Turn left or right while moving, ending at the next sensing point
    fn search_turn(&mut self, turn: Turn) -> Result<()>;

    /// Stop in the next cell, spin round and return to its sensing point
    fn turn_around(&mut self, front_wall: bool) -> Result<()>;

    /// Stop in the middle of the next cell facing back the way we came
    fn end_run(&mut self, front_wall: bool) -> Result<()>;

    /// Signal arrival and power down the drive
    fn finish(&mut self) -> Result<()>;

    /// Turn in place
    fn spin(&mut self, turn: Turn) -> Result<()>;

    /// Move straight and wait for the profile to finish
    fn straight(&mut self, distance: f32, top_speed: f32, final_speed: f32) -> Result<()>;

    /// Integrated 90 degree turn at speed
    fn smooth_turn(&mut self, turn: Turn) -> Result<()>;

    /// Motors off, controllers disabled
    fn halt(&mut self) -> Result<()>;

    /// Flash the indicator until the button is pressed
    fn alarm(&mut self) {
        let mut pattern: u16 = 0xAAAA;
        while !self.button_pressed() {
            self.set_indicator(pattern & 1 != 0);
            pattern = pattern.rotate_right(1);
            self.delay_ms(100);
        }
        self.set_indicator(false);
    }
}

// ============================================================================
// Profiled Movement
// ============================================================================

/// [`Movement`] on the control loop
pub struct ProfiledMovement<'a, P: Platform> {
    shared: &'a SharedState,
    platform: &'a P,
    moves: MoveConfig,
    front_reference: i32,
    timeout_ms: u32,
    spin_sign: f32,
}

impl<'a, P: Platform> ProfiledMovement<'a, P> {
    /// Create a movement layer over a running control loop
    pub fn new(shared: &'a SharedState, platform: &'a P, config: Option<Config>) -> Self {
        let config = config.unwrap_or_default();
        Self {
            shared,
            platform,
            moves: config.moves,
            front_reference: config.sensors.front_reference,
            timeout_ms: MOVE_TIMEOUT_MS,
            spin_sign: 1.0,
        }
    }

    /// Change the limit on a single blocking wait
    pub fn set_timeout_ms(&mut self, timeout_ms: u32) {
        self.timeout_ms = timeout_ms;
    }

    /// Platform services
    pub fn platform(&self) -> &'a P {
        self.platform
    }

    fn forward(&self) -> ProfileHandle<'a> {
        self.shared.forward()
    }

    fn rotation(&self) -> ProfileHandle<'a> {
        self.shared.rotation()
    }

    // Retry while the queue is full; the tick drains it every period.
    fn send(&self, op: impl Fn() -> Result<()>) -> Result<()> {
        for _ in 0..SEND_RETRIES {
            match op() {
                Err(Error::Busy) => self.platform.delay_us(TICK_PERIOD_US),
                other => return other,
            }
        }
        warn!("command queue stayed full");
        Err(Error::Busy)
    }

    fn command(&self, command: Command) -> Result<()> {
        self.send(|| self.shared.send(command))
    }

    fn wait_until(&self, mut done: impl FnMut() -> bool) -> Result<()> {
        let mut waited = 0u32;
        while !done() {
            if waited >= self.timeout_ms {
                warn!("wait timed out after {} ms", waited);
                return Err(Error::Timeout);
            }
            self.platform.delay_ms(POLL_MS);
            waited += POLL_MS;
        }
        Ok(())
    }

    fn wait_finished(&self, profile: ProfileHandle<'a>) -> Result<()> {
        self.wait_until(|| profile.is_finished())
    }

    // Profile state once every queued command has reached it
    fn settled(&self, profile: ProfileHandle<'a>) -> Result<ProfileSnapshot> {
        let mut snapshot = None;
        self.wait_until(|| {
            snapshot = profile.synced_snapshot();
            snapshot.is_some()
        })?;
        snapshot.ok_or(Error::Timeout)
    }

    /// Motors off, controllers and steering disabled, encoders and profiles
    /// reset
    pub fn reset_drive_system(&self) -> Result<()> {
        self.command(Command::ResetDrive)
    }

    /// Switch motor controller output
    pub fn set_controllers(&self, enabled: bool) -> Result<()> {
        self.command(Command::Controllers(enabled))
    }

    /// Switch wall sensors and emitters
    pub fn set_sensors(&self, enabled: bool) -> Result<()> {
        self.command(Command::Sensors(enabled))
    }

    /// Arbitrary turn: in place when stationary, integrated when moving
    ///
    /// Positive angles turn left.
    pub fn turn(&self, angle: f32, omega: f32, alpha: f32) -> Result<()> {
        let rotation = self.rotation();
        self.send(|| rotation.reset())?;
        self.send(|| rotation.start(angle, omega, 0.0, alpha))?;
        self.wait_finished(rotation)
    }

    /// Bring forward speed to zero, then turn
    pub fn spin_turn(&self, angle: f32, speed: f32, acceleration: f32) -> Result<()> {
        let forward = self.forward();
        self.send(|| forward.set_target_speed(0.0))?;
        self.wait_until(|| self.shared.is_synced() && forward.speed() == 0.0)?;
        self.turn(angle, speed, acceleration)
    }

    /// Brake to a halt at a forward position
    ///
    /// Assumes the robot is moving with room left to stop.
    pub fn stop_at(&self, position: f32) -> Result<()> {
        let remaining = position - self.settled(self.forward())?.position;
        self.stop_after(remaining)
    }

    /// Brake to a halt after a distance
    ///
    /// Assumes the robot is moving with room left to stop.
    pub fn stop_after(&self, distance: f32) -> Result<()> {
        let forward = self.forward();
        let now = self.settled(forward)?;
        self.send(|| forward.start(distance, now.speed, 0.0, now.acceleration))?;
        self.wait_finished(forward)
    }

    /// Wait for the forward profile to reach a position
    pub fn wait_until_position(&self, position: f32) -> Result<()> {
        let forward = self.forward();
        self.wait_until(|| self.shared.is_synced() && forward.position() >= position)
    }

    /// Wait for the forward profile to move on by a distance
    pub fn wait_until_distance(&self, distance: f32) -> Result<()> {
        self.wait_until(|| self.shared.is_synced())?;
        let target = self.forward().position() + distance;
        self.wait_until_position(target)
    }

    // Slow down toward the middle of the next cell. With a wall ahead the
    // front sensor decides where to stop.
    fn stop_in_cell(&self, front_wall: bool) -> Result<()> {
        let forward = self.forward();
        self.command(Command::Steering(false))?;
        let now = self.settled(forward)?;
        let remaining = (FULL_CELL + HALF_CELL) - now.position;
        self.send(|| forward.start(remaining, now.speed, CREEP_TO_CENTER, now.acceleration))?;
        if front_wall {
            let reference = self.front_reference;
            self.wait_until(|| self.shared.sensors().front >= reference)?;
        } else {
            self.wait_finished(forward)?;
        }
        debug!(
            "stopped at {} front {}",
            forward.position(),
            self.shared.sensors().front
        );
        self.send(|| forward.stop())
    }
}

impl<P: Platform> Movement for ProfiledMovement<'_, P> {
    fn walls(&mut self) -> WallState {
        self.shared.sensors().walls
    }

    fn front_sensor(&mut self) -> i32 {
        self.shared.sensors().front
    }

    fn position(&mut self) -> f32 {
        self.forward().position()
    }

    fn button_pressed(&mut self) -> bool {
        self.platform.button_pressed()
    }

    fn set_indicator(&mut self, on: bool) {
        self.platform.set_indicator(on);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.platform.delay_ms(ms);
    }

    fn moves(&self) -> MoveConfig {
        self.moves
    }

    fn begin(&mut self) -> Result<()> {
        self.set_sensors(true)?;
        self.reset_drive_system()?;
        self.set_controllers(true)
    }

    fn set_steering(&mut self, enabled: bool) -> Result<()> {
        self.command(Command::Steering(enabled))
    }

    fn leave_start(&mut self, start: StartPosition) -> Result<()> {
        let forward = self.forward();
        let m = self.moves;
        match start {
            StartPosition::BackWall { align } => {
                if align {
                    self.send(|| forward.start(ALIGN_DISTANCE, ALIGN_SPEED, 0.0, ALIGN_ACCEL))?;
                    self.wait_finished(forward)?;
                }
                self.send(|| {
                    forward.start(
                        m.back_wall_to_center,
                        m.search_speed,
                        m.search_speed,
                        m.search_accel,
                    )
                })?;
                self.wait_finished(forward)?;
                self.send(|| forward.set_position(HALF_CELL))?;
                self.wait_until_position(SENSING_POSITION)?;
            }
            StartPosition::CellCenter => {
                let distance = SENSING_POSITION - HALF_CELL;
                self.send(|| {
                    forward.start(distance, m.search_speed, m.search_speed, m.search_accel)
                })?;
                self.wait_finished(forward)?;
                self.send(|| forward.set_position(SENSING_POSITION))?;
            }
        }
        debug!("off we go from {:?}", start);
        Ok(())
    }

    fn search_forward(&mut self) -> Result<()> {
        let forward = self.forward();
        self.send(|| forward.adjust_position(-FULL_CELL))?;
        self.wait_until_position(SENSING_POSITION)
    }

    fn search_turn(&mut self, turn: Turn) -> Result<()> {
        let m = self.moves;
        let run_in = match turn {
            Turn::Right => m.right_run_in,
            Turn::Left => m.left_run_in,
            _ => return Err(Error::InvalidArg),
        };
        let forward = self.forward();
        let rotation = self.rotation();
        self.command(Command::Steering(false))?;

        let now = self.settled(forward)?;
        let distance = FULL_CELL + TURN_OVERSHOOT + run_in - now.position;
        self.send(|| forward.start(distance, now.speed, m.turn_speed, m.search_accel))?;
        let mut triggered = false;
        let mut waited = 0u32;
        while !forward.is_finished() {
            if waited >= self.timeout_ms {
                return Err(Error::Timeout);
            }
            self.platform.delay_ms(POLL_MS);
            waited += POLL_MS;
            if !triggered && self.shared.sensors().front > m.turn_trigger {
                self.send(|| forward.set_state(ProfileState::Finished))?;
                triggered = true;
            }
        }
        debug!("search turn {:?} triggered {}", turn, triggered);

        let angle = turn.degrees();
        self.send(|| rotation.start(angle, m.search_turn_omega, 0.0, m.search_turn_alpha))?;
        self.wait_finished(rotation)?;
        let speed = self.settled(forward)?.speed;
        self.send(|| forward.start(m.search_run_out, speed, m.search_speed, m.search_accel))?;
        self.wait_finished(forward)?;
        self.send(|| forward.set_position(SENSING_POSITION))
    }

    fn turn_around(&mut self, front_wall: bool) -> Result<()> {
        let m = self.moves;
        self.stop_in_cell(front_wall)?;
        self.spin_turn(-180.0, m.spin_speed, m.spin_accel)?;
        let forward = self.forward();
        let distance = SENSING_POSITION - HALF_CELL;
        self.send(|| forward.start(distance, m.search_speed, m.search_speed, m.search_accel))?;
        self.wait_finished(forward)?;
        self.send(|| forward.set_position(SENSING_POSITION))
    }

    fn end_run(&mut self, front_wall: bool) -> Result<()> {
        let m = self.moves;
        self.stop_in_cell(front_wall)?;
        self.spin_turn(-180.0, m.spin_speed, m.spin_accel)
    }

    fn finish(&mut self) -> Result<()> {
        for _ in 0..4 {
            self.set_sensors(false)?;
            self.platform.delay_ms(250);
            self.set_sensors(true)?;
            self.platform.delay_ms(250);
        }
        self.set_sensors(false)?;
        self.reset_drive_system()
    }

    fn spin(&mut self, turn: Turn) -> Result<()> {
        let m = self.moves;
        let angle = match turn {
            Turn::Ahead => return Ok(()),
            Turn::Back => {
                // half turns alternate direction
                self.spin_sign = -self.spin_sign;
                self.spin_sign * 180.0
            }
            _ => turn.degrees(),
        };
        self.spin_turn(angle, m.spin_speed, m.spin_accel)
    }

    fn straight(&mut self, distance: f32, top_speed: f32, final_speed: f32) -> Result<()> {
        let forward = self.forward();
        let acceleration = self.moves.search_accel;
        self.send(|| forward.start(distance, top_speed, final_speed, acceleration))?;
        self.wait_finished(forward)
    }

    fn smooth_turn(&mut self, turn: Turn) -> Result<()> {
        if !matches!(turn, Turn::Left | Turn::Right) {
            return Err(Error::InvalidArg);
        }
        let m = self.moves;
        self.turn(turn.degrees(), m.smooth_turn_omega, m.smooth_turn_alpha)
    }

    fn halt(&mut self) -> Result<()> {
        self.reset_drive_system()
    }
}
