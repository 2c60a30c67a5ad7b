//! Micromouse core - Control loop
//!
//! Everything time-critical happens in [`ControlLoop::tick`], called every
//! [`TICK_PERIOD_US`](crate::types::TICK_PERIOD_US) from a timer interrupt,
//! a dedicated thread or a simulator. The loop exclusively owns the
//! profiles, odometry, sensor processing, steering and motor controllers.
//!
//! # Example
//!
//! ```ignore
//! let shared = SharedState::new();
//! let mut control = ControlLoop::new(None);
//!
//! // In the 500 Hz timer interrupt
//! control.tick(&mut board, &shared);
//! ```

use crate::config::Config;
use crate::drive::{DriveController, Measured};
use crate::hal::Hal;
use crate::odometry::Odometry;
use crate::profile::MotionProfile;
use crate::sensors::WallSensors;
use crate::shared::{Command, ProfileCommand, SharedState, COMMAND_QUEUE_SIZE};
use crate::snapshot::{Pose, SensorSnapshot};
use crate::steering::Steering;
use crate::types::*;

/// Tick-side motion and sensing state
#[derive(Debug, Clone)]
pub struct ControlLoop {
    forward: MotionProfile,
    rotation: MotionProfile,
    odometry: Odometry,
    sensors: WallSensors,
    steering: Steering,
    drive: DriveController,
    supply_volts: f32,
    ticks: Tick,
}

impl ControlLoop {
    /// Create a control loop with motors off and everything idle
    pub fn new(config: Option<Config>) -> Self {
        let config = config.unwrap_or_default();
        Self {
            forward: MotionProfile::new(),
            rotation: MotionProfile::new(),
            odometry: Odometry::new(Some(config.geometry)),
            sensors: WallSensors::new(Some(config.sensors), config.steering.front_limit),
            steering: Steering::new(Some(config.steering)),
            drive: DriveController::new(Some(config.drive), config.geometry.mouse_radius),
            supply_volts: 0.0,
            ticks: 0,
        }
    }

    /// Run one control period
    ///
    /// Never blocks, allocates or logs.
    pub fn tick<H: Hal>(&mut self, hal: &mut H, shared: &SharedState) {
        // 1. Apply foreground commands (bounded per tick)
        let mut applied = 0u32;
        while (applied as usize) < COMMAND_QUEUE_SIZE {
            match shared.take_command() {
                Some(command) => {
                    self.apply(command, hal);
                    applied += 1;
                }
                None => break,
            }
        }

        // 2. Encoders first, they keep changing
        let (left, right) = hal.encoder_deltas();
        self.odometry.update(left, right);

        // 3. Supply voltage
        self.supply_volts = hal.supply_volts();

        // 4. Profiles
        self.forward.update();
        self.rotation.update();

        // 5. Wall sensors
        let error = self.sensors.update(hal.wall_sensors());

        // 6. Steering
        let adjustment = self.steering.update(error);

        // 7. Motor controllers
        let measured = Measured {
            fwd_increment: self.odometry.fwd_increment(),
            rot_increment: self.odometry.rot_increment(),
        };
        let steering = self.steering.is_enabled().then_some(adjustment);
        self.drive
            .update(&self.forward, &self.rotation, measured, steering);
        if self.drive.is_enabled() {
            let (left, right) = self.drive.motor_drive(self.supply_volts);
            hal.set_motor_drive(left, right);
        }

        // 8. Publish, then release the commands as applied
        self.publish(shared);
        shared.complete_tick(applied);
        self.ticks = self.ticks.wrapping_add(1);

        // 9. Start the next sensor cycle. Nothing follows this.
        hal.start_sensor_cycle();
    }

    fn apply<H: Hal>(&mut self, command: Command, hal: &mut H) {
        match command {
            Command::Profile(axis, op) => {
                let profile = match axis {
                    Axis::Forward => &mut self.forward,
                    Axis::Rotation => &mut self.rotation,
                };
                apply_profile(profile, op);
            }
            Command::Controllers(enabled) => {
                self.drive.set_enabled(enabled);
                if !enabled {
                    hal.set_motor_drive(0.0, 0.0);
                }
            }
            Command::Steering(true) => self.steering.enable(self.sensors.cross_track_error()),
            Command::Steering(false) => self.steering.disable(),
            Command::Sensors(enabled) => {
                self.sensors.set_enabled(enabled);
                hal.set_emitters(enabled);
            }
            Command::ResetDrive => {
                hal.set_motor_drive(0.0, 0.0);
                self.drive.set_enabled(false);
                self.steering.disable();
                self.odometry.reset();
                self.drive.reset();
                self.forward.reset();
                self.rotation.reset();
            }
        }
    }

    fn publish(&self, shared: &SharedState) {
        shared.publish_profile(Axis::Forward, &self.forward.snapshot());
        shared.publish_profile(Axis::Rotation, &self.rotation.snapshot());
        shared.publish_pose(&self.odometry.pose());
        let (left, front, right) = self.sensors.readings();
        shared.publish_sensors(&SensorSnapshot {
            left,
            front,
            right,
            raw: self.sensors.raw(),
            walls: self.sensors.walls(),
            enabled: self.sensors.is_enabled(),
            steering: self.steering.is_enabled(),
            cross_track_error: self.sensors.cross_track_error(),
            steering_adjustment: self.steering.adjustment(),
            supply_volts: self.supply_volts,
        });
        shared.publish_drive(&self.drive.snapshot());
    }

    /// Forward profile
    pub fn forward(&self) -> &MotionProfile {
        &self.forward
    }

    /// Rotation profile
    pub fn rotation(&self) -> &MotionProfile {
        &self.rotation
    }

    /// Odometry pose
    pub fn pose(&self) -> Pose {
        self.odometry.pose()
    }

    /// Sensor processing
    pub fn sensors(&self) -> &WallSensors {
        &self.sensors
    }

    /// Motor controllers
    pub fn drive(&self) -> &DriveController {
        &self.drive
    }

    /// Ticks run
    pub fn ticks(&self) -> Tick {
        self.ticks
    }
}

fn apply_profile(profile: &mut MotionProfile, op: ProfileCommand) {
    match op {
        ProfileCommand::Start {
            distance,
            top_speed,
            final_speed,
            acceleration,
        } => profile.start(distance, top_speed, final_speed, acceleration),
        ProfileCommand::Stop => profile.stop(),
        ProfileCommand::Finish => profile.finish(),
        ProfileCommand::SetState(state) => profile.set_state(state),
        ProfileCommand::SetSpeed(speed) => profile.set_speed(speed),
        ProfileCommand::SetTargetSpeed(speed) => profile.set_target_speed(speed),
        ProfileCommand::AdjustPosition(adjustment) => profile.adjust_position(adjustment),
        ProfileCommand::SetPosition(position) => profile.set_position(position),
        ProfileCommand::Reset => profile.reset(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::NoopHal;

    #[test]
    fn test_tick_applies_commands_and_publishes() {
        let shared = SharedState::new();
        let mut control = ControlLoop::new(None);
        let mut hal = NoopHal::new();

        shared.forward().start(180.0, 400.0, 0.0, 2000.0).unwrap();
        assert!(!shared.is_synced());
        control.tick(&mut hal, &shared);

        assert!(shared.is_synced());
        assert_eq!(shared.ticks(), 1);
        assert_eq!(control.ticks(), 1);
        let snap = shared.forward().snapshot();
        assert_eq!(snap.state, ProfileState::Accelerating);
        assert!(snap.speed > 0.0);
        assert_eq!(hal.sensor_cycles, 1);
    }

    #[test]
    fn test_disabled_controllers_leave_motors_alone() {
        let shared = SharedState::new();
        let mut control = ControlLoop::new(None);
        let mut hal = NoopHal::new();
        hal.drive = (0.3, 0.3);
        shared.forward().start(180.0, 400.0, 0.0, 2000.0).unwrap();
        for _ in 0..10 {
            control.tick(&mut hal, &shared);
        }
        assert_eq!(hal.drive, (0.3, 0.3));
        // the error still accumulates while the robot stands still
        assert!(shared.drive().fwd_error > 0.0);
    }

    #[test]
    fn test_enabled_controllers_drive_forward() {
        let shared = SharedState::new();
        let mut control = ControlLoop::new(None);
        let mut hal = NoopHal::new();
        shared.send(Command::Controllers(true)).unwrap();
        shared.forward().start(180.0, 400.0, 0.0, 2000.0).unwrap();
        for _ in 0..5 {
            control.tick(&mut hal, &shared);
        }
        let (left, right) = hal.drive;
        // positive volts on both wheels; right motor is wired reversed
        assert!(left > 0.0);
        assert!(right < 0.0);
        assert!((left + right).abs() < 1e-6);
    }

    #[test]
    fn test_encoder_polarity_and_pose() {
        let shared = SharedState::new();
        let mut control = ControlLoop::new(None);
        let mut hal = NoopHal::new();
        hal.encoder = (-3, 3);
        for _ in 0..10 {
            control.tick(&mut hal, &shared);
        }
        let pose = shared.pose();
        assert_eq!(pose.left_total, 30);
        assert_eq!(pose.right_total, 30);
        assert!(pose.distance > 20.0 && pose.distance < 23.0);
    }

    #[test]
    fn test_sensors_and_steering_commands() {
        let shared = SharedState::new();
        let mut control = ControlLoop::new(None);
        let mut hal = NoopHal::new();
        hal.sensors = [112, 10, 82];

        control.tick(&mut hal, &shared);
        assert!(!shared.sensors().enabled);
        assert_eq!(shared.sensors().left, 0);

        shared.send(Command::Sensors(true)).unwrap();
        shared.send(Command::Steering(true)).unwrap();
        control.tick(&mut hal, &shared);
        let sensors = shared.sensors();
        assert!(hal.emitters);
        assert!(sensors.enabled && sensors.steering);
        assert_eq!((sensors.left, sensors.right), (100, 100));
        assert!(sensors.walls.left && !sensors.walls.front && sensors.walls.right);
        assert_eq!(sensors.cross_track_error, 0.0);
        assert!((sensors.supply_volts - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_reset_drive() {
        let shared = SharedState::new();
        let mut control = ControlLoop::new(None);
        let mut hal = NoopHal::new();
        hal.encoder = (-2, 2);
        shared.send(Command::Controllers(true)).unwrap();
        shared.forward().start(180.0, 400.0, 0.0, 2000.0).unwrap();
        for _ in 0..20 {
            control.tick(&mut hal, &shared);
        }
        hal.encoder = (0, 0);
        shared.send(Command::ResetDrive).unwrap();
        control.tick(&mut hal, &shared);

        assert_eq!(hal.drive, (0.0, 0.0));
        assert_eq!(shared.forward().snapshot().state, ProfileState::Idle);
        assert_eq!(shared.pose().distance, 0.0);
        assert!(!shared.drive().enabled);
    }
}
