//! Micromouse core - Drive controller
//!
//! Two PD loops, forward position and heading angle, each tracking the
//! difference between what its profile commanded this tick and what the
//! encoders measured. The outputs are mixed onto the wheels with speed
//! feed-forward, clamped, compensated for supply voltage and handed to the
//! motors.

use crate::config::DriveConfig;
use crate::profile::MotionProfile;
use crate::snapshot::DriveSnapshot;

const DEG_TO_RAD: f32 = core::f32::consts::PI / 180.0;

/// Measured motion for one tick
#[derive(Debug, Clone, Copy, Default)]
pub struct Measured {
    /// Forward travel (mm)
    pub fwd_increment: f32,
    /// Heading change (deg)
    pub rot_increment: f32,
}

/// Dual-axis PD controller with differential mixing
#[derive(Debug, Clone)]
pub struct DriveController {
    config: DriveConfig,
    mouse_radius: f32,
    enabled: bool,
    fwd_error: f32,
    old_fwd_error: f32,
    rot_error: f32,
    old_rot_error: f32,
    left_volts: f32,
    right_volts: f32,
}

impl DriveController {
    /// Create a disabled controller
    ///
    /// `mouse_radius` is half the wheel track, used for feed-forward mixing.
    pub fn new(config: Option<DriveConfig>, mouse_radius: f32) -> Self {
        Self {
            config: config.unwrap_or_default(),
            mouse_radius,
            enabled: false,
            fwd_error: 0.0,
            old_fwd_error: 0.0,
            rot_error: 0.0,
            old_rot_error: 0.0,
            left_volts: 0.0,
            right_volts: 0.0,
        }
    }

    /// Clear accumulated errors
    pub fn reset(&mut self) {
        self.fwd_error = 0.0;
        self.old_fwd_error = 0.0;
        self.rot_error = 0.0;
        self.old_rot_error = 0.0;
    }

    /// Enable or disable motor output
    ///
    /// Errors keep accumulating while disabled.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Output enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn position_controller(&mut self, forward: &MotionProfile, measured: f32) -> f32 {
        self.fwd_error += forward.increment() - measured;
        let diff = self.fwd_error - self.old_fwd_error;
        self.old_fwd_error = self.fwd_error;
        self.config.fwd_kp * self.fwd_error + self.config.fwd_kd * diff
    }

    fn angle_controller(
        &mut self,
        rotation: &MotionProfile,
        measured: f32,
        steering_adjustment: Option<f32>,
    ) -> f32 {
        self.rot_error += rotation.increment() - measured;
        if let Some(adjustment) = steering_adjustment {
            self.rot_error += adjustment;
        }
        let diff = self.rot_error - self.old_rot_error;
        self.old_rot_error = self.rot_error;
        self.config.rot_kp * self.rot_error + self.config.rot_kd * diff
    }

    /// Run both loops and mix; returns `(left, right)` motor volts
    ///
    /// `steering_adjustment` is `Some` only while steering is enabled.
    pub fn update(
        &mut self,
        forward: &MotionProfile,
        rotation: &MotionProfile,
        measured: Measured,
        steering_adjustment: Option<f32>,
    ) -> (f32, f32) {
        let pos_output = self.position_controller(forward, measured.fwd_increment);
        let rot_output =
            self.angle_controller(rotation, measured.rot_increment, steering_adjustment);

        let mut left = pos_output - rot_output;
        let mut right = pos_output + rot_output;

        let tangential = DEG_TO_RAD * self.mouse_radius * rotation.speed();
        let v_left = forward.speed() - tangential;
        let v_right = forward.speed() + tangential;
        left += self.config.speed_ff * v_left;
        right += self.config.speed_ff * v_right;

        self.left_volts = left;
        self.right_volts = right;
        (left, right)
    }

    /// Normalised, polarity-corrected drive for the last output
    pub fn motor_drive(&self, supply_volts: f32) -> (f32, f32) {
        (
            self.scale(self.left_volts, supply_volts, self.config.left_motor_polarity),
            self.scale(self.right_volts, supply_volts, self.config.right_motor_polarity),
        )
    }

    fn scale(&self, volts: f32, supply_volts: f32, polarity: i8) -> f32 {
        if supply_volts <= 0.0 || !volts.is_finite() {
            return 0.0;
        }
        let limit = self.config.max_motor_volts;
        let volts = volts.clamp(-limit, limit);
        (volts / supply_volts).clamp(-1.0, 1.0) * polarity as f32
    }

    /// Copy for publication
    pub fn snapshot(&self) -> DriveSnapshot {
        let limit = self.config.max_motor_volts;
        DriveSnapshot {
            left_volts: self.left_volts.clamp(-limit, limit),
            right_volts: self.right_volts.clamp(-limit, limit),
            fwd_error: self.fwd_error,
            rot_error: self.rot_error,
            enabled: self.enabled,
        }
    }

    /// Forward error (mm)
    pub fn fwd_error(&self) -> f32 {
        self.fwd_error
    }

    /// Rotation error (deg)
    pub fn rot_error(&self) -> f32 {
        self.rot_error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moving(speed: f32) -> MotionProfile {
        let mut profile = MotionProfile::new();
        profile.start(1000.0, speed, speed, 1000.0);
        profile.set_speed(speed);
        profile
    }

    #[test]
    fn test_feed_forward_only_when_tracking() {
        let mut drive = DriveController::new(None, 37.92);
        let forward = moving(280.0);
        let rotation = MotionProfile::new();
        let measured = Measured {
            fwd_increment: forward.increment(),
            rot_increment: 0.0,
        };
        let (left, right) = drive.update(&forward, &rotation, measured, None);
        assert!((left - 1.0).abs() < 1e-5);
        assert!((right - 1.0).abs() < 1e-5);
        assert_eq!(drive.fwd_error(), 0.0);
    }

    #[test]
    fn test_rotation_mixes_differentially() {
        let config = DriveConfig {
            speed_ff: 0.0,
            ..DriveConfig::default()
        };
        let mut drive = DriveController::new(Some(config), 37.92);
        let forward = MotionProfile::new();
        let rotation = MotionProfile::new();
        // robot turned clockwise by 1 degree: needs anticlockwise correction
        let measured = Measured {
            fwd_increment: 0.0,
            rot_increment: -1.0,
        };
        let (left, right) = drive.update(&forward, &rotation, measured, None);
        assert!(left < 0.0 && right > 0.0);
        assert!((right + left).abs() < 1e-6);
        // kp * 1 + kd * 1
        assert!((right - 3.3).abs() < 1e-5);
    }

    #[test]
    fn test_steering_adjustment_adds_to_rotation_error() {
        let mut drive = DriveController::new(None, 37.92);
        let idle = MotionProfile::new();
        drive.update(&idle, &idle, Measured::default(), Some(0.5));
        assert_eq!(drive.rot_error(), 0.5);
        drive.update(&idle, &idle, Measured::default(), None);
        assert_eq!(drive.rot_error(), 0.5);
    }

    #[test]
    fn test_motor_drive_clamps_and_applies_polarity() {
        let mut drive = DriveController::new(None, 37.92);
        let idle = MotionProfile::new();
        let measured = Measured {
            fwd_increment: -10.0,
            rot_increment: 0.0,
        };
        drive.update(&idle, &idle, measured, None);
        // huge positive demand: clamp to 6 V, 6 / 8 = 0.75
        let (left, right) = drive.motor_drive(8.0);
        assert!((left - 0.75).abs() < 1e-6);
        assert!((right + 0.75).abs() < 1e-6);

        // low supply saturates at full drive
        let (left, right) = drive.motor_drive(4.0);
        assert_eq!((left, right), (1.0, -1.0));

        assert_eq!(drive.motor_drive(0.0), (0.0, 0.0));
        assert_eq!(drive.snapshot().left_volts, 6.0);
    }

    #[test]
    fn test_reset_clears_errors() {
        let mut drive = DriveController::new(None, 37.92);
        let idle = MotionProfile::new();
        let measured = Measured {
            fwd_increment: 1.0,
            rot_increment: 1.0,
        };
        drive.update(&idle, &idle, measured, None);
        drive.reset();
        assert_eq!(drive.fwd_error(), 0.0);
        assert_eq!(drive.rot_error(), 0.0);
    }
}
