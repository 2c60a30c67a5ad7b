//! Micromouse core - Configuration
//!
//! Every tunable lives in a typed sub-config with `Default` carrying the
//! calibrated robot's values. Components take `Option<SubConfig>` and fall
//! back to the defaults.
//!
//! The static [`SETTINGS`] table exposes the numeric tunables by name for
//! menus, command lines and persistence:
//!
//! ```ignore
//! let mut config = Config::default();
//! config.set("fwd_kp", 1.8)?;
//! assert_eq!(config.get("fwd_kp")?, 1.8);
//! ```

use crate::types::*;

/// Settings layout revision. Stored settings with another revision are
/// rejected.
pub const CONFIG_REVISION: u32 = 107;

// ============================================================================
// Sub-configs
// ============================================================================

/// Motor controller gains and limits
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DriveConfig {
    /// Forward controller proportional gain (V/mm)
    pub fwd_kp: f32,
    /// Forward controller derivative gain
    pub fwd_kd: f32,
    /// Rotation controller proportional gain (V/deg)
    pub rot_kp: f32,
    /// Rotation controller derivative gain
    pub rot_kd: f32,
    /// Speed feed-forward (V per mm/s)
    pub speed_ff: f32,
    /// Motor voltage clamp
    pub max_motor_volts: f32,
    /// Left motor polarity (+1 or -1)
    pub left_motor_polarity: i8,
    /// Right motor polarity (+1 or -1)
    pub right_motor_polarity: i8,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            fwd_kp: 2.0,
            fwd_kd: 1.1,
            rot_kp: 2.1,
            rot_kd: 1.2,
            speed_ff: 1.0 / 280.0,
            max_motor_volts: 6.0,
            left_motor_polarity: 1,
            right_motor_polarity: -1,
        }
    }
}

/// Wall-following steering controller
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SteeringConfig {
    /// Proportional gain
    pub kp: f32,
    /// Derivative gain
    pub kd: f32,
    /// Clamp on the per-tick adjustment (deg)
    pub adjust_limit: f32,
    /// Front reading above which side sensors are ignored
    pub front_limit: i32,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            kp: 0.25,
            kd: 0.0,
            adjust_limit: 10.0,
            front_limit: 100,
        }
    }
}

/// Wall sensor calibration
///
/// Raw readings are scaled by `nominal / calibration` so that a centred
/// robot reads the nominal value from each side wall.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorConfig {
    /// Raw left reading when centred
    pub left_calibration: i32,
    /// Raw front reading when backed against a wall
    pub front_calibration: i32,
    /// Raw right reading when centred
    pub right_calibration: i32,
    /// Normalised left target
    pub left_nominal: i32,
    /// Normalised front target
    pub front_nominal: i32,
    /// Normalised right target
    pub right_nominal: i32,
    /// Left wall present above this
    pub left_threshold: i32,
    /// Front wall present above this
    pub front_threshold: i32,
    /// Right wall present above this
    pub right_threshold: i32,
    /// Front reading with the robot centred in a cell facing a wall
    pub front_reference: i32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            left_calibration: 112,
            front_calibration: 82,
            right_calibration: 82,
            left_nominal: 100,
            front_nominal: 100,
            right_nominal: 100,
            left_threshold: 40,
            front_threshold: 20,
            right_threshold: 40,
            front_reference: 850,
        }
    }
}

/// Drive mechanics
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Geometry {
    /// Wheel diameter (mm)
    pub wheel_diameter: f32,
    /// Encoder pulses per motor revolution
    pub encoder_pulses: f32,
    /// Motor to wheel reduction
    pub gear_ratio: f32,
    /// Half the wheel track (mm)
    pub mouse_radius: f32,
    /// Wheel size mismatch; negative curves left
    pub rotation_bias: f32,
    /// Left encoder polarity (+1 or -1)
    pub left_encoder_polarity: i8,
    /// Right encoder polarity (+1 or -1)
    pub right_encoder_polarity: i8,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            wheel_diameter: 31.966,
            encoder_pulses: 12.0,
            gear_ratio: 11.4,
            mouse_radius: 37.92,
            rotation_bias: 0.0025,
            left_encoder_polarity: -1,
            right_encoder_polarity: 1,
        }
    }
}

impl Geometry {
    /// Left wheel travel per encoder count (mm)
    pub fn mm_per_count_left(&self) -> f32 {
        (1.0 - self.rotation_bias) * core::f32::consts::PI * self.wheel_diameter
            / (self.encoder_pulses * self.gear_ratio)
    }

    /// Right wheel travel per encoder count (mm)
    pub fn mm_per_count_right(&self) -> f32 {
        (1.0 + self.rotation_bias) * core::f32::consts::PI * self.wheel_diameter
            / (self.encoder_pulses * self.gear_ratio)
    }

    /// Heading change per mm of wheel travel difference
    pub fn deg_per_mm_difference(&self) -> f32 {
        180.0 / (2.0 * self.mouse_radius * core::f32::consts::PI)
    }
}

/// Speeds, accelerations and turn geometry for the navigation moves
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MoveConfig {
    /// Forward acceleration while searching (mm/s²)
    pub search_accel: f32,
    /// Cruise speed while searching (mm/s)
    pub search_speed: f32,
    /// Top speed on run straights (mm/s)
    pub run_speed: f32,
    /// Entry speed of a search turn (mm/s)
    pub turn_speed: f32,
    /// Forward speed of a smooth run turn (mm/s)
    pub smooth_turn_speed: f32,
    /// Peak rate of an in-place spin (deg/s)
    pub spin_speed: f32,
    /// Angular acceleration of an in-place spin (deg/s²)
    pub spin_accel: f32,
    /// Travel from the back wall to the start cell centre (mm)
    pub back_wall_to_center: f32,
    /// Straight before a right search turn (mm)
    pub right_run_in: f32,
    /// Straight before a left search turn (mm)
    pub left_run_in: f32,
    /// Straight after a search turn (mm)
    pub search_run_out: f32,
    /// Peak rate of a search turn (deg/s)
    pub search_turn_omega: f32,
    /// Angular acceleration of a search turn (deg/s²)
    pub search_turn_alpha: f32,
    /// Front reading that cuts a search-turn run-in short
    pub turn_trigger: i32,
    /// Straight either side of a smooth run turn (mm)
    pub smooth_run_in: f32,
    /// Peak rate of a smooth run turn (deg/s)
    pub smooth_turn_omega: f32,
    /// Angular acceleration of a smooth run turn (deg/s²)
    pub smooth_turn_alpha: f32,
}

impl Default for MoveConfig {
    fn default() -> Self {
        Self {
            search_accel: 2000.0,
            search_speed: 400.0,
            run_speed: 800.0,
            turn_speed: 300.0,
            smooth_turn_speed: 500.0,
            spin_speed: 400.0,
            spin_accel: 5000.0,
            back_wall_to_center: 48.0,
            right_run_in: 15.0,
            left_run_in: 7.0,
            search_run_out: 10.0,
            search_turn_omega: 280.0,
            search_turn_alpha: 4000.0,
            turn_trigger: 54,
            smooth_run_in: 20.0,
            smooth_turn_omega: 200.0,
            smooth_turn_alpha: 2000.0,
        }
    }
}

// ============================================================================
// Config
// ============================================================================

/// Complete robot configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Layout revision, [`CONFIG_REVISION`] when built here
    pub revision: u32,
    /// Motor controllers
    pub drive: DriveConfig,
    /// Steering controller
    pub steering: SteeringConfig,
    /// Wall sensors
    pub sensors: SensorConfig,
    /// Drive mechanics
    pub geometry: Geometry,
    /// Navigation moves
    pub moves: MoveConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            revision: CONFIG_REVISION,
            drive: DriveConfig::default(),
            steering: SteeringConfig::default(),
            sensors: SensorConfig::default(),
            geometry: Geometry::default(),
            moves: MoveConfig::default(),
        }
    }
}

impl Config {
    /// Table of named settings
    pub fn settings() -> &'static [SettingInfo] {
        &SETTINGS
    }

    /// Look up a setting by name
    pub fn find(name: &str) -> Result<&'static SettingInfo> {
        SETTINGS
            .iter()
            .find(|s| s.name == name)
            .ok_or(Error::NotFound)
    }

    /// Read a setting by name
    pub fn get(&self, name: &str) -> Result<f32> {
        Ok((Self::find(name)?.get)(self))
    }

    /// Write a setting by name, bounds checked
    pub fn set(&mut self, name: &str, value: f32) -> Result<()> {
        let info = Self::find(name)?;
        if !value.is_finite() || value < info.min || value > info.max {
            return Err(Error::InvalidArg);
        }
        (info.set)(self, value);
        Ok(())
    }

    /// Serialize to JSON
    #[cfg(feature = "std")]
    pub fn to_json(&self) -> Result<std::string::String> {
        serde_json::to_string_pretty(self).map_err(|_| Error::InvalidData)
    }

    /// Parse from JSON, rejecting other revisions
    #[cfg(feature = "std")]
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json).map_err(|_| Error::InvalidData)?;
        if config.revision != CONFIG_REVISION {
            return Err(Error::RevisionMismatch);
        }
        Ok(config)
    }
}

// ============================================================================
// Settings Table
// ============================================================================

/// Named, bounded view of one numeric setting
#[derive(Clone, Copy)]
pub struct SettingInfo {
    /// Setting name
    pub name: &'static str,
    /// Smallest accepted value
    pub min: f32,
    /// Largest accepted value
    pub max: f32,
    /// Read accessor
    pub get: fn(&Config) -> f32,
    /// Write accessor (bounds already checked)
    pub set: fn(&mut Config, f32),
}

impl core::fmt::Debug for SettingInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SettingInfo")
            .field("name", &self.name)
            .field("min", &self.min)
            .field("max", &self.max)
            .finish()
    }
}

macro_rules! setting {
    ($name:literal, $min:expr, $max:expr, $($field:ident).+ : $ty:ty) => {
        SettingInfo {
            name: $name,
            min: $min,
            max: $max,
            get: |c: &Config| c.$($field).+ as f32,
            set: |c: &mut Config, v: f32| c.$($field).+ = v as $ty,
        }
    };
}

/// Number of entries in [`SETTINGS`]
pub const SETTING_COUNT: usize = 35;

/// All named settings
pub static SETTINGS: [SettingInfo; SETTING_COUNT] = [
    setting!("fwd_kp", 0.0, 20.0, drive.fwd_kp: f32),
    setting!("fwd_kd", 0.0, 20.0, drive.fwd_kd: f32),
    setting!("rot_kp", 0.0, 20.0, drive.rot_kp: f32),
    setting!("rot_kd", 0.0, 20.0, drive.rot_kd: f32),
    setting!("speed_ff", 0.0, 0.1, drive.speed_ff: f32),
    setting!("max_motor_volts", 0.0, 12.0, drive.max_motor_volts: f32),
    setting!("steering_kp", 0.0, 10.0, steering.kp: f32),
    setting!("steering_kd", 0.0, 10.0, steering.kd: f32),
    setting!("steering_limit", 0.0, 90.0, steering.adjust_limit: f32),
    setting!("steering_front_limit", 0.0, 1023.0, steering.front_limit: i32),
    setting!("left_calibration", 1.0, 1023.0, sensors.left_calibration: i32),
    setting!("front_calibration", 1.0, 1023.0, sensors.front_calibration: i32),
    setting!("right_calibration", 1.0, 1023.0, sensors.right_calibration: i32),
    setting!("left_nominal", 1.0, 1023.0, sensors.left_nominal: i32),
    setting!("front_nominal", 1.0, 1023.0, sensors.front_nominal: i32),
    setting!("right_nominal", 1.0, 1023.0, sensors.right_nominal: i32),
    setting!("left_threshold", 0.0, 1023.0, sensors.left_threshold: i32),
    setting!("front_threshold", 0.0, 1023.0, sensors.front_threshold: i32),
    setting!("right_threshold", 0.0, 1023.0, sensors.right_threshold: i32),
    setting!("front_reference", 0.0, 4095.0, sensors.front_reference: i32),
    setting!("wheel_diameter", 10.0, 100.0, geometry.wheel_diameter: f32),
    setting!("mouse_radius", 10.0, 100.0, geometry.mouse_radius: f32),
    setting!("rotation_bias", -0.1, 0.1, geometry.rotation_bias: f32),
    setting!("search_accel", 100.0, 20000.0, moves.search_accel: f32),
    setting!("search_speed", 10.0, 3000.0, moves.search_speed: f32),
    setting!("run_speed", 10.0, 5000.0, moves.run_speed: f32),
    setting!("turn_speed", 10.0, 3000.0, moves.turn_speed: f32),
    setting!("smooth_turn_speed", 10.0, 3000.0, moves.smooth_turn_speed: f32),
    setting!("spin_speed", 10.0, 3000.0, moves.spin_speed: f32),
    setting!("spin_accel", 100.0, 50000.0, moves.spin_accel: f32),
    setting!("back_wall_to_center", 0.0, 90.0, moves.back_wall_to_center: f32),
    setting!("right_run_in", 0.0, 90.0, moves.right_run_in: f32),
    setting!("left_run_in", 0.0, 90.0, moves.left_run_in: f32),
    setting!("search_run_out", 0.0, 90.0, moves.search_run_out: f32),
    setting!("turn_trigger", 0.0, 1023.0, moves.turn_trigger: i32),
];
