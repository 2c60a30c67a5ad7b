//! Micromouse core - Wall sensor processing
//!
//! Normalises raw readings, detects walls and derives the cross-track error
//! used by steering. Runs inside the control tick.

use crate::config::SensorConfig;
use crate::snapshot::WallState;

/// Processed wall sensor state
#[derive(Debug, Clone)]
pub struct WallSensors {
    config: SensorConfig,
    front_limit: i32,
    enabled: bool,
    raw: [i32; 3],
    left: i32,
    front: i32,
    right: i32,
    walls: WallState,
    cross_track_error: f32,
}

fn normalise(raw: i32, nominal: i32, calibration: i32) -> i32 {
    if calibration <= 0 {
        return raw;
    }
    (raw as f32 * nominal as f32 / calibration as f32) as i32
}

impl WallSensors {
    /// Create sensor processing with the given calibration
    ///
    /// `front_limit` is the front reading above which side readings are too
    /// unreliable to steer by.
    pub fn new(config: Option<SensorConfig>, front_limit: i32) -> Self {
        Self {
            config: config.unwrap_or_default(),
            front_limit,
            enabled: false,
            raw: [0; 3],
            left: 0,
            front: 0,
            right: 0,
            walls: WallState::default(),
            cross_track_error: 0.0,
        }
    }

    /// Enable or disable processing
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Processing enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Process one set of raw readings `[left, front, right]`
    ///
    /// Returns the cross-track error: negative when the robot is too far
    /// left. Disabled sensors leave the last readings in place and report
    /// zero error.
    pub fn update(&mut self, raw: [i32; 3]) -> f32 {
        if !self.enabled {
            self.cross_track_error = 0.0;
            return 0.0;
        }
        let c = &self.config;
        self.raw = raw.map(|r| r.max(0));
        self.left = normalise(self.raw[0], c.left_nominal, c.left_calibration);
        self.front = normalise(self.raw[1], c.front_nominal, c.front_calibration);
        self.right = normalise(self.raw[2], c.right_nominal, c.right_calibration);

        self.walls = WallState {
            left: self.left > c.left_threshold,
            front: self.front > c.front_threshold,
            right: self.right > c.right_threshold,
        };

        let left_error = (c.left_nominal - self.left) as f32;
        let right_error = (c.right_nominal - self.right) as f32;
        let mut error = match (self.walls.left, self.walls.right) {
            (true, true) => left_error - right_error,
            (true, false) => 2.0 * left_error,
            (false, true) => -2.0 * right_error,
            (false, false) => 0.0,
        };
        if self.front > self.front_limit {
            error = 0.0;
        }
        self.cross_track_error = error;
        error
    }

    /// Normalised readings `(left, front, right)`
    pub fn readings(&self) -> (i32, i32, i32) {
        (self.left, self.front, self.right)
    }

    /// Raw readings from the last update
    pub fn raw(&self) -> [i32; 3] {
        self.raw
    }

    /// Detected walls
    pub fn walls(&self) -> WallState {
        self.walls
    }

    /// Last cross-track error
    pub fn cross_track_error(&self) -> f32 {
        self.cross_track_error
    }
}
