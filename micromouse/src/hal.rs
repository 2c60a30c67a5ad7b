//! Micromouse core - Hardware Abstraction Layer
//!
//! Two traits split the hardware along the concurrency boundary:
//!
//! - [`Hal`] is owned by the control tick: encoders, wall sensors, supply
//!   voltage and motor drive. It takes `&mut self` and is never shared.
//! - [`Platform`] is used by the foreground: time, delays, the user button,
//!   the indicator and raw debug output.
//!
//! # Implementing a HAL
//!
//! ```ignore
//! struct Board { /* timers, ADC, PWM */ }
//!
//! impl Hal for Board {
//!     fn encoder_deltas(&mut self) -> (i32, i32) {
//!         // Read and clear the quadrature counters
//!     }
//!
//!     fn set_motor_drive(&mut self, left: f32, right: f32) {
//!         // Scale [-1, 1] onto the PWM compare registers
//!     }
//!
//!     // ... implement other methods
//! }
//! ```

use crate::types::*;

// ============================================================================
// HAL Trait (tick side)
// ============================================================================

/// Hardware used by the control tick
pub trait Hal {
    /// Raw encoder counts since the previous call, `(left, right)`
    ///
    /// Counts are unsigned-direction hardware counts; polarity is applied by
    /// the odometry from [`crate::config::Geometry`].
    fn encoder_deltas(&mut self) -> (i32, i32);

    /// Raw wall sensor readings from the last completed cycle,
    /// `[left, front, right]`
    fn wall_sensors(&mut self) -> [i32; 3];

    /// Measured supply voltage
    fn supply_volts(&mut self) -> f32;

    /// Normalized motor drive in [-1, 1], polarity already applied
    fn set_motor_drive(&mut self, left: f32, right: f32);

    /// Switch the sensor emitters
    fn set_emitters(&mut self, _on: bool) {}

    /// Begin the next sensor acquisition cycle
    ///
    /// Called last in every tick so readings are ready for the next one.
    fn start_sensor_cycle(&mut self) {}
}

// ============================================================================
// Platform Trait (foreground)
// ============================================================================

/// Services used by the foreground navigation code
pub trait Platform {
    /// Current time in microseconds
    ///
    /// Must be monotonically increasing.
    fn time_us(&self) -> TimeUs;

    /// Current time in milliseconds
    fn time_ms(&self) -> u32 {
        (self.time_us() / 1000) as u32
    }

    /// Block for at least `us` microseconds
    fn delay_us(&self, us: u32);

    /// Block for at least `ms` milliseconds
    fn delay_ms(&self, ms: u32) {
        self.delay_us(ms.saturating_mul(1000));
    }

    /// True while the user button is held
    fn button_pressed(&self) -> bool;

    /// Drive the indicator LED
    fn set_indicator(&self, _on: bool) {}

    /// Get platform name
    fn platform_name(&self) -> &'static str;

    /// Debug print (optional)
    fn debug_print(&self, _msg: &str) {}
}

// ============================================================================
// No-op HAL (for testing)
// ============================================================================

/// Scripted hardware for unit tests
///
/// Encoder deltas and sensor readings are whatever the test puts in the
/// public fields; motor drive is recorded.
#[cfg(any(test, feature = "std"))]
#[derive(Debug)]
pub struct NoopHal {
    time: core::sync::atomic::AtomicU64,
    button: core::sync::atomic::AtomicBool,
    /// Deltas returned on every `encoder_deltas` call
    pub encoder: (i32, i32),
    /// Readings returned by `wall_sensors`
    pub sensors: [i32; 3],
    /// Reported supply voltage
    pub supply: f32,
    /// Last drive handed to the motors
    pub drive: (f32, f32),
    /// Emitter state
    pub emitters: bool,
    /// Number of sensor cycles started
    pub sensor_cycles: u32,
}

#[cfg(any(test, feature = "std"))]
impl NoopHal {
    /// Create new no-op HAL
    pub fn new() -> Self {
        Self {
            time: core::sync::atomic::AtomicU64::new(0),
            button: core::sync::atomic::AtomicBool::new(false),
            encoder: (0, 0),
            sensors: [0; 3],
            supply: 8.0,
            drive: (0.0, 0.0),
            emitters: false,
            sensor_cycles: 0,
        }
    }

    /// Advance time (for testing)
    pub fn advance_time(&self, us: u64) {
        self.time.fetch_add(us, core::sync::atomic::Ordering::SeqCst);
    }

    /// Press or release the button
    pub fn set_button(&self, pressed: bool) {
        self.button
            .store(pressed, core::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "std"))]
impl Default for NoopHal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "std"))]
impl Hal for NoopHal {
    fn encoder_deltas(&mut self) -> (i32, i32) {
        self.encoder
    }

    fn wall_sensors(&mut self) -> [i32; 3] {
        self.sensors
    }

    fn supply_volts(&mut self) -> f32 {
        self.supply
    }

    fn set_motor_drive(&mut self, left: f32, right: f32) {
        self.drive = (left, right);
    }

    fn set_emitters(&mut self, on: bool) {
        self.emitters = on;
    }

    fn start_sensor_cycle(&mut self) {
        self.sensor_cycles += 1;
    }
}

#[cfg(any(test, feature = "std"))]
impl Platform for NoopHal {
    fn time_us(&self) -> TimeUs {
        self.time.load(core::sync::atomic::Ordering::SeqCst)
    }

    fn delay_us(&self, us: u32) {
        self.advance_time(us as u64);
    }

    fn button_pressed(&self) -> bool {
        self.button.load(core::sync::atomic::Ordering::SeqCst)
    }

    fn platform_name(&self) -> &'static str {
        "noop"
    }
}

// ============================================================================
// POSIX Platform (std only)
// ============================================================================

#[cfg(feature = "std")]
pub mod posix {
    //! Wall-clock platform for hosts running the tick on its own thread

    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::{Duration, Instant};

    /// Foreground platform backed by the system clock
    pub struct PosixPlatform {
        start: Instant,
        button: AtomicBool,
        indicator: AtomicBool,
        indicator_changes: AtomicU32,
    }

    impl PosixPlatform {
        /// Create new POSIX platform
        pub fn new() -> Self {
            Self {
                start: Instant::now(),
                button: AtomicBool::new(false),
                indicator: AtomicBool::new(false),
                indicator_changes: AtomicU32::new(0),
            }
        }

        /// Simulate a button press (e.g. from a signal handler)
        pub fn press_button(&self) {
            self.button.store(true, Ordering::SeqCst);
        }

        /// Current indicator state
        pub fn indicator(&self) -> bool {
            self.indicator.load(Ordering::Relaxed)
        }

        /// Number of indicator transitions so far
        pub fn indicator_changes(&self) -> u32 {
            self.indicator_changes.load(Ordering::Relaxed)
        }
    }

    impl Default for PosixPlatform {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Platform for PosixPlatform {
        fn time_us(&self) -> TimeUs {
            self.start.elapsed().as_micros() as TimeUs
        }

        fn delay_us(&self, us: u32) {
            std::thread::sleep(Duration::from_micros(us as u64));
        }

        fn button_pressed(&self) -> bool {
            self.button.swap(false, Ordering::SeqCst)
        }

        fn set_indicator(&self, on: bool) {
            if self.indicator.swap(on, Ordering::Relaxed) != on {
                self.indicator_changes.fetch_add(1, Ordering::Relaxed);
            }
        }

        fn platform_name(&self) -> &'static str {
            "posix"
        }

        fn debug_print(&self, msg: &str) {
            eprintln!("{}", msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_platform_time() {
        let hal = NoopHal::new();
        assert_eq!(hal.time_us(), 0);
        hal.delay_ms(3);
        assert_eq!(hal.time_us(), 3000);
        assert_eq!(hal.time_ms(), 3);
    }

    #[test]
    fn test_noop_hal_records_drive() {
        let mut hal = NoopHal::new();
        hal.set_motor_drive(0.5, -0.25);
        assert_eq!(hal.drive, (0.5, -0.25));
        hal.start_sensor_cycle();
        assert_eq!(hal.sensor_cycles, 1);
    }
}
