//! Micromouse core - Steering controller
//!
//! PD on the wall cross-track error, producing a per-tick angular
//! adjustment that the rotation controller folds into its error.

use crate::config::SteeringConfig;
use crate::types::LOOP_INTERVAL;

/// Wall-following steering, owned by the control tick
#[derive(Debug, Clone)]
pub struct Steering {
    config: SteeringConfig,
    enabled: bool,
    last_error: f32,
    adjustment: f32,
}

impl Steering {
    /// Create a disabled steering controller
    pub fn new(config: Option<SteeringConfig>) -> Self {
        Self {
            config: config.unwrap_or_default(),
            enabled: false,
            last_error: 0.0,
            adjustment: 0.0,
        }
    }

    /// Compute the adjustment for this tick's cross-track error
    ///
    /// Always computed; it only takes effect while steering is enabled.
    pub fn update(&mut self, error: f32) -> f32 {
        let p_term = self.config.kp * error;
        let d_term = self.config.kd * (error - self.last_error);
        let limit = self.config.adjust_limit;
        self.adjustment = ((p_term + d_term) * LOOP_INTERVAL).clamp(-limit, limit);
        self.last_error = error;
        self.adjustment
    }

    /// Forget history; the next derivative is taken against `current_error`
    pub fn reset(&mut self, current_error: f32) {
        self.last_error = current_error;
        self.adjustment = 0.0;
    }

    /// Reset and enable
    pub fn enable(&mut self, current_error: f32) {
        self.reset(current_error);
        self.enabled = true;
    }

    /// Disable
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Last adjustment (deg)
    pub fn adjustment(&self) -> f32 {
        self.adjustment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proportional_adjustment() {
        let mut steering = Steering::new(None);
        let adj = steering.update(20.0);
        assert!((adj - 0.25 * 20.0 * LOOP_INTERVAL).abs() < 1e-6);
    }

    #[test]
    fn test_adjustment_is_clamped() {
        let mut steering = Steering::new(Some(SteeringConfig {
            kp: 100.0,
            ..SteeringConfig::default()
        }));
        assert_eq!(steering.update(1.0e4), 10.0);
        assert_eq!(steering.update(-1.0e4), -10.0);
    }

    #[test]
    fn test_derivative_uses_reset_error() {
        let mut steering = Steering::new(Some(SteeringConfig {
            kp: 0.0,
            kd: 1.0,
            ..SteeringConfig::default()
        }));
        steering.enable(5.0);
        assert!(steering.is_enabled());
        assert_eq!(steering.update(5.0), 0.0);
        let adj = steering.update(7.0);
        assert!((adj - 2.0 * LOOP_INTERVAL).abs() < 1e-6);
        steering.disable();
        assert!(!steering.is_enabled());
    }
}
