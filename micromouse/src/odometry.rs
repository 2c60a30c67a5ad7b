//! Micromouse core - Encoder odometry
//!
//! Converts per-tick encoder counts into forward and rotational increments
//! and integrates them into the robot pose.

use crate::config::Geometry;
use crate::snapshot::Pose;

/// Encoder integration, owned by the control tick
#[derive(Debug, Clone)]
pub struct Odometry {
    geometry: Geometry,
    mm_per_count_left: f32,
    mm_per_count_right: f32,
    deg_per_mm_difference: f32,
    pose: Pose,
}

impl Odometry {
    /// Create odometry for the given mechanics
    pub fn new(geometry: Option<Geometry>) -> Self {
        let geometry = geometry.unwrap_or_default();
        Self {
            mm_per_count_left: geometry.mm_per_count_left(),
            mm_per_count_right: geometry.mm_per_count_right(),
            deg_per_mm_difference: geometry.deg_per_mm_difference(),
            geometry,
            pose: Pose::default(),
        }
    }

    /// Zero the pose and totals
    pub fn reset(&mut self) {
        self.pose = Pose::default();
    }

    /// Integrate one tick of raw encoder counts
    pub fn update(&mut self, left_raw: i32, right_raw: i32) {
        let left = left_raw * self.geometry.left_encoder_polarity as i32;
        let right = right_raw * self.geometry.right_encoder_polarity as i32;
        self.pose.left_total = self.pose.left_total.wrapping_add(left);
        self.pose.right_total = self.pose.right_total.wrapping_add(right);

        let left_change = left as f32 * self.mm_per_count_left;
        let right_change = right as f32 * self.mm_per_count_right;
        self.pose.fwd_increment = 0.5 * (right_change + left_change);
        self.pose.rot_increment = (right_change - left_change) * self.deg_per_mm_difference;
        self.pose.distance += self.pose.fwd_increment;
        self.pose.angle += self.pose.rot_increment;
    }

    /// Forward travel in the last tick (mm)
    pub fn fwd_increment(&self) -> f32 {
        self.pose.fwd_increment
    }

    /// Heading change in the last tick (deg)
    pub fn rot_increment(&self) -> f32 {
        self.pose.rot_increment
    }

    /// Current pose
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Mechanics in use
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_line() {
        let mut odo = Odometry::new(None);
        let geometry = Geometry::default();
        // left encoder counts backwards when driving forward
        odo.update(-10, 10);
        let expected = 0.5 * 10.0 * (geometry.mm_per_count_left() + geometry.mm_per_count_right());
        assert!((odo.fwd_increment() - expected).abs() < 1e-5);
        assert_eq!(odo.pose().left_total, 10);
        assert_eq!(odo.pose().right_total, 10);
        // the bias term turns a little even on equal counts
        assert!(odo.rot_increment() > 0.0 && odo.rot_increment() < 0.05);
    }

    #[test]
    fn test_spin_in_place() {
        let geometry = Geometry {
            rotation_bias: 0.0,
            ..Geometry::default()
        };
        let mut odo = Odometry::new(Some(geometry));
        // both encoders count the same way: right wheel forward, left back
        odo.update(20, 20);
        assert!(odo.fwd_increment().abs() < 1e-6);
        let wheel = 20.0 * geometry.mm_per_count_right();
        let expected = 2.0 * wheel * geometry.deg_per_mm_difference();
        assert!((odo.rot_increment() - expected).abs() < 1e-4);
        assert!(odo.pose().angle > 0.0);
    }

    #[test]
    fn test_reset() {
        let mut odo = Odometry::new(None);
        odo.update(-5, 7);
        odo.reset();
        assert_eq!(odo.pose(), Pose::default());
    }
}
