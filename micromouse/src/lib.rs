//! # Micromouse control and navigation core
//!
//! Everything between the motor driver and the maze solver of a
//! two-wheel differential-drive micromouse.
//!
//! ## Layers
//!
//! ### 1. Control loop
//!
//! A fixed 500 Hz tick owns two trapezoidal motion profiles (forward and
//! rotation), encoder odometry, wall sensor processing, steering and the
//! PD drive controller.
//!
//! ```ignore
//! let shared = SharedState::new();
//! let mut control = ControlLoop::new(None);
//!
//! // every 2 ms
//! control.tick(&mut board, &shared);
//! ```
//!
//! ### 2. Shared state
//!
//! The foreground talks to the tick through a lock-free command queue and
//! reads seqlock snapshots back. Neither side ever waits on the other.
//!
//! ### 3. Maze
//!
//! A 16x16 wall map with flood-fill costs and route reconstruction into
//! path strings such as `BFFRFLS`.
//!
//! ### 4. Navigation
//!
//! [`NavigationAgent`] explores the maze over a [`Movement`] layer and then
//! runs the best known route, first with in-place spins and then with
//! smooth turns.
//!
//! ## Quick Start
//!
//! ```ignore
//! use micromouse::prelude::*;
//!
//! let movement = ProfiledMovement::new(&shared, &platform, None);
//! let mut agent = NavigationAgent::new(movement, None);
//! agent.run_maze()?;
//! ```
//!
//! ## Features
//!
//! - `std` (default): JSON settings, `tracing` logs, host simulation
//! - `defmt-log`: log through `defmt` on embedded targets

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

// Logging macros, must come first
mod fmt;

// Core modules
pub mod types;
pub mod config;
pub mod hal;
pub mod snapshot;
pub mod profile;
pub mod odometry;
pub mod sensors;
pub mod steering;
pub mod drive;
pub mod shared;
pub mod control;
pub mod maze;
pub mod path;
pub mod report;
pub mod movement;
pub mod navigator;
#[cfg(any(test, feature = "std"))]
pub mod sim;

// Re-exports for convenience
pub use types::*;
pub use config::{
    Config, DriveConfig, Geometry, MoveConfig, SensorConfig, SettingInfo, SteeringConfig,
};
pub use hal::{Hal, Platform};
pub use snapshot::{DriveSnapshot, Pose, ProfileSnapshot, SensorSnapshot, Seqlock, WallState};
pub use profile::MotionProfile;
pub use drive::DriveController;
pub use shared::{Command, ProfileCommand, ProfileHandle, SharedState};
pub use control::ControlLoop;
pub use maze::{Maze, EMPTY_MAZE, JAPAN_2007};
pub use path::{compress, expand, make_path, Commands, Path, PathToken, PlannedPath, Route};
pub use report::{MazeView, StatusLine, StepLog};
pub use movement::{Movement, ProfiledMovement, StartPosition};
pub use navigator::NavigationAgent;

/// Prelude - commonly used items
pub mod prelude {
    pub use crate::types::*;
    pub use crate::config::Config;
    pub use crate::hal::{Hal, Platform};
    pub use crate::shared::SharedState;
    pub use crate::control::ControlLoop;
    pub use crate::maze::Maze;
    pub use crate::path::{make_path, Route};
    pub use crate::movement::{Movement, ProfiledMovement};
    pub use crate::navigator::NavigationAgent;
}

// ============================================================================
// Version
// ============================================================================

/// Major version
pub const VERSION_MAJOR: u32 = 0;
/// Minor version
pub const VERSION_MINOR: u32 = 1;
/// Patch version
pub const VERSION_PATCH: u32 = 0;
/// Version string
pub const VERSION_STRING: &str = "0.1.0";

/// Get version as packed integer (major << 16 | minor << 8 | patch)
pub const fn version() -> u32 {
    (VERSION_MAJOR << 16) | (VERSION_MINOR << 8) | VERSION_PATCH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(version(), 0x000100);
        assert_eq!(VERSION_STRING, "0.1.0");
    }
}
