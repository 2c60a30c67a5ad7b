//! Micromouse core - Tick/foreground shared state
//!
//! The control tick owns all motion state. The foreground talks to it
//! through this region only:
//!
//! - Foreground to tick: a lock-free command queue plus issued/applied
//!   counters, so the foreground can tell when its commands have taken
//!   effect.
//! - Tick to foreground: seqlock snapshot cells, published once per tick.
//!
//! ```ignore
//! static SHARED: SharedState = SharedState::new();
//!
//! // foreground
//! SHARED.forward().start(180.0, 400.0, 0.0, 2000.0)?;
//! while !SHARED.forward().is_finished() {
//!     platform.delay_ms(2);
//! }
//! ```

use crate::snapshot::*;
use crate::types::*;
use core::sync::atomic::{AtomicU32, Ordering};
use heapless::mpmc::MpMcQueue;

/// Command queue depth (power of two)
pub const COMMAND_QUEUE_SIZE: usize = 16;

// ============================================================================
// Commands
// ============================================================================

/// Operation on one motion profile
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum ProfileCommand {
    /// Begin a move
    Start {
        /// Signed distance
        distance: f32,
        /// Cruise speed
        top_speed: f32,
        /// Exit speed
        final_speed: f32,
        /// Acceleration
        acceleration: f32,
    },
    /// Zero speed and finish
    Stop,
    /// Jump to target speed and finish
    Finish,
    /// Force the phase
    SetState(ProfileState),
    /// Overwrite speed
    SetSpeed(f32),
    /// Overwrite the speed being approached
    SetTargetSpeed(f32),
    /// Shift position
    AdjustPosition(f32),
    /// Overwrite position
    SetPosition(f32),
    /// Back to idle at rest
    Reset,
}

/// Foreground request to the control tick
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum Command {
    /// Profile operation on an axis
    Profile(Axis, ProfileCommand),
    /// Enable or disable motor controller output
    Controllers(bool),
    /// Enable (with reset) or disable steering
    Steering(bool),
    /// Enable or disable wall sensors and emitters
    Sensors(bool),
    /// Motors off, controllers and steering disabled, encoders, errors and
    /// profiles reset
    ResetDrive,
}

// ============================================================================
// Shared Region
// ============================================================================

/// State shared between the control tick and the foreground
pub struct SharedState {
    commands: MpMcQueue<Command, COMMAND_QUEUE_SIZE>,
    issued: AtomicU32,
    applied: AtomicU32,
    forward: Seqlock<ProfileSnapshot, 6>,
    rotation: Seqlock<ProfileSnapshot, 6>,
    pose: Seqlock<Pose, 6>,
    sensors: Seqlock<SensorSnapshot, 10>,
    drive: Seqlock<DriveSnapshot, 5>,
    ticks: AtomicU32,
}

impl SharedState {
    /// Create an empty region
    pub const fn new() -> Self {
        Self {
            commands: MpMcQueue::new(),
            issued: AtomicU32::new(0),
            applied: AtomicU32::new(0),
            forward: Seqlock::new(),
            rotation: Seqlock::new(),
            pose: Seqlock::new(),
            sensors: Seqlock::new(),
            drive: Seqlock::new(),
            ticks: AtomicU32::new(0),
        }
    }

    // ------------------------------------------------------------------
    // Foreground side
    // ------------------------------------------------------------------

    /// Queue a command for the next tick
    ///
    /// Returns `Err(Busy)` when the queue is full.
    pub fn send(&self, command: Command) -> Result<()> {
        self.issued.fetch_add(1, Ordering::AcqRel);
        if self.commands.enqueue(command).is_err() {
            self.issued.fetch_sub(1, Ordering::AcqRel);
            return Err(Error::Busy);
        }
        Ok(())
    }

    /// True when every queued command has been applied and published
    pub fn is_synced(&self) -> bool {
        self.applied.load(Ordering::Acquire) == self.issued.load(Ordering::Acquire)
    }

    /// Forward profile
    pub fn forward(&self) -> ProfileHandle<'_> {
        ProfileHandle {
            shared: self,
            axis: Axis::Forward,
        }
    }

    /// Rotation profile
    pub fn rotation(&self) -> ProfileHandle<'_> {
        ProfileHandle {
            shared: self,
            axis: Axis::Rotation,
        }
    }

    /// Latest pose
    pub fn pose(&self) -> Pose {
        self.pose.load()
    }

    /// Latest sensor state
    pub fn sensors(&self) -> SensorSnapshot {
        self.sensors.load()
    }

    /// Latest controller state
    pub fn drive(&self) -> DriveSnapshot {
        self.drive.load()
    }

    /// Ticks completed
    pub fn ticks(&self) -> Tick {
        self.ticks.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // Tick side
    // ------------------------------------------------------------------

    /// Next pending command (tick only)
    pub fn take_command(&self) -> Option<Command> {
        self.commands.dequeue()
    }

    /// Publish a profile snapshot (tick only)
    pub fn publish_profile(&self, axis: Axis, snapshot: &ProfileSnapshot) {
        match axis {
            Axis::Forward => self.forward.publish(snapshot),
            Axis::Rotation => self.rotation.publish(snapshot),
        }
    }

    /// Publish the pose (tick only)
    pub fn publish_pose(&self, pose: &Pose) {
        self.pose.publish(pose);
    }

    /// Publish sensor state (tick only)
    pub fn publish_sensors(&self, sensors: &SensorSnapshot) {
        self.sensors.publish(sensors);
    }

    /// Publish controller state (tick only)
    pub fn publish_drive(&self, drive: &DriveSnapshot) {
        self.drive.publish(drive);
    }

    /// Close out a tick: `count` commands were applied and everything
    /// they changed has been published (tick only)
    pub fn complete_tick(&self, count: u32) {
        self.applied.fetch_add(count, Ordering::Release);
        self.ticks.fetch_add(1, Ordering::Release);
    }

    fn profile(&self, axis: Axis) -> ProfileSnapshot {
        match axis {
            Axis::Forward => self.forward.load(),
            Axis::Rotation => self.rotation.load(),
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Profile Handle
// ============================================================================

/// Foreground view of one profile
///
/// Reads come from the latest snapshot; writes are queued commands.
#[derive(Clone, Copy)]
pub struct ProfileHandle<'a> {
    shared: &'a SharedState,
    axis: Axis,
}

impl<'a> ProfileHandle<'a> {
    /// Axis this handle controls
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// Latest published state
    pub fn snapshot(&self) -> ProfileSnapshot {
        self.shared.profile(self.axis)
    }

    /// True once finished and no queued command is outstanding
    pub fn is_finished(&self) -> bool {
        self.shared.is_synced() && self.snapshot().is_finished()
    }

    /// Published state, or `None` while a queued command is outstanding
    pub fn synced_snapshot(&self) -> Option<ProfileSnapshot> {
        self.shared.is_synced().then(|| self.snapshot())
    }

    /// Published position
    pub fn position(&self) -> f32 {
        self.snapshot().position
    }

    /// Published speed
    pub fn speed(&self) -> f32 {
        self.snapshot().speed
    }

    /// Published acceleration
    pub fn acceleration(&self) -> f32 {
        self.snapshot().acceleration
    }

    /// Queue a profile command
    pub fn send(&self, command: ProfileCommand) -> Result<()> {
        self.shared.send(Command::Profile(self.axis, command))
    }

    /// Queue a move
    pub fn start(
        &self,
        distance: f32,
        top_speed: f32,
        final_speed: f32,
        acceleration: f32,
    ) -> Result<()> {
        self.send(ProfileCommand::Start {
            distance,
            top_speed,
            final_speed,
            acceleration,
        })
    }

    /// Queue a stop
    pub fn stop(&self) -> Result<()> {
        self.send(ProfileCommand::Stop)
    }

    /// Queue a finish
    pub fn finish(&self) -> Result<()> {
        self.send(ProfileCommand::Finish)
    }

    /// Queue a phase change
    pub fn set_state(&self, state: ProfileState) -> Result<()> {
        self.send(ProfileCommand::SetState(state))
    }

    /// Queue a speed change
    pub fn set_speed(&self, speed: f32) -> Result<()> {
        self.send(ProfileCommand::SetSpeed(speed))
    }

    /// Queue a target speed change
    pub fn set_target_speed(&self, speed: f32) -> Result<()> {
        self.send(ProfileCommand::SetTargetSpeed(speed))
    }

    /// Queue a position shift
    pub fn adjust_position(&self, adjustment: f32) -> Result<()> {
        self.send(ProfileCommand::AdjustPosition(adjustment))
    }

    /// Queue a position overwrite
    pub fn set_position(&self, position: f32) -> Result<()> {
        self.send(ProfileCommand::SetPosition(position))
    }

    /// Queue a reset
    pub fn reset(&self) -> Result<()> {
        self.send(ProfileCommand::Reset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_track_pending_commands() {
        let shared = SharedState::new();
        assert!(shared.is_synced());
        shared.send(Command::Controllers(true)).unwrap();
        shared.forward().start(90.0, 400.0, 0.0, 2000.0).unwrap();
        assert!(!shared.is_synced());

        let mut count = 0;
        while shared.take_command().is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
        assert!(!shared.is_synced());
        shared.complete_tick(count);
        assert!(shared.is_synced());
        assert_eq!(shared.ticks(), 1);
    }

    #[test]
    fn test_full_queue_is_busy() {
        let shared = SharedState::new();
        for _ in 0..COMMAND_QUEUE_SIZE {
            shared.send(Command::Steering(false)).unwrap();
        }
        assert_eq!(shared.send(Command::Steering(true)), Err(Error::Busy));
        assert_eq!(shared.issued.load(Ordering::SeqCst), COMMAND_QUEUE_SIZE as u32);
    }

    #[test]
    fn test_is_finished_waits_for_sync() {
        let shared = SharedState::new();
        let finished = ProfileSnapshot {
            state: ProfileState::Finished,
            ..ProfileSnapshot::default()
        };
        shared.publish_profile(Axis::Forward, &finished);
        assert!(shared.forward().is_finished());

        shared.forward().start(180.0, 400.0, 0.0, 2000.0).unwrap();
        // stale snapshot still says finished, but the start is pending
        assert!(!shared.forward().is_finished());
        assert!(!shared.rotation().is_finished());
    }

    #[test]
    fn test_synced_snapshot_waits_for_tick() {
        let shared = SharedState::new();
        let moved = ProfileSnapshot {
            position: 100.0,
            ..ProfileSnapshot::default()
        };
        shared.publish_profile(Axis::Forward, &moved);
        let forward = shared.forward();
        assert_eq!(forward.synced_snapshot().map(|s| s.position), Some(100.0));

        forward.set_position(0.0).unwrap();
        assert_eq!(forward.synced_snapshot(), None);
        // plain reads still see the old value
        assert_eq!(forward.position(), 100.0);

        let mut count = 0;
        while shared.take_command().is_some() {
            count += 1;
        }
        shared.publish_profile(Axis::Forward, &ProfileSnapshot::default());
        shared.complete_tick(count);
        assert_eq!(forward.synced_snapshot().map(|s| s.position), Some(0.0));
    }
}
