//! Micromouse core - Snapshot cells
//!
//! The control tick publishes its multi-word state through seqlock cells so
//! the foreground never observes a torn set of fields and the tick never
//! waits.
//!
//! Uses the classic seqlock pattern:
//! - Writer increments sequence to ODD before write (write in progress)
//! - Writer increments sequence to EVEN after write (write complete)
//! - Reader checks sequence before/after read; retries if mismatched or odd
//!
//! Payloads are packed into `AtomicU32` words so the reads themselves are
//! data-race free.

use crate::types::*;
use core::marker::PhantomData;
use core::sync::atomic::{fence, AtomicU32, Ordering};

// ============================================================================
// Packing
// ============================================================================

/// Fixed-size word encoding of a snapshot payload
pub trait Packed<const N: usize>: Sized {
    /// Encode into words
    fn pack(&self) -> [u32; N];

    /// Decode from words produced by [`Packed::pack`]
    fn unpack(words: &[u32; N]) -> Self;
}

// ============================================================================
// Seqlock
// ============================================================================

/// Single-writer, multi-reader snapshot cell
pub struct Seqlock<T, const N: usize> {
    /// Sequence counter (odd = write in progress)
    sequence: AtomicU32,
    words: [AtomicU32; N],
    _payload: PhantomData<fn() -> T>,
}

impl<T: Packed<N>, const N: usize> Seqlock<T, N> {
    /// Create a cell holding the all-zero payload
    pub const fn new() -> Self {
        const WORD_INIT: AtomicU32 = AtomicU32::new(0);
        Self {
            sequence: AtomicU32::new(0),
            words: [WORD_INIT; N],
            _payload: PhantomData,
        }
    }

    /// Publish a new value
    ///
    /// Only one context may publish to a given cell.
    pub fn publish(&self, value: &T) {
        let words = value.pack();
        let seq = self.sequence.load(Ordering::Relaxed);
        self.sequence.store(seq.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        for (slot, word) in self.words.iter().zip(words) {
            slot.store(word, Ordering::Relaxed);
        }
        self.sequence.store(seq.wrapping_add(2), Ordering::Release);
    }

    /// Single read attempt
    ///
    /// Returns `Err(Busy)` if a write was in progress or completed during
    /// the read.
    pub fn sample(&self) -> Result<T> {
        let before = self.sequence.load(Ordering::Acquire);
        if before & 1 != 0 {
            return Err(Error::Busy);
        }
        let mut words = [0u32; N];
        for (word, slot) in words.iter_mut().zip(self.words.iter()) {
            *word = slot.load(Ordering::Relaxed);
        }
        fence(Ordering::Acquire);
        let after = self.sequence.load(Ordering::Relaxed);
        if before != after {
            return Err(Error::Busy);
        }
        Ok(T::unpack(&words))
    }

    /// Read with a bounded number of retries
    pub fn sample_consistent(&self, max_retries: u32) -> Result<T> {
        for _ in 0..=max_retries {
            match self.sample() {
                Err(Error::Busy) => core::hint::spin_loop(),
                other => return other,
            }
        }
        Err(Error::Busy)
    }

    /// Read, spinning until a consistent copy is obtained
    ///
    /// The writer finishes in bounded time, so this terminates.
    pub fn load(&self) -> T {
        loop {
            if let Ok(value) = self.sample() {
                return value;
            }
            core::hint::spin_loop();
        }
    }

    /// Number of completed publishes
    pub fn version(&self) -> u32 {
        self.sequence.load(Ordering::Acquire) / 2
    }
}

impl<T: Packed<N>, const N: usize> Default for Seqlock<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Snapshot Payloads
// ============================================================================

/// Published state of one motion profile
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub struct ProfileSnapshot {
    /// Phase
    pub state: ProfileState,
    /// Position along the axis
    pub position: f32,
    /// Current speed
    pub speed: f32,
    /// Speed being approached
    pub target_speed: f32,
    /// Exit speed
    pub final_speed: f32,
    /// Acceleration magnitude
    pub acceleration: f32,
}

impl ProfileSnapshot {
    /// True once the target has been covered
    pub fn is_finished(&self) -> bool {
        self.state == ProfileState::Finished
    }
}

impl Packed<6> for ProfileSnapshot {
    fn pack(&self) -> [u32; 6] {
        [
            self.state as u32,
            self.position.to_bits(),
            self.speed.to_bits(),
            self.target_speed.to_bits(),
            self.final_speed.to_bits(),
            self.acceleration.to_bits(),
        ]
    }

    fn unpack(words: &[u32; 6]) -> Self {
        Self {
            state: ProfileState::from_bits(words[0]),
            position: f32::from_bits(words[1]),
            speed: f32::from_bits(words[2]),
            target_speed: f32::from_bits(words[3]),
            final_speed: f32::from_bits(words[4]),
            acceleration: f32::from_bits(words[5]),
        }
    }
}

/// Robot pose from odometry
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub struct Pose {
    /// Accumulated forward travel (mm)
    pub distance: f32,
    /// Accumulated heading change (deg, anticlockwise positive)
    pub angle: f32,
    /// Forward travel during the last tick
    pub fwd_increment: f32,
    /// Heading change during the last tick
    pub rot_increment: f32,
    /// Left encoder total (counts, polarity applied)
    pub left_total: i32,
    /// Right encoder total (counts, polarity applied)
    pub right_total: i32,
}

impl Packed<6> for Pose {
    fn pack(&self) -> [u32; 6] {
        [
            self.distance.to_bits(),
            self.angle.to_bits(),
            self.fwd_increment.to_bits(),
            self.rot_increment.to_bits(),
            self.left_total as u32,
            self.right_total as u32,
        ]
    }

    fn unpack(words: &[u32; 6]) -> Self {
        Self {
            distance: f32::from_bits(words[0]),
            angle: f32::from_bits(words[1]),
            fwd_increment: f32::from_bits(words[2]),
            rot_increment: f32::from_bits(words[3]),
            left_total: words[4] as i32,
            right_total: words[5] as i32,
        }
    }
}

/// Wall presence relative to the robot heading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub struct WallState {
    /// Wall on the left
    pub left: bool,
    /// Wall ahead
    pub front: bool,
    /// Wall on the right
    pub right: bool,
}

impl WallState {
    /// Wall on the given side
    pub fn has(&self, turn: Turn) -> bool {
        match turn {
            Turn::Left => self.left,
            Turn::Ahead => self.front,
            Turn::Right => self.right,
            Turn::Back => false,
        }
    }
}

impl core::fmt::Display for WallState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let flag = |present: bool, c: char| if present { c } else { '-' };
        write!(
            f,
            "{}{}{}",
            flag(self.left, 'L'),
            flag(self.front, 'F'),
            flag(self.right, 'R')
        )
    }
}

const FLAG_LEFT: u32 = 1 << 0;
const FLAG_FRONT: u32 = 1 << 1;
const FLAG_RIGHT: u32 = 1 << 2;
const FLAG_ENABLED: u32 = 1 << 3;
const FLAG_STEERING: u32 = 1 << 4;

/// Published wall sensor state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub struct SensorSnapshot {
    /// Normalised left reading
    pub left: i32,
    /// Normalised front reading
    pub front: i32,
    /// Normalised right reading
    pub right: i32,
    /// Raw readings `[left, front, right]`
    pub raw: [i32; 3],
    /// Wall detection
    pub walls: WallState,
    /// Sensors enabled
    pub enabled: bool,
    /// Steering enabled
    pub steering: bool,
    /// Cross-track error, too far left is negative
    pub cross_track_error: f32,
    /// Steering adjustment applied this tick (deg)
    pub steering_adjustment: f32,
    /// Supply voltage
    pub supply_volts: f32,
}

impl Packed<10> for SensorSnapshot {
    fn pack(&self) -> [u32; 10] {
        let mut flags = 0;
        for (set, bit) in [
            (self.walls.left, FLAG_LEFT),
            (self.walls.front, FLAG_FRONT),
            (self.walls.right, FLAG_RIGHT),
            (self.enabled, FLAG_ENABLED),
            (self.steering, FLAG_STEERING),
        ] {
            if set {
                flags |= bit;
            }
        }
        [
            self.left as u32,
            self.front as u32,
            self.right as u32,
            self.raw[0] as u32,
            self.raw[1] as u32,
            self.raw[2] as u32,
            flags,
            self.cross_track_error.to_bits(),
            self.steering_adjustment.to_bits(),
            self.supply_volts.to_bits(),
        ]
    }

    fn unpack(words: &[u32; 10]) -> Self {
        let flags = words[6];
        Self {
            left: words[0] as i32,
            front: words[1] as i32,
            right: words[2] as i32,
            raw: [words[3] as i32, words[4] as i32, words[5] as i32],
            walls: WallState {
                left: flags & FLAG_LEFT != 0,
                front: flags & FLAG_FRONT != 0,
                right: flags & FLAG_RIGHT != 0,
            },
            enabled: flags & FLAG_ENABLED != 0,
            steering: flags & FLAG_STEERING != 0,
            cross_track_error: f32::from_bits(words[7]),
            steering_adjustment: f32::from_bits(words[8]),
            supply_volts: f32::from_bits(words[9]),
        }
    }
}

/// Published motor controller state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub struct DriveSnapshot {
    /// Left motor voltage before supply compensation
    pub left_volts: f32,
    /// Right motor voltage before supply compensation
    pub right_volts: f32,
    /// Forward position error (mm)
    pub fwd_error: f32,
    /// Rotation error (deg)
    pub rot_error: f32,
    /// Output enabled
    pub enabled: bool,
}

impl Packed<5> for DriveSnapshot {
    fn pack(&self) -> [u32; 5] {
        [
            self.left_volts.to_bits(),
            self.right_volts.to_bits(),
            self.fwd_error.to_bits(),
            self.rot_error.to_bits(),
            self.enabled as u32,
        ]
    }

    fn unpack(words: &[u32; 5]) -> Self {
        Self {
            left_volts: f32::from_bits(words[0]),
            right_volts: f32::from_bits(words[1]),
            fwd_error: f32::from_bits(words[2]),
            rot_error: f32::from_bits(words[3]),
            enabled: words[4] != 0,
        }
    }
}
