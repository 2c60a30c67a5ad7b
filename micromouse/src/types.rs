//! Micromouse core - Base types and constants
//!
//! Grid geometry, timing, compass arithmetic and the shared error type.

use core::fmt;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Control loop frequency in Hz
pub const LOOP_FREQUENCY: f32 = 500.0;

/// Control loop interval in seconds
pub const LOOP_INTERVAL: f32 = 1.0 / LOOP_FREQUENCY;

/// Control loop period in microseconds
pub const TICK_PERIOD_US: u32 = 2_000;

/// Cells along one side of the maze
pub const MAZE_WIDTH: usize = 16;

/// Total cell count
pub const MAZE_CELLS: usize = MAZE_WIDTH * MAZE_WIDTH;

/// Cell pitch in mm
pub const FULL_CELL: f32 = 180.0;

/// Half a cell in mm
pub const HALF_CELL: f32 = FULL_CELL / 2.0;

/// Flood cost sentinel: unreachable
pub const MAX_COST: u8 = 255;

/// Start cell (row 0, column 0)
pub const START: Cell = Cell::new(0x00);

/// Default goal cell (row 7, column 7)
pub const DEFAULT_GOAL: Cell = Cell::new(0x77);

// ============================================================================
// Basic Types
// ============================================================================

/// Timestamp in microseconds
pub type TimeUs = u64;

/// Tick count
pub type Tick = u32;

// ============================================================================
// Error Types
// ============================================================================

/// Result type for micromouse operations
pub type Result<T> = core::result::Result<T, Error>;

/// Error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum Error {
    /// Invalid argument provided
    InvalidArg,
    /// Item not found
    NotFound,
    /// Resource is busy (torn snapshot read, full command queue)
    Busy,
    /// No route from the current cell to the target
    NoRoute,
    /// A fixed-capacity buffer is full
    Overflow,
    /// Unrecognised command sequence
    BadCommand,
    /// Traversal aborted by the user button
    Cancelled,
    /// Stored settings were written by a different revision
    RevisionMismatch,
    /// Malformed persisted data
    InvalidData,
    /// A move did not complete in the time allowed
    Timeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::InvalidArg => "invalid argument",
            Error::NotFound => "not found",
            Error::Busy => "resource busy",
            Error::NoRoute => "no route to target",
            Error::Overflow => "buffer overflow",
            Error::BadCommand => "bad command sequence",
            Error::Cancelled => "cancelled",
            Error::RevisionMismatch => "settings revision mismatch",
            Error::InvalidData => "invalid data",
            Error::Timeout => "move timed out",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

// ============================================================================
// Compass
// ============================================================================

/// Absolute heading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Direction {
    /// Towards increasing row
    #[default]
    North = 0,
    /// Towards increasing column
    East = 1,
    /// Towards decreasing row
    South = 2,
    /// Towards decreasing column
    West = 3,
}

impl Direction {
    /// All headings in encoding order
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Heading from its encoding, taken modulo 4
    pub const fn from_index(index: u8) -> Self {
        match index & 0x03 {
            0 => Direction::North,
            1 => Direction::East,
            2 => Direction::South,
            _ => Direction::West,
        }
    }

    /// Encoding 0..3
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Heading after a relative turn
    pub const fn turned(self, turn: Turn) -> Self {
        Self::from_index(self as u8 + turn as u8)
    }

    /// Heading to the right
    pub const fn right(self) -> Self {
        self.turned(Turn::Right)
    }

    /// Heading to the left
    pub const fn left(self) -> Self {
        self.turned(Turn::Left)
    }

    /// Opposite heading
    pub const fn behind(self) -> Self {
        self.turned(Turn::Back)
    }

    /// Relative turn that takes this heading to `target`
    pub const fn turn_to(self, target: Direction) -> Turn {
        Turn::from_index((target as u8).wrapping_sub(self as u8))
    }

    /// Wall bit for this heading
    pub const fn wall_bit(self) -> u8 {
        1 << (self as u8)
    }

    /// Compass letter
    pub const fn letter(self) -> char {
        match self {
            Direction::North => 'N',
            Direction::East => 'E',
            Direction::South => 'S',
            Direction::West => 'W',
        }
    }
}

/// Heading change relative to the current heading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[repr(u8)]
pub enum Turn {
    /// No change
    #[default]
    Ahead = 0,
    /// Quarter turn clockwise
    Right = 1,
    /// Half turn
    Back = 2,
    /// Quarter turn anticlockwise
    Left = 3,
}

impl Turn {
    /// Preference order used when choosing among equal neighbours
    pub const PREFERENCE: [Turn; 4] = [Turn::Ahead, Turn::Right, Turn::Left, Turn::Back];

    /// Turn from a heading delta, taken modulo 4
    pub const fn from_index(index: u8) -> Self {
        match index & 0x03 {
            0 => Turn::Ahead,
            1 => Turn::Right,
            2 => Turn::Back,
            _ => Turn::Left,
        }
    }

    /// Rotation in degrees, anticlockwise positive
    pub const fn degrees(self) -> f32 {
        match self {
            Turn::Ahead => 0.0,
            Turn::Right => -90.0,
            Turn::Back => 180.0,
            Turn::Left => 90.0,
        }
    }
}

// ============================================================================
// Cell
// ============================================================================

/// Maze cell, packed as `column * 16 + row`
///
/// Neighbour arithmetic wraps at the grid edges; the boundary walls keep
/// the wrapped cells unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cell(u8);

impl Cell {
    /// Cell from its packed index
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    /// Cell from grid coordinates (each taken modulo 16)
    pub const fn from_coords(row: u8, column: u8) -> Self {
        Self(((column & 0x0F) << 4) | (row & 0x0F))
    }

    /// Packed index
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Row 0..15
    pub const fn row(self) -> u8 {
        self.0 & 0x0F
    }

    /// Column 0..15
    pub const fn column(self) -> u8 {
        self.0 >> 4
    }

    /// Adjacent cell in the given heading
    pub const fn neighbour(self, direction: Direction) -> Self {
        let step: u8 = match direction {
            Direction::North => 1,
            Direction::East => 16,
            Direction::South => 255,
            Direction::West => 240,
        };
        Self(self.0.wrapping_add(step))
    }

    /// Iterate over every cell
    pub fn all() -> impl Iterator<Item = Cell> {
        (0..=255u8).map(Cell)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}", self.0)
    }
}

// ============================================================================
// State Enums
// ============================================================================

/// Motion profile phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[repr(u8)]
pub enum ProfileState {
    /// Not moving, not armed
    #[default]
    Idle = 0,
    /// Heading for the cruise speed
    Accelerating = 1,
    /// Slowing for the exit speed
    Braking = 2,
    /// Target distance covered; holds the exit speed
    Finished = 3,
}

impl ProfileState {
    /// Decode from the snapshot word
    pub const fn from_bits(bits: u32) -> Self {
        match bits {
            1 => ProfileState::Accelerating,
            2 => ProfileState::Braking,
            3 => ProfileState::Finished,
            _ => ProfileState::Idle,
        }
    }
}

/// Navigation run phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RunState {
    /// Exploring start to goal and back
    #[default]
    Searching,
    /// Speed run with in-place spins
    InPlaceRun,
    /// Speed run with smooth turns
    SmoothRun,
    /// Terminal
    Finished,
}

/// Motion axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum Axis {
    /// Distance along the heading, mm
    Forward,
    /// Heading angle, degrees
    Rotation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_arithmetic() {
        assert_eq!(Direction::North.right(), Direction::East);
        assert_eq!(Direction::North.left(), Direction::West);
        assert_eq!(Direction::West.right(), Direction::North);
        assert_eq!(Direction::East.behind(), Direction::West);
        for d in Direction::ALL {
            for t in Turn::PREFERENCE {
                assert_eq!(d.turn_to(d.turned(t)), t);
            }
        }
    }

    #[test]
    fn test_cell_neighbours() {
        let cell = Cell::from_coords(3, 5);
        assert_eq!(cell.index(), 0x53);
        assert_eq!(cell.neighbour(Direction::North), Cell::from_coords(4, 5));
        assert_eq!(cell.neighbour(Direction::East), Cell::from_coords(3, 6));
        assert_eq!(cell.neighbour(Direction::South), Cell::from_coords(2, 5));
        assert_eq!(cell.neighbour(Direction::West), Cell::from_coords(3, 4));
        for d in Direction::ALL {
            assert_eq!(cell.neighbour(d).neighbour(d.behind()), cell);
        }
    }

    #[test]
    fn test_cell_display() {
        extern crate std;
        use std::string::ToString;
        assert_eq!(DEFAULT_GOAL.to_string(), "77");
        assert_eq!(Cell::new(0x0A).to_string(), "0A");
    }
}
