//! Micromouse core - Reports
//!
//! Text views of the maze and the navigator, as `Display` adapters so they
//! work the same over a serial port, `defmt` or a host terminal.
//!
//! ```text
//! o---o---o---o
//! |   |       |
//! o   o---o   o
//! ```
//!
//! Row 15 is printed first, so north is up.

use crate::maze::Maze;
use crate::snapshot::WallState;
use crate::types::*;
use core::fmt;

/// What to print inside each cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum MazeView {
    /// Walls only
    #[default]
    Plain,
    /// Flood cost
    Costs,
    /// Downhill direction, `*` on the goal
    Directions,
}

/// Wall drawing of a maze
///
/// [`MazeView::Costs`] and [`MazeView::Directions`] show the current
/// costs, so flood first.
#[derive(Debug, Clone, Copy)]
pub struct MazeDisplay<'a> {
    maze: &'a Maze,
    view: MazeView,
}

/// Hex dump of the wall bytes, one row per line
#[derive(Debug, Clone, Copy)]
pub struct WallData<'a>(&'a Maze);

impl Maze {
    /// Printable drawing
    pub fn display(&self, view: MazeView) -> MazeDisplay<'_> {
        MazeDisplay { maze: self, view }
    }

    /// Printable wall bytes
    pub fn wall_data(&self) -> WallData<'_> {
        WallData(self)
    }
}

const DIRECTION_CHARS: [char; 4] = ['^', '>', 'v', '<'];

impl MazeDisplay<'_> {
    fn horizontal(&self, f: &mut fmt::Formatter<'_>, row: u8, side: Direction) -> fmt::Result {
        for column in 0..MAZE_WIDTH as u8 {
            let cell = Cell::from_coords(row, column);
            f.write_str(if self.maze.is_wall(cell, side) { "o---" } else { "o   " })?;
        }
        f.write_str("o\n")
    }

    fn body(&self, f: &mut fmt::Formatter<'_>, cell: Cell) -> fmt::Result {
        match self.view {
            MazeView::Plain => f.write_str("   "),
            MazeView::Costs => write!(f, "{:>3}", self.maze.cost(cell)),
            MazeView::Directions => {
                let c = if cell == self.maze.goal() {
                    '*'
                } else {
                    match self.maze.direction_to_smallest(cell, Direction::North) {
                        Some(d) => DIRECTION_CHARS[d.index() as usize],
                        None => ' ',
                    }
                };
                write!(f, " {} ", c)
            }
        }
    }
}

impl fmt::Display for MazeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in (0..MAZE_WIDTH as u8).rev() {
            self.horizontal(f, row, Direction::North)?;
            for column in 0..MAZE_WIDTH as u8 {
                let cell = Cell::from_coords(row, column);
                let side = if self.maze.is_wall(cell, Direction::West) { '|' } else { ' ' };
                write!(f, "{}", side)?;
                self.body(f, cell)?;
            }
            let east = Cell::from_coords(row, MAZE_WIDTH as u8 - 1);
            f.write_str(if self.maze.is_wall(east, Direction::East) { "|\n" } else { " \n" })?;
        }
        self.horizontal(f, 0, Direction::South)
    }
}

impl fmt::Display for WallData<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in (0..MAZE_WIDTH as u8).rev() {
            for column in 0..MAZE_WIDTH as u8 {
                let cell = Cell::from_coords(row, column);
                if column > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{:02X}", self.0.walls(cell))?;
            }
            f.write_str("\n")?;
        }
        Ok(())
    }
}

// ============================================================================
// Navigator Status
// ============================================================================

/// Location, heading and walls, e.g. `07:NL-R`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub struct StatusLine {
    /// Current cell
    pub location: Cell,
    /// Current heading
    pub heading: Direction,
    /// Walls seen at the last sensing point
    pub walls: WallState,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}", self.location, self.heading.letter(), self.walls)
    }
}

/// One step of a search trace, e.g. `R(17E)[ 42]@ 170 L--`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub struct StepLog {
    /// Action letter
    pub action: char,
    /// Status at the time
    pub status: StatusLine,
    /// Front sensor reading
    pub front: i32,
    /// Forward profile position
    pub position: f32,
}

impl fmt::Display for StepLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}{})[{:>3}]@{:>4} {}",
            self.action,
            self.status.location,
            self.status.heading.letter(),
            self.front,
            self.position as i32,
            self.status.walls
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maze::JAPAN_2007;
    extern crate std;
    use std::string::{String, ToString};

    fn lines(text: &str) -> std::vec::Vec<&str> {
        text.lines().collect()
    }

    #[test]
    fn test_plain_layout() {
        let maze = Maze::new();
        let text = maze.display(MazeView::Plain).to_string();
        let rows = lines(&text);
        assert_eq!(rows.len(), 33);
        let full: String = "o---".repeat(16) + "o";
        assert_eq!(rows[0], full);
        assert_eq!(rows[32], full);
        // bottom row of cells: start cell has its east wall
        assert!(rows[31].starts_with("|   |   "));
        assert!(rows.iter().all(|r| r.len() == 65));
    }

    #[test]
    fn test_costs_view() {
        let mut maze = Maze::new();
        maze.flood(DEFAULT_GOAL);
        let text = maze.display(MazeView::Costs).to_string();
        let rows = lines(&text);
        // start cell is 14 steps from the goal
        assert!(rows[31].starts_with("| 14| 13"));
    }

    #[test]
    fn test_directions_view_marks_goal() {
        let mut maze = Maze::with_walls(&JAPAN_2007);
        maze.flood(DEFAULT_GOAL);
        let text = maze.display(MazeView::Directions).to_string();
        assert_eq!(text.matches('*').count(), 1);
        let rows = lines(&text);
        // row 7 is printed on line 2 * (15 - 7) + 1, goal in column 7
        let goal_row = rows[17];
        assert_eq!(&goal_row[4 * 7 + 1..4 * 7 + 4], " * ");
        // start cell leads north
        assert_eq!(&rows[31][1..4], " ^ ");
    }

    #[test]
    fn test_wall_data() {
        let maze = Maze::new();
        let text = maze.wall_data().to_string();
        let rows = lines(&text);
        assert_eq!(rows.len(), 16);
        assert!(rows[15].starts_with("0E 0C 04"));
        assert!(rows[0].starts_with("09 01 01"));
    }

    #[test]
    fn test_status_and_step_log() {
        let status = StatusLine {
            location: Cell::new(0x17),
            heading: Direction::East,
            walls: WallState {
                left: true,
                front: false,
                right: true,
            },
        };
        assert_eq!(status.to_string(), "17:EL-R");
        let step = StepLog {
            action: 'F',
            status,
            front: 42,
            position: 170.4,
        };
        assert_eq!(step.to_string(), "F(17E)[ 42]@ 170 L-R");
    }
}
