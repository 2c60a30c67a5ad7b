//! Micromouse core - Maze map and flood fill
//!
//! One wall byte per cell: bits 0..3 are the north, east, south and west
//! walls, bit 4 marks a visited cell. Walls are always set and cleared from
//! both sides so the map stays consistent.
//!
//! Costs are the Manhattan step count to the flood target through open
//! walls; [`MAX_COST`] marks an unreachable cell.

use crate::snapshot::WallState;
use crate::types::*;
use heapless::Deque;

/// Visited flag in a wall byte
pub const VISITED: u8 = 0x10;

/// Wall bits in a wall byte
pub const WALL_MASK: u8 = 0x0F;

/// Maze walls, flood costs and goal
#[derive(Clone, PartialEq, Eq)]
pub struct Maze {
    walls: [u8; MAZE_CELLS],
    cost: [u8; MAZE_CELLS],
    goal: Cell,
}

impl core::fmt::Debug for Maze {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Maze")
            .field("goal", &self.goal)
            .field("visited", &self.visited_count())
            .finish_non_exhaustive()
    }
}

impl Default for Maze {
    fn default() -> Self {
        Self::new()
    }
}

impl Maze {
    /// Unexplored maze: boundary walls and the start cell's east wall
    pub fn new() -> Self {
        let mut maze = Self {
            walls: [0; MAZE_CELLS],
            cost: [0; MAZE_CELLS],
            goal: DEFAULT_GOAL,
        };
        maze.initialise();
        maze
    }

    /// Maze with the given wall bytes, e.g. [`JAPAN_2007`]
    pub fn with_walls(walls: &[u8; MAZE_CELLS]) -> Self {
        Self {
            walls: *walls,
            cost: [0; MAZE_CELLS],
            goal: DEFAULT_GOAL,
        }
    }

    /// Load persisted wall bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let walls: &[u8; MAZE_CELLS] = bytes.try_into().map_err(|_| Error::InvalidData)?;
        Ok(Self::with_walls(walls))
    }

    /// Wall bytes for persistence
    pub fn to_bytes(&self) -> [u8; MAZE_CELLS] {
        self.walls
    }

    /// Reset to the unexplored maze, keeping the goal
    pub fn initialise(&mut self) {
        self.walls = [0; MAZE_CELLS];
        self.cost = [0; MAZE_CELLS];
        for i in 0..MAZE_WIDTH as u8 {
            self.set_wall(Cell::from_coords(i, 0), Direction::West);
            self.set_wall(Cell::from_coords(i, 15), Direction::East);
            self.set_wall(Cell::from_coords(0, i), Direction::South);
            self.set_wall(Cell::from_coords(15, i), Direction::North);
        }
        self.set_wall(START, Direction::East);
        self.clear_wall(START, Direction::North);
    }

    /// Goal cell
    pub fn goal(&self) -> Cell {
        self.goal
    }

    /// Change the goal cell
    pub fn set_goal(&mut self, goal: Cell) {
        self.goal = goal;
    }

    /// Raw wall byte
    pub fn walls(&self, cell: Cell) -> u8 {
        self.walls[cell.index() as usize]
    }

    /// Add a wall on both sides
    pub fn set_wall(&mut self, cell: Cell, direction: Direction) {
        let next = cell.neighbour(direction);
        self.walls[cell.index() as usize] |= direction.wall_bit();
        self.walls[next.index() as usize] |= direction.behind().wall_bit();
    }

    /// Remove a wall on both sides
    ///
    /// Boundary walls are not protected.
    pub fn clear_wall(&mut self, cell: Cell, direction: Direction) {
        let next = cell.neighbour(direction);
        self.walls[cell.index() as usize] &= !direction.wall_bit();
        self.walls[next.index() as usize] &= !direction.behind().wall_bit();
    }

    /// Wall present
    pub fn is_wall(&self, cell: Cell, direction: Direction) -> bool {
        self.walls(cell) & direction.wall_bit() != 0
    }

    /// No wall: the neighbour can be entered
    pub fn is_exit(&self, cell: Cell, direction: Direction) -> bool {
        !self.is_wall(cell, direction)
    }

    /// Record a visit
    pub fn mark_visited(&mut self, cell: Cell) {
        self.walls[cell.index() as usize] |= VISITED;
    }

    /// Visited
    pub fn is_visited(&self, cell: Cell) -> bool {
        self.walls(cell) & VISITED != 0
    }

    /// Number of visited cells
    pub fn visited_count(&self) -> usize {
        self.walls.iter().filter(|w| *w & VISITED != 0).count()
    }

    /// Add the walls seen from `cell` facing `heading` and mark it visited
    ///
    /// Walls are only ever added.
    pub fn update_from_sensors(&mut self, cell: Cell, heading: Direction, walls: WallState) {
        if walls.front {
            self.set_wall(cell, heading);
        }
        if walls.right {
            self.set_wall(cell, heading.right());
        }
        if walls.left {
            self.set_wall(cell, heading.left());
        }
        self.mark_visited(cell);
    }

    /// Wall in every unvisited cell so routes only use explored cells
    pub fn close_unvisited(&mut self) {
        for cell in Cell::all() {
            if !self.is_visited(cell) {
                for direction in Direction::ALL {
                    self.set_wall(cell, direction);
                }
            }
        }
    }

    /// Flood cost of a cell
    pub fn cost(&self, cell: Cell) -> u8 {
        self.cost[cell.index() as usize]
    }

    /// Cost of the neighbour, or [`MAX_COST`] through a wall
    pub fn neighbour_cost(&self, cell: Cell, direction: Direction) -> u8 {
        if self.is_wall(cell, direction) {
            return MAX_COST;
        }
        self.cost(cell.neighbour(direction))
    }

    /// Breadth-first flood of step costs toward `target`
    pub fn flood(&mut self, target: Cell) {
        self.cost = [MAX_COST; MAZE_CELLS];
        let mut queue: Deque<u8, MAZE_CELLS> = Deque::new();
        self.cost[target.index() as usize] = 0;
        // each cell is queued at most once, so the queue cannot overflow
        let _ = queue.push_back(target.index());
        while let Some(index) = queue.pop_front() {
            let here = Cell::new(index);
            let new_cost = self.cost(here).saturating_add(1);
            for direction in Direction::ALL {
                if self.is_exit(here, direction) {
                    let next = here.neighbour(direction);
                    if self.cost(next) > new_cost {
                        self.cost[next.index() as usize] = new_cost;
                        let _ = queue.push_back(next.index());
                    }
                }
            }
        }
    }

    /// Open neighbour with the smallest cost below the cell's own
    ///
    /// Looks ahead, right, left, then behind; the first strictly smaller
    /// cost wins ties. `None` if no neighbour is cheaper than `cell`.
    pub fn direction_to_smallest(&self, cell: Cell, heading: Direction) -> Option<Direction> {
        let mut smallest = self.cost(cell);
        let mut best = None;
        for turn in Turn::PREFERENCE {
            let direction = heading.turned(turn);
            let cost = self.neighbour_cost(cell, direction);
            if cost < smallest {
                smallest = cost;
                best = Some(direction);
            }
        }
        best
    }
}

// ============================================================================
// Sample Mazes
// ============================================================================

/// Unexplored maze wall data, same as [`Maze::new`]
pub const EMPTY_MAZE: [u8; MAZE_CELLS] = [
    0x0E, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x08, 0x09,
    0x0C, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
    0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
    0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
    0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
    0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
    0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
    0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
    0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
    0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
    0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
    0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
    0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
    0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
    0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
    0x06, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x02, 0x03,
];

/// All Japan 2007 competition maze
pub const JAPAN_2007: [u8; MAZE_CELLS] = [
    0x0E, 0x08, 0x0A, 0x09, 0x0C, 0x09, 0x0C, 0x09, 0x0C, 0x0A, 0x0A, 0x09, 0x0D, 0x0C, 0x0A, 0x09,
    0x0C, 0x02, 0x09, 0x06, 0x03, 0x06, 0x03, 0x06, 0x01, 0x0C, 0x0A, 0x03, 0x04, 0x02, 0x09, 0x05,
    0x06, 0x08, 0x02, 0x08, 0x0B, 0x0C, 0x0A, 0x0A, 0x03, 0x06, 0x0A, 0x0A, 0x03, 0x0C, 0x03, 0x05,
    0x0C, 0x02, 0x09, 0x06, 0x0A, 0x03, 0x0C, 0x0A, 0x0A, 0x0A, 0x0A, 0x08, 0x0B, 0x06, 0x09, 0x05,
    0x04, 0x0A, 0x00, 0x0B, 0x0E, 0x08, 0x03, 0x0C, 0x0A, 0x09, 0x0E, 0x00, 0x0B, 0x0C, 0x03, 0x05,
    0x04, 0x0A, 0x00, 0x0B, 0x0C, 0x01, 0x0E, 0x02, 0x09, 0x05, 0x0E, 0x00, 0x0B, 0x06, 0x09, 0x05,
    0x04, 0x0A, 0x00, 0x0B, 0x05, 0x04, 0x08, 0x0A, 0x03, 0x05, 0x0C, 0x03, 0x0C, 0x09, 0x05, 0x05,
    0x05, 0x0C, 0x03, 0x0C, 0x03, 0x05, 0x07, 0x0C, 0x09, 0x05, 0x06, 0x0A, 0x03, 0x05, 0x05, 0x05,
    0x04, 0x02, 0x0A, 0x03, 0x0E, 0x00, 0x0B, 0x04, 0x03, 0x06, 0x0A, 0x0A, 0x09, 0x05, 0x05, 0x05,
    0x06, 0x0A, 0x0A, 0x0A, 0x0A, 0x03, 0x0C, 0x00, 0x0B, 0x0C, 0x0A, 0x0A, 0x03, 0x05, 0x05, 0x05,
    0x0C, 0x09, 0x0C, 0x0A, 0x0A, 0x0A, 0x03, 0x04, 0x0B, 0x06, 0x0A, 0x0A, 0x08, 0x03, 0x05, 0x05,
    0x05, 0x05, 0x05, 0x0C, 0x08, 0x0A, 0x0A, 0x02, 0x0B, 0x0C, 0x0A, 0x09, 0x06, 0x09, 0x05, 0x05,
    0x05, 0x05, 0x05, 0x05, 0x06, 0x0A, 0x0A, 0x0A, 0x09, 0x06, 0x09, 0x06, 0x09, 0x06, 0x01, 0x05,
    0x05, 0x05, 0x05, 0x05, 0x0C, 0x09, 0x0C, 0x09, 0x06, 0x09, 0x06, 0x09, 0x06, 0x09, 0x05, 0x05,
    0x05, 0x06, 0x03, 0x06, 0x03, 0x06, 0x03, 0x06, 0x09, 0x06, 0x0A, 0x02, 0x0B, 0x06, 0x01, 0x05,
    0x06, 0x0A, 0x0A, 0x0A, 0x0A, 0x0A, 0x0A, 0x0A, 0x02, 0x0A, 0x0A, 0x0A, 0x0A, 0x0A, 0x02, 0x03,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_matches_empty_sample() {
        let maze = Maze::new();
        assert_eq!(maze.to_bytes(), EMPTY_MAZE);
        assert!(maze.is_wall(START, Direction::East));
        assert!(maze.is_exit(START, Direction::North));
        assert_eq!(maze.goal(), DEFAULT_GOAL);
    }

    #[test]
    fn test_walls_are_symmetric() {
        let mut maze = Maze::new();
        let cell = Cell::from_coords(4, 9);
        maze.set_wall(cell, Direction::South);
        assert!(maze.is_wall(Cell::from_coords(3, 9), Direction::North));
        maze.set_wall(cell, Direction::West);
        assert!(maze.is_wall(Cell::from_coords(4, 8), Direction::East));
        maze.clear_wall(cell, Direction::South);
        assert!(maze.is_exit(Cell::from_coords(3, 9), Direction::North));
        assert!(maze.is_exit(cell, Direction::South));
    }

    #[test]
    fn test_flood_empty_maze_is_manhattan() {
        let mut maze = Maze::new();
        maze.flood(DEFAULT_GOAL);
        for cell in Cell::all() {
            let expected = (cell.row() as i32 - 7).abs() + (cell.column() as i32 - 7).abs();
            assert_eq!(maze.cost(cell) as i32, expected, "cell {}", cell);
        }
    }

    #[test]
    fn test_flood_unreachable() {
        let mut maze = Maze::new();
        for direction in Direction::ALL {
            maze.set_wall(DEFAULT_GOAL, direction);
        }
        maze.flood(DEFAULT_GOAL);
        assert_eq!(maze.cost(DEFAULT_GOAL), 0);
        assert_eq!(maze.cost(START), MAX_COST);
        assert_eq!(maze.direction_to_smallest(START, Direction::North), None);
    }

    #[test]
    fn test_neighbour_cost_through_wall() {
        let mut maze = Maze::new();
        maze.flood(DEFAULT_GOAL);
        assert_eq!(maze.neighbour_cost(START, Direction::East), MAX_COST);
        assert_eq!(maze.neighbour_cost(START, Direction::North), 13);
    }

    #[test]
    fn test_direction_to_smallest_prefers_ahead() {
        let mut maze = Maze::new();
        maze.flood(DEFAULT_GOAL);
        // north and east both lead downhill from (2, 2); heading decides
        let cell = Cell::from_coords(2, 2);
        assert_eq!(
            maze.direction_to_smallest(cell, Direction::North),
            Some(Direction::North)
        );
        assert_eq!(
            maze.direction_to_smallest(cell, Direction::East),
            Some(Direction::East)
        );
        // facing away: left beats behind, right beats left
        assert_eq!(
            maze.direction_to_smallest(cell, Direction::South),
            Some(Direction::East)
        );
        assert_eq!(
            maze.direction_to_smallest(cell, Direction::West),
            Some(Direction::North)
        );
        assert_eq!(maze.direction_to_smallest(DEFAULT_GOAL, Direction::North), None);
    }

    #[test]
    fn test_update_from_sensors() {
        let mut maze = Maze::new();
        let cell = Cell::from_coords(3, 3);
        let walls = WallState {
            left: true,
            front: true,
            right: false,
        };
        maze.update_from_sensors(cell, Direction::East, walls);
        assert!(maze.is_wall(cell, Direction::East));
        assert!(maze.is_wall(cell, Direction::North));
        assert!(maze.is_exit(cell, Direction::South));
        assert!(maze.is_visited(cell));
        assert_eq!(maze.visited_count(), 1);
    }

    #[test]
    fn test_bytes_round_trip_and_length_check() {
        let maze = Maze::with_walls(&JAPAN_2007);
        let loaded = Maze::from_bytes(&maze.to_bytes()).unwrap();
        assert_eq!(loaded, maze);
        assert_eq!(Maze::from_bytes(&[0u8; 255]), Err(Error::InvalidData));
    }

    #[test]
    fn test_close_unvisited() {
        let mut maze = Maze::new();
        maze.mark_visited(START);
        maze.close_unvisited();
        let cell = Cell::from_coords(5, 5);
        for direction in Direction::ALL {
            assert!(maze.is_wall(cell, direction));
        }
        maze.flood(DEFAULT_GOAL);
        assert_eq!(maze.cost(START), MAX_COST);
    }
}
