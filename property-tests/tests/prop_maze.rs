//! Property tests for the maze module
//!
//! Tests invariants for:
//! - Walls: symmetry under any sequence of edits
//! - Flood: agrees with a plain breadth-first search
//! - Direction choice: always downhill through an exit
//! - Persistence: byte round trip

use micromouse::maze::*;
use micromouse::types::*;
use proptest::prelude::*;
use std::collections::VecDeque;

// ============================================================================
// Strategies
// ============================================================================

fn cell() -> impl Strategy<Value = Cell> {
    any::<u8>().prop_map(Cell::new)
}

fn direction() -> impl Strategy<Value = Direction> {
    (0u8..4).prop_map(Direction::from_index)
}

/// Random interior walls on top of the boundary
fn random_maze() -> impl Strategy<Value = Maze> {
    prop::collection::vec((cell(), direction()), 0..300).prop_map(|walls| {
        let mut maze = Maze::new();
        for (cell, direction) in walls {
            maze.set_wall(cell, direction);
        }
        maze
    })
}

fn reference_costs(maze: &Maze, target: Cell) -> [u8; MAZE_CELLS] {
    let mut costs = [MAX_COST; MAZE_CELLS];
    let mut queue = VecDeque::new();
    costs[target.index() as usize] = 0;
    queue.push_back(target);
    while let Some(here) = queue.pop_front() {
        for direction in Direction::ALL {
            if maze.is_wall(here, direction) {
                continue;
            }
            let next = here.neighbour(direction);
            if costs[next.index() as usize] == MAX_COST && next != target {
                costs[next.index() as usize] = costs[here.index() as usize] + 1;
                queue.push_back(next);
            }
        }
    }
    costs
}

// ============================================================================
// Wall Property Tests
// ============================================================================

proptest! {
    /// CORE INVARIANT: a wall seen from one side is seen from the other
    #[test]
    fn walls_stay_symmetric(
        edits in prop::collection::vec((cell(), direction(), any::<bool>()), 0..200)
    ) {
        let mut maze = Maze::new();
        for (cell, direction, set) in edits {
            if set {
                maze.set_wall(cell, direction);
            } else {
                maze.clear_wall(cell, direction);
            }
        }
        for cell in Cell::all() {
            for direction in Direction::ALL {
                prop_assert_eq!(
                    maze.is_wall(cell, direction),
                    maze.is_wall(cell.neighbour(direction), direction.behind()),
                    "asymmetric wall at {} {:?}", cell, direction
                );
            }
        }
    }

    /// Sensor updates only ever add walls
    #[test]
    fn sensor_updates_never_remove_walls(
        maze in random_maze(),
        at in cell(),
        heading in direction(),
        left in any::<bool>(),
        front in any::<bool>(),
        right in any::<bool>()
    ) {
        let mut updated = maze.clone();
        updated.update_from_sensors(at, heading, micromouse::WallState { left, front, right });
        prop_assert!(updated.is_visited(at));
        for cell in Cell::all() {
            prop_assert_eq!(maze.walls(cell) & !updated.walls(cell) & WALL_MASK, 0);
        }
    }

    /// Saved bytes load back to the same maze
    #[test]
    fn bytes_round_trip(maze in random_maze(), visited in prop::collection::vec(cell(), 0..50)) {
        let mut maze = maze;
        for cell in visited {
            maze.mark_visited(cell);
        }
        let bytes = maze.to_bytes();
        let loaded = Maze::from_bytes(&bytes).unwrap();
        prop_assert_eq!(loaded.to_bytes(), bytes);
    }
}

// ============================================================================
// Flood Property Tests
// ============================================================================

proptest! {
    /// CORE INVARIANT: flood costs are breadth-first step counts
    #[test]
    fn flood_matches_reference(maze in random_maze(), target in cell()) {
        let mut maze = maze;
        maze.flood(target);
        let expected = reference_costs(&maze, target);
        for cell in Cell::all() {
            prop_assert_eq!(maze.cost(cell), expected[cell.index() as usize], "cell {}", cell);
        }
    }

    /// The chosen direction is open and one step cheaper
    #[test]
    fn smallest_direction_is_downhill(
        maze in random_maze(),
        target in cell(),
        from in cell(),
        heading in direction()
    ) {
        let mut maze = maze;
        maze.flood(target);
        match maze.direction_to_smallest(from, heading) {
            Some(direction) => {
                prop_assert!(maze.is_exit(from, direction));
                prop_assert_eq!(maze.neighbour_cost(from, direction) + 1, maze.cost(from));
            }
            None => {
                prop_assert!(from == target || maze.cost(from) == MAX_COST);
            }
        }
    }

    /// Closing unvisited cells never shortens a route
    #[test]
    fn closing_unvisited_never_helps(
        maze in random_maze(),
        visited in prop::collection::vec(cell(), 0..256)
    ) {
        let mut open = maze;
        for cell in visited {
            open.mark_visited(cell);
        }
        let mut closed = open.clone();
        closed.close_unvisited();
        open.flood(DEFAULT_GOAL);
        closed.flood(DEFAULT_GOAL);
        for cell in Cell::all() {
            prop_assert!(closed.cost(cell) >= open.cost(cell));
        }
    }
}
