//! Property tests for path reconstruction
//!
//! Tests invariants for:
//! - make_path: walkable, minimal, framed by B and S
//! - Verification: unvisited cells make a route unverified
//! - expand/compress: inverse of each other

use micromouse::maze::*;
use micromouse::path::*;
use micromouse::types::*;
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn cell() -> impl Strategy<Value = Cell> {
    any::<u8>().prop_map(Cell::new)
}

fn direction() -> impl Strategy<Value = Direction> {
    (0u8..4).prop_map(Direction::from_index)
}

fn random_maze() -> impl Strategy<Value = Maze> {
    prop::collection::vec((cell(), direction()), 0..300).prop_map(|walls| {
        let mut maze = Maze::new();
        for (cell, direction) in walls {
            maze.set_wall(cell, direction);
        }
        maze
    })
}

fn cell_path() -> impl Strategy<Value = Path> {
    let step = prop_oneof![
        Just(PathToken::Forward),
        Just(PathToken::Right),
        Just(PathToken::Left),
        Just(PathToken::Around),
    ];
    prop::collection::vec(step, 0..100).prop_map(|steps| {
        let mut path = Path::new();
        path.push(PathToken::Begin).unwrap();
        for step in steps {
            path.push(step).unwrap();
        }
        path.push(PathToken::Stop).unwrap();
        path
    })
}

// ============================================================================
// Route Property Tests
// ============================================================================

proptest! {
    /// CORE INVARIANT: the route is a shortest walk through open walls
    #[test]
    fn route_is_walkable_and_minimal(
        maze in random_maze(),
        start in cell(),
        heading in direction()
    ) {
        let mut maze = maze;
        let goal = maze.goal();
        maze.flood(goal);
        let route = make_path(&maze, start, heading);
        if maze.cost(start) == MAX_COST {
            prop_assert_eq!(route, Err(Error::NoRoute));
            return Ok(());
        }
        let planned = route.unwrap().accept_unverified();
        let tokens = planned.path.tokens();
        prop_assert_eq!(tokens.first(), Some(&PathToken::Begin));
        prop_assert_eq!(tokens.last(), Some(&PathToken::Stop));
        prop_assert_eq!(planned.path.cells(), maze.cost(start) as usize);
        prop_assert_eq!(planned.cost, maze.cost(start));

        let mut here = start;
        let mut facing = planned.first_heading;
        for token in tokens {
            if let Some(turn) = token.turn() {
                facing = facing.turned(turn);
                prop_assert!(maze.is_exit(here, facing), "blocked at {} {:?}", here, facing);
                here = here.neighbour(facing);
            }
        }
        prop_assert_eq!(here, goal);
        prop_assert_eq!(facing, planned.final_heading);
    }

    /// A route is verified exactly when every cell it enters was visited
    #[test]
    fn verification_tracks_visits(
        maze in random_maze(),
        start in cell(),
        visited in prop::collection::vec(cell(), 0..256)
    ) {
        let mut maze = maze;
        for cell in visited {
            maze.mark_visited(cell);
        }
        let goal = maze.goal();
        maze.flood(goal);
        let Ok(route) = make_path(&maze, start, Direction::North) else {
            return Ok(());
        };
        let planned = route.planned().clone();
        let mut here = start;
        let mut facing = planned.first_heading;
        let mut all_visited = true;
        for token in planned.path.tokens() {
            if let Some(turn) = token.turn() {
                facing = facing.turned(turn);
                here = here.neighbour(facing);
                all_visited &= maze.is_visited(here);
            }
        }
        prop_assert_eq!(route.is_verified(), all_visited);
    }
}

// ============================================================================
// Expansion Property Tests
// ============================================================================

proptest! {
    /// compress undoes expand
    #[test]
    fn expand_compress_inverse(path in cell_path()) {
        let commands = expand(&path).unwrap();
        prop_assert_eq!(compress(&commands).unwrap(), path.clone());
    }

    /// Every cell move becomes two half cells
    #[test]
    fn expand_doubles_cells(path in cell_path()) {
        let commands = expand(&path).unwrap();
        let halves = commands
            .tokens()
            .iter()
            .filter(|t| **t == PathToken::Half)
            .count();
        prop_assert_eq!(halves, 2 * path.cells());
    }

    /// Text form parses back
    #[test]
    fn display_parses_back(path in cell_path()) {
        let text = path.to_string();
        prop_assert_eq!(Path::parse(&text).unwrap(), path);
    }
}
