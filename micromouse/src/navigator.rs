//! Micromouse core - Navigation agent
//!
//! Explores the maze one cell at a time, keeps the map, and runs the best
//! known route. All physical motion goes through a [`Movement`]
//! implementation, so the same agent drives the real robot, the physics
//! simulator and the idealised grid model.
//!
//! # Search loop
//!
//! Every iteration starts at the sensing point just short of a cell
//! boundary:
//!
//! 1. Poll the button; a press cancels the traversal.
//! 2. Step the location into the next cell and read its walls.
//! 3. Add the walls to the map and re-flood toward the target.
//! 4. Pick the cheapest open neighbour and make the matching move.
//!
//! # Run sequence
//!
//! ```text
//! Searching -> InPlaceRun -> SmoothRun -> Finished
//! ```

use crate::maze::Maze;
use crate::movement::{Movement, StartPosition};
use crate::path::{expand, make_path, Commands, PathToken, PlannedPath};
use crate::report::{StatusLine, StepLog};
use crate::snapshot::WallState;
use crate::types::*;

/// Cells a wall follower may visit before giving up
pub const MAX_FOLLOW_STEPS: usize = 4 * MAZE_CELLS;

/// Explorer and route runner
pub struct NavigationAgent<M: Movement> {
    movement: M,
    maze: Maze,
    location: Cell,
    heading: Direction,
    walls: WallState,
    state: RunState,
    start: StartPosition,
}

impl<M: Movement> NavigationAgent<M> {
    /// Agent in the start cell facing north with its tail on the back wall
    pub fn new(movement: M, maze: Option<Maze>) -> Self {
        Self {
            movement,
            maze: maze.unwrap_or_default(),
            location: START,
            heading: Direction::North,
            walls: WallState::default(),
            state: RunState::Searching,
            start: StartPosition::BackWall { align: true },
        }
    }

    /// Back to the start cell, keeping the map
    pub fn reset(&mut self) {
        self.location = START;
        self.heading = Direction::North;
        self.walls = WallState::default();
        self.state = RunState::Searching;
        self.start = StartPosition::BackWall { align: true };
    }

    /// Declare where the robot is and how it is placed
    pub fn place(&mut self, location: Cell, heading: Direction, start: StartPosition) {
        self.location = location;
        self.heading = heading;
        self.start = start;
    }

    /// Current cell
    pub fn location(&self) -> Cell {
        self.location
    }

    /// Current heading
    pub fn heading(&self) -> Direction {
        self.heading
    }

    /// Walls seen at the last sensing point
    pub fn walls(&self) -> WallState {
        self.walls
    }

    /// Position in the run sequence
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Jump to a stage of the run sequence
    pub fn set_state(&mut self, state: RunState) {
        self.state = state;
    }

    /// How the next search will begin
    pub fn start_position(&self) -> StartPosition {
        self.start
    }

    /// Map
    pub fn maze(&self) -> &Maze {
        &self.maze
    }

    /// Mutable map
    pub fn maze_mut(&mut self) -> &mut Maze {
        &mut self.maze
    }

    /// Movement layer
    pub fn movement(&self) -> &M {
        &self.movement
    }

    /// Mutable movement layer
    pub fn movement_mut(&mut self) -> &mut M {
        &mut self.movement
    }

    /// Take the agent apart
    pub fn into_parts(self) -> (M, Maze) {
        (self.movement, self.maze)
    }

    /// Status line for reports
    pub fn status(&self) -> StatusLine {
        StatusLine {
            location: self.location,
            heading: self.heading,
            walls: self.walls,
        }
    }

    fn log_step(&mut self, action: char) {
        let step = StepLog {
            action,
            status: self.status(),
            front: self.movement.front_sensor(),
            position: self.movement.position(),
        };
        trace!("{}", step);
    }

    /// Add the last wall readings to the map and mark the cell visited
    pub fn update_map(&mut self) {
        self.maze
            .update_from_sensors(self.location, self.heading, self.walls);
    }

    /// Spin in place to face `direction`
    pub fn turn_to_face(&mut self, direction: Direction) -> Result<()> {
        let turn = self.heading.turn_to(direction);
        self.movement.spin(turn)?;
        self.heading = direction;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    /// Explore toward `target`, mapping every cell entered
    ///
    /// Ends stopped in the middle of the target facing back the way it came.
    /// Walls are only ever added, so a bad reading can wall the robot in;
    /// that ends with [`Error::NoRoute`] and the alarm.
    pub fn search_to(&mut self, target: Cell) -> Result<()> {
        self.maze.flood(target);
        if self.location == target {
            return Ok(());
        }
        self.depart(target)?;
        while self.location != target {
            self.enter_next_cell()?;
            self.maze.flood(target);
            if self.location == target {
                self.log_step('T');
                self.movement.end_run(self.walls.front)?;
                self.heading = self.heading.behind();
                break;
            }
            let Some(next) = self.maze.direction_to_smallest(self.location, self.heading) else {
                return self.no_route();
            };
            self.search_move(self.heading.turn_to(next))?;
        }
        self.arrive()
    }

    /// Left-hand wall follower
    ///
    /// Maps as it goes like [`search_to`](Self::search_to) but ignores the
    /// flood when choosing. Gives up with [`Error::NoRoute`] after
    /// [`MAX_FOLLOW_STEPS`] cells, which is what happens when the target
    /// is not on the wall being followed.
    pub fn follow_to(&mut self, target: Cell) -> Result<()> {
        self.maze.flood(target);
        if self.location == target {
            return Ok(());
        }
        self.depart(target)?;
        let mut steps = 0;
        while self.location != target {
            if steps >= MAX_FOLLOW_STEPS {
                warn!("wall follower lost after {} cells", steps);
                self.movement.halt()?;
                return Err(Error::NoRoute);
            }
            steps += 1;
            self.enter_next_cell()?;
            if self.location == target {
                self.log_step('T');
                self.movement.end_run(self.walls.front)?;
                self.heading = self.heading.behind();
                break;
            }
            let turn = if !self.walls.left {
                Turn::Left
            } else if !self.walls.front {
                Turn::Ahead
            } else if !self.walls.right {
                Turn::Right
            } else {
                Turn::Back
            };
            self.search_move(turn)?;
        }
        self.arrive()
    }

    /// Search to the goal and back to the start
    pub fn search_maze(&mut self) -> Result<()> {
        let goal = self.maze.goal();
        self.search_to(goal)?;
        self.movement.delay_ms(200);
        self.search_to(START)
    }

    fn depart(&mut self, target: Cell) -> Result<()> {
        self.movement.delay_ms(1000);
        self.movement.begin()?;
        self.maze.mark_visited(self.location);
        if self.start == StartPosition::CellCenter {
            let smallest = self.maze.direction_to_smallest(self.location, self.heading);
            let Some(direction) = smallest else {
                return self.no_route();
            };
            self.turn_to_face(direction)?;
        }
        self.movement.leave_start(self.start)?;
        info!("searching from {} to {}", self.location, target);
        Ok(())
    }

    fn enter_next_cell(&mut self) -> Result<()> {
        if self.movement.button_pressed() {
            warn!("search cancelled at {}", self.location);
            self.movement.halt()?;
            return Err(Error::Cancelled);
        }
        self.movement.set_steering(true)?;
        self.location = self.location.neighbour(self.heading);
        self.walls = self.movement.walls();
        self.update_map();
        Ok(())
    }

    fn search_move(&mut self, turn: Turn) -> Result<()> {
        match turn {
            Turn::Ahead => {
                self.log_step('F');
                self.movement.search_forward()?;
            }
            Turn::Right => {
                self.log_step('R');
                self.movement.search_turn(turn)?;
            }
            Turn::Left => {
                self.log_step('L');
                self.movement.search_turn(turn)?;
            }
            Turn::Back => {
                self.log_step('A');
                self.movement.turn_around(self.walls.front)?;
            }
        }
        self.heading = self.heading.turned(turn);
        Ok(())
    }

    fn arrive(&mut self) -> Result<()> {
        self.start = StartPosition::CellCenter;
        info!("arrived {}", self.status());
        self.movement.finish()
    }

    fn no_route(&mut self) -> Result<()> {
        error!("no route from {}", self.status());
        self.movement.halt()?;
        self.movement.alarm();
        Err(Error::NoRoute)
    }

    // ------------------------------------------------------------------
    // Runs
    // ------------------------------------------------------------------

    /// Shortest route to the goal through visited cells only
    pub fn plan_run(&self) -> Result<PlannedPath> {
        let mut known = self.maze.clone();
        known.close_unvisited();
        known.flood(self.maze.goal());
        make_path(&known, self.location, self.heading)?.verified()
    }

    /// Run to the goal stopping for every turn
    pub fn run_in_place(&mut self) -> Result<()> {
        self.run(false)
    }

    /// Run to the goal with integrated turns
    pub fn run_smooth(&mut self) -> Result<()> {
        self.run(true)
    }

    fn run(&mut self, smooth: bool) -> Result<()> {
        let planned = match self.plan_run() {
            Ok(planned) => planned,
            Err(Error::NoRoute) => return self.no_route(),
            Err(e) => return Err(e),
        };
        info!("run {} from {} smooth {}", planned.path, self.location, smooth);
        let commands = expand(&planned.path)?;
        self.movement.delay_ms(200);
        self.movement.begin()?;
        self.turn_to_face(planned.first_heading)?;
        self.execute(&commands, smooth)?;
        self.location = self.maze.goal();
        self.heading = planned.final_heading;
        self.start = StartPosition::CellCenter;
        info!("run complete {}", self.status());
        self.movement.halt()
    }

    // Half-cell command patterns:
    //   HRH / HLH  turn in the cell between two half cells
    //   HH         half cell, carrying speed on
    //   HS         half cell, stopping in the middle of the cell
    fn execute(&mut self, commands: &Commands, smooth: bool) -> Result<()> {
        let m = self.movement.moves();
        let top = m.run_speed;
        let tokens = commands.tokens();
        let mut i = 0;
        while let Some(&token) = tokens.get(i) {
            if token == PathToken::Stop {
                break;
            }
            if self.movement.button_pressed() {
                warn!("run cancelled");
                self.movement.halt()?;
                return Err(Error::Cancelled);
            }
            let next = tokens.get(i + 1).copied();
            let after = tokens.get(i + 2).copied();
            match (token, next, after) {
                (PathToken::Begin, _, _) => i += 1,
                (PathToken::Half, Some(PathToken::Right), Some(PathToken::Half))
                | (PathToken::Half, Some(PathToken::Left), Some(PathToken::Half)) => {
                    let turn = if next == Some(PathToken::Right) {
                        Turn::Right
                    } else {
                        Turn::Left
                    };
                    if smooth {
                        self.movement
                            .straight(m.smooth_run_in, top, m.smooth_turn_speed)?;
                        self.movement.smooth_turn(turn)?;
                        self.movement.straight(m.smooth_run_in, top, top)?;
                    } else {
                        self.movement.straight(HALF_CELL, top, 0.0)?;
                        self.movement.spin(turn)?;
                        self.movement.straight(HALF_CELL, top, top)?;
                    }
                    i += 3;
                }
                (PathToken::Half, Some(PathToken::Half), _) => {
                    self.movement.straight(HALF_CELL, top, top)?;
                    i += 1;
                }
                (PathToken::Half, Some(PathToken::Stop), _) => {
                    self.movement.straight(HALF_CELL, top, 0.0)?;
                    i += 1;
                }
                _ => {
                    error!("bad command {:?} at {}", token, i);
                    self.movement.halt()?;
                    return Err(Error::BadCommand);
                }
            }
        }
        Ok(())
    }

    /// Work through the run sequence from the current state
    ///
    /// Each stage advances the state only when it succeeds, so after an
    /// error the same stage can be retried.
    pub fn run_maze(&mut self) -> Result<()> {
        while self.state != RunState::Finished {
            self.run_stage()?;
        }
        info!("finished, {} cells visited", self.maze.visited_count());
        self.movement.halt()
    }

    /// Perform the current stage of the run sequence and advance past it
    ///
    /// Returns the new state. A finished agent stays finished.
    pub fn run_stage(&mut self) -> Result<RunState> {
        match self.state {
            RunState::Searching => {
                self.place(START, Direction::North, StartPosition::BackWall { align: true });
                self.search_maze()?;
                self.movement.delay_ms(200);
                self.state = RunState::InPlaceRun;
            }
            RunState::InPlaceRun => {
                self.run_in_place()?;
                self.search_to(START)?;
                self.state = RunState::SmoothRun;
            }
            RunState::SmoothRun => {
                self.run_smooth()?;
                self.search_to(START)?;
                self.state = RunState::Finished;
            }
            RunState::Finished => {}
        }
        Ok(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maze::{EMPTY_MAZE, JAPAN_2007};
    use crate::sim::GridMovement;

    fn agent(truth: &[u8; MAZE_CELLS]) -> NavigationAgent<GridMovement> {
        NavigationAgent::new(GridMovement::new(Maze::with_walls(truth), None), None)
    }

    #[test]
    fn test_search_open_maze_reaches_goal() {
        let mut agent = agent(&EMPTY_MAZE);
        agent.search_to(DEFAULT_GOAL).unwrap();
        assert_eq!(agent.location(), DEFAULT_GOAL);
        assert_eq!(agent.movement().cell(), DEFAULT_GOAL);
        // arrived heading east, now facing west
        assert_eq!(agent.heading(), Direction::West);
        assert_eq!(agent.movement().heading(), Direction::West);
        assert!(agent.maze().is_visited(DEFAULT_GOAL));
        assert_eq!(agent.start_position(), StartPosition::CellCenter);
    }

    #[test]
    fn test_search_japan_and_back() {
        let mut agent = agent(&JAPAN_2007);
        agent.search_maze().unwrap();
        assert_eq!(agent.location(), START);
        assert_eq!(agent.movement().cell(), START);
        let truth = Maze::with_walls(&JAPAN_2007);
        // every mapped wall is real
        for cell in Cell::all() {
            if agent.maze().is_visited(cell) {
                for d in Direction::ALL {
                    assert_eq!(agent.maze().is_wall(cell, d), truth.is_wall(cell, d));
                }
            }
        }
    }

    #[test]
    fn test_run_maze_completes() {
        let mut agent = agent(&JAPAN_2007);
        agent.run_maze().unwrap();
        assert_eq!(agent.state(), RunState::Finished);
        assert_eq!(agent.location(), START);
        assert_eq!(agent.movement().cell(), START);
        assert_eq!(agent.movement().alarms(), 0);
    }

    #[test]
    fn test_run_stage_steps_through_states() {
        let mut agent = agent(&JAPAN_2007);
        assert_eq!(agent.state(), RunState::Searching);
        assert_eq!(agent.run_stage(), Ok(RunState::InPlaceRun));
        assert_eq!(agent.location(), START);
        assert_eq!(agent.run_stage(), Ok(RunState::SmoothRun));
        assert_eq!(agent.run_stage(), Ok(RunState::Finished));
        assert_eq!(agent.run_stage(), Ok(RunState::Finished));
        assert_eq!(agent.movement().cell(), START);
    }

    #[test]
    fn test_runs_end_at_goal() {
        for smooth in [false, true] {
            let mut agent = agent(&JAPAN_2007);
            agent.search_maze().unwrap();
            let planned = agent.plan_run().unwrap();
            if smooth {
                agent.run_smooth().unwrap();
            } else {
                agent.run_in_place().unwrap();
            }
            assert_eq!(agent.location(), DEFAULT_GOAL);
            assert_eq!(agent.movement().cell(), DEFAULT_GOAL);
            assert_eq!(agent.movement().heading(), planned.final_heading);
            assert!(agent.movement().offset().abs() < 0.5);
        }
    }

    #[test]
    fn test_run_needs_known_route() {
        let mut agent = agent(&EMPTY_MAZE);
        assert_eq!(agent.plan_run(), Err(Error::NoRoute));
        assert_eq!(agent.run_in_place(), Err(Error::NoRoute));
        assert_eq!(agent.movement().alarms(), 1);
    }

    #[test]
    fn test_button_cancels_search() {
        let mut agent = agent(&JAPAN_2007);
        agent.movement_mut().press_button_at(5_000);
        assert_eq!(agent.search_to(DEFAULT_GOAL), Err(Error::Cancelled));
        let visited = agent.maze().visited_count();
        assert!(visited > 1);
        assert_ne!(agent.location(), DEFAULT_GOAL);
    }

    #[test]
    fn test_walled_in_goal_is_no_route() {
        let mut truth = Maze::new();
        for d in Direction::ALL {
            truth.set_wall(DEFAULT_GOAL, d);
        }
        let mut agent = NavigationAgent::new(GridMovement::new(truth, None), None);
        assert_eq!(agent.search_to(DEFAULT_GOAL), Err(Error::NoRoute));
        assert_eq!(agent.movement().alarms(), 1);
    }

    #[test]
    fn test_follow_wall_to_corner() {
        let mut agent = agent(&EMPTY_MAZE);
        let corner = Cell::from_coords(15, 15);
        agent.follow_to(corner).unwrap();
        assert_eq!(agent.location(), corner);
        assert_eq!(agent.movement().cell(), corner);
    }

    #[test]
    fn test_follower_gives_up_on_island() {
        let mut agent = agent(&EMPTY_MAZE);
        assert_eq!(agent.follow_to(DEFAULT_GOAL), Err(Error::NoRoute));
    }

    #[test]
    fn test_turn_to_face() {
        let mut agent = agent(&EMPTY_MAZE);
        agent.turn_to_face(Direction::West).unwrap();
        assert_eq!(agent.heading(), Direction::West);
        agent.turn_to_face(Direction::East).unwrap();
        assert_eq!(agent.movement().heading(), Direction::East);
        assert_eq!(agent.movement().spins(), 2);
        agent.turn_to_face(Direction::East).unwrap();
        assert_eq!(agent.movement().spins(), 2);
    }

    #[test]
    fn test_status_line() {
        let agent = agent(&EMPTY_MAZE);
        assert_eq!(agent.status().location, START);
        assert_eq!(agent.status().heading, Direction::North);
    }
}
