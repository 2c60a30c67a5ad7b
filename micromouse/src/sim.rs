//! Micromouse core - Simulation
//!
//! Host-side stand-ins for the robot:
//!
//! - [`GridMovement`] moves a point through a known maze cell by cell. It
//!   exercises the navigator's decisions without any physics.
//! - [`SimWorld`] is a kinematic robot in a real maze behind the [`Hal`]
//!   trait: lagged motors, quantised encoders and wall sensors derived from
//!   the true pose.
//! - [`SimPlatform`] is a [`Platform`] whose delays run [`ControlLoop`]
//!   ticks on a [`SimWorld`], so blocking foreground code runs unchanged.
//!
//! Coordinates are millimetres from the outside corner of the start cell,
//! x east and y north. Angles are degrees counter-clockwise from north.

extern crate std;

use crate::config::{Config, MoveConfig};
use crate::maze::Maze;
use crate::movement::{Movement, StartPosition, SENSING_POSITION};
use crate::snapshot::WallState;
use crate::types::*;

#[cfg(feature = "std")]
use crate::{
    control::ControlLoop,
    hal::{Hal, Platform},
    shared::SharedState,
};
#[cfg(feature = "std")]
use core::cell::{Ref, RefCell, RefMut};
#[cfg(feature = "std")]
use rand::{rngs::StdRng, Rng, SeedableRng};

// sensing point measured from the middle of the cell
const SENSING_OFFSET: f32 = SENSING_POSITION - HALF_CELL;

const FRONT_AT_CENTRE: f32 = 850.0;

// Front reading with the nearest wall ahead at `distance` mm from the
// middle of the robot.
fn front_reading(distance: f32) -> f32 {
    let d = distance.max(10.0);
    FRONT_AT_CENTRE * pow4(HALF_CELL / d)
}

fn pow4(x: f32) -> f32 {
    let sq = x * x;
    sq * sq
}

fn travel_ms(distance: f32, speed: f32) -> u32 {
    if speed <= 0.0 {
        return 0;
    }
    (distance.abs() / speed * 1000.0) as u32
}

// ============================================================================
// Grid Movement
// ============================================================================

/// Cell-level [`Movement`] in a known maze
///
/// Tracks a cell, a heading and an offset in mm from the middle of the cell
/// along the heading. Driving through a wall is an
/// [`Error::InvalidArg`]; so is spinning away from the middle of a cell.
/// Time only passes through delays and a nominal duration per move.
#[derive(Debug, Clone)]
pub struct GridMovement {
    truth: Maze,
    moves: MoveConfig,
    cell: Cell,
    heading: Direction,
    offset: f32,
    elapsed_ms: u32,
    press_at_ms: Option<u32>,
    indicator: bool,
    alarms: u32,
    moves_made: u32,
    spins: u32,
}

impl GridMovement {
    /// Start cell, facing north, in `truth`
    pub fn new(truth: Maze, config: Option<Config>) -> Self {
        Self {
            truth,
            moves: config.unwrap_or_default().moves,
            cell: START,
            heading: Direction::North,
            offset: 0.0,
            elapsed_ms: 0,
            press_at_ms: None,
            indicator: false,
            alarms: 0,
            moves_made: 0,
            spins: 0,
        }
    }

    /// Put the robot somewhere else
    pub fn place(&mut self, cell: Cell, heading: Direction, offset: f32) {
        self.cell = cell;
        self.heading = heading;
        self.offset = offset;
    }

    /// The real maze
    pub fn truth(&self) -> &Maze {
        &self.truth
    }

    /// Cell the robot is in
    pub fn cell(&self) -> Cell {
        self.cell
    }

    /// Heading
    pub fn heading(&self) -> Direction {
        self.heading
    }

    /// Distance past the middle of the cell (mm)
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Simulated time (ms)
    pub fn elapsed_ms(&self) -> u32 {
        self.elapsed_ms
    }

    /// Hold the button from this simulated time on
    pub fn press_button_at(&mut self, ms: u32) {
        self.press_at_ms = Some(ms);
    }

    /// Indicator state
    pub fn indicator(&self) -> bool {
        self.indicator
    }

    /// Alarms raised
    pub fn alarms(&self) -> u32 {
        self.alarms
    }

    /// Search moves made
    pub fn moves_made(&self) -> u32 {
        self.moves_made
    }

    /// In-place spins made
    pub fn spins(&self) -> u32 {
        self.spins
    }

    fn step_into(&mut self, direction: Direction) -> Result<()> {
        if self.truth.is_wall(self.cell, direction) {
            error!("drove into the {:?} wall of {}", direction, self.cell);
            return Err(Error::InvalidArg);
        }
        self.cell = self.cell.neighbour(direction);
        Ok(())
    }

    // Move along the heading, crossing boundaries as the offset passes them.
    fn advance(&mut self, distance: f32) -> Result<()> {
        self.offset += distance;
        while self.offset >= HALF_CELL + 0.5 {
            self.step_into(self.heading)?;
            self.offset -= FULL_CELL;
        }
        while self.offset <= -(HALF_CELL + 0.5) {
            self.step_into(self.heading.behind())?;
            self.offset += FULL_CELL;
        }
        Ok(())
    }

    fn search_move(&mut self, turn: Turn, offset: f32) -> Result<()> {
        self.step_into(self.heading)?;
        self.heading = self.heading.turned(turn);
        self.offset = offset;
        self.moves_made += 1;
        self.elapsed_ms += travel_ms(FULL_CELL, self.moves.search_speed);
        Ok(())
    }
}

impl Movement for GridMovement {
    fn walls(&mut self) -> WallState {
        let ahead = self.cell.neighbour(self.heading);
        WallState {
            left: self.truth.is_wall(ahead, self.heading.left()),
            front: self.truth.is_wall(ahead, self.heading),
            right: self.truth.is_wall(ahead, self.heading.right()),
        }
    }

    fn front_sensor(&mut self) -> i32 {
        let mut distance = HALF_CELL - self.offset;
        let mut cell = self.cell;
        for _ in 0..MAZE_WIDTH {
            if self.truth.is_wall(cell, self.heading) {
                break;
            }
            cell = cell.neighbour(self.heading);
            distance += FULL_CELL;
        }
        front_reading(distance) as i32
    }

    fn position(&mut self) -> f32 {
        self.offset + HALF_CELL
    }

    fn button_pressed(&mut self) -> bool {
        self.press_at_ms.is_some_and(|at| self.elapsed_ms >= at)
    }

    fn set_indicator(&mut self, on: bool) {
        self.indicator = on;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.elapsed_ms = self.elapsed_ms.saturating_add(ms);
    }

    fn moves(&self) -> MoveConfig {
        self.moves
    }

    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_steering(&mut self, _enabled: bool) -> Result<()> {
        Ok(())
    }

    fn leave_start(&mut self, start: StartPosition) -> Result<()> {
        let distance = SENSING_OFFSET - self.offset;
        if let StartPosition::BackWall { align: true } = start {
            self.elapsed_ms += 500;
        }
        self.advance(distance)?;
        self.elapsed_ms += travel_ms(distance, self.moves.search_speed);
        Ok(())
    }

    fn search_forward(&mut self) -> Result<()> {
        self.search_move(Turn::Ahead, SENSING_OFFSET)
    }

    fn search_turn(&mut self, turn: Turn) -> Result<()> {
        if !matches!(turn, Turn::Left | Turn::Right) {
            return Err(Error::InvalidArg);
        }
        self.search_move(turn, SENSING_OFFSET)
    }

    fn turn_around(&mut self, _front_wall: bool) -> Result<()> {
        self.search_move(Turn::Back, SENSING_OFFSET)?;
        self.elapsed_ms += 400;
        Ok(())
    }

    fn end_run(&mut self, _front_wall: bool) -> Result<()> {
        self.search_move(Turn::Back, 0.0)?;
        self.elapsed_ms += 400;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.elapsed_ms += 2000;
        Ok(())
    }

    fn spin(&mut self, turn: Turn) -> Result<()> {
        if turn == Turn::Ahead {
            return Ok(());
        }
        if self.offset.abs() >= 1.0 {
            error!("spin {:?} off centre at {}", turn, self.offset);
            return Err(Error::InvalidArg);
        }
        self.heading = self.heading.turned(turn);
        self.spins += 1;
        self.elapsed_ms += if turn == Turn::Back { 400 } else { 250 };
        Ok(())
    }

    fn straight(&mut self, distance: f32, top_speed: f32, _final_speed: f32) -> Result<()> {
        self.advance(distance)?;
        self.elapsed_ms += travel_ms(distance, top_speed);
        Ok(())
    }

    fn smooth_turn(&mut self, turn: Turn) -> Result<()> {
        if !matches!(turn, Turn::Left | Turn::Right) {
            return Err(Error::InvalidArg);
        }
        self.heading = self.heading.turned(turn);
        self.offset = -self.offset;
        self.elapsed_ms += 200;
        Ok(())
    }

    fn halt(&mut self) -> Result<()> {
        Ok(())
    }

    fn alarm(&mut self) {
        warn!("alarm at {} facing {:?}", self.cell, self.heading);
        self.alarms += 1;
    }
}

// ============================================================================
// Physics World
// ============================================================================

#[cfg(feature = "std")]
const MOTOR_LAG: f32 = 0.2;

#[cfg(feature = "std")]
const MAX_READING: f32 = 4095.0;

#[cfg(feature = "std")]
const SIDE_LOOKAHEAD: f32 = 30.0;

// side emitters splay outward from the heading by this many degrees
#[cfg(feature = "std")]
const SIDE_ANGLE: f32 = 45.0;

/// Kinematic robot in a maze, seen through [`Hal`]
///
/// Each wheel follows its commanded speed with a first-order lag. The
/// motor constant is the inverse of the drive feed-forward, so a tuned
/// controller tracks without steady error. Walls do not stop the robot.
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct SimWorld {
    maze: Maze,
    config: Config,
    x: f32,
    y: f32,
    angle: f32,
    left_speed: f32,
    right_speed: f32,
    left_target: f32,
    right_target: f32,
    left_fraction: f32,
    right_fraction: f32,
    pending: (i32, i32),
    supply: f32,
    emitters: bool,
    readings: [i32; 3],
    noise: i32,
    rng: StdRng,
}

#[cfg(feature = "std")]
impl SimWorld {
    /// Robot at rest in the middle of the start cell facing north
    pub fn new(maze: Maze, config: Option<Config>, seed: u64) -> Self {
        let mut world = Self {
            maze,
            config: config.unwrap_or_default(),
            x: 0.0,
            y: 0.0,
            angle: 0.0,
            left_speed: 0.0,
            right_speed: 0.0,
            left_target: 0.0,
            right_target: 0.0,
            left_fraction: 0.0,
            right_fraction: 0.0,
            pending: (0, 0),
            supply: 8.0,
            emitters: false,
            readings: [0; 3],
            noise: 2,
            rng: StdRng::seed_from_u64(seed),
        };
        world.place(START, Direction::North);
        world
    }

    /// Robot settings matched to this world's sensor model
    pub fn calibrated_config() -> Config {
        let mut config = Config::default();
        config.moves.turn_trigger = 81;
        config
    }

    /// Stop the robot in the middle of `cell` facing `heading`
    pub fn place(&mut self, cell: Cell, heading: Direction) {
        self.x = cell.column() as f32 * FULL_CELL + HALF_CELL;
        self.y = cell.row() as f32 * FULL_CELL + HALF_CELL;
        self.angle = match heading {
            Direction::North => 0.0,
            Direction::West => 90.0,
            Direction::South => 180.0,
            Direction::East => 270.0,
        };
        self.left_speed = 0.0;
        self.right_speed = 0.0;
    }

    /// Sensor noise amplitude in raw counts
    pub fn set_noise(&mut self, noise: i32) {
        self.noise = noise.max(0);
    }

    /// Supply voltage reported to the tick
    pub fn set_supply(&mut self, volts: f32) {
        self.supply = volts;
    }

    /// The maze
    pub fn maze(&self) -> &Maze {
        &self.maze
    }

    /// East coordinate (mm)
    pub fn x(&self) -> f32 {
        self.x
    }

    /// North coordinate (mm)
    pub fn y(&self) -> f32 {
        self.y
    }

    /// Heading angle (deg)
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Wheel speeds (mm/s)
    pub fn wheel_speeds(&self) -> (f32, f32) {
        (self.left_speed, self.right_speed)
    }

    /// Cell under the middle of the robot
    pub fn cell(&self) -> Cell {
        cell_at(self.x, self.y)
    }

    /// Nearest cardinal heading
    pub fn heading(&self) -> Direction {
        let quarter = (self.angle / 90.0).round() as i32;
        match quarter.rem_euclid(4) {
            0 => Direction::North,
            1 => Direction::West,
            2 => Direction::South,
            _ => Direction::East,
        }
    }

    /// Advance the physics by `dt` seconds
    pub fn step(&mut self, dt: f32) {
        self.left_speed += MOTOR_LAG * (self.left_target - self.left_speed);
        self.right_speed += MOTOR_LAG * (self.right_target - self.right_speed);
        let left = self.left_speed * dt;
        let right = self.right_speed * dt;

        let geometry = self.config.geometry;
        let distance = 0.5 * (left + right);
        let turn = ((right - left) / (2.0 * geometry.mouse_radius)).to_degrees();
        let mid = (self.angle + 0.5 * turn).to_radians();
        self.x -= distance * mid.sin();
        self.y += distance * mid.cos();
        self.angle += turn;

        self.left_fraction += left / geometry.mm_per_count_left();
        self.right_fraction += right / geometry.mm_per_count_right();
        let left_counts = self.left_fraction.trunc();
        let right_counts = self.right_fraction.trunc();
        self.left_fraction -= left_counts;
        self.right_fraction -= right_counts;
        self.pending.0 += left_counts as i32 * geometry.left_encoder_polarity as i32;
        self.pending.1 += right_counts as i32 * geometry.right_encoder_polarity as i32;
    }

    // Distance from (x, y) to the first wall in `direction`.
    fn distance_to_wall(&self, x: f32, y: f32, direction: Direction) -> f32 {
        let mut cell = cell_at(x, y);
        let mut distance = match direction {
            Direction::North => (cell.row() + 1) as f32 * FULL_CELL - y,
            Direction::South => y - cell.row() as f32 * FULL_CELL,
            Direction::East => (cell.column() + 1) as f32 * FULL_CELL - x,
            Direction::West => x - cell.column() as f32 * FULL_CELL,
        };
        for _ in 0..MAZE_WIDTH {
            if self.maze.is_wall(cell, direction) {
                break;
            }
            cell = cell.neighbour(direction);
            distance += FULL_CELL;
        }
        distance
    }

    // The side emitters sit ahead of the wheels and splay outward, so the
    // reading depends on heading as well as offset. The beam is traced to
    // the wall line on `side` and scaled to read nominal when the robot is
    // centred and square.
    fn side_reading(&self, side: Direction, nominal: i32) -> f32 {
        let heading = self.angle.to_radians();
        let sensor_x = self.x - SIDE_LOOKAHEAD * heading.sin();
        let sensor_y = self.y + SIDE_LOOKAHEAD * heading.cos();
        let splay = if side == self.heading().left() {
            SIDE_ANGLE
        } else {
            -SIDE_ANGLE
        };
        let beam = heading + splay.to_radians();
        let (beam_x, beam_y) = (-beam.sin(), beam.cos());

        let cell = cell_at(sensor_x, sensor_y);
        let (lateral, closing) = match side {
            Direction::North => ((cell.row() + 1) as f32 * FULL_CELL - sensor_y, beam_y),
            Direction::South => (sensor_y - cell.row() as f32 * FULL_CELL, -beam_y),
            Direction::East => ((cell.column() + 1) as f32 * FULL_CELL - sensor_x, beam_x),
            Direction::West => (sensor_x - cell.column() as f32 * FULL_CELL, -beam_x),
        };
        // beam running along the wall line sees nothing
        if closing <= 0.05 {
            return 0.0;
        }
        let range = lateral / closing;
        let reach = range * 0.999;
        let hit = cell_at(sensor_x + beam_x * reach, sensor_y + beam_y * reach);
        if !self.maze.is_wall(hit, side) {
            return 0.0;
        }
        let centred_range = HALF_CELL / SIDE_ANGLE.to_radians().sin();
        let ratio = centred_range / range.max(10.0);
        nominal as f32 * ratio * ratio
    }

    fn raw(&mut self, normalised: f32, nominal: i32, calibration: i32) -> i32 {
        let mut raw = normalised * calibration as f32 / nominal.max(1) as f32;
        if self.noise > 0 {
            raw += self.rng.gen_range(-self.noise..=self.noise) as f32;
        }
        raw.clamp(0.0, MAX_READING) as i32
    }
}

#[cfg(feature = "std")]
fn cell_at(x: f32, y: f32) -> Cell {
    let last = (MAZE_WIDTH - 1) as f32;
    let row = (y / FULL_CELL).floor().clamp(0.0, last) as u8;
    let column = (x / FULL_CELL).floor().clamp(0.0, last) as u8;
    Cell::from_coords(row, column)
}

#[cfg(feature = "std")]
impl Hal for SimWorld {
    fn encoder_deltas(&mut self) -> (i32, i32) {
        core::mem::take(&mut self.pending)
    }

    fn wall_sensors(&mut self) -> [i32; 3] {
        self.readings
    }

    fn supply_volts(&mut self) -> f32 {
        self.supply
    }

    fn set_motor_drive(&mut self, left: f32, right: f32) {
        let drive = self.config.drive;
        let per_volt = if drive.speed_ff > 0.0 { 1.0 / drive.speed_ff } else { 0.0 };
        self.left_target = left * self.supply * per_volt * drive.left_motor_polarity as f32;
        self.right_target = right * self.supply * per_volt * drive.right_motor_polarity as f32;
    }

    fn set_emitters(&mut self, on: bool) {
        self.emitters = on;
    }

    fn start_sensor_cycle(&mut self) {
        if !self.emitters {
            self.readings = [0; 3];
            return;
        }
        let s = self.config.sensors;
        let heading = self.heading();
        let front = front_reading(self.distance_to_wall(self.x, self.y, heading))
            * s.front_nominal as f32
            / 100.0;
        let left = self.side_reading(heading.left(), s.left_nominal);
        let right = self.side_reading(heading.right(), s.right_nominal);
        self.readings = [
            self.raw(left, s.left_nominal, s.left_calibration),
            self.raw(front, s.front_nominal, s.front_calibration),
            self.raw(right, s.right_nominal, s.right_calibration),
        ];
    }
}

// ============================================================================
// Simulated Platform
// ============================================================================

/// [`Platform`] that runs the control loop on a [`SimWorld`] during delays
#[cfg(feature = "std")]
pub struct SimPlatform<'a> {
    shared: &'a SharedState,
    world: RefCell<SimWorld>,
    control: RefCell<ControlLoop>,
    time_us: core::cell::Cell<TimeUs>,
    press_at_us: core::cell::Cell<Option<TimeUs>>,
    indicator: core::cell::Cell<bool>,
}

#[cfg(feature = "std")]
impl<'a> SimPlatform<'a> {
    /// Platform ticking `world` with a fresh control loop
    pub fn new(shared: &'a SharedState, world: SimWorld, config: Option<Config>) -> Self {
        Self {
            shared,
            world: RefCell::new(world),
            control: RefCell::new(ControlLoop::new(config)),
            time_us: core::cell::Cell::new(0),
            press_at_us: core::cell::Cell::new(None),
            indicator: core::cell::Cell::new(false),
        }
    }

    /// The simulated robot
    pub fn world(&self) -> Ref<'_, SimWorld> {
        self.world.borrow()
    }

    /// The simulated robot, mutably
    pub fn world_mut(&self) -> RefMut<'_, SimWorld> {
        self.world.borrow_mut()
    }

    /// The control loop
    pub fn control(&self) -> Ref<'_, ControlLoop> {
        self.control.borrow()
    }

    /// Hold the button from this simulated time on
    pub fn press_button_at_ms(&self, ms: u32) {
        self.press_at_us.set(Some(ms as TimeUs * 1000));
    }

    /// Indicator state
    pub fn indicator(&self) -> bool {
        self.indicator.get()
    }

    /// Run `count` control periods
    pub fn run_ticks(&self, count: u32) {
        let dt = TICK_PERIOD_US as f32 * 1e-6;
        let mut world = self.world.borrow_mut();
        let mut control = self.control.borrow_mut();
        for _ in 0..count {
            world.step(dt);
            control.tick(&mut *world, self.shared);
            self.time_us.set(self.time_us.get() + TICK_PERIOD_US as TimeUs);
        }
    }
}

#[cfg(feature = "std")]
impl Platform for SimPlatform<'_> {
    fn time_us(&self) -> TimeUs {
        self.time_us.get()
    }

    fn delay_us(&self, us: u32) {
        self.run_ticks((us / TICK_PERIOD_US).max(1));
    }

    fn button_pressed(&self) -> bool {
        self.press_at_us
            .get()
            .is_some_and(|at| self.time_us.get() >= at)
    }

    fn set_indicator(&self, on: bool) {
        self.indicator.set(on);
    }

    fn platform_name(&self) -> &'static str {
        "sim"
    }

    fn debug_print(&self, msg: &str) {
        std::eprintln!("{}", msg);
    }
}
