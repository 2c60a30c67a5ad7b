//! Micromouse Simulator
//!
//! Runs the navigation agent against a sample or saved maze, either on the
//! idealised grid model or on the simulated robot with the real control
//! loop in the middle.

mod error;

use clap::{Parser, ValueEnum};
use error::{SimError, SimResult};
use micromouse::hal::posix::PosixPlatform;
use micromouse::hal::Platform;
use micromouse::maze::{Maze, EMPTY_MAZE, JAPAN_2007};
use micromouse::movement::{Movement, ProfiledMovement};
use micromouse::navigator::NavigationAgent;
use micromouse::path::PlannedPath;
use micromouse::report::MazeView;
use micromouse::sim::{GridMovement, SimPlatform, SimWorld};
use micromouse::{Config, ControlLoop, RunState, SharedState, MAZE_CELLS, TICK_PERIOD_US};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Micromouse maze simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Maze: "japan", "empty" or a 256-byte maze file
    #[arg(short, long, default_value = "japan")]
    maze: String,

    /// Robot model
    #[arg(long, value_enum, default_value_t = Model::Grid)]
    model: Model,

    /// How far through the run sequence to go
    #[arg(long, value_enum, default_value_t = Stage::All)]
    stage: Stage,

    /// Run the control loop on its own 500 Hz thread in real time (physics only)
    #[arg(long)]
    threaded: bool,

    /// Settings file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override one setting, e.g. --set run_speed=1200
    #[arg(long = "set", value_name = "NAME=VALUE")]
    overrides: Vec<String>,

    /// Print the effective settings as JSON and exit
    #[arg(long)]
    print_config: bool,

    /// Save the learned map to this file
    #[arg(long)]
    save_maze: Option<PathBuf>,

    /// Maze drawing printed at the end
    #[arg(long, value_enum, default_value_t = View::Directions)]
    view: View,

    /// Print a JSON summary
    #[arg(long)]
    json: bool,

    /// Sensor noise seed
    #[arg(long, default_value = "1")]
    seed: u64,

    /// Simulated seconds before the button is pressed
    #[arg(long, default_value = "900")]
    time_limit: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
enum Model {
    /// Cell-level moves, no physics
    Grid,
    /// Control loop driving a simulated robot
    Physics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Stage {
    /// Search to the goal and back
    Search,
    /// Search, then both speed runs
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum View {
    Plain,
    Costs,
    Directions,
    Hex,
}

/// How a simulation ended
#[derive(Debug)]
struct Outcome {
    result: micromouse::Result<()>,
    maze: Maze,
    state: RunState,
    route: Option<PlannedPath>,
    elapsed_ms: u64,
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    maze: &'a str,
    model: Model,
    outcome: String,
    state: RunState,
    visited: usize,
    route: Option<String>,
    route_cells: Option<u8>,
    elapsed_ms: u64,
}

impl Outcome {
    fn summary<'a>(&self, maze: &'a str, model: Model) -> Summary<'a> {
        Summary {
            maze,
            model,
            outcome: match self.result {
                Ok(()) => "ok".to_string(),
                Err(e) => e.to_string(),
            },
            state: self.state,
            visited: self.maze.visited_count(),
            route: self.route.as_ref().map(|r| r.path.to_string()),
            route_cells: self.route.as_ref().map(|r| r.cost),
            elapsed_ms: self.elapsed_ms,
        }
    }
}

// ============================================================================
// Setup
// ============================================================================

fn load_maze(name: &str) -> SimResult<Maze> {
    match name {
        "japan" => Ok(Maze::with_walls(&JAPAN_2007)),
        "empty" => Ok(Maze::with_walls(&EMPTY_MAZE)),
        path => {
            let bytes = std::fs::read(path)?;
            if bytes.len() != MAZE_CELLS {
                return Err(SimError::MazeSize(path.to_string(), MAZE_CELLS));
            }
            Ok(Maze::from_bytes(&bytes)?)
        }
    }
}

fn apply_setting(config: &mut Config, text: &str) -> SimResult<()> {
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| SimError::Setting(text.to_string(), "expected NAME=VALUE".to_string()))?;
    let name = name.trim();
    let value: f32 = value
        .trim()
        .parse()
        .map_err(|e: std::num::ParseFloatError| {
            SimError::Setting(name.to_string(), e.to_string())
        })?;
    config
        .set(name, value)
        .map_err(|e| SimError::Setting(name.to_string(), e.to_string()))
}

fn load_config(args: &Args) -> SimResult<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_json(&std::fs::read_to_string(path)?)?,
        None if args.model == Model::Physics => SimWorld::calibrated_config(),
        None => Config::default(),
    };
    for text in &args.overrides {
        apply_setting(&mut config, text)?;
    }
    Ok(config)
}

// ============================================================================
// Runs
// ============================================================================

fn explore<M: Movement>(agent: &mut NavigationAgent<M>, stage: Stage) -> micromouse::Result<()> {
    match stage {
        Stage::Search => agent.search_maze(),
        Stage::All => agent.run_maze(),
    }
}

fn conclude<M: Movement>(
    agent: &NavigationAgent<M>,
    result: micromouse::Result<()>,
    elapsed_ms: u64,
) -> Outcome {
    match &result {
        Ok(()) => info!("done: {}", agent.status()),
        Err(e) => warn!("stopped with {} at {}", e, agent.status()),
    }
    Outcome {
        result,
        maze: agent.maze().clone(),
        state: agent.state(),
        route: agent.plan_run().ok(),
        elapsed_ms,
    }
}

fn run_grid(truth: Maze, config: Config, stage: Stage, time_limit: u32) -> Outcome {
    let mut movement = GridMovement::new(truth, Some(config));
    movement.press_button_at(time_limit.saturating_mul(1000));
    let mut agent = NavigationAgent::new(movement, None);
    let result = explore(&mut agent, stage);
    let elapsed_ms = agent.movement().elapsed_ms() as u64;
    conclude(&agent, result, elapsed_ms)
}

fn run_physics(truth: Maze, config: Config, stage: Stage, seed: u64, time_limit: u32) -> Outcome {
    let shared = SharedState::new();
    let world = SimWorld::new(truth, Some(config), seed);
    let platform = SimPlatform::new(&shared, world, Some(config));
    platform.press_button_at_ms(time_limit.saturating_mul(1000));
    let movement = ProfiledMovement::new(&shared, &platform, Some(config));
    let mut agent = NavigationAgent::new(movement, None);
    let result = explore(&mut agent, stage);
    let outcome = conclude(&agent, result, platform.time_us() / 1000);
    let world = platform.world();
    info!(
        "robot in {} facing {:?} at ({:.0}, {:.0}) {:.1} deg",
        world.cell(),
        world.heading(),
        world.x(),
        world.y(),
        world.angle()
    );
    outcome
}

fn run_threaded(
    truth: Maze,
    config: Config,
    stage: Stage,
    seed: u64,
    platform: Arc<PosixPlatform>,
) -> SimResult<Outcome> {
    let shared = SharedState::new();
    let running = AtomicBool::new(true);
    let started = Instant::now();
    let (shared, running) = (&shared, &running);

    std::thread::scope(|scope| {
        let ticker = scope.spawn(move || {
            let mut world = SimWorld::new(truth, Some(config), seed);
            let mut control = ControlLoop::new(Some(config));
            let period = Duration::from_micros(TICK_PERIOD_US as u64);
            let dt = period.as_secs_f32();
            let mut next = Instant::now();
            while running.load(Ordering::Relaxed) {
                world.step(dt);
                control.tick(&mut world, shared);
                next += period;
                if let Some(wait) = next.checked_duration_since(Instant::now()) {
                    std::thread::sleep(wait);
                }
            }
            (world, control.ticks())
        });

        let movement = ProfiledMovement::new(shared, &*platform, Some(config));
        let mut agent = NavigationAgent::new(movement, None);
        let result = explore(&mut agent, stage);
        let outcome = conclude(&agent, result, started.elapsed().as_millis() as u64);
        running.store(false, Ordering::Relaxed);

        let (world, ticks) = ticker.join().map_err(|_| SimError::TickThread)?;
        info!(
            "{} ticks on {}, robot in {} facing {:?}",
            ticks,
            platform.platform_name(),
            world.cell(),
            world.heading()
        );
        Ok(outcome)
    })
}

// ============================================================================
// Output
// ============================================================================

fn report(args: &Args, outcome: &Outcome) -> SimResult<()> {
    let mut maze = outcome.maze.clone();
    maze.flood(maze.goal());
    match args.view {
        View::Plain => print!("{}", maze.display(MazeView::Plain)),
        View::Costs => print!("{}", maze.display(MazeView::Costs)),
        View::Directions => print!("{}", maze.display(MazeView::Directions)),
        View::Hex => print!("{}", maze.wall_data()),
    }
    if let Some(route) = &outcome.route {
        println!("route {} ({} cells)", route.path, route.cost);
    }
    println!(
        "{:?} after {:.1} s, {} cells visited",
        outcome.state,
        outcome.elapsed_ms as f64 / 1000.0,
        outcome.maze.visited_count()
    );

    if let Some(path) = &args.save_maze {
        std::fs::write(path, outcome.maze.to_bytes())?;
        info!("map saved to {}", path.display());
    }
    if args.json {
        let summary = outcome.summary(&args.maze, args.model);
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> SimResult<()> {
    let args = Args::parse();

    // Setup logging
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&args)?;
    if args.print_config {
        println!("{}", config.to_json()?);
        return Ok(());
    }
    let truth = load_maze(&args.maze)?;
    info!(
        "micromouse {} sim: maze {}, {:?} model, stage {:?}",
        micromouse::VERSION_STRING,
        args.maze,
        args.model,
        args.stage
    );

    let (stage, seed, time_limit) = (args.stage, args.seed, args.time_limit);
    let outcome = match args.model {
        Model::Grid => {
            if args.threaded {
                warn!("--threaded only applies to the physics model");
            }
            tokio::task::spawn_blocking(move || run_grid(truth, config, stage, time_limit)).await?
        }
        Model::Physics if !args.threaded => {
            tokio::task::spawn_blocking(move || run_physics(truth, config, stage, seed, time_limit))
                .await?
        }
        Model::Physics => {
            let platform = Arc::new(PosixPlatform::new());
            let button = Arc::clone(&platform);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupted, pressing the button");
                    button.press_button();
                }
            });
            tokio::task::spawn_blocking(move || run_threaded(truth, config, stage, seed, platform))
                .await??
        }
    };

    report(&args, &outcome)?;
    outcome.result?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_apply_setting() {
        let mut config = Config::default();
        apply_setting(&mut config, "run_speed = 1200").unwrap();
        assert_eq!(config.moves.run_speed, 1200.0);
        assert!(matches!(
            apply_setting(&mut config, "run_speed"),
            Err(SimError::Setting(..))
        ));
        assert!(matches!(
            apply_setting(&mut config, "no_such=1"),
            Err(SimError::Setting(..))
        ));
        assert!(matches!(
            apply_setting(&mut config, "run_speed=fast"),
            Err(SimError::Setting(..))
        ));
    }

    #[test]
    fn test_maze_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("japan.maz");
        std::fs::write(&path, JAPAN_2007).unwrap();
        let maze = load_maze(path.to_str().unwrap()).unwrap();
        assert_eq!(maze.to_bytes(), JAPAN_2007);

        let short = dir.path().join("short.maz");
        std::fs::write(&short, [0u8; 10]).unwrap();
        assert!(matches!(
            load_maze(short.to_str().unwrap()),
            Err(SimError::MazeSize(..))
        ));
    }

    #[test]
    fn test_grid_run_finishes_japan() {
        let outcome = run_grid(load_maze("japan").unwrap(), Config::default(), Stage::All, 86_400);
        assert_eq!(outcome.result, Ok(()));
        assert_eq!(outcome.state, RunState::Finished);
        let route = outcome.route.as_ref().unwrap();
        assert_eq!(route.path.cells(), route.cost as usize);

        let summary = outcome.summary("japan", Model::Grid);
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"model\":\"grid\""));
        assert!(json.contains("\"outcome\":\"ok\""));
    }

    #[test]
    fn test_grid_search_stage_stays_searching() {
        let truth = load_maze("empty").unwrap();
        let outcome = run_grid(truth, Config::default(), Stage::Search, 86_400);
        assert_eq!(outcome.result, Ok(()));
        assert_eq!(outcome.state, RunState::Searching);
        assert!(outcome.maze.visited_count() > 14);
    }
}
