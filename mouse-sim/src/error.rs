//! Simulator errors

use thiserror::Error;

/// Errors from the simulator binary
#[derive(Error, Debug)]
pub enum SimError {
    #[error("Core error: {0}")]
    Core(#[from] micromouse::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bad setting '{0}': {1}")]
    Setting(String, String),

    #[error("Maze file {0} is not {1} bytes")]
    MazeSize(String, usize),

    #[error("Logging setup failed: {0}")]
    Logging(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("Simulation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Tick thread panicked")]
    TickThread,
}

/// Result alias for the simulator
pub type SimResult<T> = Result<T, SimError>;
