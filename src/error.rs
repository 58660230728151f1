use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OhmlinkError {
    #[error("no ngspice shared library found in any of: {searched:?}")]
    EngineNotFound { searched: Vec<PathBuf> },

    #[error("unsupported platform: {0}")]
    UnknownPlatform(String),

    #[error("failed to load {path}: {reason}")]
    LibraryLoad { path: PathBuf, reason: String },

    #[error("ngspice initialisation failed: {0}")]
    EngineInitFailed(String),

    #[error("another ngspice engine is already attached in this process")]
    EngineAlreadyAttached,

    #[error("engine is detached")]
    Detached,

    #[error("command '{command}' failed with status {status}")]
    CommandFailed { command: String, status: i32 },

    #[error("netlist load failed: {0}")]
    NetlistLoadFailed(String),

    #[error("run failed: {0}")]
    RunFailed(String),

    #[error("unexpected engine output: {0}")]
    UnexpectedOutput(String),

    #[error("string cannot cross the engine boundary: {0}")]
    InvalidString(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, OhmlinkError>;
