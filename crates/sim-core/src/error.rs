use std::path::PathBuf;

use thiserror::Error;

/// Rejections raised while assembling a site from its configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimError {
    #[error("site has no machines")]
    NoMachines,
    #[error("duplicate machine id {0}")]
    DuplicateMachine(String),
    #[error("duplicate worker id {0}")]
    DuplicateWorker(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read {}: {message}", path.display())]
    Io { path: PathBuf, message: String },
    #[error("failed to parse site config: {0}")]
    Parse(String),
    #[error("invalid site config: {0}")]
    Invalid(String),
}
