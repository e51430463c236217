use gridworld::{EnvError, ParseEnvIdError};
use ml::MlError;
use std::path::PathBuf;
use thiserror::Error;

/// Problems found before any rollout starts. All of them end the run.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    UnknownEnv(#[from] ParseEnvIdError),
    #[error("encoder parameter file {} does not exist", .0.display())]
    MissingEncoder(PathBuf),
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("parsing config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum RlError {
    #[error("environment: {0}")]
    Env(#[from] EnvError),
    #[error(transparent)]
    Ml(#[from] MlError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
