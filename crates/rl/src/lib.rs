//! Question-asking agents trained with PPO.
//!
//! - [`config`] holds the run's hyper-parameters.
//! - [`encoder`] embeds questions and answers with a frozen recurrent encoder.
//! - [`policy`] has the stateless, recurrent and slot-memory networks.
//! - [`ppo`] collects episodes through an [`oracle::OracleEnv`] and updates the
//!   policy from two advantage streams computed in [`gae`].
//! - [`agent`] saves and restores trained parameters.

pub mod agent;
pub mod buffer;
pub mod config;
pub mod encoder;
pub mod error;
pub mod gae;
pub mod logger;
pub mod memory;
pub mod policy;
pub mod ppo;

pub use buffer::{RolloutBuffer, Transition};
pub use config::{Config, Phase, QaBaseline};
pub use encoder::{EncodedBank, LanguageEncoder, RecurrentEncoder};
pub use error::{ConfigError, RlError};
pub use logger::{MemoryLogger, MetricsLogger, NoopLogger, Scalars, TracingLogger};
pub use memory::{Exchange, MemoryState};
pub use policy::{build_policy, Policy, PolicyDims, PolicyKind, StepView};
pub use ppo::{EpisodeStats, PpoTrainer, UpdateStats};
