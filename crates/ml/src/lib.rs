//! Small CPU autograd stack for the question-asking agent.
//!
//! - [`Tensor`] holds trainable parameters.
//! - [`tape::Tape`] records a forward pass and differentiates it.
//! - [`nn`] provides dense and GRU layers built on the tape.
//! - [`optim::Adam`] updates parameters from their gradients.
//! - [`distributions::Categorical`] samples discrete actions at rollout time.
//! - [`checkpoint`] persists named tensors.

pub mod checkpoint;
pub mod distributions;
pub mod nn;
pub mod optim;
pub mod tape;
pub mod tensor;

pub use distributions::Categorical;
pub use nn::{Dense, GruCell};
pub use optim::Adam;
pub use tape::{Gradients, Tape, Var};
pub use tensor::Tensor;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MlError {
    #[error("loss must be a scalar, got {0} elements")]
    NonScalarLoss(usize),
    #[error("checkpoint io: {0}")]
    Io(#[from] std::io::Error),
    #[error("checkpoint manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("malformed checkpoint: {0}")]
    Format(String),
    #[error("parameter `{0}` missing from checkpoint")]
    MissingParam(String),
    #[error("parameter `{name}` has shape {found:?}, expected {expected:?}")]
    ShapeMismatch { name: String, expected: Vec<usize>, found: Vec<usize> },
}
