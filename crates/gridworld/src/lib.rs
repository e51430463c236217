//! Grid-world simulator used as the environment collaborator.
//!
//! [`Env`] is the turn-based step/reset contract the trainer drives;
//! [`PrivilegedState`] exposes the ground truth the oracle answers from.

pub mod env;
pub mod grid;
pub mod world;

pub use env::{Env, EnvError, PrivilegedState, Step};
pub use grid::{GridSpec, GridWorld, Layout, ParseEnvIdError};
pub use world::{Color, ObjectKind, WorldObject, WorldSnapshot};
