use crate::world::WorldSnapshot;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvError {
    #[error("action {action} out of range, environment has {n_actions} actions")]
    InvalidAction { action: usize, n_actions: usize },
    #[error("step called after the episode finished; call reset first")]
    EpisodeFinished,
}

/// Result of one environment step.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub obs: Vec<f32>,
    pub reward: f32,
    pub done: bool,
}

/// Reinforcement learning environment trait.
///
/// Inspired by classic frameworks like OpenAI Gym, this trait defines the core
/// interface an environment must provide. Each call to [`step`] advances the
/// simulation by one discrete action and returns the new observation vector, a
/// reward signal, and whether the episode has terminated.
///
/// [`step`]: Env::step
pub trait Env {
    /// Advance the environment by one action.
    fn step(&mut self, action: usize) -> Result<Step, EnvError>;

    /// Reset the environment to a fresh episode and return the initial
    /// observation vector.
    fn reset(&mut self) -> Vec<f32>;

    /// Size of the observation vector.
    fn obs_size(&self) -> usize;

    /// Number of discrete actions.
    fn action_size(&self) -> usize;
}

/// Read-only access to the ground-truth state behind the observations.
pub trait PrivilegedState {
    fn snapshot(&self) -> WorldSnapshot;
}
