use crate::oracle::{Oracle, Verdict};
use crate::vocab::TokenId;
use gridworld::{Env, EnvError, PrivilegedState, WorldSnapshot};

/// Reward added for each verdict class.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapingRewards {
    pub defined: f32,
    pub syntax_error: f32,
    pub undefined_error: f32,
}

impl ShapingRewards {
    /// Shaping for one step; `None` means no question was asked.
    pub fn for_verdict(&self, verdict: Option<&Verdict>) -> f32 {
        match verdict {
            None => 0.0,
            Some(Verdict::Answered { .. }) => self.defined,
            Some(Verdict::SyntaxError) => self.syntax_error,
            Some(Verdict::UndefinedError) => self.undefined_error,
        }
    }
}

/// A movement plus at most one question.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtendedAction {
    pub movement: usize,
    pub question: Option<Vec<TokenId>>,
}

impl ExtendedAction {
    pub fn movement(movement: usize) -> Self {
        Self { movement, question: None }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StepInfo {
    pub base_reward: f32,
    pub shaping_reward: f32,
    pub verdict: Option<Verdict>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OracleStep {
    pub obs: Vec<f32>,
    /// `info.base_reward + info.shaping_reward`.
    pub reward: f32,
    pub done: bool,
    pub info: StepInfo,
}

/// Wraps an environment so every step may also ask the [`Oracle`] a question.
///
/// The question is answered against the state reached by the movement.
pub struct OracleEnv<E> {
    inner: E,
    oracle: Oracle,
    shaping: ShapingRewards,
    snapshot: WorldSnapshot,
}

impl<E: Env + PrivilegedState> OracleEnv<E> {
    pub fn new(inner: E, oracle: Oracle, shaping: ShapingRewards) -> Self {
        let snapshot = inner.snapshot();
        Self { inner, oracle, shaping, snapshot }
    }

    pub fn reset(&mut self) -> Vec<f32> {
        let obs = self.inner.reset();
        self.snapshot = self.inner.snapshot();
        obs
    }

    pub fn step(&mut self, action: &ExtendedAction) -> Result<OracleStep, EnvError> {
        let step = self.inner.step(action.movement)?;
        self.snapshot = self.inner.snapshot();

        let verdict = action
            .question
            .as_deref()
            .map(|tokens| self.oracle.validate_and_answer(tokens, &self.snapshot));
        let shaping_reward = self.shaping.for_verdict(verdict.as_ref());
        if let Some(v) = &verdict {
            tracing::trace!(verdict = v.label(), shaping_reward, "question asked");
        }

        Ok(OracleStep {
            obs: step.obs,
            reward: step.reward + shaping_reward,
            done: step.done,
            info: StepInfo { base_reward: step.reward, shaping_reward, verdict },
        })
    }

    pub fn snapshot(&self) -> &WorldSnapshot {
        &self.snapshot
    }

    pub fn obs_size(&self) -> usize {
        self.inner.obs_size()
    }

    pub fn action_size(&self) -> usize {
        self.inner.action_size()
    }
}
