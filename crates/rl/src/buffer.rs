use crate::memory::{Exchange, MemoryState};
use oracle::Verdict;
use std::ops::Range;

/// One recorded step.
#[derive(Clone, Debug)]
pub struct Transition {
    pub obs: Vec<f32>,
    pub action: usize,
    /// Bank index of the question asked this step.
    pub question: Option<usize>,
    pub log_prob_action: f32,
    pub log_prob_question: f32,
    pub value: f32,
    pub qa_value: f32,
    /// Base plus shaping reward.
    pub reward: f32,
    pub shaping_reward: f32,
    pub verdict: Option<Verdict>,
    pub done: bool,
    pub memory_in: MemoryState,
    pub exchange_in: Option<Exchange>,
    pub memory_out: MemoryState,
}

impl Transition {
    /// Question-logit column that was sampled, `0` for "ask nothing".
    pub fn question_column(&self) -> usize {
        self.question.map_or(0, |q| q + 1)
    }
}

/// On-policy storage for whole episodes.
///
/// Only episodes closed with [`RolloutBuffer::end_episode`] are visible; an
/// interrupted episode never reaches an update.
#[derive(Default)]
pub struct RolloutBuffer {
    steps: Vec<Transition>,
    episodes: Vec<Range<usize>>,
}

impl RolloutBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn committed(&self) -> usize {
        self.episodes.last().map_or(0, |r| r.end)
    }

    pub fn push(&mut self, transition: Transition) {
        self.steps.push(transition);
    }

    pub fn end_episode(&mut self) {
        let start = self.committed();
        if self.steps.len() > start {
            self.episodes.push(start..self.steps.len());
        }
    }

    /// Drops steps of an episode that was never closed.
    pub fn discard_partial(&mut self) {
        let committed = self.committed();
        self.steps.truncate(committed);
    }

    pub fn clear(&mut self) {
        self.steps.clear();
        self.episodes.clear();
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.steps[..self.committed()]
    }

    pub fn episodes(&self) -> &[Range<usize>] {
        &self.episodes
    }

    pub fn len(&self) -> usize {
        self.committed()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
