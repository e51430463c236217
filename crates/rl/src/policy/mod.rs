//! Policy/value networks.
//!
//! Every variant shares one forward contract: a batch of [`StepView`]s in,
//! action logits, optional question logits, value estimates and the updated
//! memory out. The exchange answered on the previous step is folded into
//! memory at the start of the next forward, so replaying a stored transition
//! reproduces the rollout-time computation with gradient.

mod recurrent;
mod slots;
mod stateless;
mod trunk;

pub use recurrent::RecurrentPolicy;
pub use slots::SlotPolicy;
pub use stateless::StatelessPolicy;
pub use trunk::Trunk;

use crate::config::{Config, QaBaseline};
use crate::memory::{Exchange, MemoryState};
use ml::{Categorical, Dense, Tape, Tensor, Var};
use oracle::QuestionBank;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyKind {
    Stateless,
    Recurrent,
    Slots,
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stateless => "stateless",
            Self::Recurrent => "recurrent",
            Self::Slots => "slots",
        })
    }
}

/// What the policy sees at one step.
#[derive(Clone, Copy, Debug)]
pub struct StepView<'a> {
    pub obs: &'a [f32],
    /// Memory after the previous step.
    pub memory: &'a MemoryState,
    /// Answer received on the previous step, not yet folded in.
    pub exchange: Option<&'a Exchange>,
}

/// Tape handles produced by one batched forward pass.
pub struct PolicyOutput {
    /// `[n, actions]`
    pub action_logits: Var,
    /// `[n, bank + 1]`, column 0 is "ask nothing". `None` for baselines.
    pub question_logits: Option<Var>,
    /// `[n, 1]`
    pub value: Var,
    /// `[n, 1]` from the separate QA value head, when there is one.
    pub qa_value: Option<Var>,
    /// `[n, memory width]` after folding, for stateful variants.
    pub memory: Option<Var>,
}

/// A sampled step.
#[derive(Clone, Debug)]
pub struct Decision {
    pub action: usize,
    /// Bank index of the question asked, if any.
    pub question: Option<usize>,
    pub log_prob_action: f32,
    /// Log-probability of the sampled question column, "ask nothing" included.
    pub log_prob_question: f32,
    pub value: f32,
    pub qa_value: f32,
    pub memory: MemoryState,
}

pub trait Policy {
    fn kind(&self) -> PolicyKind;

    fn asks_questions(&self) -> bool;

    /// Canonical memory at the start of an episode.
    fn reset_memory(&self) -> MemoryState;

    fn forward(&self, batch: &[StepView<'_>], tape: &mut Tape) -> PolicyOutput;

    /// Trainable parameters. Names are stable and the order matches
    /// [`Policy::named_params_mut`].
    fn named_params(&self) -> Vec<(String, &Tensor)>;

    fn named_params_mut(&mut self) -> Vec<(String, &mut Tensor)>;

    /// Samples an action and a question for a single step.
    fn act(&self, view: StepView<'_>, rng: &mut fastrand::Rng) -> Decision {
        let mut tape = Tape::new();
        let out = self.forward(std::slice::from_ref(&view), &mut tape);

        let actions = Categorical::from_logits(tape.value(out.action_logits));
        let action = actions.sample(rng);
        let (column, log_prob_question) = match out.question_logits {
            Some(q) => {
                let questions = Categorical::from_logits(tape.value(q));
                let column = questions.sample(rng);
                (column, questions.log_prob(column))
            }
            None => (0, 0.0),
        };

        let value = tape.scalar(out.value);
        let memory = match out.memory {
            Some(m) => view.memory.advance(tape.value(m).to_vec(), view.exchange),
            None => view.memory.clone(),
        };
        Decision {
            action,
            question: QuestionBank::index_for_column(column),
            log_prob_action: actions.log_prob(action),
            log_prob_question,
            value,
            qa_value: out.qa_value.map_or(value, |v| tape.scalar(v)),
            memory,
        }
    }
}

/// Sizes every variant needs.
#[derive(Clone, Copy, Debug)]
pub struct PolicyDims {
    pub obs: usize,
    pub actions: usize,
    /// Question-logit width, `bank.len() + 1`.
    pub questions: usize,
    /// Exchange embedding width.
    pub exchange: usize,
}

/// Picks the variant for `config` once, at construction.
pub fn build_policy(
    config: &Config,
    dims: PolicyDims,
    rng: &mut fastrand::Rng,
) -> Box<dyn Policy> {
    let questions = (!config.baseline).then_some(dims.questions);
    let separate_qa = questions.is_some() && config.qa_baseline == QaBaseline::Separate;
    let policy: Box<dyn Policy> = match (config.use_mem, config.exp_mem) {
        (false, _) => {
            let (obs, hidden, actions) = (dims.obs, config.hidden_dim, dims.actions);
            let trunk = Trunk::new(obs, hidden, 0, actions, questions, separate_qa, rng);
            Box::new(StatelessPolicy::new(trunk))
        }
        (true, false) => Box::new(RecurrentPolicy::new(config, dims, questions, separate_qa, rng)),
        (true, true) => Box::new(SlotPolicy::new(config, dims, questions, separate_qa, rng)),
    };
    tracing::info!(
        kind = %policy.kind(),
        asks_questions = policy.asks_questions(),
        params = policy.named_params().iter().map(|(_, t)| t.len()).sum::<usize>(),
        "policy built"
    );
    policy
}

/// Stacks the observations of `batch` as an `[n, obs]` constant.
pub(crate) fn stack_obs(batch: &[StepView<'_>], tape: &mut Tape) -> Var {
    let width = batch.first().map_or(0, |v| v.obs.len());
    let data = batch.iter().flat_map(|v| v.obs.iter().copied()).collect();
    tape.constant(batch.len(), width, data)
}

/// Stacks incoming memory as an `[n, width]` constant.
pub(crate) fn stack_memory(batch: &[StepView<'_>], width: usize, tape: &mut Tape) -> Var {
    let data = batch.iter().flat_map(|v| v.memory.values.iter().copied()).collect();
    tape.constant(batch.len(), width, data)
}

/// Stacks exchange features, zero rows where there is none. `None` if the
/// whole batch is silent.
pub(crate) fn stack_exchanges(
    batch: &[StepView<'_>],
    width: usize,
    tape: &mut Tape,
) -> Option<Var> {
    if batch.iter().all(|v| v.exchange.is_none()) {
        return None;
    }
    let mut data = Vec::with_capacity(batch.len() * width);
    for v in batch {
        match v.exchange {
            Some(ex) => data.extend_from_slice(&ex.features),
            None => data.extend(std::iter::repeat(0.0).take(width)),
        }
    }
    Some(tape.constant(batch.len(), width, data))
}

pub(crate) fn dense_params<'a>(prefix: &str, layer: &'a Dense) -> [(String, &'a Tensor); 2] {
    [(format!("{prefix}.w"), &layer.w), (format!("{prefix}.b"), &layer.b)]
}

pub(crate) fn dense_params_mut<'a>(
    prefix: &str,
    layer: &'a mut Dense,
) -> [(String, &'a mut Tensor); 2] {
    let Dense { w, b, .. } = layer;
    [(format!("{prefix}.w"), w), (format!("{prefix}.b"), b)]
}
