use super::{
    dense_params, dense_params_mut, stack_exchanges, stack_memory, stack_obs, Policy, PolicyDims,
    PolicyKind, PolicyOutput, StepView, Trunk,
};
use crate::config::Config;
use crate::memory::MemoryState;
use ml::{GruCell, Tape, Tensor};

/// Folds each answered exchange into a single memory vector with a GRU.
///
/// `m' = m + mask * (gru([q; a], m) - m)`, so silent rows keep `m` exactly.
pub struct RecurrentPolicy {
    trunk: Trunk,
    gru: GruCell,
    memory_dim: usize,
    exchange_dim: usize,
}

impl RecurrentPolicy {
    pub fn new(
        config: &Config,
        dims: PolicyDims,
        questions: Option<usize>,
        separate_qa: bool,
        rng: &mut fastrand::Rng,
    ) -> Self {
        let m = config.memory_dim;
        let (obs, hidden, actions) = (dims.obs, config.hidden_dim, dims.actions);
        Self {
            trunk: Trunk::new(obs, hidden, m, actions, questions, separate_qa, rng),
            gru: GruCell::random(dims.exchange, m, rng),
            memory_dim: m,
            exchange_dim: dims.exchange,
        }
    }
}

impl Policy for RecurrentPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Recurrent
    }

    fn asks_questions(&self) -> bool {
        self.trunk.question.is_some()
    }

    fn reset_memory(&self) -> MemoryState {
        MemoryState::zeros(self.memory_dim, 0)
    }

    fn forward(&self, batch: &[StepView<'_>], tape: &mut Tape) -> PolicyOutput {
        let obs = stack_obs(batch, tape);
        let h = self.trunk.features(obs, tape);
        let m_in = stack_memory(batch, self.memory_dim, tape);

        let memory = match stack_exchanges(batch, self.exchange_dim, tape) {
            Some(x) => {
                let folded = self.gru.forward(x, m_in, tape);
                let mask: Vec<f32> = batch
                    .iter()
                    .flat_map(|v| {
                        let on = if v.exchange.is_some() { 1.0 } else { 0.0 };
                        std::iter::repeat(on).take(self.memory_dim)
                    })
                    .collect();
                let mask = tape.constant(batch.len(), self.memory_dim, mask);
                let delta = tape.sub(folded, m_in);
                let delta = tape.mul(mask, delta);
                tape.add(m_in, delta)
            }
            None => m_in,
        };

        let z = tape.concat(h, memory);
        let mut out = self.trunk.heads(z, tape);
        out.memory = Some(memory);
        out
    }

    fn named_params(&self) -> Vec<(String, &Tensor)> {
        let mut out = self.trunk.named_params();
        out.extend(dense_params("memory.gru.update", &self.gru.update));
        out.extend(dense_params("memory.gru.reset", &self.gru.reset));
        out.extend(dense_params("memory.gru.candidate", &self.gru.candidate));
        out
    }

    fn named_params_mut(&mut self) -> Vec<(String, &mut Tensor)> {
        let mut out = self.trunk.named_params_mut();
        out.extend(dense_params_mut("memory.gru.update", &mut self.gru.update));
        out.extend(dense_params_mut("memory.gru.reset", &mut self.gru.reset));
        out.extend(dense_params_mut("memory.gru.candidate", &mut self.gru.candidate));
        out
    }
}
