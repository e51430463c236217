use super::{
    dense_params, dense_params_mut, stack_exchanges, stack_memory, stack_obs, Policy, PolicyDims,
    PolicyKind, PolicyOutput, StepView, Trunk,
};
use crate::config::Config;
use crate::memory::MemoryState;
use ml::{Dense, Tape, Tensor};
use oracle::Subject;

/// Explicit memory with one slot per answer subject.
///
/// An exchange overwrites its subject's slot with `tanh(W [q; a] + b)`. The
/// heads read the filled slots through scaled dot-product attention, queried
/// from the observation features.
pub struct SlotPolicy {
    trunk: Trunk,
    write: Dense,
    query: Dense,
    slot_dim: usize,
    exchange_dim: usize,
}

impl SlotPolicy {
    pub fn new(
        config: &Config,
        dims: PolicyDims,
        questions: Option<usize>,
        separate_qa: bool,
        rng: &mut fastrand::Rng,
    ) -> Self {
        let d = config.slot_dim;
        let (obs, hidden, actions) = (dims.obs, config.hidden_dim, dims.actions);
        let trunk = Trunk::new(obs, hidden, d, actions, questions, separate_qa, rng);
        let query = Dense::random(trunk.hidden(), d, rng);
        let write = Dense::random(dims.exchange, d, rng);
        Self { trunk, write, query, slot_dim: d, exchange_dim: dims.exchange }
    }

    fn width(&self) -> usize {
        Subject::COUNT * self.slot_dim
    }
}

impl Policy for SlotPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Slots
    }

    fn asks_questions(&self) -> bool {
        self.trunk.question.is_some()
    }

    fn reset_memory(&self) -> MemoryState {
        MemoryState::zeros(self.width(), Subject::COUNT)
    }

    fn forward(&self, batch: &[StepView<'_>], tape: &mut Tape) -> PolicyOutput {
        let n = batch.len();
        let width = self.width();
        let obs = stack_obs(batch, tape);
        let h = self.trunk.features(obs, tape);
        let m_in = stack_memory(batch, width, tape);

        let slots = match stack_exchanges(batch, self.exchange_dim, tape) {
            Some(x) => {
                let w = self.write.forward(x, tape);
                let w = tape.tanh(w);
                let tiled = tape.tile(w, Subject::COUNT);
                let mut mask = vec![0.0; n * width];
                for (r, v) in batch.iter().enumerate() {
                    if let Some(ex) = v.exchange {
                        let start = r * width + ex.slot * self.slot_dim;
                        mask[start..start + self.slot_dim].fill(1.0);
                    }
                }
                let mask = tape.constant(n, width, mask);
                let delta = tape.sub(tiled, m_in);
                let delta = tape.mul(mask, delta);
                tape.add(m_in, delta)
            }
            None => m_in,
        };

        let filled: Vec<f32> = batch
            .iter()
            .flat_map(|v| v.memory.filled_after(v.exchange))
            .map(|f| if f { 1.0 } else { 0.0 })
            .collect();
        let q = self.query.forward(h, tape);
        let read = tape.attend_slots(q, slots, filled);

        let z = tape.concat(h, read);
        let mut out = self.trunk.heads(z, tape);
        out.memory = Some(slots);
        out
    }

    fn named_params(&self) -> Vec<(String, &Tensor)> {
        let mut out = self.trunk.named_params();
        out.extend(dense_params("memory.write", &self.write));
        out.extend(dense_params("memory.query", &self.query));
        out
    }

    fn named_params_mut(&mut self) -> Vec<(String, &mut Tensor)> {
        let mut out = self.trunk.named_params_mut();
        out.extend(dense_params_mut("memory.write", &mut self.write));
        out.extend(dense_params_mut("memory.query", &mut self.query));
        out
    }
}
