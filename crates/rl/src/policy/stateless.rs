use super::{stack_obs, Policy, PolicyKind, PolicyOutput, StepView, Trunk};
use crate::memory::MemoryState;
use ml::{Tape, Tensor};

/// Acts on the current observation alone.
pub struct StatelessPolicy {
    trunk: Trunk,
}

impl StatelessPolicy {
    pub fn new(trunk: Trunk) -> Self {
        Self { trunk }
    }
}

impl Policy for StatelessPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Stateless
    }

    fn asks_questions(&self) -> bool {
        self.trunk.question.is_some()
    }

    fn reset_memory(&self) -> MemoryState {
        MemoryState::default()
    }

    fn forward(&self, batch: &[StepView<'_>], tape: &mut Tape) -> PolicyOutput {
        let obs = stack_obs(batch, tape);
        let h = self.trunk.features(obs, tape);
        self.trunk.heads(h, tape)
    }

    fn named_params(&self) -> Vec<(String, &Tensor)> {
        self.trunk.named_params()
    }

    fn named_params_mut(&mut self) -> Vec<(String, &mut Tensor)> {
        self.trunk.named_params_mut()
    }
}
