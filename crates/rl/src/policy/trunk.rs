use super::{dense_params, dense_params_mut, PolicyOutput};
use ml::{Dense, Tape, Tensor, Var};

/// Observation encoder plus output heads shared by all variants.
///
/// Heads read `z = [h; memory read]`, where `h = tanh(W obs + b)`.
pub struct Trunk {
    pub encoder: Dense,
    pub action: Dense,
    pub value: Dense,
    pub question: Option<Dense>,
    pub qa_value: Option<Dense>,
    hidden: usize,
}

impl Trunk {
    pub fn new(
        obs: usize,
        hidden: usize,
        read: usize,
        actions: usize,
        questions: Option<usize>,
        separate_qa: bool,
        rng: &mut fastrand::Rng,
    ) -> Self {
        let z = hidden + read;
        Self {
            encoder: Dense::random(obs, hidden, rng),
            action: Dense::scaled(z, actions, 0.01, rng),
            value: Dense::random(z, 1, rng),
            question: questions.map(|q| Dense::scaled(z, q, 0.01, rng)),
            qa_value: separate_qa.then(|| Dense::random(z, 1, rng)),
            hidden,
        }
    }

    pub fn hidden(&self) -> usize {
        self.hidden
    }

    pub fn features(&self, obs: Var, tape: &mut Tape) -> Var {
        let h = self.encoder.forward(obs, tape);
        tape.tanh(h)
    }

    /// All heads over `z`; the caller fills in `memory`.
    pub fn heads(&self, z: Var, tape: &mut Tape) -> PolicyOutput {
        PolicyOutput {
            action_logits: self.action.forward(z, tape),
            question_logits: self.question.as_ref().map(|d| d.forward(z, tape)),
            value: self.value.forward(z, tape),
            qa_value: self.qa_value.as_ref().map(|d| d.forward(z, tape)),
            memory: None,
        }
    }

    pub fn named_params(&self) -> Vec<(String, &Tensor)> {
        let mut out = Vec::new();
        out.extend(dense_params("trunk.encoder", &self.encoder));
        out.extend(dense_params("head.action", &self.action));
        out.extend(dense_params("head.value", &self.value));
        if let Some(d) = &self.question {
            out.extend(dense_params("head.question", d));
        }
        if let Some(d) = &self.qa_value {
            out.extend(dense_params("head.qa_value", d));
        }
        out
    }

    pub fn named_params_mut(&mut self) -> Vec<(String, &mut Tensor)> {
        let mut out = Vec::new();
        out.extend(dense_params_mut("trunk.encoder", &mut self.encoder));
        out.extend(dense_params_mut("head.action", &mut self.action));
        out.extend(dense_params_mut("head.value", &mut self.value));
        if let Some(d) = &mut self.question {
            out.extend(dense_params_mut("head.question", d));
        }
        if let Some(d) = &mut self.qa_value {
            out.extend(dense_params_mut("head.qa_value", d));
        }
        out
    }
}
