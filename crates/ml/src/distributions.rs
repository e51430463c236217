/// Categorical distribution parameterised by unnormalised logits.
#[derive(Clone, Debug)]
pub struct Categorical {
    log_probs: Vec<f32>,
}

impl Categorical {
    pub fn from_logits(logits: &[f32]) -> Self {
        assert!(!logits.is_empty(), "categorical over an empty support");
        let m = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let lse = m + logits.iter().map(|&l| (l - m).exp()).sum::<f32>().ln();
        Self { log_probs: logits.iter().map(|&l| l - lse).collect() }
    }

    pub fn len(&self) -> usize {
        self.log_probs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log_probs.is_empty()
    }

    pub fn log_prob(&self, idx: usize) -> f32 {
        self.log_probs[idx]
    }

    pub fn sample(&self, rng: &mut fastrand::Rng) -> usize {
        let u = rng.f32();
        let mut cum = 0.0;
        for (i, l) in self.log_probs.iter().enumerate() {
            cum += l.exp();
            if u < cum {
                return i;
            }
        }
        self.log_probs.len() - 1
    }
}
