use crate::tape::{Tape, Var};
use crate::tensor::Tensor;

/// A fully connected neural network layer.
#[derive(Clone, Debug)]
pub struct Dense {
    /// The weight matrix for the layer, `[out_dim, in_dim]`.
    pub w: Tensor,
    /// The bias vector for the layer.
    pub b: Tensor,
    /// The number of input dimensions.
    pub in_dim: usize,
    /// The number of output dimensions.
    pub out_dim: usize,
}

impl Dense {
    /// Creates a new `Dense` layer with the given weights and biases.
    pub fn new(weights: Vec<f32>, bias: Vec<f32>, in_d: usize, out_d: usize) -> Self {
        assert_eq!(weights.len(), in_d * out_d);
        assert_eq!(bias.len(), out_d);
        Self {
            w: Tensor::from_vec(vec![out_d, in_d], weights).with_grad(),
            b: Tensor::from_vec(vec![out_d], bias).with_grad(),
            in_dim: in_d,
            out_dim: out_d,
        }
    }

    /// Glorot-uniform weights and zero bias.
    pub fn random(in_d: usize, out_d: usize, rng: &mut fastrand::Rng) -> Self {
        let limit = (6.0 / (in_d + out_d) as f32).sqrt();
        let weights = (0..in_d * out_d).map(|_| rng.f32() * 2.0 * limit - limit).collect();
        let bias = vec![0.0; out_d];
        Self::new(weights, bias, in_d, out_d)
    }

    /// Same as [`Dense::random`] with the weights scaled by `gain`.
    ///
    /// Small gains on output heads keep the initial policy close to uniform.
    pub fn scaled(in_d: usize, out_d: usize, gain: f32, rng: &mut fastrand::Rng) -> Self {
        let mut layer = Self::random(in_d, out_d, rng);
        layer.w.data.iter_mut().for_each(|w| *w *= gain);
        layer
    }

    /// Performs the forward pass through the layer on the tape.
    pub fn forward(&self, x: Var, tape: &mut Tape) -> Var {
        let w = tape.param(&self.w);
        let b = tape.param(&self.b);
        let wx = tape.matmul(w, x);
        tape.add_broadcast(wx, b)
    }

    /// Forward pass for a single input without recording anything.
    pub fn apply(&self, x: &[f32]) -> Vec<f32> {
        assert_eq!(x.len(), self.in_dim);
        (0..self.out_dim)
            .map(|o| {
                let row = &self.w.data[o * self.in_dim..(o + 1) * self.in_dim];
                self.b.data[o] + row.iter().zip(x).map(|(w, x)| w * x).sum::<f32>()
            })
            .collect()
    }

    pub fn params(&self) -> [&Tensor; 2] {
        [&self.w, &self.b]
    }

    pub fn params_mut(&mut self) -> [&mut Tensor; 2] {
        [&mut self.w, &mut self.b]
    }
}

/// Gated recurrent unit cell.
///
/// `h' = (1 - z) * n + z * h` with `z`, `r` sigmoid gates over `[x; h]` and the
/// candidate `n = tanh(W [x; r * h])`.
#[derive(Clone, Debug)]
pub struct GruCell {
    pub update: Dense,
    pub reset: Dense,
    pub candidate: Dense,
    pub input_dim: usize,
    pub hidden_dim: usize,
}

impl GruCell {
    pub fn random(input_dim: usize, hidden_dim: usize, rng: &mut fastrand::Rng) -> Self {
        let joint = input_dim + hidden_dim;
        Self {
            update: Dense::random(joint, hidden_dim, rng),
            reset: Dense::random(joint, hidden_dim, rng),
            candidate: Dense::random(joint, hidden_dim, rng),
            input_dim,
            hidden_dim,
        }
    }

    /// One step for a batch: `x [n, input_dim]`, `h [n, hidden_dim]`.
    pub fn forward(&self, x: Var, h: Var, tape: &mut Tape) -> Var {
        let xh = tape.concat(x, h);
        let z = self.update.forward(xh, tape);
        let z = tape.sigmoid(z);
        let r = self.reset.forward(xh, tape);
        let r = tape.sigmoid(r);
        let rh = tape.mul(r, h);
        let xrh = tape.concat(x, rh);
        let n = self.candidate.forward(xrh, tape);
        let n = tape.tanh(n);
        let diff = tape.sub(h, n);
        let gated = tape.mul(z, diff);
        tape.add(n, gated)
    }

    pub fn params(&self) -> Vec<&Tensor> {
        let mut out = Vec::with_capacity(6);
        out.extend(self.update.params());
        out.extend(self.reset.params());
        out.extend(self.candidate.params());
        out
    }

    pub fn params_mut(&mut self) -> Vec<&mut Tensor> {
        let mut out = Vec::with_capacity(6);
        out.extend(self.update.params_mut());
        out.extend(self.reset.params_mut());
        out.extend(self.candidate.params_mut());
        out
    }
}
