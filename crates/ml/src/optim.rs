use crate::Tensor;

/// Adam with bias correction folded into the step size.
///
/// Moment buffers are laid out in the order of the parameter list given to
/// [`Adam::new`]; every later [`Adam::step`] must pass the same list in the same
/// order. Parameters without a gradient are left untouched for that step.
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    eps: f32,
    t: u32,
    m: Vec<Vec<f32>>,
    v: Vec<Vec<f32>>,
}

impl Adam {
    pub fn new(params: &[&Tensor], lr: f32) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            t: 0,
            m: params.iter().map(|p| vec![0.0; p.data.len()]).collect(),
            v: params.iter().map(|p| vec![0.0; p.data.len()]).collect(),
        }
    }

    pub fn step(&mut self, params: &mut [&mut Tensor]) {
        assert_eq!(params.len(), self.m.len(), "parameter list changed since construction");
        self.t += 1;
        let lr_t = self.lr * (1.0 - self.beta2.powi(self.t as i32)).sqrt()
            / (1.0 - self.beta1.powi(self.t as i32));

        for (i, p) in params.iter_mut().enumerate() {
            let Some(grad) = p.grad.take() else {
                continue;
            };
            for j in 0..p.data.len() {
                self.m[i][j] = self.beta1 * self.m[i][j] + (1.0 - self.beta1) * grad[j];
                self.v[i][j] = self.beta2 * self.v[i][j] + (1.0 - self.beta2) * grad[j].powi(2);
                p.data[j] -= lr_t * self.m[i][j] / (self.v[i][j].sqrt() + self.eps);
            }
        }
    }
}
