use crate::tensor::Tensor;
use crate::MlError;
use std::collections::HashMap;

/// Handle to a value recorded on a [`Tape`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Var(usize);

/// Operations the tape knows how to differentiate.
///
/// All values are row-major matrices. Binary element-wise ops expect equal
/// shapes; `MatMul` follows the layer convention `w [out, in] x [n, in] -> [n, out]`.
#[derive(Clone, Debug)]
pub enum EOp {
    Leaf,
    Add,
    Sub,
    Mul,
    MatMul,
    AddBroadcast,
    MulScalar(f32),
    AddScalar(f32),
    Tanh,
    Sigmoid,
    Exp,
    Pow(f32),
    Clamp(f32, f32),
    Min,
    ReduceSum,
    ReduceMean,
    SumRows,
    LogSoftmax,
    Concat,
    SelectCols(Vec<usize>),
    SelectRows(Vec<usize>),
    Tile(usize),
    /// Scaled dot-product read over `[n, slots * d]` with a `[n * slots]` 0/1 mask.
    AttendSlots(Vec<f32>),
}

#[derive(Clone, Debug)]
pub struct Node {
    pub op: EOp,
    pub a: usize,
    pub b: usize,
    pub rows: usize,
    pub cols: usize,
    pub value: Vec<f32>,
    pub param: Option<usize>,
}

/// A tape that records operations for automatic differentiation.
///
/// Unlike a parameter [`Tensor`], values on the tape are owned by the tape and
/// addressed through [`Var`] handles. Parameters enter through [`Tape::param`],
/// which remembers the originating tensor id so [`Tape::backward`] can hand the
/// accumulated gradient back to it.
#[derive(Default)]
pub struct Tape {
    nodes: Vec<Node>,
}

impl Tape {
    /// Creates a new, empty tape.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(
        &mut self,
        op: EOp,
        a: usize,
        b: usize,
        rows: usize,
        cols: usize,
        value: Vec<f32>,
    ) -> Var {
        debug_assert_eq!(rows * cols, value.len());
        self.nodes.push(Node { op, a, b, rows, cols, value, param: None });
        Var(self.nodes.len() - 1)
    }

    fn node(&self, v: Var) -> &Node {
        &self.nodes[v.0]
    }

    /// Copies a parameter onto the tape.
    pub fn param(&mut self, tensor: &Tensor) -> Var {
        let (rows, cols) = tensor.dims();
        let var = self.push(EOp::Leaf, usize::MAX, usize::MAX, rows, cols, tensor.data.clone());
        self.nodes[var.0].param = Some(tensor.id);
        var
    }

    /// Records a value that receives no gradient.
    pub fn constant(&mut self, rows: usize, cols: usize, data: Vec<f32>) -> Var {
        assert_eq!(rows * cols, data.len(), "constant shape does not match data");
        self.push(EOp::Leaf, usize::MAX, usize::MAX, rows, cols, data)
    }

    pub fn value(&self, v: Var) -> &[f32] {
        &self.node(v).value
    }

    pub fn dims(&self, v: Var) -> (usize, usize) {
        let n = self.node(v);
        (n.rows, n.cols)
    }

    pub fn scalar(&self, v: Var) -> f32 {
        self.node(v).value[0]
    }

    fn zip_with(&mut self, op: EOp, a: Var, b: Var, f: impl Fn(f32, f32) -> f32) -> Var {
        let (na, nb) = (self.node(a), self.node(b));
        assert_eq!((na.rows, na.cols), (nb.rows, nb.cols), "{op:?}: shape mismatch");
        let value = na.value.iter().zip(&nb.value).map(|(&x, &y)| f(x, y)).collect();
        let (rows, cols) = (na.rows, na.cols);
        self.push(op, a.0, b.0, rows, cols, value)
    }

    fn map(&mut self, op: EOp, a: Var, f: impl Fn(f32) -> f32) -> Var {
        let na = self.node(a);
        let value = na.value.iter().map(|&x| f(x)).collect();
        let (rows, cols) = (na.rows, na.cols);
        self.push(op, a.0, a.0, rows, cols, value)
    }

    pub fn add(&mut self, a: Var, b: Var) -> Var {
        self.zip_with(EOp::Add, a, b, |x, y| x + y)
    }

    pub fn sub(&mut self, a: Var, b: Var) -> Var {
        self.zip_with(EOp::Sub, a, b, |x, y| x - y)
    }

    pub fn mul(&mut self, a: Var, b: Var) -> Var {
        self.zip_with(EOp::Mul, a, b, |x, y| x * y)
    }

    pub fn min(&mut self, a: Var, b: Var) -> Var {
        self.zip_with(EOp::Min, a, b, f32::min)
    }

    /// `w [out, in]` applied to each row of `x [n, in]`, giving `[n, out]`.
    pub fn matmul(&mut self, w: Var, x: Var) -> Var {
        let (nw, nx) = (self.node(w), self.node(x));
        let (out_dim, in_dim) = (nw.rows, nw.cols);
        assert_eq!(nx.cols, in_dim, "matmul: inner dimensions differ");
        let batch = nx.rows;
        let mut value = vec![0.0; batch * out_dim];
        for k in 0..batch {
            let xr = &nx.value[k * in_dim..(k + 1) * in_dim];
            for o in 0..out_dim {
                let wr = &nw.value[o * in_dim..(o + 1) * in_dim];
                value[k * out_dim + o] = wr.iter().zip(xr).map(|(a, b)| a * b).sum();
            }
        }
        self.push(EOp::MatMul, w.0, x.0, batch, out_dim, value)
    }

    /// Adds the single-row `b` to every row of `a`.
    pub fn add_broadcast(&mut self, a: Var, b: Var) -> Var {
        let (na, nb) = (self.node(a), self.node(b));
        assert_eq!(nb.value.len(), na.cols, "add_broadcast: bias width differs");
        let cols = na.cols;
        let value = na.value.iter().enumerate().map(|(i, &x)| x + nb.value[i % cols]).collect();
        let rows = na.rows;
        self.push(EOp::AddBroadcast, a.0, b.0, rows, cols, value)
    }

    pub fn mul_scalar(&mut self, a: Var, s: f32) -> Var {
        self.map(EOp::MulScalar(s), a, |x| x * s)
    }

    pub fn add_scalar(&mut self, a: Var, s: f32) -> Var {
        self.map(EOp::AddScalar(s), a, |x| x + s)
    }

    pub fn tanh(&mut self, a: Var) -> Var {
        self.map(EOp::Tanh, a, f32::tanh)
    }

    pub fn sigmoid(&mut self, a: Var) -> Var {
        self.map(EOp::Sigmoid, a, |x| 1.0 / (1.0 + (-x).exp()))
    }

    pub fn exp(&mut self, a: Var) -> Var {
        self.map(EOp::Exp, a, f32::exp)
    }

    pub fn pow(&mut self, a: Var, p: f32) -> Var {
        self.map(EOp::Pow(p), a, |x| x.powf(p))
    }

    pub fn clamp(&mut self, a: Var, min: f32, max: f32) -> Var {
        self.map(EOp::Clamp(min, max), a, |x| x.max(min).min(max))
    }

    pub fn reduce_sum(&mut self, a: Var) -> Var {
        let sum = self.node(a).value.iter().sum();
        self.push(EOp::ReduceSum, a.0, a.0, 1, 1, vec![sum])
    }

    pub fn reduce_mean(&mut self, a: Var) -> Var {
        let na = self.node(a);
        let mean = na.value.iter().sum::<f32>() / na.value.len().max(1) as f32;
        self.push(EOp::ReduceMean, a.0, a.0, 1, 1, vec![mean])
    }

    /// Sums each row, giving `[n, 1]`.
    pub fn sum_rows(&mut self, a: Var) -> Var {
        let na = self.node(a);
        let value = na.value.chunks(na.cols).map(|r| r.iter().sum()).collect();
        let rows = na.rows;
        self.push(EOp::SumRows, a.0, a.0, rows, 1, value)
    }

    /// Row-wise `x - logsumexp(x)`.
    pub fn log_softmax(&mut self, a: Var) -> Var {
        let na = self.node(a);
        let mut value = Vec::with_capacity(na.value.len());
        for row in na.value.chunks(na.cols) {
            let m = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let lse = m + row.iter().map(|&v| (v - m).exp()).sum::<f32>().ln();
            value.extend(row.iter().map(|&v| v - lse));
        }
        let (rows, cols) = (na.rows, na.cols);
        self.push(EOp::LogSoftmax, a.0, a.0, rows, cols, value)
    }

    /// Joins columns: `[n, p]` and `[n, q]` into `[n, p + q]`.
    pub fn concat(&mut self, a: Var, b: Var) -> Var {
        let (na, nb) = (self.node(a), self.node(b));
        assert_eq!(na.rows, nb.rows, "concat: row counts differ");
        let cols = na.cols + nb.cols;
        let mut value = Vec::with_capacity(na.rows * cols);
        for r in 0..na.rows {
            value.extend_from_slice(&na.value[r * na.cols..(r + 1) * na.cols]);
            value.extend_from_slice(&nb.value[r * nb.cols..(r + 1) * nb.cols]);
        }
        let rows = na.rows;
        self.push(EOp::Concat, a.0, b.0, rows, cols, value)
    }

    /// Picks column `idx[r]` from every row `r`, giving `[n, 1]`.
    pub fn select_cols(&mut self, a: Var, idx: &[usize]) -> Var {
        let na = self.node(a);
        assert_eq!(idx.len(), na.rows, "select_cols: one index per row");
        let value = idx.iter().enumerate().map(|(r, &c)| na.value[r * na.cols + c]).collect();
        let rows = na.rows;
        self.push(EOp::SelectCols(idx.to_vec()), a.0, a.0, rows, 1, value)
    }

    /// Gathers the listed rows, giving `[idx.len(), m]`.
    pub fn select_rows(&mut self, a: Var, idx: &[usize]) -> Var {
        let na = self.node(a);
        let cols = na.cols;
        let mut value = Vec::with_capacity(idx.len() * cols);
        for &r in idx {
            value.extend_from_slice(&na.value[r * cols..(r + 1) * cols]);
        }
        self.push(EOp::SelectRows(idx.to_vec()), a.0, a.0, idx.len(), cols, value)
    }

    /// Repeats each row `times` times side by side: `[n, d]` into `[n, times * d]`.
    pub fn tile(&mut self, a: Var, times: usize) -> Var {
        let na = self.node(a);
        let cols = na.cols * times;
        let mut value = Vec::with_capacity(na.rows * cols);
        for row in na.value.chunks(na.cols) {
            for _ in 0..times {
                value.extend_from_slice(row);
            }
        }
        let rows = na.rows;
        self.push(EOp::Tile(times), a.0, a.0, rows, cols, value)
    }

    /// Attention read of `slots [n, s * d]` with `query [n, d]`.
    ///
    /// Only slots whose `mask` entry is non-zero take part. A row with no
    /// filled slot reads zeros.
    pub fn attend_slots(&mut self, query: Var, slots: Var, mask: Vec<f32>) -> Var {
        let (nq, ns) = (self.node(query), self.node(slots));
        let d = nq.cols;
        assert_eq!(nq.rows, ns.rows, "attend_slots: row counts differ");
        assert_eq!(ns.cols % d, 0, "attend_slots: slot width is not a multiple of the query");
        let n_slots = ns.cols / d;
        assert_eq!(mask.len(), nq.rows * n_slots, "attend_slots: mask size");
        let mut value = vec![0.0; nq.rows * d];
        for r in 0..nq.rows {
            let q = &nq.value[r * d..(r + 1) * d];
            let s = &ns.value[r * ns.cols..(r + 1) * ns.cols];
            let m = &mask[r * n_slots..(r + 1) * n_slots];
            if let Some(w) = slot_weights(q, s, m, d) {
                let out = &mut value[r * d..(r + 1) * d];
                for (t, wt) in w.iter().enumerate() {
                    for j in 0..d {
                        out[j] += wt * s[t * d + j];
                    }
                }
            }
        }
        let rows = nq.rows;
        self.push(EOp::AttendSlots(mask), query.0, slots.0, rows, d, value)
    }

    /// Computes the gradients of every recorded parameter with respect to `loss`.
    ///
    /// The gradients are computed by traversing the recorded operations in
    /// reverse order. Parameters copied onto the tape more than once receive
    /// the sum of their contributions.
    pub fn backward(&self, loss: Var) -> Result<Gradients, MlError> {
        let root = self.node(loss);
        if root.value.len() != 1 {
            return Err(MlError::NonScalarLoss(root.value.len()));
        }
        let mut grads: Vec<Option<Vec<f32>>> = vec![None; loss.0 + 1];
        grads[loss.0] = Some(vec![1.0]);

        for i in (0..=loss.0).rev() {
            let node = &self.nodes[i];
            if matches!(node.op, EOp::Leaf) {
                continue;
            }
            let Some(out_grad) = grads[i].take() else {
                continue;
            };
            self.propagate(node, &out_grad, &mut grads);
        }

        let mut by_param: HashMap<usize, Vec<f32>> = HashMap::new();
        for (node, grad) in self.nodes.iter().zip(grads) {
            if let (Some(id), Some(grad)) = (node.param, grad) {
                match by_param.get_mut(&id) {
                    Some(acc) => acc.iter_mut().zip(&grad).for_each(|(a, g)| *a += g),
                    None => {
                        by_param.insert(id, grad);
                    }
                }
            }
        }
        Ok(Gradients { by_param })
    }

    fn propagate(&self, node: &Node, g: &[f32], grads: &mut [Option<Vec<f32>>]) {
        let a = &self.nodes[node.a];
        match &node.op {
            EOp::Leaf => {}
            EOp::Add => {
                add_into(acc(grads, node.a, a.value.len()), g.iter().copied());
                add_into(acc(grads, node.b, g.len()), g.iter().copied());
            }
            EOp::Sub => {
                add_into(acc(grads, node.a, a.value.len()), g.iter().copied());
                add_into(acc(grads, node.b, g.len()), g.iter().map(|v| -v));
            }
            EOp::Mul => {
                let b = &self.nodes[node.b];
                add_into(
                    acc(grads, node.a, a.value.len()),
                    g.iter().zip(&b.value).map(|(g, y)| g * y),
                );
                add_into(
                    acc(grads, node.b, b.value.len()),
                    g.iter().zip(&a.value).map(|(g, x)| g * x),
                );
            }
            EOp::MatMul => {
                let x = &self.nodes[node.b];
                let (out_dim, in_dim) = (a.rows, a.cols);
                let batch = x.rows;
                {
                    let w_grad = acc(grads, node.a, a.value.len());
                    for k in 0..batch {
                        for o in 0..out_dim {
                            let go = g[k * out_dim + o];
                            if go == 0.0 {
                                continue;
                            }
                            for j in 0..in_dim {
                                w_grad[o * in_dim + j] += go * x.value[k * in_dim + j];
                            }
                        }
                    }
                }
                {
                    let x_grad = acc(grads, node.b, x.value.len());
                    for k in 0..batch {
                        for o in 0..out_dim {
                            let go = g[k * out_dim + o];
                            if go == 0.0 {
                                continue;
                            }
                            for j in 0..in_dim {
                                x_grad[k * in_dim + j] += go * a.value[o * in_dim + j];
                            }
                        }
                    }
                }
            }
            EOp::AddBroadcast => {
                add_into(acc(grads, node.a, a.value.len()), g.iter().copied());
                let cols = node.cols;
                let b_grad = acc(grads, node.b, cols);
                for row in g.chunks(cols) {
                    add_into(b_grad, row.iter().copied());
                }
            }
            EOp::MulScalar(s) => {
                add_into(acc(grads, node.a, a.value.len()), g.iter().map(|v| v * s));
            }
            EOp::AddScalar(_) => {
                add_into(acc(grads, node.a, a.value.len()), g.iter().copied());
            }
            EOp::Tanh => {
                let y = &node.value;
                add_into(
                    acc(grads, node.a, a.value.len()),
                    g.iter().zip(y).map(|(g, y)| g * (1.0 - y * y)),
                );
            }
            EOp::Sigmoid => {
                let y = &node.value;
                add_into(
                    acc(grads, node.a, a.value.len()),
                    g.iter().zip(y).map(|(g, y)| g * y * (1.0 - y)),
                );
            }
            EOp::Exp => {
                let y = &node.value;
                add_into(acc(grads, node.a, a.value.len()), g.iter().zip(y).map(|(g, y)| g * y));
            }
            EOp::Pow(p) => {
                let p = *p;
                add_into(
                    acc(grads, node.a, a.value.len()),
                    g.iter().zip(&a.value).map(|(g, x)| g * p * x.powf(p - 1.0)),
                );
            }
            EOp::Clamp(min, max) => {
                let (min, max) = (*min, *max);
                add_into(
                    acc(grads, node.a, a.value.len()),
                    g.iter().zip(&a.value).map(|(g, &x)| if x > min && x < max { *g } else { 0.0 }),
                );
            }
            EOp::Min => {
                let b = &self.nodes[node.b];
                add_into(
                    acc(grads, node.a, a.value.len()),
                    g.iter()
                        .zip(a.value.iter().zip(&b.value))
                        .map(|(g, (x, y))| if x < y { *g } else { 0.0 }),
                );
                add_into(
                    acc(grads, node.b, b.value.len()),
                    g.iter()
                        .zip(a.value.iter().zip(&b.value))
                        .map(|(g, (x, y))| if y <= x { *g } else { 0.0 }),
                );
            }
            EOp::ReduceSum => {
                let n = a.value.len();
                add_into(acc(grads, node.a, n), std::iter::repeat(g[0]).take(n));
            }
            EOp::ReduceMean => {
                let n = a.value.len();
                add_into(acc(grads, node.a, n), std::iter::repeat(g[0] / n as f32).take(n));
            }
            EOp::SumRows => {
                let cols = a.cols;
                let n = a.value.len();
                add_into(acc(grads, node.a, n), (0..n).map(|i| g[i / cols]));
            }
            EOp::LogSoftmax => {
                let cols = node.cols;
                let a_grad = acc(grads, node.a, a.value.len());
                for (r, (gr, yr)) in g.chunks(cols).zip(node.value.chunks(cols)).enumerate() {
                    let total: f32 = gr.iter().sum();
                    for c in 0..cols {
                        a_grad[r * cols + c] += gr[c] - yr[c].exp() * total;
                    }
                }
            }
            EOp::Concat => {
                let b = &self.nodes[node.b];
                let (p, q) = (a.cols, b.cols);
                {
                    let a_grad = acc(grads, node.a, a.value.len());
                    for r in 0..node.rows {
                        for c in 0..p {
                            a_grad[r * p + c] += g[r * (p + q) + c];
                        }
                    }
                }
                let b_grad = acc(grads, node.b, b.value.len());
                for r in 0..node.rows {
                    for c in 0..q {
                        b_grad[r * q + c] += g[r * (p + q) + p + c];
                    }
                }
            }
            EOp::SelectCols(idx) => {
                let cols = a.cols;
                let a_grad = acc(grads, node.a, a.value.len());
                for (r, &c) in idx.iter().enumerate() {
                    a_grad[r * cols + c] += g[r];
                }
            }
            EOp::SelectRows(idx) => {
                let cols = a.cols;
                let a_grad = acc(grads, node.a, a.value.len());
                for (k, &r) in idx.iter().enumerate() {
                    for c in 0..cols {
                        a_grad[r * cols + c] += g[k * cols + c];
                    }
                }
            }
            EOp::Tile(times) => {
                let d = a.cols;
                let a_grad = acc(grads, node.a, a.value.len());
                for r in 0..a.rows {
                    for t in 0..*times {
                        for j in 0..d {
                            a_grad[r * d + j] += g[r * times * d + t * d + j];
                        }
                    }
                }
            }
            EOp::AttendSlots(mask) => {
                let s_node = &self.nodes[node.b];
                let d = a.cols;
                let width = s_node.cols;
                let n_slots = width / d;
                let scale = 1.0 / (d as f32).sqrt();
                let mut q_grad = vec![0.0; a.value.len()];
                let mut s_grad = vec![0.0; s_node.value.len()];
                for r in 0..a.rows {
                    let q = &a.value[r * d..(r + 1) * d];
                    let s = &s_node.value[r * width..(r + 1) * width];
                    let m = &mask[r * n_slots..(r + 1) * n_slots];
                    let Some(w) = slot_weights(q, s, m, d) else {
                        continue;
                    };
                    let gr = &g[r * d..(r + 1) * d];
                    let dw: Vec<f32> = (0..n_slots)
                        .map(|t| (0..d).map(|j| gr[j] * s[t * d + j]).sum())
                        .collect();
                    let avg: f32 = w.iter().zip(&dw).map(|(w, dw)| w * dw).sum();
                    for t in 0..n_slots {
                        if w[t] == 0.0 {
                            continue;
                        }
                        let dscore = w[t] * (dw[t] - avg) * scale;
                        for j in 0..d {
                            s_grad[r * width + t * d + j] += w[t] * gr[j] + dscore * q[j];
                            q_grad[r * d + j] += dscore * s[t * d + j];
                        }
                    }
                }
                add_into(acc(grads, node.a, q_grad.len()), q_grad);
                add_into(acc(grads, node.b, s_grad.len()), s_grad);
            }
        }
    }
}

fn acc(grads: &mut [Option<Vec<f32>>], idx: usize, len: usize) -> &mut Vec<f32> {
    grads[idx].get_or_insert_with(|| vec![0.0; len])
}

fn add_into(dst: &mut [f32], src: impl IntoIterator<Item = f32>) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += s;
    }
}

/// Softmax weights over the filled slots of one row, `None` when nothing is filled.
fn slot_weights(q: &[f32], slots: &[f32], mask: &[f32], d: usize) -> Option<Vec<f32>> {
    let scale = 1.0 / (d as f32).sqrt();
    let scores: Vec<Option<f32>> = mask
        .iter()
        .enumerate()
        .map(|(t, &m)| {
            (m > 0.5).then(|| {
                let slot = &slots[t * d..(t + 1) * d];
                q.iter().zip(slot).map(|(a, b)| a * b).sum::<f32>() * scale
            })
        })
        .collect();
    let max = scores.iter().flatten().copied().fold(f32::NEG_INFINITY, f32::max);
    if max == f32::NEG_INFINITY {
        return None;
    }
    let exp: Vec<f32> = scores.iter().map(|s| s.map_or(0.0, |s| (s - max).exp())).collect();
    let total: f32 = exp.iter().sum();
    Some(exp.into_iter().map(|e| e / total).collect())
}

/// Parameter gradients produced by [`Tape::backward`], keyed by tensor id.
#[derive(Debug, Default)]
pub struct Gradients {
    by_param: HashMap<usize, Vec<f32>>,
}

impl Gradients {
    pub fn get(&self, tensor: &Tensor) -> Option<&[f32]> {
        self.by_param.get(&tensor.id).map(Vec::as_slice)
    }

    pub fn is_finite(&self) -> bool {
        self.by_param.values().flatten().all(|g| g.is_finite())
    }

    pub fn global_norm(&self) -> f32 {
        self.by_param.values().flatten().map(|g| g * g).sum::<f32>().sqrt()
    }

    /// Rescales all gradients so their joint L2 norm is at most `max_norm`.
    /// Returns the norm before clipping.
    pub fn clip_global_norm(&mut self, max_norm: f32) -> f32 {
        let norm = self.global_norm();
        if norm > max_norm && norm > 0.0 {
            let scale = max_norm / norm;
            self.by_param.values_mut().flatten().for_each(|g| *g *= scale);
        }
        norm
    }

    /// Moves each gradient into the matching parameter's `grad` slot.
    pub fn apply(mut self, params: &mut [&mut Tensor]) {
        for p in params.iter_mut() {
            let grad = self.by_param.remove(&p.id);
            p.grad = if p.requires_grad { grad } else { None };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_softmax_rows_normalise() {
        let mut tape = Tape::new();
        let x = tape.constant(2, 3, vec![1.0, 2.0, 3.0, -1.0, 0.0, 50.0]);
        let y = tape.log_softmax(x);
        for row in tape.value(y).chunks(3) {
            let total: f32 = row.iter().map(|v| v.exp()).sum();
            assert!((total - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn attend_without_filled_slots_reads_zero() {
        let mut tape = Tape::new();
        let q = tape.constant(1, 2, vec![1.0, 1.0]);
        let s = tape.constant(1, 4, vec![1.0, 2.0, 3.0, 4.0]);
        let out = tape.attend_slots(q, s, vec![0.0, 0.0]);
        assert_eq!(tape.value(out), &[0.0, 0.0]);
    }

    #[test]
    fn attend_single_slot_copies_it() {
        let mut tape = Tape::new();
        let q = tape.constant(1, 2, vec![0.3, -0.2]);
        let s = tape.constant(1, 4, vec![1.0, 2.0, 3.0, 4.0]);
        let out = tape.attend_slots(q, s, vec![0.0, 1.0]);
        assert_eq!(tape.value(out), &[3.0, 4.0]);
    }

    #[test]
    fn non_scalar_loss_is_rejected() {
        let mut tape = Tape::new();
        let x = tape.constant(1, 2, vec![1.0, 2.0]);
        assert!(matches!(tape.backward(x), Err(MlError::NonScalarLoss(2))));
    }

    #[test]
    fn repeated_param_grads_accumulate() {
        let w = Tensor::from_vec(vec![1, 1], vec![3.0]).with_grad();
        let mut tape = Tape::new();
        let a = tape.param(&w);
        let b = tape.param(&w);
        let y = tape.mul(a, b);
        let loss = tape.reduce_sum(y);
        let grads = tape.backward(loss).unwrap();
        assert_eq!(grads.get(&w), Some(&[6.0][..]));
    }
}
