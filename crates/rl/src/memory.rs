use oracle::TokenId;

/// One answered question, ready to be folded into memory.
#[derive(Clone, Debug, PartialEq)]
pub struct Exchange {
    /// Index into the question bank.
    pub question: usize,
    pub answer: TokenId,
    /// Memory slot of the answer's subject.
    pub slot: usize,
    /// `[question embedding; answer embedding]`.
    pub features: Vec<f32>,
}

/// Per-episode memory carried between policy steps.
///
/// `values` is the recurrent vector or the flattened slot table. `filled`
/// marks written slots and is empty for variants without slots.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryState {
    pub values: Vec<f32>,
    pub filled: Vec<bool>,
}

impl MemoryState {
    pub fn zeros(width: usize, slots: usize) -> Self {
        Self { values: vec![0.0; width], filled: vec![false; slots] }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Slot flags after `exchange` is written.
    pub fn filled_after(&self, exchange: Option<&Exchange>) -> Vec<bool> {
        let mut filled = self.filled.clone();
        if let Some(flag) = exchange.and_then(|e| filled.get_mut(e.slot)) {
            *flag = true;
        }
        filled
    }

    /// The state after a forward pass produced `values` from this one.
    pub fn advance(&self, values: Vec<f32>, exchange: Option<&Exchange>) -> Self {
        Self { values, filled: self.filled_after(exchange) }
    }
}
