//! Frozen language encoder used to embed questions and answers.

use crate::error::{ConfigError, RlError};
use ml::{checkpoint, Dense, MlError, Tensor};
use oracle::vocab::{self, TokenId};
use oracle::QuestionBank;
use std::path::Path;

pub trait LanguageEncoder {
    fn embed_dim(&self) -> usize;
    fn encode(&self, tokens: &[TokenId]) -> Vec<f32>;
}

/// Word embeddings followed by an Elman cell, `h = tanh(W [e; h] + b)`.
///
/// Row `VOCAB_SIZE` of the embedding table is shared by every
/// out-of-vocabulary id.
pub struct RecurrentEncoder {
    embedding: Tensor,
    cell: Dense,
    word_dim: usize,
    hidden_dim: usize,
}

impl RecurrentEncoder {
    pub fn random(word_dim: usize, hidden_dim: usize, rng: &mut fastrand::Rng) -> Self {
        let rows = vocab::VOCAB_SIZE + 1;
        let embedding = Tensor::from_vec(
            vec![rows, word_dim],
            (0..rows * word_dim).map(|_| rng.f32() * 2.0 - 1.0).collect(),
        );
        let cell = Dense::random(word_dim + hidden_dim, hidden_dim, rng);
        Self { embedding, cell, word_dim, hidden_dim }
    }

    /// Loads parameters saved by [`RecurrentEncoder::save`].
    pub fn load(path: &Path, word_dim: usize, hidden_dim: usize) -> Result<Self, RlError> {
        if !path.is_file() {
            return Err(ConfigError::MissingEncoder(path.to_path_buf()).into());
        }
        let mut encoder = Self::random(word_dim, hidden_dim, &mut fastrand::Rng::with_seed(0));
        checkpoint::restore(path, encoder.named_params_mut())?;
        tracing::info!(path = %path.display(), "language encoder loaded");
        Ok(encoder)
    }

    pub fn save(&self, path: &Path) -> Result<(), MlError> {
        let params = [
            ("encoder.embedding".to_string(), &self.embedding),
            ("encoder.cell.w".to_string(), &self.cell.w),
            ("encoder.cell.b".to_string(), &self.cell.b),
        ];
        checkpoint::save(path, &params)
    }

    fn named_params_mut(&mut self) -> Vec<(String, &mut Tensor)> {
        vec![
            ("encoder.embedding".to_string(), &mut self.embedding),
            ("encoder.cell.w".to_string(), &mut self.cell.w),
            ("encoder.cell.b".to_string(), &mut self.cell.b),
        ]
    }

    fn word(&self, token: TokenId) -> &[f32] {
        let row = (token as usize).min(vocab::VOCAB_SIZE);
        &self.embedding.data[row * self.word_dim..(row + 1) * self.word_dim]
    }
}

impl LanguageEncoder for RecurrentEncoder {
    fn embed_dim(&self) -> usize {
        self.hidden_dim
    }

    fn encode(&self, tokens: &[TokenId]) -> Vec<f32> {
        let mut h = vec![0.0; self.hidden_dim];
        let mut input = Vec::with_capacity(self.word_dim + self.hidden_dim);
        for &t in tokens {
            input.clear();
            input.extend_from_slice(self.word(t));
            input.extend_from_slice(&h);
            h = self.cell.apply(&input).into_iter().map(f32::tanh).collect();
        }
        h
    }
}

/// Embeddings of every bank phrase and every vocabulary word, computed once.
pub struct EncodedBank {
    questions: Vec<Vec<f32>>,
    words: Vec<Vec<f32>>,
    dim: usize,
}

impl EncodedBank {
    pub fn new(encoder: &dyn LanguageEncoder, bank: &QuestionBank) -> Self {
        Self {
            questions: bank.phrases().iter().map(|p| encoder.encode(p)).collect(),
            words: (0..vocab::VOCAB_SIZE as TokenId).map(|t| encoder.encode(&[t])).collect(),
            dim: encoder.embed_dim(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Width of an exchange embedding, `[question; answer]`.
    pub fn exchange_dim(&self) -> usize {
        2 * self.dim
    }

    pub fn question(&self, index: usize) -> &[f32] {
        &self.questions[index]
    }

    pub fn exchange(&self, question: usize, answer: TokenId) -> Vec<f32> {
        let mut out = self.questions[question].clone();
        out.extend_from_slice(&self.words[answer as usize]);
        out
    }
}
