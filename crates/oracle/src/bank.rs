use crate::grammar::{self, Entity, Question, Relation};
use crate::vocab::{self, TokenId};
use gridworld::{Color, ObjectKind};

/// The fixed set of phrases a policy chooses from.
///
/// Question-logit column `0` means "ask nothing"; column `i + 1` selects
/// phrase `i`. Grammatical phrases come first, followed by corrupted ones
/// that never parse.
#[derive(Clone, Debug)]
pub struct QuestionBank {
    phrases: Vec<Vec<TokenId>>,
    valid: usize,
}

impl QuestionBank {
    pub fn new(corrupted: usize, seed: u64) -> Self {
        let mut phrases: Vec<Vec<TokenId>> =
            Self::templates().iter().map(Question::tokens).collect();
        let valid = phrases.len();
        let mut rng = fastrand::Rng::with_seed(seed);
        let mut attempts = 0;
        while phrases.len() < valid + corrupted && attempts < corrupted * 100 {
            attempts += 1;
            let mut phrase = phrases[rng.usize(..valid)].clone();
            corrupt(&mut phrase, &mut rng);
            if grammar::parse(&phrase).is_err() && !phrases[valid..].contains(&phrase) {
                phrases.push(phrase);
            }
        }
        if phrases.len() < valid + corrupted {
            tracing::warn!(
                wanted = corrupted,
                got = phrases.len() - valid,
                "question bank is short of corrupted phrases"
            );
        }
        Self { phrases, valid }
    }

    /// Every instantiation of every template.
    pub fn templates() -> Vec<Question> {
        let colors = std::iter::once(None).chain(Color::ALL.into_iter().map(Some));
        let mut out = Vec::new();
        for relation in Relation::ALL {
            for color in colors.clone() {
                for kind in ObjectKind::ALL {
                    out.push(Question { relation, entity: Entity { kind, color } });
                }
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    pub fn valid_len(&self) -> usize {
        self.valid
    }

    pub fn phrases(&self) -> &[Vec<TokenId>] {
        &self.phrases
    }

    pub fn phrase(&self, index: usize) -> &[TokenId] {
        &self.phrases[index]
    }

    pub fn is_corrupted(&self, index: usize) -> bool {
        index >= self.valid
    }

    /// Width of the question logits: every phrase plus "ask nothing".
    pub fn logit_width(&self) -> usize {
        self.phrases.len() + 1
    }

    /// Maps a sampled question column to a bank index.
    pub fn index_for_column(column: usize) -> Option<usize> {
        column.checked_sub(1)
    }
}

fn corrupt(phrase: &mut Vec<TokenId>, rng: &mut fastrand::Rng) {
    let n = phrase.len();
    match rng.usize(..3) {
        0 => {
            phrase.remove(rng.usize(..n));
        }
        1 => {
            let i = rng.usize(..n - 1);
            phrase.swap(i, i + 1);
        }
        _ => phrase[rng.usize(..n)] = rng.u32(..vocab::VOCAB_SIZE as u32),
    }
}
