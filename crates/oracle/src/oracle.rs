use crate::grammar::{self, Question, Relation};
use crate::vocab::{self, Direction, TokenId};
use gridworld::{Color, ObjectKind, WorldSnapshot};

/// The object an answer is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Subject {
    pub kind: ObjectKind,
    pub color: Color,
}

impl Subject {
    /// Number of distinct subjects, one memory slot each.
    pub const COUNT: usize = ObjectKind::COUNT * Color::COUNT;

    pub fn slot(self) -> usize {
        self.kind.index() * Color::COUNT + self.color.index()
    }
}

/// Outcome of asking the oracle one question.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Answered { answer: TokenId, subject: Subject },
    SyntaxError,
    UndefinedError,
}

impl Verdict {
    pub fn is_answered(&self) -> bool {
        matches!(self, Self::Answered { .. })
    }

    pub fn answer(&self) -> Option<TokenId> {
        match self {
            Self::Answered { answer, .. } => Some(*answer),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Answered { .. } => "answered",
            Self::SyntaxError => "syntax_error",
            Self::UndefinedError => "undefined_error",
        }
    }
}

/// How answers are produced once a question resolves.
pub enum AnswerMode {
    /// Answers come from the world state.
    Truthful,
    /// Answers are drawn uniformly from the answer vocabulary. Syntax and
    /// undefined errors are still reported from the world state.
    Random(fastrand::Rng),
}

pub struct Oracle {
    mode: AnswerMode,
    answers: Vec<TokenId>,
}

impl Oracle {
    pub fn new(mode: AnswerMode) -> Self {
        Self { mode, answers: vocab::answer_tokens() }
    }

    pub fn truthful() -> Self {
        Self::new(AnswerMode::Truthful)
    }

    pub fn random(seed: u64) -> Self {
        Self::new(AnswerMode::Random(fastrand::Rng::with_seed(seed)))
    }

    pub fn is_random(&self) -> bool {
        matches!(self.mode, AnswerMode::Random(_))
    }

    /// Parses `tokens` and answers from `state`. Never fails: malformed input
    /// becomes [`Verdict::SyntaxError`].
    pub fn validate_and_answer(&mut self, tokens: &[TokenId], state: &WorldSnapshot) -> Verdict {
        let Ok(question) = grammar::parse(tokens) else {
            return Verdict::SyntaxError;
        };
        let verdict = answer(&question, state);
        match (&mut self.mode, verdict) {
            (AnswerMode::Random(rng), Verdict::Answered { subject, .. }) => {
                let answer = self.answers[rng.usize(..self.answers.len())];
                Verdict::Answered { answer, subject }
            }
            (_, verdict) => verdict,
        }
    }
}

/// Truthful answer to a parsed question. Pure in `state`.
///
/// The nearest matching object to the agent is chosen (Manhattan distance,
/// first in object order on ties).
pub fn answer(question: &Question, state: &WorldSnapshot) -> Verdict {
    let entity = question.entity;
    let target = state
        .objects
        .iter()
        .filter(|o| o.kind == entity.kind && entity.color.map_or(true, |c| c == o.color))
        .min_by_key(|o| state.distance_to_agent(o.pos));
    let Some(target) = target else {
        return Verdict::UndefinedError;
    };

    let answer = match question.relation {
        Relation::Location => {
            let dx = target.pos.0 as isize - state.agent.0 as isize;
            let dy = target.pos.1 as isize - state.agent.1 as isize;
            Direction::from_offset(dx, dy).token()
        }
        Relation::Color => vocab::color_token(target.color),
        Relation::Open if target.kind == ObjectKind::Door => {
            if target.open {
                vocab::YES
            } else {
                vocab::NO
            }
        }
        Relation::Open => return Verdict::UndefinedError,
    };
    Verdict::Answered { answer, subject: Subject { kind: target.kind, color: target.color } }
}
