//! Question grammar, oracle and the oracle-wrapped environment.
//!
//! Questions are token sequences over [`vocab::VOCAB`]. The [`Oracle`] parses
//! them with [`grammar::parse`] and answers from a [`gridworld::WorldSnapshot`].
//! [`OracleEnv`] adds a question channel to any [`gridworld::Env`] and shapes
//! the reward from the verdict.

pub mod bank;
pub mod grammar;
pub mod oracle;
pub mod vocab;
pub mod wrapper;

pub use bank::QuestionBank;
pub use grammar::{parse, Entity, Question, Relation, SyntaxError};
pub use oracle::{answer, AnswerMode, Oracle, Subject, Verdict};
pub use vocab::TokenId;
pub use wrapper::{ExtendedAction, OracleEnv, OracleStep, ShapingRewards, StepInfo};
