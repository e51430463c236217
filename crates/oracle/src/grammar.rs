//! Question templates and their recursive-descent parser.
//!
//! ```text
//! question := "where" "is" entity
//!           | "what" "color" "is" entity
//!           | "is" entity "open"
//! entity   := "the" [colour] kind
//! ```

use crate::vocab::{self, TokenId};
use gridworld::{Color, ObjectKind};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Relation {
    Location,
    Color,
    Open,
}

impl Relation {
    pub const ALL: [Relation; 3] = [Self::Location, Self::Color, Self::Open];
}

/// A kind with an optional colour qualifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Entity {
    pub kind: ObjectKind,
    pub color: Option<Color>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Question {
    pub relation: Relation,
    pub entity: Entity,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("question does not parse at token {position}")]
pub struct SyntaxError {
    pub position: usize,
}

impl Question {
    /// Renders the question back to the token sequence the parser accepts.
    pub fn tokens(&self) -> Vec<TokenId> {
        let mut entity = vec![vocab::THE];
        entity.extend(self.entity.color.map(vocab::color_token));
        entity.push(vocab::kind_token(self.entity.kind));
        match self.relation {
            Relation::Location => [vec![vocab::WHERE, vocab::IS], entity].concat(),
            Relation::Color => [vec![vocab::WHAT, vocab::COLOR, vocab::IS], entity].concat(),
            Relation::Open => [vec![vocab::IS], entity, vec![vocab::OPEN]].concat(),
        }
    }
}

pub fn parse(tokens: &[TokenId]) -> Result<Question, SyntaxError> {
    let mut p = Parser { tokens, pos: 0 };
    let question = match p.next()? {
        vocab::WHERE => {
            p.expect(vocab::IS)?;
            Question { relation: Relation::Location, entity: p.entity()? }
        }
        vocab::WHAT => {
            p.expect(vocab::COLOR)?;
            p.expect(vocab::IS)?;
            Question { relation: Relation::Color, entity: p.entity()? }
        }
        vocab::IS => {
            let entity = p.entity()?;
            p.expect(vocab::OPEN)?;
            Question { relation: Relation::Open, entity }
        }
        _ => return Err(p.error_here()),
    };
    p.finish()?;
    Ok(question)
}

struct Parser<'a> {
    tokens: &'a [TokenId],
    pos: usize,
}

impl Parser<'_> {
    fn error_here(&self) -> SyntaxError {
        SyntaxError { position: self.pos.saturating_sub(1) }
    }

    fn peek(&self) -> Option<TokenId> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Result<TokenId, SyntaxError> {
        let t = self.peek().ok_or(SyntaxError { position: self.pos })?;
        self.pos += 1;
        Ok(t)
    }

    fn expect(&mut self, want: TokenId) -> Result<(), SyntaxError> {
        if self.next()? == want {
            Ok(())
        } else {
            Err(self.error_here())
        }
    }

    fn entity(&mut self) -> Result<Entity, SyntaxError> {
        self.expect(vocab::THE)?;
        let color = self.peek().and_then(vocab::as_color);
        if color.is_some() {
            self.pos += 1;
        }
        let kind = vocab::as_kind(self.next()?).ok_or_else(|| self.error_here())?;
        Ok(Entity { kind, color })
    }

    fn finish(&self) -> Result<(), SyntaxError> {
        if self.pos == self.tokens.len() {
            Ok(())
        } else {
            Err(SyntaxError { position: self.pos })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::encode;

    fn parse_text(text: &str) -> Result<Question, SyntaxError> {
        parse(&encode(text).unwrap())
    }

    #[test]
    fn parses_each_template() {
        let q = parse_text("where is the key").unwrap();
        assert_eq!(q.relation, Relation::Location);
        assert_eq!(q.entity, Entity { kind: ObjectKind::Key, color: None });

        let q = parse_text("what color is the ball").unwrap();
        assert_eq!(q.relation, Relation::Color);

        let q = parse_text("is the purple door open").unwrap();
        assert_eq!(q.relation, Relation::Open);
        assert_eq!(q.entity.color, Some(Color::Purple));
    }

    #[test]
    fn rejects_malformed_sequences() {
        for text in [
            "",
            "where is the",
            "where is the red",
            "where the key",
            "is the door",
            "is the door open open",
            "what is the color key",
            "where is the red blue key",
            "yes",
        ] {
            let tokens = encode(text).unwrap();
            assert!(parse(&tokens).is_err(), "`{text}` should not parse");
        }
    }

    #[test]
    fn out_of_vocabulary_tokens_fail() {
        assert!(parse(&[vocab::WHERE, vocab::IS, vocab::THE, 1000]).is_err());
        assert_eq!(parse(&[500]), Err(SyntaxError { position: 0 }));
    }

    #[test]
    fn rendered_tokens_parse_back() {
        let q = Question {
            relation: Relation::Open,
            entity: Entity { kind: ObjectKind::Door, color: Some(Color::Grey) },
        };
        assert_eq!(parse(&q.tokens()), Ok(q));
    }
}
