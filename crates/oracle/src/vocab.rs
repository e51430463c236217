//! Fixed word list shared by questions and answers.

use gridworld::{Color, ObjectKind};

pub type TokenId = u32;

pub const VOCAB: [&str; 24] = [
    "where", "what", "is", "the", "color", "open", // function words
    "red", "green", "blue", "purple", "yellow", "grey", // colours
    "goal", "door", "key", "ball", "box", // kinds
    "north", "south", "east", "west", "here", "yes", "no", // answers
];
pub const VOCAB_SIZE: usize = VOCAB.len();

pub const WHERE: TokenId = 0;
pub const WHAT: TokenId = 1;
pub const IS: TokenId = 2;
pub const THE: TokenId = 3;
pub const COLOR: TokenId = 4;
pub const OPEN: TokenId = 5;
pub const YES: TokenId = 22;
pub const NO: TokenId = 23;

const COLOR_BASE: usize = 6;
const KIND_BASE: usize = COLOR_BASE + Color::COUNT;
const DIRECTION_BASE: usize = KIND_BASE + ObjectKind::COUNT;

/// Compass answer to a location question; `y` grows southwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    North,
    South,
    East,
    West,
    Here,
}

impl Direction {
    pub const ALL: [Direction; 5] = [Self::North, Self::South, Self::East, Self::West, Self::Here];

    /// Dominant-axis direction of the offset `(dx, dy)`; horizontal wins ties.
    pub fn from_offset(dx: isize, dy: isize) -> Self {
        match (dx, dy) {
            (0, 0) => Self::Here,
            _ if dx.abs() >= dy.abs() => {
                if dx > 0 {
                    Self::East
                } else {
                    Self::West
                }
            }
            _ if dy > 0 => Self::South,
            _ => Self::North,
        }
    }

    pub fn token(self) -> TokenId {
        (DIRECTION_BASE + self as usize) as TokenId
    }
}

pub fn color_token(color: Color) -> TokenId {
    (COLOR_BASE + color.index()) as TokenId
}

pub fn kind_token(kind: ObjectKind) -> TokenId {
    (KIND_BASE + kind.index()) as TokenId
}

pub fn as_color(token: TokenId) -> Option<Color> {
    (token as usize).checked_sub(COLOR_BASE).and_then(|i| Color::ALL.get(i).copied())
}

pub fn as_kind(token: TokenId) -> Option<ObjectKind> {
    (token as usize).checked_sub(KIND_BASE).and_then(|i| ObjectKind::ALL.get(i).copied())
}

/// Every word an answer can be: colours, directions, yes and no.
pub fn answer_tokens() -> Vec<TokenId> {
    Color::ALL
        .iter()
        .map(|&c| color_token(c))
        .chain(Direction::ALL.iter().map(|d| d.token()))
        .chain([YES, NO])
        .collect()
}

pub fn word(token: TokenId) -> Option<&'static str> {
    VOCAB.get(token as usize).copied()
}

fn lookup(word: &str) -> Option<TokenId> {
    VOCAB.iter().position(|w| *w == word).map(|i| i as TokenId)
}

/// Space-separated words; out-of-vocabulary ids render as `<unk:ID>`.
pub fn decode(tokens: &[TokenId]) -> String {
    tokens
        .iter()
        .map(|&t| word(t).map_or_else(|| format!("<unk:{t}>"), str::to_string))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits on whitespace; `None` if any word is unknown.
pub fn encode(text: &str) -> Option<Vec<TokenId>> {
    text.split_whitespace().map(lookup).collect()
}
