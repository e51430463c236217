#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Goal,
    Door,
    Key,
    Ball,
    Box,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 5] = [Self::Goal, Self::Door, Self::Key, Self::Ball, Self::Box];
    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Goal => "goal",
            Self::Door => "door",
            Self::Key => "key",
            Self::Ball => "ball",
            Self::Box => "box",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    Red,
    Green,
    Blue,
    Purple,
    Yellow,
    Grey,
}

impl Color {
    pub const ALL: [Color; 6] = [
        Self::Red,
        Self::Green,
        Self::Blue,
        Self::Purple,
        Self::Yellow,
        Self::Grey,
    ];
    pub const COUNT: usize = Self::ALL.len();

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Purple => "purple",
            Self::Yellow => "yellow",
            Self::Grey => "grey",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldObject {
    pub kind: ObjectKind,
    pub color: Color,
    /// `(x, y)` with `y` growing southwards.
    pub pos: (usize, usize),
    /// Only meaningful for doors.
    pub open: bool,
}

/// Ground-truth state of one episode at one step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorldSnapshot {
    pub width: usize,
    pub height: usize,
    pub agent: (usize, usize),
    pub objects: Vec<WorldObject>,
}

impl WorldSnapshot {
    pub fn object_at(&self, pos: (usize, usize)) -> Option<&WorldObject> {
        self.objects.iter().find(|o| o.pos == pos)
    }

    pub fn distance_to_agent(&self, pos: (usize, usize)) -> usize {
        self.agent.0.abs_diff(pos.0) + self.agent.1.abs_diff(pos.1)
    }
}
