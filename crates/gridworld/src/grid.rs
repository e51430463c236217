use crate::env::{Env, EnvError, PrivilegedState, Step};
use crate::world::{Color, ObjectKind, WorldObject, WorldSnapshot};
use std::str::FromStr;
use thiserror::Error;

/// Channels per observed cell: kind, colour, door-open, out-of-bounds.
pub const CELL_CHANNELS: usize = 4;
pub const DEFAULT_VIEW_RADIUS: usize = 2;
const MAX_SIDE: usize = 64;

/// Movement actions, in action-index order.
pub const ACTIONS: [&str; 4] = ["north", "south", "east", "west"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown environment identifier `{0}`")]
pub struct ParseEnvIdError(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Layout {
    /// Agent top-left, goal bottom-right.
    Empty,
    /// Agent top-left, goal anywhere else.
    EmptyRandomGoal,
    /// Random agent and goal plus coloured keys, balls, boxes and doors.
    Objects,
}

/// A parsed environment identifier such as `Grid-Objects-6x6`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridSpec {
    pub layout: Layout,
    pub width: usize,
    pub height: usize,
    pub view_radius: usize,
}

impl GridSpec {
    #[must_use]
    pub fn with_view_radius(mut self, view_radius: usize) -> Self {
        self.view_radius = view_radius;
        self
    }

    pub fn max_steps(&self) -> usize {
        4 * self.width * self.height
    }

    pub fn obs_size(&self) -> usize {
        let side = 2 * self.view_radius + 1;
        side * side * CELL_CHANNELS + 2
    }
}

impl FromStr for GridSpec {
    type Err = ParseEnvIdError;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        let err = || ParseEnvIdError(id.to_string());
        let rest = id.strip_prefix("Grid-").ok_or_else(err)?;
        let (layout, dims) = if let Some(d) = rest.strip_prefix("Empty-Random-") {
            (Layout::EmptyRandomGoal, d)
        } else if let Some(d) = rest.strip_prefix("Empty-") {
            (Layout::Empty, d)
        } else if let Some(d) = rest.strip_prefix("Objects-") {
            (Layout::Objects, d)
        } else {
            return Err(err());
        };
        let (w, h) = dims.split_once('x').ok_or_else(err)?;
        let width: usize = w.parse().map_err(|_| err())?;
        let height: usize = h.parse().map_err(|_| err())?;
        if width == 0 || height == 0 || width > MAX_SIDE || height > MAX_SIDE {
            return Err(err());
        }
        if width * height < 2 {
            return Err(err());
        }
        Ok(Self { layout, width, height, view_radius: DEFAULT_VIEW_RADIUS })
    }
}

/// A small fully-passable grid with a goal cell and optional coloured objects.
///
/// Reaching the goal ends the episode with reward `1 - 0.9 * steps / max_steps`;
/// running out of steps ends it with zero.
pub struct GridWorld {
    spec: GridSpec,
    rng: fastrand::Rng,
    agent: (usize, usize),
    objects: Vec<WorldObject>,
    steps: usize,
    done: bool,
}

impl GridWorld {
    pub fn new(spec: GridSpec, seed: u64) -> Self {
        let mut world = Self {
            spec,
            rng: fastrand::Rng::with_seed(seed),
            agent: (0, 0),
            objects: Vec::new(),
            steps: 0,
            done: false,
        };
        world.place();
        world
    }

    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    fn free_cell(&mut self) -> Option<(usize, usize)> {
        let free: Vec<(usize, usize)> = (0..self.spec.height)
            .flat_map(|y| (0..self.spec.width).map(move |x| (x, y)))
            .filter(|&p| p != self.agent && self.objects.iter().all(|o| o.pos != p))
            .collect();
        (!free.is_empty()).then(|| free[self.rng.usize(..free.len())])
    }

    fn place(&mut self) {
        self.objects.clear();
        self.steps = 0;
        self.done = false;
        let (w, h) = (self.spec.width, self.spec.height);
        let goal = |pos| WorldObject {
            kind: ObjectKind::Goal,
            color: Color::Green,
            pos,
            open: false,
        };

        match self.spec.layout {
            Layout::Empty => {
                self.agent = (0, 0);
                self.objects.push(goal((w - 1, h - 1)));
            }
            Layout::EmptyRandomGoal => {
                self.agent = (0, 0);
                if let Some(pos) = self.free_cell() {
                    self.objects.push(goal(pos));
                }
            }
            Layout::Objects => {
                self.agent = (self.rng.usize(..w), self.rng.usize(..h));
                if let Some(pos) = self.free_cell() {
                    self.objects.push(goal(pos));
                }
                let others = [ObjectKind::Door, ObjectKind::Key, ObjectKind::Ball, ObjectKind::Box];
                for _ in 0..w.max(h) / 2 {
                    let Some(pos) = self.free_cell() else {
                        break;
                    };
                    let kind = others[self.rng.usize(..others.len())];
                    let color = Color::ALL[self.rng.usize(..Color::COUNT)];
                    let open = kind == ObjectKind::Door && self.rng.bool();
                    self.objects.push(WorldObject { kind, color, pos, open });
                }
            }
        }
        tracing::trace!(agent = ?self.agent, objects = self.objects.len(), "grid placed");
    }

    fn observe(&self) -> Vec<f32> {
        let r = self.spec.view_radius as isize;
        let mut obs = Vec::with_capacity(self.spec.obs_size());
        for dy in -r..=r {
            for dx in -r..=r {
                let x = self.agent.0 as isize + dx;
                let y = self.agent.1 as isize + dy;
                let (w, h) = (self.spec.width as isize, self.spec.height as isize);
                if x < 0 || y < 0 || x >= w || y >= h {
                    obs.extend_from_slice(&[0.0, 0.0, 0.0, 1.0]);
                    continue;
                }
                match self.objects.iter().find(|o| o.pos == (x as usize, y as usize)) {
                    Some(o) => obs.extend_from_slice(&[
                        (o.kind.index() + 1) as f32 / ObjectKind::COUNT as f32,
                        (o.color.index() + 1) as f32 / Color::COUNT as f32,
                        f32::from(u8::from(o.open)),
                        0.0,
                    ]),
                    None => obs.extend_from_slice(&[0.0; CELL_CHANNELS]),
                }
            }
        }
        let norm = |v: usize, side: usize| {
            if side > 1 {
                v as f32 / (side - 1) as f32
            } else {
                0.0
            }
        };
        obs.push(norm(self.agent.0, self.spec.width));
        obs.push(norm(self.agent.1, self.spec.height));
        obs
    }
}

impl Env for GridWorld {
    fn step(&mut self, action: usize) -> Result<Step, EnvError> {
        if self.done {
            return Err(EnvError::EpisodeFinished);
        }
        let (x, y) = self.agent;
        self.agent = match action {
            0 => (x, y.saturating_sub(1)),
            1 => (x, (y + 1).min(self.spec.height - 1)),
            2 => ((x + 1).min(self.spec.width - 1), y),
            3 => (x.saturating_sub(1), y),
            _ => return Err(EnvError::InvalidAction { action, n_actions: ACTIONS.len() }),
        };
        self.steps += 1;

        let on_goal = self
            .objects
            .iter()
            .any(|o| o.kind == ObjectKind::Goal && o.pos == self.agent);
        let max_steps = self.spec.max_steps();
        let reward = if on_goal { 1.0 - 0.9 * (self.steps as f32 / max_steps as f32) } else { 0.0 };
        self.done = on_goal || self.steps >= max_steps;
        Ok(Step { obs: self.observe(), reward, done: self.done })
    }

    fn reset(&mut self) -> Vec<f32> {
        self.place();
        self.observe()
    }

    fn obs_size(&self) -> usize {
        self.spec.obs_size()
    }

    fn action_size(&self) -> usize {
        ACTIONS.len()
    }
}

impl PrivilegedState for GridWorld {
    fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            width: self.spec.width,
            height: self.spec.height,
            agent: self.agent,
            objects: self.objects.clone(),
        }
    }
}
