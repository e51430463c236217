//! Run configuration.
//!
//! A [`Config`] is built once (defaults, then an optional JSON file, then
//! command-line overrides), checked with [`Config::validate`] and passed by
//! shared reference from then on.

use crate::error::ConfigError;
use gridworld::{GridSpec, GridWorld};
use oracle::{Oracle, OracleEnv, ShapingRewards};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Where the question stream bootstraps its value estimates from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QaBaseline {
    /// A dedicated QA value head trained on question returns.
    #[default]
    Separate,
    /// The action value head.
    Shared,
}

impl FromStr for QaBaseline {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "separate" => Ok(Self::Separate),
            "shared" => Ok(Self::Shared),
            other => Err(format!("unknown qa baseline `{other}`, expected `separate` or `shared`")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Train,
    Test,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub run_name: String,
    pub train_env_name: String,
    pub test_env_name: String,
    pub train_episodes: usize,
    pub test_episodes: usize,
    pub seed: u64,

    // network
    pub hidden_dim: usize,
    pub memory_dim: usize,
    pub slot_dim: usize,
    pub word_embed_dim: usize,
    pub encoder_hidden: usize,
    pub encoder_path: Option<PathBuf>,
    pub view_radius: usize,
    pub use_mem: bool,
    pub exp_mem: bool,
    pub baseline: bool,

    // ppo
    pub lr: f32,
    pub gamma: f32,
    pub lmbda: f32,
    pub clip: f32,
    pub episodes_per_update: usize,
    pub epochs: usize,
    pub minibatch_size: usize,
    pub max_grad_norm: f32,
    pub normalize_advantages: bool,
    pub value_param: f32,
    pub entropy_act_param: f32,
    pub policy_qa_param: f32,
    pub advantage_qa_param: f32,
    pub entropy_qa_param: f32,
    pub qa_baseline: QaBaseline,

    // oracle
    pub ans_random: bool,
    pub corrupted_questions: usize,
    pub defined_q_reward: f32,
    pub defined_q_reward_test: f32,
    pub syntax_error_reward: f32,
    pub undefined_error_reward: f32,

    // output
    pub train_log_interval: usize,
    pub log_questions: bool,
    pub log_metrics: bool,
    pub checkpoint_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            run_name: "agent".into(),
            train_env_name: "Grid-Objects-6x6".into(),
            test_env_name: "Grid-Objects-8x8".into(),
            train_episodes: 1000,
            test_episodes: 200,
            seed: 1,
            hidden_dim: 32,
            memory_dim: 32,
            slot_dim: 16,
            word_embed_dim: 32,
            encoder_hidden: 32,
            encoder_path: None,
            view_radius: gridworld::grid::DEFAULT_VIEW_RADIUS,
            use_mem: true,
            exp_mem: true,
            baseline: false,
            lr: 5e-4,
            gamma: 0.99,
            lmbda: 0.95,
            clip: 0.2,
            episodes_per_update: 1,
            epochs: 4,
            minibatch_size: 64,
            max_grad_norm: 0.5,
            normalize_advantages: true,
            value_param: 1.0,
            entropy_act_param: 0.1,
            policy_qa_param: 0.25,
            advantage_qa_param: 0.25,
            entropy_qa_param: 0.05,
            qa_baseline: QaBaseline::Separate,
            ans_random: false,
            corrupted_questions: 32,
            defined_q_reward: 0.2,
            defined_q_reward_test: 0.0,
            syntax_error_reward: -0.2,
            undefined_error_reward: 0.0,
            train_log_interval: 3,
            log_questions: false,
            log_metrics: false,
            checkpoint_dir: PathBuf::from("checkpoints"),
        }
    }
}

impl Config {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Checks everything that would otherwise fail mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.train_spec()?;
        if self.test_episodes > 0 {
            self.test_spec()?;
        }
        if let Some(path) = &self.encoder_path {
            if !path.is_file() {
                return Err(ConfigError::MissingEncoder(path.clone()));
            }
        }
        if self.run_name.trim().is_empty() {
            return Err(invalid("run_name", "must not be empty"));
        }
        for (field, v) in [("gamma", self.gamma), ("lmbda", self.lmbda)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(invalid(field, format!("{v} is outside [0, 1]")));
            }
        }
        for (field, v) in [
            ("lr", self.lr),
            ("clip", self.clip),
            ("max_grad_norm", self.max_grad_norm),
        ] {
            if !(v > 0.0 && v.is_finite()) {
                return Err(invalid(field, format!("{v} must be positive")));
            }
        }
        for (field, v) in [
            ("value_param", self.value_param),
            ("entropy_act_param", self.entropy_act_param),
            ("policy_qa_param", self.policy_qa_param),
            ("advantage_qa_param", self.advantage_qa_param),
            ("entropy_qa_param", self.entropy_qa_param),
        ] {
            if !(v >= 0.0 && v.is_finite()) {
                return Err(invalid(field, format!("{v} must be non-negative")));
            }
        }
        for (field, v) in [
            ("episodes_per_update", self.episodes_per_update),
            ("epochs", self.epochs),
            ("minibatch_size", self.minibatch_size),
            ("hidden_dim", self.hidden_dim),
            ("memory_dim", self.memory_dim),
            ("slot_dim", self.slot_dim),
            ("word_embed_dim", self.word_embed_dim),
            ("encoder_hidden", self.encoder_hidden),
            ("train_log_interval", self.train_log_interval),
        ] {
            if v == 0 {
                return Err(invalid(field, "must be at least 1"));
            }
        }
        Ok(())
    }

    pub fn train_spec(&self) -> Result<GridSpec, ConfigError> {
        Ok(self.train_env_name.parse::<GridSpec>()?.with_view_radius(self.view_radius))
    }

    pub fn test_spec(&self) -> Result<GridSpec, ConfigError> {
        Ok(self.test_env_name.parse::<GridSpec>()?.with_view_radius(self.view_radius))
    }

    /// The oracle-wrapped grid for `phase`, seeded from the run seed.
    pub fn make_env(&self, phase: Phase) -> Result<OracleEnv<GridWorld>, ConfigError> {
        let (spec, seed) = match phase {
            Phase::Train => (self.train_spec()?, self.seed),
            Phase::Test => (self.test_spec()?, self.seed.wrapping_add(1)),
        };
        let oracle = if self.ans_random {
            Oracle::random(seed.wrapping_mul(31))
        } else {
            Oracle::truthful()
        };
        Ok(OracleEnv::new(GridWorld::new(spec, seed), oracle, self.shaping(phase)))
    }

    pub fn shaping(&self, phase: Phase) -> ShapingRewards {
        let defined = match phase {
            Phase::Train => self.defined_q_reward,
            Phase::Test => self.defined_q_reward_test,
        };
        ShapingRewards {
            defined,
            syntax_error: self.syntax_error_reward,
            undefined_error: self.undefined_error_reward,
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field, reason: reason.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn unknown_env_is_fatal() {
        let cfg = Config { train_env_name: "MiniGrid-Lava-5x5".into(), ..Config::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::UnknownEnv(_))));
    }

    #[test]
    fn test_env_checked_only_when_used() {
        let cfg = Config { test_env_name: "nope".into(), test_episodes: 0, ..Config::default() };
        cfg.validate().unwrap();
    }

    #[test]
    fn missing_encoder_is_fatal() {
        let cfg = Config {
            encoder_path: Some("/definitely/not/here.ckpt".into()),
            ..Config::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::MissingEncoder(_))));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let cfg = Config { gamma: 1.5, ..Config::default() };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { field: "gamma", .. })));
        let cfg = Config { minibatch_size: 0, ..Config::default() };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid { field: "minibatch_size", .. })
        ));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{"run_name": "mem", "qa_baseline": "shared", "lr": 0.001}"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.run_name, "mem");
        assert_eq!(cfg.qa_baseline, QaBaseline::Shared);
        assert_eq!(cfg.gamma, Config::default().gamma);
    }

    #[test]
    fn test_phase_uses_its_own_answer_reward() {
        let cfg = Config::default();
        assert_eq!(cfg.shaping(Phase::Train).defined, 0.2);
        assert_eq!(cfg.shaping(Phase::Test).defined, 0.0);
        assert_eq!(cfg.shaping(Phase::Test).syntax_error, -0.2);
    }
}
