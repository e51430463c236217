#![allow(dead_code)]

use gridworld::GridWorld;
use oracle::OracleEnv;
use rl::{Config, NoopLogger, Phase, PpoTrainer, RecurrentEncoder};

/// Small networks and batches so tests stay quick.
pub fn small_config() -> Config {
    Config {
        train_env_name: "Grid-Objects-5x5".into(),
        hidden_dim: 16,
        memory_dim: 8,
        slot_dim: 4,
        word_embed_dim: 8,
        encoder_hidden: 8,
        corrupted_questions: 8,
        minibatch_size: 32,
        epochs: 2,
        ..Config::default()
    }
}

pub fn setup(config: &Config) -> (PpoTrainer, OracleEnv<GridWorld>) {
    let env = config.make_env(Phase::Train).unwrap();
    let mut rng = fastrand::Rng::with_seed(config.seed);
    let encoder = RecurrentEncoder::random(config.word_embed_dim, config.encoder_hidden, &mut rng);
    let trainer = PpoTrainer::from_config(
        config,
        env.obs_size(),
        env.action_size(),
        &encoder,
        Box::new(NoopLogger),
    );
    (trainer, env)
}

pub fn mean(values: &[f32]) -> f32 {
    values.iter().sum::<f32>() / values.len().max(1) as f32
}
