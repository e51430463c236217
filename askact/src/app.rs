//! Application wiring for the `askact` binary.
//!
//! A run trains on the train grid, keeps learning on the (usually larger)
//! test grid with the test-phase answer reward, and saves the final agent.

use anyhow::{ensure, Context, Result};
use rl::{
    agent, Config, LanguageEncoder, MetricsLogger, NoopLogger, Phase, PpoTrainer, RecurrentEncoder,
    TracingLogger,
};
use std::path::{Path, PathBuf};
use tracing::info;

pub struct RunSummary {
    pub train_rewards: Vec<f32>,
    pub test_rewards: Vec<f32>,
    pub checkpoint: PathBuf,
}

pub fn run(config: &Config) -> Result<RunSummary> {
    config.validate().context("invalid configuration")?;
    let encoder = load_encoder(config)?;

    let mut train_env = config.make_env(Phase::Train)?;
    let logger: Box<dyn MetricsLogger> = if config.log_metrics {
        Box::new(TracingLogger::new(&config.run_name))
    } else {
        Box::new(NoopLogger)
    };
    let mut trainer = PpoTrainer::from_config(
        config,
        train_env.obs_size(),
        train_env.action_size(),
        &encoder,
        logger,
    );
    info!(
        run = %config.run_name,
        env = %config.train_env_name,
        episodes = config.train_episodes,
        policy = %trainer.policy().kind(),
        "train phase"
    );
    let train_rewards = trainer.train(&mut train_env, config.train_episodes)?;

    let test_rewards = if config.test_episodes > 0 {
        let mut test_env = config.make_env(Phase::Test)?;
        ensure!(
            test_env.obs_size() == train_env.obs_size(),
            "train and test observations differ in size ({} vs {})",
            train_env.obs_size(),
            test_env.obs_size()
        );
        info!(env = %config.test_env_name, episodes = config.test_episodes, "test phase");
        trainer.train(&mut test_env, config.test_episodes)?
    } else {
        Vec::new()
    };

    let checkpoint = agent::save(trainer.policy(), &config.checkpoint_dir, &config.run_name)?;
    info!(
        run = %config.run_name,
        train_tail = tail_mean(&train_rewards),
        test_tail = tail_mean(&test_rewards),
        "run finished"
    );
    Ok(RunSummary { train_rewards, test_rewards, checkpoint })
}

pub fn export_encoder(config: &Config, out: &Path) -> Result<()> {
    let encoder = random_encoder(config);
    encoder.save(out).with_context(|| format!("writing encoder to {}", out.display()))?;
    info!(path = %out.display(), dim = encoder.embed_dim(), "encoder exported");
    Ok(())
}

fn load_encoder(config: &Config) -> Result<RecurrentEncoder> {
    match &config.encoder_path {
        Some(path) => Ok(RecurrentEncoder::load(
            path,
            config.word_embed_dim,
            config.encoder_hidden,
        )?),
        None => Ok(random_encoder(config)),
    }
}

fn random_encoder(config: &Config) -> RecurrentEncoder {
    let mut rng = fastrand::Rng::with_seed(config.seed);
    RecurrentEncoder::random(config.word_embed_dim, config.encoder_hidden, &mut rng)
}

/// Mean reward over the last hundred episodes.
fn tail_mean(rewards: &[f32]) -> f32 {
    let tail = &rewards[rewards.len().saturating_sub(100)..];
    if tail.is_empty() {
        0.0
    } else {
        tail.iter().sum::<f32>() / tail.len() as f32
    }
}
