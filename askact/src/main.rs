//! # askact
//!
//! Command-line entry point. Builds a [`rl::Config`] from defaults, an
//! optional JSON file and flag overrides, then hands it to [`app`].

mod app;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rl::{Config, QaBaseline};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "askact", version, about = "Train grid-world agents that ask an oracle questions")]
struct Cli {
    /// JSON config file. Missing fields keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train on the train grid, continue on the test grid, save the agent.
    Train(Overrides),
    /// Print the resolved configuration as JSON.
    ShowConfig(Overrides),
    /// Write a freshly initialised question encoder to `--out`.
    ExportEncoder {
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Args)]
struct Overrides {
    #[arg(long)]
    run_name: Option<String>,
    #[arg(long)]
    train_env: Option<String>,
    #[arg(long)]
    test_env: Option<String>,
    #[arg(long)]
    train_episodes: Option<usize>,
    #[arg(long)]
    test_episodes: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    use_mem: Option<bool>,
    #[arg(long)]
    exp_mem: Option<bool>,
    /// Never ask questions.
    #[arg(long)]
    baseline: Option<bool>,
    /// Answer with random vocabulary words instead of the truth.
    #[arg(long)]
    ans_random: Option<bool>,
    /// `separate` or `shared`.
    #[arg(long)]
    qa_baseline: Option<QaBaseline>,
    #[arg(long)]
    encoder_path: Option<PathBuf>,
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,
    #[arg(long)]
    log_questions: Option<bool>,
    #[arg(long)]
    log_metrics: Option<bool>,
}

impl Overrides {
    fn apply(self, config: &mut Config) {
        macro_rules! set {
            ($($flag:ident => $field:ident),* $(,)?) => {
                $(if let Some(v) = self.$flag { config.$field = v; })*
            };
        }
        set! {
            run_name => run_name,
            train_env => train_env_name,
            test_env => test_env_name,
            train_episodes => train_episodes,
            test_episodes => test_episodes,
            seed => seed,
            use_mem => use_mem,
            exp_mem => exp_mem,
            baseline => baseline,
            ans_random => ans_random,
            qa_baseline => qa_baseline,
            checkpoint_dir => checkpoint_dir,
            log_questions => log_questions,
            log_metrics => log_metrics,
        }
        if let Some(path) = self.encoder_path {
            config.encoder_path = Some(path);
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Command::Train(overrides) => {
            overrides.apply(&mut config);
            let summary = app::run(&config)?;
            let report = serde_json::json!({
                "run": config.run_name,
                "train_episodes": summary.train_rewards.len(),
                "test_episodes": summary.test_rewards.len(),
                "checkpoint": summary.checkpoint,
            });
            println!("{report}");
        }
        Command::ShowConfig(overrides) => {
            overrides.apply(&mut config);
            config.validate()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Command::ExportEncoder { out } => app::export_encoder(&config, &out)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_the_file_config() {
        let cli = Cli::try_parse_from([
            "askact",
            "train",
            "--run-name",
            "mem",
            "--exp-mem",
            "false",
            "--qa-baseline",
            "shared",
            "--train-episodes",
            "5",
        ])
        .unwrap();
        let Command::Train(overrides) = cli.command else { panic!("expected train") };
        let mut config = Config::default();
        overrides.apply(&mut config);
        assert_eq!(config.run_name, "mem");
        assert!(!config.exp_mem);
        assert!(config.use_mem);
        assert_eq!(config.qa_baseline, QaBaseline::Shared);
        assert_eq!(config.train_episodes, 5);
        assert_eq!(config.test_env_name, Config::default().test_env_name);
    }

    #[test]
    fn unknown_qa_baseline_is_rejected() {
        assert!(Cli::try_parse_from(["askact", "train", "--qa-baseline", "both"]).is_err());
    }
}
