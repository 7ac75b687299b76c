use anyhow::Context;
use tracing_subscriber::EnvFilter;

use zt_tuner::{CommandTrainable, Tuner, TunerConfig};

const DEFAULT_MAX_TRIALS: usize = 100;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("ZOOMTUNE_CONFIG").ok())
        .context("usage: zt-tune <config.json> (or set ZOOMTUNE_CONFIG)")?;

    let config = TunerConfig::from_json_file(&path)
        .with_context(|| format!("failed to load tuner config from {path}"))?;
    let argv = config
        .command
        .clone()
        .context("config has no `command` to run for each trial")?;
    let trainable = CommandTrainable::new(argv)?.with_save_command(config.save_command.clone());
    let max_trials = config.max_trials.unwrap_or(DEFAULT_MAX_TRIALS);

    let mut tuner = Tuner::resume(config, trainable)?;
    let summary = tuner.tune(|n| n >= max_trials)?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
