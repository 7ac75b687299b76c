//! Tuning session configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use zt_search::StrategyConfig;
use zt_types::{SearchSpace, ZtResult};

use crate::trainable::CallbackConfig;

/// Top-level configuration for a tuning session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunerConfig {
    /// Prefix for run identifiers and persisted files.
    pub name: String,

    /// Directory receiving the trial log, CSV export and checkpoints.
    pub save_path: PathBuf,

    /// The parameters to tune, in canonical order.
    pub parameters: SearchSpace,

    /// The single active search strategy.
    #[serde(default)]
    pub strategy: StrategyConfig,

    /// Ask the trainable to save its model after every trial.
    #[serde(default)]
    pub save_model: bool,

    /// Seed for reproducible sampling.
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub callbacks: CallbackConfig,

    /// Trial budget used by the `zt-tune` binary.
    #[serde(default)]
    pub max_trials: Option<usize>,

    /// Program run for each trial by the `zt-tune` binary.
    #[serde(default)]
    pub command: Option<Vec<String>>,

    /// Program run to save a model by the `zt-tune` binary.
    #[serde(default)]
    pub save_command: Option<Vec<String>>,
}

impl TunerConfig {
    pub fn new(name: impl Into<String>, save_path: impl Into<PathBuf>, parameters: SearchSpace) -> Self {
        Self {
            name: name.into(),
            save_path: save_path.into(),
            parameters,
            strategy: StrategyConfig::Uniform,
            save_model: false,
            seed: None,
            callbacks: CallbackConfig::default(),
            max_trials: None,
            command: None,
            save_command: None,
        }
    }

    pub fn with_strategy(mut self, strategy: StrategyConfig) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_save_model(mut self, save_model: bool) -> Self {
        self.save_model = save_model;
        self
    }

    pub fn with_callbacks(mut self, callbacks: CallbackConfig) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn with_max_trials(mut self, n: usize) -> Self {
        self.max_trials = Some(n);
        self
    }

    pub fn from_json_str(text: &str) -> ZtResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ZtResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
