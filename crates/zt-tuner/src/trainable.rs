//! The trainable process abstraction and its lifecycle callbacks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use zt_types::{ParameterValue, ZtResult};

/// Lifecycle hook injected into the trainable before a run. The tuner only
/// builds and hands these over; interpreting them is up to the trainable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Callback {
    /// Keep a checkpoint of the model at `filepath`.
    ModelCheckpoint {
        filepath: String,
        monitor: String,
        save_best_only: bool,
    },
    /// Stop training when `monitor` stops improving.
    EarlyStopping { monitor: String, patience: u32 },
    /// Scale the learning rate by `factor` when `monitor` plateaus.
    ReduceLrOnPlateau {
        monitor: String,
        factor: f64,
        patience: u32,
        min_lr: f64,
    },
}

/// Settings for the learning-rate reduction hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReduceLrConfig {
    pub factor: f64,
    pub patience: u32,
    pub min_lr: f64,
}

impl Default for ReduceLrConfig {
    fn default() -> Self {
        Self {
            factor: 0.5,
            patience: 6,
            min_lr: 0.0001,
        }
    }
}

/// Which callbacks are built for every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackConfig {
    /// Metric watched by every hook.
    pub monitor: String,
    pub checkpoint: bool,
    /// `None` disables early stopping.
    pub early_stopping_patience: Option<u32>,
    /// `None` disables learning-rate reduction.
    pub reduce_lr: Option<ReduceLrConfig>,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            monitor: "val_loss".to_string(),
            checkpoint: true,
            early_stopping_patience: Some(24),
            reduce_lr: Some(ReduceLrConfig::default()),
        }
    }
}

impl CallbackConfig {
    /// No callbacks at all.
    pub fn none() -> Self {
        Self {
            checkpoint: false,
            early_stopping_patience: None,
            reduce_lr: None,
            ..Self::default()
        }
    }

    /// Fresh callbacks for one run; checkpoints land in `save_path/run_id`.
    pub fn build(&self, save_path: &Path, run_id: &str) -> Vec<Callback> {
        let mut callbacks = Vec::new();

        if self.checkpoint {
            callbacks.push(Callback::ModelCheckpoint {
                filepath: save_path.join(run_id).to_string_lossy().into_owned(),
                monitor: self.monitor.clone(),
                save_best_only: true,
            });
        }
        if let Some(patience) = self.early_stopping_patience {
            callbacks.push(Callback::EarlyStopping {
                monitor: self.monitor.clone(),
                patience,
            });
        }
        if let Some(reduce) = &self.reduce_lr {
            callbacks.push(Callback::ReduceLrOnPlateau {
                monitor: self.monitor.clone(),
                factor: reduce.factor,
                patience: reduce.patience,
                min_lr: reduce.min_lr,
            });
        }

        callbacks
    }
}

/// The external process whose hyperparameters are being tuned.
pub trait Trainable {
    /// Run one trial with the given parameters and return its score
    /// (higher is better).
    fn run(&mut self, params: &HashMap<String, ParameterValue>, run_id: &str) -> ZtResult<f64>;

    /// Persist the model produced by run `run_id`.
    fn save(&mut self, run_id: &str) -> ZtResult<()>;

    /// Replace the callbacks used by subsequent runs.
    fn set_callbacks(&mut self, callbacks: Vec<Callback>);
}
