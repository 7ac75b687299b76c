//! Trainable backed by an external program.

use std::collections::HashMap;
use std::process::{Command, Stdio};
use tracing::{debug, info};

use zt_types::{ConfigError, ParameterValue, ZtError, ZtResult};

use crate::trainable::{Callback, Trainable};

pub const PARAMS_ENV: &str = "ZOOMTUNE_PARAMS";
pub const RUN_ID_ENV: &str = "ZOOMTUNE_RUN_ID";
pub const CALLBACKS_ENV: &str = "ZOOMTUNE_CALLBACKS";

/// Runs one process per trial.
///
/// Parameters are passed as a JSON object in `ZOOMTUNE_PARAMS`, the run id
/// in `ZOOMTUNE_RUN_ID` and the callbacks as a JSON array in
/// `ZOOMTUNE_CALLBACKS`. The last non-empty line the process prints on
/// stdout is read as the score.
#[derive(Debug, Clone)]
pub struct CommandTrainable {
    argv: Vec<String>,
    save_argv: Option<Vec<String>>,
    callbacks: Vec<Callback>,
}

impl CommandTrainable {
    pub fn new(argv: Vec<String>) -> Result<Self, ConfigError> {
        if argv.is_empty() {
            return Err(ConfigError::EmptyCommand);
        }
        Ok(Self {
            argv,
            save_argv: None,
            callbacks: Vec::new(),
        })
    }

    /// Program run by [`Trainable::save`]; without one saving is a no-op.
    pub fn with_save_command(mut self, argv: Option<Vec<String>>) -> Self {
        self.save_argv = argv.filter(|a| !a.is_empty());
        self
    }

    pub fn callbacks(&self) -> &[Callback] {
        &self.callbacks
    }

    fn command(argv: &[String], run_id: &str) -> Command {
        let mut command = Command::new(&argv[0]);
        command.args(&argv[1..]).env(RUN_ID_ENV, run_id);
        command
    }
}

fn trainable_error(run_id: &str, message: impl Into<String>) -> ZtError {
    ZtError::Trainable {
        run_id: run_id.to_string(),
        message: message.into(),
    }
}

impl Trainable for CommandTrainable {
    fn run(&mut self, params: &HashMap<String, ParameterValue>, run_id: &str) -> ZtResult<f64> {
        let output = Self::command(&self.argv, run_id)
            .env(PARAMS_ENV, serde_json::to_string(params)?)
            .env(CALLBACKS_ENV, serde_json::to_string(&self.callbacks)?)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()?;

        if !output.status.success() {
            return Err(trainable_error(
                run_id,
                format!("{} exited with {}", self.argv[0], output.status),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let last = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| trainable_error(run_id, "process printed no score"))?;
        let score = last
            .parse::<f64>()
            .map_err(|e| trainable_error(run_id, format!("cannot parse score {last:?}: {e}")))?;

        debug!(run_id, score, "trial process finished");
        Ok(score)
    }

    fn save(&mut self, run_id: &str) -> ZtResult<()> {
        let Some(argv) = &self.save_argv else {
            return Ok(());
        };

        let status = Self::command(argv, run_id).stdin(Stdio::null()).status()?;
        if !status.success() {
            return Err(trainable_error(
                run_id,
                format!("save command {} exited with {status}", argv[0]),
            ));
        }
        info!(run_id, "saved model");
        Ok(())
    }

    fn set_callbacks(&mut self, callbacks: Vec<Callback>) {
        self.callbacks = callbacks;
    }
}
