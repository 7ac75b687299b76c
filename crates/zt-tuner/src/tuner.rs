//! The tuning loop.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use zt_search::{RescalerSet, SearchStrategy, TrialId, TrialLog};
use zt_types::{LogError, ParameterValue, ZtResult};

use crate::config::TunerConfig;
use crate::store::TrialStore;
use crate::trainable::Trainable;

/// The best trial seen so far.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestTrial {
    pub trial: TrialId,
    pub score: f64,
    pub params: HashMap<String, ParameterValue>,
}

/// Outcome of one call to [`Tuner::tune`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TuningSummary {
    pub session: Uuid,
    /// Trials run by this call.
    pub trials_run: usize,
    /// Rows in the log, including resumed ones.
    pub total_trials: usize,
    pub best: Option<BestTrial>,
}

/// Drives a trainable with suggestions from one search strategy.
pub struct Tuner<T: Trainable> {
    id: Uuid,
    config: TunerConfig,
    trainable: T,
    strategy: Box<dyn SearchStrategy>,
    log: TrialLog,
    store: TrialStore,
}

impl<T: Trainable> Tuner<T> {
    /// Validate the configuration and build the strategy over a fresh log.
    pub fn new(config: TunerConfig, trainable: T) -> ZtResult<Self> {
        let rescalers = Arc::new(RescalerSet::from_space(&config.parameters)?);
        let strategy = config.strategy.build(Arc::clone(&rescalers), config.seed)?;
        let log = TrialLog::new(rescalers.names().to_vec());
        let store = TrialStore::new(&config.save_path, config.name.clone())?;
        let id = Uuid::new_v4();

        info!(
            session = %id,
            tuner = %config.name,
            strategy = strategy.name(),
            parameters = rescalers.len(),
            "tuner created"
        );

        Ok(Self {
            id,
            config,
            trainable,
            strategy,
            log,
            store,
        })
    }

    /// Build a tuner and continue from the snapshot in `save_path`, if any.
    pub fn resume(config: TunerConfig, trainable: T) -> ZtResult<Self> {
        let tuner = Self::new(config, trainable)?;
        if !tuner.store.has_snapshot() {
            return Ok(tuner);
        }

        let log = tuner.store.load()?;
        info!(session = %tuner.id, trials = log.len(), "resuming from saved trials");
        tuner.with_log(log)
    }

    /// Continue from an existing log with the same parameter columns.
    pub fn with_log(mut self, log: TrialLog) -> ZtResult<Self> {
        if log.names() != self.log.names() {
            return Err(LogError::ColumnMismatch {
                expected: self.log.names().to_vec(),
                found: log.names().to_vec(),
            }
            .into());
        }
        self.log = log;
        Ok(self)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    pub fn log(&self) -> &TrialLog {
        &self.log
    }

    pub fn trainable(&self) -> &T {
        &self.trainable
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Run trials until `stop(trials_run)` returns true.
    ///
    /// The predicate is checked before every trial with the number of trials
    /// this call has run so far. The log is persisted after every trial.
    pub fn tune<F>(&mut self, mut stop: F) -> ZtResult<TuningSummary>
    where
        F: FnMut(usize) -> bool,
    {
        let mut trials_run = 0;

        while !stop(trials_run) {
            let suggestion = self.strategy.suggest(&mut self.log)?;
            let run_id = format!("{}_param_{}", self.config.name, self.log.len());

            self.trainable
                .set_callbacks(self.config.callbacks.build(&self.config.save_path, &run_id));

            info!(session = %self.id, run_id = %run_id, trial = %suggestion.trial, "starting trial");
            let mut score = self.trainable.run(&suggestion.params, &run_id)?;
            if !score.is_finite() {
                warn!(run_id = %run_id, score, "non-finite score recorded as the lowest value");
                score = f64::MIN;
            }
            info!(session = %self.id, run_id = %run_id, score, "finished trial");

            self.log.log_score(score, Some(suggestion.trial))?;
            self.store.save(&self.log)?;
            if self.config.save_model {
                self.trainable.save(&run_id)?;
            }
            self.store.record_time(self.log.len())?;

            trials_run += 1;
        }

        Ok(self.summary(trials_run))
    }

    fn summary(&self, trials_run: usize) -> TuningSummary {
        let best = self.log.best().map(|trial| BestTrial {
            trial,
            score: self.log.scores()[trial.index()],
            params: self
                .log
                .names()
                .iter()
                .cloned()
                .zip(self.log.actual_params()[trial.index()].iter().cloned())
                .collect(),
        });

        TuningSummary {
            session: self.id,
            trials_run,
            total_trials: self.log.len(),
            best,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trainable::{Callback, CallbackConfig};
    use tempfile::tempdir;
    use zt_search::{StrategyConfig, ZoomOptions};
    use zt_types::{SearchSpace, ZtError};

    /// Scores a trial by how close `x` is to 0.3.
    #[derive(Default)]
    struct Quadratic {
        runs: Vec<String>,
        saved: Vec<String>,
        callbacks: Vec<Vec<Callback>>,
    }

    impl Trainable for Quadratic {
        fn run(&mut self, params: &HashMap<String, ParameterValue>, run_id: &str) -> ZtResult<f64> {
            self.runs.push(run_id.to_string());
            let x = params["x"].as_f64().unwrap_or_default();
            Ok(-(x - 0.3).powi(2))
        }

        fn save(&mut self, run_id: &str) -> ZtResult<()> {
            self.saved.push(run_id.to_string());
            Ok(())
        }

        fn set_callbacks(&mut self, callbacks: Vec<Callback>) {
            self.callbacks.push(callbacks);
        }
    }

    fn space() -> SearchSpace {
        SearchSpace::new()
            .add_double("x", 0.0, 1.0)
            .add_integer("units", 10, 100)
            .add_discrete("opt", vec!["adam".into(), "sgd".into()])
    }

    fn config(dir: &std::path::Path) -> TunerConfig {
        TunerConfig::new("demo", dir, space()).with_seed(5)
    }

    #[test]
    fn test_uniform_tuning_runs_until_stopped() {
        let temp_dir = tempdir().unwrap();
        let mut tuner = Tuner::new(config(temp_dir.path()), Quadratic::default()).unwrap();
        assert_eq!(tuner.strategy_name(), "uniform");

        let summary = tuner.tune(|n| n >= 5).unwrap();
        assert_eq!(summary.trials_run, 5);
        assert_eq!(summary.total_trials, 5);
        assert_eq!(summary.session, tuner.id());
        assert_eq!(
            tuner.trainable().runs,
            vec!["demo_param_1", "demo_param_2", "demo_param_3", "demo_param_4", "demo_param_5"]
        );
        assert!(tuner.trainable().saved.is_empty());
        assert!((0..5).all(|i| tuner.log().is_scored(TrialId(i))));

        let best = summary.best.unwrap();
        let max = tuner
            .log()
            .scores()
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(best.score, max);
        assert_eq!(best.params.len(), 3);
    }

    #[test]
    fn test_callbacks_and_model_save_per_run() {
        let temp_dir = tempdir().unwrap();
        let mut tuner = Tuner::new(
            config(temp_dir.path()).with_save_model(true),
            Quadratic::default(),
        )
        .unwrap();
        tuner.tune(|n| n >= 2).unwrap();

        let trainable = tuner.trainable();
        assert_eq!(trainable.saved, vec!["demo_param_1", "demo_param_2"]);
        assert_eq!(trainable.callbacks.len(), 2);
        assert_eq!(
            trainable.callbacks[1][0],
            Callback::ModelCheckpoint {
                filepath: temp_dir
                    .path()
                    .join("demo_param_2")
                    .to_string_lossy()
                    .into_owned(),
                monitor: "val_loss".to_string(),
                save_best_only: true,
            }
        );
    }

    #[test]
    fn test_zoom_tuning_from_json_strategy() {
        let temp_dir = tempdir().unwrap();
        let strategy: StrategyConfig = serde_json::from_str(
            r#"{"ZoomRandomSearch": {"trials_per_zoom": 20, "n_eval_trials": 3}}"#,
        )
        .unwrap();
        assert_eq!(
            strategy,
            StrategyConfig::Zoom(ZoomOptions {
                trials_per_zoom: 20,
                eval_trials: 3
            })
        );

        let config = config(temp_dir.path())
            .with_strategy(strategy)
            .with_callbacks(CallbackConfig::none());
        let mut tuner = Tuner::new(config, Quadratic::default()).unwrap();
        assert_eq!(tuner.strategy_name(), "zoom");

        let summary = tuner.tune(|n| n > 45).unwrap();
        assert_eq!(summary.trials_run, 46);
        assert!(tuner.trainable().callbacks.iter().all(Vec::is_empty));
    }

    #[test]
    fn test_persists_after_each_trial() {
        let temp_dir = tempdir().unwrap();
        let mut tuner = Tuner::new(config(temp_dir.path()), Quadratic::default()).unwrap();
        tuner.tune(|n| n >= 3).unwrap();

        let store = TrialStore::new(temp_dir.path(), "demo").unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.scores(), tuner.log().scores());

        let csv = std::fs::read_to_string(store.csv_path()).unwrap();
        assert_eq!(csv.lines().next(), Some("x,units,opt,Score"));
        assert_eq!(csv.lines().count(), 4);

        let times = std::fs::read_to_string(store.time_log_path()).unwrap();
        assert!(times.lines().last().unwrap().starts_with("Param id 3: "));
    }

    #[test]
    fn test_resume_continues_numbering() {
        let temp_dir = tempdir().unwrap();
        let mut first = Tuner::new(config(temp_dir.path()), Quadratic::default()).unwrap();
        first.tune(|n| n >= 3).unwrap();
        let previous = first.log().unscaled_params().to_vec();

        let mut resumed = Tuner::resume(config(temp_dir.path()), Quadratic::default()).unwrap();
        assert_eq!(resumed.log().len(), 3);

        let summary = resumed.tune(|n| n >= 2).unwrap();
        assert_eq!(summary.trials_run, 2);
        assert_eq!(summary.total_trials, 5);
        assert_eq!(resumed.trainable().runs, vec!["demo_param_4", "demo_param_5"]);
        // Same seed, so the resumed run must have skipped the logged samples.
        for row in &resumed.log().unscaled_params()[3..] {
            assert!(!previous.contains(row));
        }
    }

    #[test]
    fn test_with_log_rejects_other_columns() {
        let temp_dir = tempdir().unwrap();
        let tuner = Tuner::new(config(temp_dir.path()), Quadratic::default()).unwrap();
        let other = TrialLog::new(vec!["y".to_string()]);
        assert!(matches!(
            tuner.with_log(other),
            Err(ZtError::Log(LogError::ColumnMismatch { .. }))
        ));
    }

    #[test]
    fn test_invalid_space_fails_at_construction() {
        let temp_dir = tempdir().unwrap();
        let bad = SearchSpace::new()
            .add_double("x", 0.0, 1.0)
            .add_double("x", 0.0, 2.0);
        let result = Tuner::new(TunerConfig::new("bad", temp_dir.path(), bad), Quadratic::default());
        assert!(matches!(result, Err(ZtError::Config(_))));
    }

    #[test]
    fn test_trainable_error_stops_tuning() {
        struct Failing;
        impl Trainable for Failing {
            fn run(&mut self, _: &HashMap<String, ParameterValue>, run_id: &str) -> ZtResult<f64> {
                Err(ZtError::Trainable {
                    run_id: run_id.to_string(),
                    message: "diverged".to_string(),
                })
            }
            fn save(&mut self, _: &str) -> ZtResult<()> {
                Ok(())
            }
            fn set_callbacks(&mut self, _: Vec<Callback>) {}
        }

        let temp_dir = tempdir().unwrap();
        let mut tuner = Tuner::new(config(temp_dir.path()), Failing).unwrap();
        let err = tuner.tune(|n| n >= 1).unwrap_err();
        assert!(err.to_string().contains("demo_param_1"));
    }

    #[test]
    fn test_non_finite_score_is_recorded_lowest() {
        struct Nan;
        impl Trainable for Nan {
            fn run(&mut self, _: &HashMap<String, ParameterValue>, _: &str) -> ZtResult<f64> {
                Ok(f64::NAN)
            }
            fn save(&mut self, _: &str) -> ZtResult<()> {
                Ok(())
            }
            fn set_callbacks(&mut self, _: Vec<Callback>) {}
        }

        let temp_dir = tempdir().unwrap();
        let mut tuner = Tuner::new(config(temp_dir.path()), Nan).unwrap();
        tuner.tune(|n| n >= 1).unwrap();
        assert_eq!(tuner.log().scores(), &[f64::MIN]);
    }
}
