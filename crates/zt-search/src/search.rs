//! Search strategies: uniform random search and zoom random search.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use zt_types::{ConfigError, ParameterValue, SearchError, ZtResult};

use crate::log::{TrialId, TrialLog};
use crate::rescale::RescalerSet;

/// Upper bound on redraws when the log keeps rejecting duplicates.
pub const DEFAULT_MAX_RESAMPLES: usize = 10_000;

/// A logged parameter suggestion, ready to be evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    /// Row of the trial log holding this suggestion.
    pub trial: TrialId,
    /// Rescaled values keyed by parameter name.
    pub params: HashMap<String, ParameterValue>,
    /// Rescaled values in canonical parameter order.
    pub values: Vec<ParameterValue>,
    /// The normalized sample the values were derived from.
    pub unit: Vec<f64>,
}

/// Common trait for all search strategies.
pub trait SearchStrategy: Send {
    /// Draw a new unique sample, record it in `log` and return it.
    fn suggest(&mut self, log: &mut TrialLog) -> ZtResult<Suggestion>;

    /// Human-readable strategy name.
    fn name(&self) -> &str;
}

/// Draws boxed uniform samples and retries until the log accepts one.
#[derive(Debug, Clone)]
struct Sampler {
    rescalers: Arc<RescalerSet>,
    rng: StdRng,
    max_resamples: usize,
}

impl Sampler {
    fn new(rescalers: Arc<RescalerSet>) -> Self {
        Self {
            rescalers,
            rng: StdRng::from_entropy(),
            max_resamples: DEFAULT_MAX_RESAMPLES,
        }
    }

    fn draw_unique(
        &mut self,
        log: &mut TrialLog,
        lower: &[f64],
        upper: &[f64],
    ) -> ZtResult<Suggestion> {
        if self.rescalers.is_empty() {
            return Err(SearchError::EmptySpace.into());
        }

        for _ in 0..self.max_resamples {
            let unit: Vec<f64> = lower
                .iter()
                .zip(upper)
                .map(|(&lo, &hi)| (lo + self.rng.gen::<f64>() * (hi - lo)).clamp(lo, hi))
                .collect();
            let values = self.rescalers.rescale(&unit)?;

            if let Some(trial) = log.log_param(values.clone(), unit.clone(), 0.0)? {
                let params = self
                    .rescalers
                    .names()
                    .iter()
                    .cloned()
                    .zip(values.iter().cloned())
                    .collect();
                return Ok(Suggestion {
                    trial,
                    params,
                    values,
                    unit,
                });
            }
            debug!("duplicate sample rejected, drawing again");
        }

        warn!(attempts = self.max_resamples, "no unique sample found");
        Err(SearchError::Saturated {
            attempts: self.max_resamples,
        }
        .into())
    }
}

// ---- Uniform search ----

/// Independent uniform sampling over the whole unit cube.
#[derive(Debug, Clone)]
pub struct UniformSearch {
    sampler: Sampler,
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl UniformSearch {
    pub fn new(rescalers: Arc<RescalerSet>) -> Self {
        let n = rescalers.len();
        Self {
            sampler: Sampler::new(rescalers),
            lower: vec![0.0; n],
            upper: vec![1.0; n],
        }
    }

    /// Reproducible sampling from a fixed seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.sampler.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_max_resamples(mut self, max_resamples: usize) -> Self {
        self.sampler.max_resamples = max_resamples;
        self
    }
}

impl SearchStrategy for UniformSearch {
    fn suggest(&mut self, log: &mut TrialLog) -> ZtResult<Suggestion> {
        self.sampler.draw_unique(log, &self.lower, &self.upper)
    }

    fn name(&self) -> &str {
        "uniform"
    }
}

// ---- Zoom search ----

/// Uniform sampling inside a box that, every `trials_per_zoom` trials,
/// shrinks to the bounding box of the best `eval_trials` logged samples.
///
/// The box is axis-aligned: each dimension is drawn independently between
/// the per-dimension minimum and maximum of the elite samples.
#[derive(Debug, Clone)]
pub struct ZoomSearch {
    sampler: Sampler,
    lower: Vec<f64>,
    upper: Vec<f64>,
    trials_per_zoom: usize,
    eval_trials: usize,
    trials_in_window: usize,
}

impl ZoomSearch {
    /// `eval_trials` defaults to a tenth of the window (at least one).
    pub fn new(
        rescalers: Arc<RescalerSet>,
        trials_per_zoom: usize,
        eval_trials: Option<usize>,
    ) -> Result<Self, ConfigError> {
        let eval_trials = eval_trials.unwrap_or((trials_per_zoom / 10).max(1));
        if trials_per_zoom == 0 {
            return Err(ConfigError::InvalidStrategyOptions {
                strategy: "zoom".to_string(),
                message: "trials_per_zoom must be positive".to_string(),
            });
        }
        if eval_trials == 0 || eval_trials > trials_per_zoom {
            return Err(ConfigError::InvalidStrategyOptions {
                strategy: "zoom".to_string(),
                message: format!(
                    "eval_trials must be between 1 and trials_per_zoom ({trials_per_zoom}), got {eval_trials}"
                ),
            });
        }

        let n = rescalers.len();
        Ok(Self {
            sampler: Sampler::new(rescalers),
            lower: vec![0.0; n],
            upper: vec![1.0; n],
            trials_per_zoom,
            eval_trials,
            trials_in_window: 0,
        })
    }

    /// Reproducible sampling from a fixed seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.sampler.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_max_resamples(mut self, max_resamples: usize) -> Self {
        self.sampler.max_resamples = max_resamples;
        self
    }

    pub fn lower_bounds(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper
    }

    pub fn trials_per_zoom(&self) -> usize {
        self.trials_per_zoom
    }

    pub fn eval_trials(&self) -> usize {
        self.eval_trials
    }

    /// Trials drawn from the current box so far.
    pub fn trials_in_window(&self) -> usize {
        self.trials_in_window
    }

    /// Recompute the box from the elite trials of `log`.
    fn zoom(&mut self, log: &TrialLog) -> ZtResult<()> {
        let elites = log.top_k(self.eval_trials)?;
        let samples = log.unscaled_params();

        for d in 0..self.lower.len() {
            let column = elites.iter().map(|id| samples[id.index()][d]);
            self.lower[d] = column.clone().fold(f64::INFINITY, f64::min);
            self.upper[d] = column.fold(f64::NEG_INFINITY, f64::max);
        }
        self.trials_in_window = 0;

        info!(
            elites = elites.len(),
            lower = ?self.lower,
            upper = ?self.upper,
            "zoomed search box"
        );
        Ok(())
    }
}

impl SearchStrategy for ZoomSearch {
    fn suggest(&mut self, log: &mut TrialLog) -> ZtResult<Suggestion> {
        if self.trials_in_window >= self.trials_per_zoom {
            self.zoom(log)?;
        }

        let suggestion = self.sampler.draw_unique(log, &self.lower, &self.upper)?;
        self.trials_in_window += 1;
        Ok(suggestion)
    }

    fn name(&self) -> &str {
        "zoom"
    }
}
