//! # zt-search
//!
//! Parameter search engine for zoomtune.
//!
//! Provides the rescalers that map unit-cube samples into parameter values,
//! the append-only trial log, and the uniform and zoom random search
//! strategies that feed it.

mod log;
mod registry;
mod rescale;
mod search;

pub use log::{TrialId, TrialLog};
pub use registry::{RawStrategy, StrategyConfig, ZoomOptions};
pub use rescale::{
    make_rescalers, DiscreteRescaler, IncrementalRescaler, LogRescaler, MinMaxRescaler, Rescaler,
    RescalerSet,
};
pub use search::{SearchStrategy, Suggestion, UniformSearch, ZoomSearch, DEFAULT_MAX_RESAMPLES};
