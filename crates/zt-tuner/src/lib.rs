//! # zt-tuner
//!
//! Tuning driver for zoomtune.
//!
//! Connects a search strategy from `zt-search` to a [`Trainable`] process,
//! persists every trial to disk and supports resuming an interrupted session.
//! [`CommandTrainable`] runs an external program per trial and backs the
//! `zt-tune` binary.

mod command;
mod config;
mod store;
mod trainable;
mod tuner;

pub use command::{CommandTrainable, CALLBACKS_ENV, PARAMS_ENV, RUN_ID_ENV};
pub use config::TunerConfig;
pub use store::{TrialSnapshot, TrialStore};
pub use trainable::{Callback, CallbackConfig, ReduceLrConfig, Trainable};
pub use tuner::{BestTrial, Tuner, TuningSummary};
