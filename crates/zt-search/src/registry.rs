//! Strategy selection: a closed set of identifiers with typed options.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use zt_types::{ConfigError, ZtResult};

use crate::rescale::RescalerSet;
use crate::search::{SearchStrategy, UniformSearch, ZoomSearch};

/// Options for [`ZoomSearch`] when selected through configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ZoomOptions {
    #[serde(default = "default_trials_per_zoom")]
    pub trials_per_zoom: usize,
    #[serde(default = "default_eval_trials", alias = "n_eval_trials")]
    pub eval_trials: usize,
}

fn default_trials_per_zoom() -> usize {
    40
}

fn default_eval_trials() -> usize {
    10
}

impl Default for ZoomOptions {
    fn default() -> Self {
        Self {
            trials_per_zoom: default_trials_per_zoom(),
            eval_trials: default_eval_trials(),
        }
    }
}

/// The single search strategy active in a tuning session.
///
/// In configuration files this is either a bare identifier
/// (`"zoom"`) or a one-entry map from identifier to options
/// (`{"zoom": {"trials_per_zoom": 20, "eval_trials": 3}}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawStrategy", into = "RawStrategy")]
pub enum StrategyConfig {
    Uniform,
    Zoom(ZoomOptions),
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::Uniform
    }
}

impl StrategyConfig {
    /// Resolve an identifier with default options.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        Self::with_options(name, serde_json::Value::Null)
    }

    /// Resolve an identifier together with its JSON options. `null` selects
    /// the defaults.
    pub fn with_options(name: &str, options: serde_json::Value) -> Result<Self, ConfigError> {
        let invalid = |strategy: &str, message: String| ConfigError::InvalidStrategyOptions {
            strategy: strategy.to_string(),
            message,
        };

        match name {
            "uniform" | "random" | "RandomSearch" => match options {
                serde_json::Value::Null => Ok(Self::Uniform),
                serde_json::Value::Object(map) if map.is_empty() => Ok(Self::Uniform),
                other => Err(invalid("uniform", format!("takes no options, got {other}"))),
            },
            "zoom" | "ZoomRandomSearch" => {
                let options = match options {
                    serde_json::Value::Null => ZoomOptions::default(),
                    other => serde_json::from_value(other)
                        .map_err(|e| invalid("zoom", e.to_string()))?,
                };
                Ok(Self::Zoom(options))
            }
            other => Err(ConfigError::UnknownStrategy {
                name: other.to_string(),
            }),
        }
    }

    /// Canonical identifier.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Zoom(_) => "zoom",
        }
    }

    /// Construct the strategy over `rescalers`.
    pub fn build(
        &self,
        rescalers: Arc<RescalerSet>,
        seed: Option<u64>,
    ) -> ZtResult<Box<dyn SearchStrategy>> {
        let strategy: Box<dyn SearchStrategy> = match self {
            Self::Uniform => {
                let search = UniformSearch::new(rescalers);
                Box::new(match seed {
                    Some(seed) => search.with_seed(seed),
                    None => search,
                })
            }
            Self::Zoom(options) => {
                let search =
                    ZoomSearch::new(rescalers, options.trials_per_zoom, Some(options.eval_trials))?;
                Box::new(match seed {
                    Some(seed) => search.with_seed(seed),
                    None => search,
                })
            }
        };
        Ok(strategy)
    }
}

/// Serialized shape of a [`StrategyConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawStrategy {
    Name(String),
    List(Vec<String>),
    Map(BTreeMap<String, serde_json::Value>),
}

impl TryFrom<RawStrategy> for StrategyConfig {
    type Error = ConfigError;

    fn try_from(raw: RawStrategy) -> Result<Self, Self::Error> {
        match raw {
            RawStrategy::Name(name) => Self::parse(&name),
            RawStrategy::List(names) => match names.as_slice() {
                [name] => Self::parse(name),
                _ => Err(ConfigError::StrategyCount { count: names.len() }),
            },
            RawStrategy::Map(map) => {
                if map.len() != 1 {
                    return Err(ConfigError::StrategyCount { count: map.len() });
                }
                let (name, options) = map.into_iter().next().ok_or(ConfigError::StrategyCount { count: 0 })?;
                Self::with_options(&name, options)
            }
        }
    }
}

impl From<StrategyConfig> for RawStrategy {
    fn from(config: StrategyConfig) -> Self {
        let options = match &config {
            StrategyConfig::Uniform => serde_json::json!({}),
            StrategyConfig::Zoom(options) => serde_json::json!({
                "trials_per_zoom": options.trials_per_zoom,
                "eval_trials": options.eval_trials,
            }),
        };
        let mut map = BTreeMap::new();
        map.insert(config.name().to_string(), options);
        RawStrategy::Map(map)
    }
}
