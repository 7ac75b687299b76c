//! Declarative parameter specifications.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ConfigError;

/// A concrete parameter value in application space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Json(serde_json::Value),
}

impl ParameterValue {
    /// Numeric view of the value, `None` for non-numeric candidates.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Json(v) => v.as_f64(),
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Json(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        Self::Json(serde_json::Value::String(v.to_string()))
    }
}

/// What kind of values a parameter produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    /// Continuous value between two bounds.
    Double,
    /// Whole number between two bounds.
    Integer,
    /// One of an ordered list of candidates.
    Discrete,
}

impl ParameterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Integer => "integer",
            Self::Discrete => "discrete",
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParameterKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "double" => Ok(Self::Double),
            "integer" => Ok(Self::Integer),
            "discrete" => Ok(Self::Discrete),
            other => Err(ConfigError::UnknownKind {
                kind: other.to_string(),
            }),
        }
    }
}

/// How the unit interval is stretched over a bounded range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scaling {
    /// Linear, snapped to a fixed increment.
    Incremental,
    /// Logarithmic (base 10).
    Log,
}

impl Scaling {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incremental => "incremental",
            Self::Log => "log",
        }
    }

    /// Parse a scaling mode declared for a parameter of the given kind.
    pub fn parse_for(kind: ParameterKind, s: &str) -> Result<Self, ConfigError> {
        match s {
            "incremental" => Ok(Self::Incremental),
            "log" => Ok(Self::Log),
            other => Err(ConfigError::UnknownScaling {
                kind: kind.to_string(),
                scaling: other.to_string(),
            }),
        }
    }
}

/// The declared range of a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueRange {
    /// Two bounds, in either order.
    Bounds { low: f64, high: f64 },
    /// Ordered candidate list.
    Candidates(Vec<ParameterValue>),
}

impl ValueRange {
    /// The bounds sorted so that the first element is the minimum.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        match self {
            Self::Bounds { low, high } => Some((low.min(*high), low.max(*high))),
            Self::Candidates(_) => None,
        }
    }
}

/// One tunable parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParameterSpec", into = "RawParameterSpec")]
pub struct ParameterSpec {
    /// Unique parameter name (e.g. "learning_rate").
    pub name: String,
    pub kind: ParameterKind,
    pub range: ValueRange,
    /// `None` selects the default for the kind (incremental).
    pub scaling: Option<Scaling>,
    /// Step for incremental scaling; `None` selects the default for the kind.
    pub increment: Option<f64>,
}

impl ParameterSpec {
    pub fn double(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::Double,
            range: ValueRange::Bounds { low, high },
            scaling: None,
            increment: None,
        }
    }

    pub fn integer(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::Integer,
            range: ValueRange::Bounds {
                low: low as f64,
                high: high as f64,
            },
            scaling: None,
            increment: None,
        }
    }

    pub fn discrete(name: impl Into<String>, values: Vec<ParameterValue>) -> Self {
        Self {
            name: name.into(),
            kind: ParameterKind::Discrete,
            range: ValueRange::Candidates(values),
            scaling: None,
            increment: None,
        }
    }

    /// Switch to logarithmic scaling.
    pub fn log(mut self) -> Self {
        self.scaling = Some(Scaling::Log);
        self
    }

    /// Switch to incremental scaling with an explicit step.
    pub fn incremental(mut self, increment: f64) -> Self {
        self.scaling = Some(Scaling::Incremental);
        self.increment = Some(increment);
        self
    }

    /// Build a spec from its loosely typed form, as found in configuration
    /// files. Kind and scaling strings are checked here; bounds are checked
    /// when the rescaler is built.
    pub fn parse(
        name: impl Into<String>,
        kind: &str,
        range: Vec<ParameterValue>,
        scaling: Option<&str>,
        increment: Option<f64>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let kind = ParameterKind::from_str(kind)?;

        let range = match kind {
            ParameterKind::Discrete => ValueRange::Candidates(range),
            ParameterKind::Double | ParameterKind::Integer => {
                let numeric: Vec<f64> = range.iter().filter_map(ParameterValue::as_f64).collect();
                if range.len() != 2 || numeric.len() != 2 {
                    return Err(ConfigError::RangeMismatch {
                        name,
                        kind: kind.to_string(),
                        expected: "a pair of numeric bounds".to_string(),
                    });
                }
                ValueRange::Bounds {
                    low: numeric[0],
                    high: numeric[1],
                }
            }
        };

        // Scaling is irrelevant for discrete parameters.
        let scaling = match (kind, scaling) {
            (ParameterKind::Discrete, _) | (_, None) => None,
            (_, Some(s)) => Some(Scaling::parse_for(kind, s)?),
        };

        Ok(Self {
            name,
            kind,
            range,
            scaling,
            increment,
        })
    }
}

/// Serialized shape of a [`ParameterSpec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawParameterSpec {
    pub name: String,
    pub kind: String,
    pub range: Vec<ParameterValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaling: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increment: Option<f64>,
}

impl TryFrom<RawParameterSpec> for ParameterSpec {
    type Error = ConfigError;

    fn try_from(raw: RawParameterSpec) -> Result<Self, Self::Error> {
        ParameterSpec::parse(
            raw.name,
            &raw.kind,
            raw.range,
            raw.scaling.as_deref(),
            raw.increment,
        )
    }
}

impl From<ParameterSpec> for RawParameterSpec {
    fn from(spec: ParameterSpec) -> Self {
        let range = match spec.range {
            ValueRange::Bounds { low, high } => match spec.kind {
                ParameterKind::Integer => {
                    vec![ParameterValue::Int(low as i64), ParameterValue::Int(high as i64)]
                }
                _ => vec![ParameterValue::Float(low), ParameterValue::Float(high)],
            },
            ValueRange::Candidates(values) => values,
        };
        Self {
            name: spec.name,
            kind: spec.kind.to_string(),
            range,
            scaling: spec.scaling.map(|s| s.as_str().to_string()),
            increment: spec.increment,
        }
    }
}

/// The full search space: an ordered list of parameter specifications.
/// The order is the canonical parameter-vector order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchSpace {
    pub parameters: Vec<ParameterSpec>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, spec: ParameterSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    pub fn add_double(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(ParameterSpec::double(name, low, high))
    }

    pub fn add_integer(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(ParameterSpec::integer(name, low, high))
    }

    pub fn add_discrete(self, name: impl Into<String>, values: Vec<ParameterValue>) -> Self {
        self.add(ParameterSpec::discrete(name, values))
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }
}

impl From<Vec<ParameterSpec>> for SearchSpace {
    fn from(parameters: Vec<ParameterSpec>) -> Self {
        Self { parameters }
    }
}
