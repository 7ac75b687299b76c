//! Rescalers: pure maps from the unit interval into parameter space.
//!
//! Every strategy samples in `[0, 1]^n`; the rescalers built here turn each
//! coordinate into an application value. They are built once from the
//! declared [`ParameterSpec`]s and never change afterwards.

use std::collections::HashSet;

use tracing::debug;
use zt_types::{
    ConfigError, ParameterKind, ParameterSpec, ParameterValue, Scaling, SearchSpace, ValueRange,
    ZtError, ZtResult,
};

/// Linear map from a target interval onto an original interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxRescaler {
    o_min: f64,
    o_max: f64,
    t_min: f64,
    t_max: f64,
}

impl MinMaxRescaler {
    /// `original` is the interval rescaled into, `target` the interval
    /// accepted as input. Bounds may be given in either order.
    pub fn new(original: (f64, f64), target: (f64, f64)) -> Self {
        Self {
            o_min: original.0.min(original.1),
            o_max: original.0.max(original.1),
            t_min: target.0.min(target.1),
            t_max: target.0.max(target.1),
        }
    }

    pub fn apply(&self, x: f64) -> ZtResult<f64> {
        if !(self.t_min..=self.t_max).contains(&x) {
            return Err(ZtError::Domain {
                value: x,
                low: self.t_min,
                high: self.t_max,
            });
        }
        Ok(((self.o_max - self.o_min) * (x - self.t_min)) / (self.t_max - self.t_min) + self.o_min)
    }
}

/// Linear rescaler snapped to multiples of `increment` counted from the
/// range minimum.
#[derive(Debug, Clone, PartialEq)]
pub struct IncrementalRescaler {
    increment: f64,
    min: f64,
    max: f64,
    integral: bool,
    scaler: MinMaxRescaler,
}

impl IncrementalRescaler {
    /// `increment` must be positive.
    pub fn new(increment: f64, range: (f64, f64)) -> Self {
        let min = range.0.min(range.1);
        let max = range.0.max(range.1);
        Self {
            increment,
            min,
            max,
            integral: false,
            scaler: MinMaxRescaler::new((min, max), (0.0, 1.0)),
        }
    }

    /// Same mapping, producing [`ParameterValue::Int`].
    pub fn integral(increment: f64, range: (f64, f64)) -> Self {
        Self {
            integral: true,
            ..Self::new(increment, range)
        }
    }

    pub fn apply_f64(&self, value: f64) -> ZtResult<f64> {
        let rescaled = self.scaler.apply(value)?;

        // Tolerance of 0.1% of the increment absorbs drift at the bounds.
        let last_step = ((self.max - self.min) / self.increment + 0.001).floor();
        let steps = ((rescaled - self.min) / self.increment + 0.5)
            .floor()
            .clamp(0.0, last_step.max(0.0));

        Ok((self.min + steps * self.increment).clamp(self.min, self.max))
    }

    pub fn apply(&self, value: f64) -> ZtResult<ParameterValue> {
        let result = self.apply_f64(value)?;
        if self.integral {
            Ok(ParameterValue::Int(result.round() as i64))
        } else {
            Ok(ParameterValue::Float(result))
        }
    }
}

/// Base-10 logarithmic rescaler.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRescaler {
    min: f64,
    max: f64,
    int_log: bool,
    scaler: MinMaxRescaler,
}

impl LogRescaler {
    /// Both bounds must be positive.
    pub fn new(range: (f64, f64)) -> Self {
        let min = range.0.min(range.1);
        let max = range.0.max(range.1);
        Self {
            min,
            max,
            int_log: false,
            scaler: MinMaxRescaler::new((min.log10(), max.log10()), (0.0, 1.0)),
        }
    }

    /// Rounds to the nearest integer. Both bounds must be at least 1.
    pub fn rounded(range: (f64, f64)) -> Self {
        Self {
            int_log: true,
            ..Self::new(range)
        }
    }

    pub fn apply(&self, value: f64) -> ZtResult<ParameterValue> {
        let exponent = self.scaler.apply(value)?;
        let result = 10f64.powf(exponent).clamp(self.min, self.max);

        if self.int_log {
            Ok(ParameterValue::Int(result.round() as i64))
        } else {
            Ok(ParameterValue::Float(result))
        }
    }
}

/// Picks one of an ordered list of candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteRescaler {
    values: Vec<ParameterValue>,
    index: IncrementalRescaler,
}

impl DiscreteRescaler {
    /// `None` for an empty candidate list.
    pub fn new(values: Vec<ParameterValue>) -> Option<Self> {
        let last = values.len().checked_sub(1)? as f64;
        Some(Self {
            values,
            index: IncrementalRescaler::new(1.0, (0.0, last)),
        })
    }

    pub fn values(&self) -> &[ParameterValue] {
        &self.values
    }

    /// Never fails: inputs outside `[0, 1]` are clamped.
    pub fn apply(&self, value: f64) -> ParameterValue {
        let clamped = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        let idx = self
            .index
            .apply_f64(clamped)
            .map(|i| i.round() as usize)
            .unwrap_or(0)
            .min(self.values.len() - 1);
        self.values[idx].clone()
    }
}

/// One parameter's rescaler.
#[derive(Debug, Clone, PartialEq)]
pub enum Rescaler {
    Incremental(IncrementalRescaler),
    Log(LogRescaler),
    Discrete(DiscreteRescaler),
}

impl Rescaler {
    /// Build the rescaler for a single declaration. Every configuration
    /// problem is reported here, never at sampling time.
    pub fn from_spec(spec: &ParameterSpec) -> Result<Self, ConfigError> {
        match spec.kind {
            ParameterKind::Discrete => {
                let ValueRange::Candidates(values) = &spec.range else {
                    return Err(range_mismatch(spec, "an ordered candidate list"));
                };
                DiscreteRescaler::new(values.clone())
                    .map(Self::Discrete)
                    .ok_or_else(|| ConfigError::EmptyCandidates {
                        name: spec.name.clone(),
                    })
            }
            ParameterKind::Double => {
                let (min, max) = checked_bounds(spec)?;
                match spec.scaling.unwrap_or(Scaling::Incremental) {
                    Scaling::Incremental => {
                        let default_step = (max - min) / 100.0;
                        let increment = match spec.increment {
                            Some(step) => checked_increment(spec, step)?,
                            None if default_step > 0.0 => default_step,
                            // Degenerate range: any step yields `min`.
                            None => 1.0,
                        };
                        Ok(Self::Incremental(IncrementalRescaler::new(
                            increment,
                            (min, max),
                        )))
                    }
                    Scaling::Log => {
                        if min <= 0.0 {
                            return Err(ConfigError::InvalidLogBounds {
                                name: spec.name.clone(),
                                low: min,
                                high: max,
                                requirement: "> 0",
                            });
                        }
                        Ok(Self::Log(LogRescaler::new((min, max))))
                    }
                }
            }
            ParameterKind::Integer => {
                let (min, max) = checked_bounds(spec)?;
                if min.fract() != 0.0 || max.fract() != 0.0 {
                    return Err(ConfigError::NonIntegralBounds {
                        name: spec.name.clone(),
                        low: min,
                        high: max,
                    });
                }
                match spec.scaling.unwrap_or(Scaling::Incremental) {
                    Scaling::Incremental => {
                        let increment = match spec.increment {
                            Some(step) => checked_increment(spec, step)?,
                            None => 1.0,
                        };
                        Ok(Self::Incremental(IncrementalRescaler::integral(
                            increment,
                            (min, max),
                        )))
                    }
                    Scaling::Log => {
                        if min < 1.0 {
                            return Err(ConfigError::InvalidLogBounds {
                                name: spec.name.clone(),
                                low: min,
                                high: max,
                                requirement: ">= 1",
                            });
                        }
                        Ok(Self::Log(LogRescaler::rounded((min, max))))
                    }
                }
            }
        }
    }

    /// Map a unit value into parameter space.
    pub fn apply(&self, value: f64) -> ZtResult<ParameterValue> {
        match self {
            Self::Incremental(r) => r.apply(value),
            Self::Log(r) => r.apply(value),
            Self::Discrete(r) => Ok(r.apply(value)),
        }
    }
}

fn range_mismatch(spec: &ParameterSpec, expected: &str) -> ConfigError {
    ConfigError::RangeMismatch {
        name: spec.name.clone(),
        kind: spec.kind.to_string(),
        expected: expected.to_string(),
    }
}

fn checked_bounds(spec: &ParameterSpec) -> Result<(f64, f64), ConfigError> {
    let (min, max) = spec
        .range
        .min_max()
        .ok_or_else(|| range_mismatch(spec, "a pair of numeric bounds"))?;
    if !min.is_finite() || !max.is_finite() {
        return Err(ConfigError::InvalidBounds {
            name: spec.name.clone(),
            low: min,
            high: max,
        });
    }
    Ok((min, max))
}

fn checked_increment(spec: &ParameterSpec, step: f64) -> Result<f64, ConfigError> {
    if step > 0.0 && step.is_finite() {
        Ok(step)
    } else {
        Err(ConfigError::InvalidIncrement {
            name: spec.name.clone(),
            increment: step,
        })
    }
}

/// Build parallel, order-preserving lists of rescalers and parameter names.
pub fn make_rescalers(
    specs: &[ParameterSpec],
) -> Result<(Vec<Rescaler>, Vec<String>), ConfigError> {
    let mut seen = HashSet::new();
    let mut rescalers = Vec::with_capacity(specs.len());
    let mut names = Vec::with_capacity(specs.len());

    for spec in specs {
        if !seen.insert(spec.name.as_str()) {
            return Err(ConfigError::DuplicateName {
                name: spec.name.clone(),
            });
        }
        let rescaler = Rescaler::from_spec(spec)?;
        debug!(parameter = %spec.name, kind = %spec.kind, "built rescaler");
        rescalers.push(rescaler);
        names.push(spec.name.clone());
    }

    Ok((rescalers, names))
}

/// The rescalers of a whole search space, in canonical order.
#[derive(Debug, Clone, PartialEq)]
pub struct RescalerSet {
    rescalers: Vec<Rescaler>,
    names: Vec<String>,
}

impl RescalerSet {
    pub fn from_specs(specs: &[ParameterSpec]) -> ZtResult<Self> {
        let (rescalers, names) = make_rescalers(specs)?;
        Ok(Self { rescalers, names })
    }

    pub fn from_space(space: &SearchSpace) -> ZtResult<Self> {
        Self::from_specs(&space.parameters)
    }

    pub fn len(&self) -> usize {
        self.rescalers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rescalers.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn rescalers(&self) -> &[Rescaler] {
        &self.rescalers
    }

    /// Apply every rescaler to its coordinate of `unit`.
    pub fn rescale(&self, unit: &[f64]) -> ZtResult<Vec<ParameterValue>> {
        self.rescalers
            .iter()
            .zip(unit)
            .map(|(rescaler, &u)| rescaler.apply(u))
            .collect()
    }
}
