//! Search space definition for hyperparameters

use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prior distribution of a single hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Distribution {
    /// Continuous value drawn uniformly from `[low, high]`
    Uniform { low: f64, high: f64 },
    /// Uniform value rounded to a multiple of `step`, reported as an integer
    QUniformInt { low: f64, high: f64, step: f64 },
    /// One of a fixed set of values
    Choice { choices: Vec<ParameterValue> },
}

impl Distribution {
    /// Bounds of the continuous part, `None` for choices
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match self {
            Distribution::Uniform { low, high } | Distribution::QUniformInt { low, high, .. } => {
                Some((*low, *high))
            }
            Distribution::Choice { .. } => None,
        }
    }

    /// Map a continuous draw onto the distribution's support
    pub fn quantize(&self, value: f64) -> ParameterValue {
        match self {
            Distribution::Uniform { low, high } => ParameterValue::Float(value.clamp(*low, *high)),
            Distribution::QUniformInt { low, high, step } => {
                let step = if *step > 0.0 { *step } else { 1.0 };
                let rounded = (value / step).round() * step;
                // Rounding may leave the range when the bounds are not multiples of step
                let lo = (low / step).ceil() * step;
                let hi = (high / step).floor() * step;
                ParameterValue::Int(rounded.clamp(lo, hi.max(lo)) as i64)
            }
            Distribution::Choice { choices } => choices
                .iter()
                .min_by(|a, b| {
                    let da = a.as_float().map_or(f64::INFINITY, |v| (v - value).abs());
                    let db = b.as_float().map_or(f64::INFINITY, |v| (v - value).abs());
                    da.total_cmp(&db)
                })
                .cloned()
                .unwrap_or(ParameterValue::Float(value)),
        }
    }
}

/// A single named hyperparameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub distribution: Distribution,
}

impl Parameter {
    pub fn uniform(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            distribution: Distribution::Uniform { low, high },
        }
    }

    pub fn quniform(name: impl Into<String>, low: f64, high: f64, step: f64) -> Self {
        Self {
            name: name.into(),
            distribution: Distribution::QUniformInt { low, high, step },
        }
    }

    pub fn choice(name: impl Into<String>, choices: Vec<ParameterValue>) -> Self {
        Self {
            name: name.into(),
            distribution: Distribution::Choice { choices },
        }
    }

    /// Sample a random value from the prior
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match &self.distribution {
            Distribution::Uniform { low, high } => ParameterValue::Float(rng.gen::<f64>() * (high - low) + low),
            Distribution::QUniformInt { low, high, .. } => {
                let raw = rng.gen::<f64>() * (high - low) + low;
                self.distribution.quantize(raw)
            }
            Distribution::Choice { choices } => {
                // Empty choice lists are rejected by SearchSpace::validate
                match choices.choose(rng) {
                    Some(value) => value.clone(),
                    None => ParameterValue::Float(f64::NAN),
                }
            }
        }
    }
}

/// Sampled parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl ParameterValue {
    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as int
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            ParameterValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterValue::Bool(v) => write!(f, "{}", v),
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{:.6}", v),
            ParameterValue::String(v) => write!(f, "{}", v),
        }
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Float(v)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Int(v)
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        ParameterValue::Bool(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::String(v.to_string())
    }
}

/// Ordered list of named distributions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    /// Create a new empty search space
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter to the search space
    pub fn add(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    pub fn uniform(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::uniform(name, low, high))
    }

    pub fn quniform(self, name: impl Into<String>, low: f64, high: f64, step: f64) -> Self {
        self.add(Parameter::quniform(name, low, high, step))
    }

    pub fn choice<V: Into<ParameterValue>>(self, name: impl Into<String>, choices: Vec<V>) -> Self {
        self.add(Parameter::choice(
            name,
            choices.into_iter().map(Into::into).collect(),
        ))
    }

    /// Get all parameters
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Check every distribution is well formed
    pub fn validate(&self) -> crate::error::Result<()> {
        for p in &self.parameters {
            let bad = match &p.distribution {
                Distribution::Uniform { low, high } => !(low <= high),
                Distribution::QUniformInt { low, high, step } => !(low <= high) || *step <= 0.0,
                Distribution::Choice { choices } => choices.is_empty(),
            };
            if bad {
                return Err(crate::error::KolosalError::InvalidParameter {
                    name: p.name.clone(),
                    value: format!("{:?}", p.distribution),
                    reason: "empty or inverted distribution".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Sample a random configuration
    pub fn sample(&self, rng: &mut impl Rng) -> TrialParams {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.sample(rng)))
            .collect()
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Get parameter names in order
    pub fn param_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }
}

/// Alias for sampled configuration, keyed in name order so serialized trials are stable
pub type TrialParams = BTreeMap<String, ParameterValue>;
