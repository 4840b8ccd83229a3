//! Classifier families, their search spaces and buildable specifications

use super::adversarial::{AdversarialConfig, AdversarialDebiasing};
use super::fair_forest::{FairForestConfig, FairRandomForest};
use super::logistic::{ClassWeight, LogisticConfig, LogisticRegression, Penalty};
use super::models::FairClassifier;
use crate::error::{KolosalError, Result};
use crate::optimizer::{ParameterValue, SearchSpace, TrialParams};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::str::FromStr;

/// Something that can propose a search space for a theta and build classifiers from the
/// configurations sampled out of it.
pub trait ModelFamily: Sync {
    /// Fully resolved, buildable configuration
    type Spec: Clone + Debug + Send + Serialize + DeserializeOwned;

    fn search_space(&self, theta: f64) -> SearchSpace;

    fn spec_from_params(&self, params: &TrialParams) -> Result<Self::Spec>;

    fn build(&self, spec: &Self::Spec) -> Box<dyn FairClassifier>;
}

/// Configuration of one of the built-in classifiers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum ClassifierSpec {
    Logistic(LogisticConfig),
    FairForest(FairForestConfig),
    Adversarial(AdversarialConfig),
}

impl ClassifierSpec {
    /// Default configuration of a family
    pub fn default_for(family: ClassifierFamily) -> Self {
        match family {
            ClassifierFamily::Logistic => ClassifierSpec::Logistic(LogisticConfig::default()),
            ClassifierFamily::FairForest => ClassifierSpec::FairForest(FairForestConfig::default()),
            ClassifierFamily::Adversarial => ClassifierSpec::Adversarial(AdversarialConfig::default()),
        }
    }

    /// Instantiate an unfitted classifier
    pub fn build(&self) -> Box<dyn FairClassifier> {
        match self {
            ClassifierSpec::Logistic(c) => Box::new(LogisticRegression::new(c.clone())),
            ClassifierSpec::FairForest(c) => Box::new(FairRandomForest::new(c.clone())),
            ClassifierSpec::Adversarial(c) => Box::new(AdversarialDebiasing::new(c.clone())),
        }
    }
}

/// Built-in classifier families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierFamily {
    Logistic,
    FairForest,
    Adversarial,
}

impl FromStr for ClassifierFamily {
    type Err = KolosalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "logistic" | "logistic_regression" => Ok(Self::Logistic),
            "fair_forest" | "forest" => Ok(Self::FairForest),
            "adversarial" | "adversarial_debiasing" => Ok(Self::Adversarial),
            other => Err(KolosalError::ConfigError(format!(
                "unknown classifier family '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ClassifierFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Logistic => "logistic",
            Self::FairForest => "fair_forest",
            Self::Adversarial => "adversarial",
        };
        write!(f, "{}", name)
    }
}

fn param<'a>(params: &'a TrialParams, name: &str) -> Result<&'a ParameterValue> {
    params.get(name).ok_or_else(|| KolosalError::InvalidParameter {
        name: name.to_string(),
        value: "<missing>".to_string(),
        reason: "not present in trial configuration".to_string(),
    })
}

fn wrong_type(name: &str, value: &ParameterValue, expected: &str) -> KolosalError {
    KolosalError::InvalidParameter {
        name: name.to_string(),
        value: value.to_string(),
        reason: format!("expected {}", expected),
    }
}

fn get_float(params: &TrialParams, name: &str) -> Result<f64> {
    let v = param(params, name)?;
    v.as_float().ok_or_else(|| wrong_type(name, v, "a number"))
}

fn get_count(params: &TrialParams, name: &str) -> Result<usize> {
    let v = param(params, name)?;
    v.as_int()
        .and_then(|i| usize::try_from(i).ok())
        .ok_or_else(|| wrong_type(name, v, "a non-negative integer"))
}

fn get_bool(params: &TrialParams, name: &str) -> Result<bool> {
    let v = param(params, name)?;
    v.as_bool().ok_or_else(|| wrong_type(name, v, "a boolean"))
}

fn get_str<'a>(params: &'a TrialParams, name: &str) -> Result<&'a str> {
    let v = param(params, name)?;
    v.as_string().ok_or_else(|| wrong_type(name, v, "a string"))
}

impl ModelFamily for ClassifierFamily {
    type Spec = ClassifierSpec;

    fn search_space(&self, theta: f64) -> SearchSpace {
        match self {
            Self::Logistic => SearchSpace::new()
                .choice("penalty", vec!["l1", "l2", "elasticnet", "none"])
                .uniform("tol", 1e-5, 1e-3)
                .uniform("C", 0.01, 10.0)
                .choice("fit_intercept", vec![true, false])
                .choice("class_weight", vec!["none", "balanced"])
                .quniform("max_iter", 10.0, 1000.0, 1.0)
                .uniform("l1_ratio", 0.0, 1.0),
            Self::FairForest => SearchSpace::new()
                .choice("theta", vec![theta])
                .choice("n_bins", vec![256i64])
                .choice("bootstrap", vec![true])
                .quniform("max_depth", 1.0, 20.0, 1.0)
                .uniform("max_features", 0.05, 0.95)
                .quniform("n_estimators", 100.0, 500.0, 1.0)
                .quniform("min_samples_leaf", 1.0, 10.0, 1.0)
                .quniform("min_samples_split", 2.0, 20.0, 1.0),
            Self::Adversarial => SearchSpace::new()
                .uniform("adversary_loss_weight", 0.0, 1.0)
                .quniform("num_epochs", 50.0, 500.0, 1.0)
                .quniform("batch_size", 16.0, 1024.0, 1.0)
                .quniform("classifier_num_hidden_units", 40.0, 1000.0, 1.0),
        }
    }

    fn spec_from_params(&self, params: &TrialParams) -> Result<ClassifierSpec> {
        match self {
            Self::Logistic => {
                let penalty = match get_str(params, "penalty")? {
                    "l1" => Penalty::L1,
                    "l2" => Penalty::L2,
                    "elasticnet" => Penalty::ElasticNet,
                    "none" => Penalty::None,
                    other => return Err(wrong_type("penalty", &other.into(), "l1|l2|elasticnet|none")),
                };
                let class_weight = match get_str(params, "class_weight")? {
                    "none" => ClassWeight::None,
                    "balanced" => ClassWeight::Balanced,
                    other => return Err(wrong_type("class_weight", &other.into(), "none|balanced")),
                };
                Ok(ClassifierSpec::Logistic(LogisticConfig {
                    penalty,
                    c: get_float(params, "C")?,
                    tol: get_float(params, "tol")?,
                    fit_intercept: get_bool(params, "fit_intercept")?,
                    class_weight,
                    max_iter: get_count(params, "max_iter")?,
                    l1_ratio: get_float(params, "l1_ratio")?,
                    ..LogisticConfig::default()
                }))
            }
            Self::FairForest => Ok(ClassifierSpec::FairForest(FairForestConfig {
                theta: get_float(params, "theta")?,
                n_bins: get_count(params, "n_bins")?,
                bootstrap: get_bool(params, "bootstrap")?,
                max_depth: get_count(params, "max_depth")?,
                max_features: get_float(params, "max_features")?,
                n_estimators: get_count(params, "n_estimators")?,
                min_samples_leaf: get_count(params, "min_samples_leaf")?,
                min_samples_split: get_count(params, "min_samples_split")?,
                ..FairForestConfig::default()
            })),
            Self::Adversarial => Ok(ClassifierSpec::Adversarial(AdversarialConfig {
                adversary_loss_weight: get_float(params, "adversary_loss_weight")?,
                num_epochs: get_count(params, "num_epochs")?,
                batch_size: get_count(params, "batch_size")?,
                classifier_num_hidden_units: get_count(params, "classifier_num_hidden_units")?,
                debias: true,
                ..AdversarialConfig::default()
            })),
        }
    }

    fn build(&self, spec: &ClassifierSpec) -> Box<dyn FairClassifier> {
        spec.build()
    }
}
