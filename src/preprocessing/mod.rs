//! Data preprocessing module
//!
//! Column-wise transformations fit on a training partition only:
//! - Robust scaling of numeric columns
//! - Missingness indicators and imputation
//! - Rare-category clamping
//! - One-hot encoding of categorical columns

mod clamper;
mod config;
mod encoder;
mod imputer;
mod missing;
mod pipeline;
mod scaler;

pub use clamper::Clamper;
pub use config::PreprocessingConfig;
pub use encoder::OneHotEncoder;
pub use imputer::{ImputeStrategy, Imputer};
pub use missing::MissingIndicator;
pub use pipeline::ColumnPipeline;
pub use scaler::{Scaler, ScalerType};
