//! Tabular data handling
//!
//! Loading, dataset-specific mapping rules and the [`Dataset`] wrapper that keeps
//! predictors, labels and protected attributes aligned row for row.

mod dataset;
mod loader;
mod mapping;

pub use dataset::{Dataset, DatasetSchema};
pub use loader::DataLoader;
pub use mapping::{BinarizeRule, MappingRules, RowFilter};

use crate::error::{KolosalError, Result};
use polars::prelude::*;

/// Whether a dtype holds plain integer or floating point numbers
pub(crate) fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Whether a dtype can be read as category labels
pub(crate) fn is_label_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::String | DataType::Boolean)
        || (is_numeric_dtype(dtype) && !matches!(dtype, DataType::Float32 | DataType::Float64))
}

/// Read a numeric column as f64, with nulls and NaN both reported as `None`
pub(crate) fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| KolosalError::FeatureNotFound(name.to_string()))?;
    let series = column.as_materialized_series();

    if !is_numeric_dtype(series.dtype()) && series.dtype() != &DataType::Boolean {
        return Err(KolosalError::PreprocessingError(format!(
            "column '{}' has dtype {} but a numeric column was expected",
            name,
            series.dtype()
        )));
    }

    let casted = series.cast(&DataType::Float64)?;
    let ca = casted.f64()?;
    Ok(ca
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect())
}

/// Read a column as category labels; integers and booleans are rendered as strings
pub(crate) fn label_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| KolosalError::FeatureNotFound(name.to_string()))?;
    let series = column.as_materialized_series();

    if !is_label_dtype(series.dtype()) {
        return Err(KolosalError::PreprocessingError(format!(
            "column '{}' has dtype {} but a string, integer or boolean column was expected",
            name,
            series.dtype()
        )));
    }

    let casted = series.cast(&DataType::String)?;
    let ca = casted.str()?;
    Ok(ca.into_iter().map(|v| v.map(str::to_string)).collect())
}

/// Select rows by position, preserving the given order
pub(crate) fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = indices.iter().map(|&i| i as IdxSize).collect();
    let idx = IdxCa::from_vec("idx".into(), idx);
    Ok(df.take(&idx)?)
}
