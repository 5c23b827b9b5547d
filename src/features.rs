use polars::prelude::*;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::config::{DerivedColumn, FeatureConfig};
use crate::error::PipelineError;

/// IEEE round-to-nearest with ties to even, matching the reference
/// numeric semantics for the day-to-year conversion.
fn round_half_to_even(x: f64) -> f64 {
    let floor = x.floor();
    let diff = x - floor;
    if diff > 0.5 {
        floor + 1.0
    } else if diff < 0.5 {
        floor
    } else if (floor as i64) % 2 == 0 {
        floor
    } else {
        floor + 1.0
    }
}

/// Derives calendar-unit columns: `new = round(source / 365)`.
pub fn day_to_year(df: &DataFrame, pairs: &[DerivedColumn]) -> Result<DataFrame, PipelineError> {
    let mut out = df.clone();
    for pair in pairs {
        let source = out.column(&pair.source)?.cast(&DataType::Float64)?;
        let years: Vec<Option<f64>> = source
            .f64()?
            .into_iter()
            .map(|v| v.map(|days| round_half_to_even(days / 365.0)))
            .collect();
        out.with_column(Column::new(pair.name.as_str().into(), years))?;
        info!(new = %pair.name, source = %pair.source, "Day-count column converted to years");
    }
    Ok(out)
}

/// Derives the "ever employed" indicator from the employment duration.
///
/// The source column is already sign-corrected by the Cleaner, so the
/// unemployed sentinel (a large positive raw value) has become a large
/// negative value and maps to "No"; every genuinely employed applicant
/// maps to "Yes". This mirrors the reference behavior exactly; the
/// sentinel dependence is a recorded risk, not something to fix here.
pub fn employment_indicator(
    df: &DataFrame,
    source: &str,
    new_col: &str,
) -> Result<DataFrame, PipelineError> {
    let values = df.column(source)?.cast(&DataType::Int64)?;
    let indicator: Vec<Option<&str>> = values
        .i64()?
        .into_iter()
        .map(|v| v.map(|days| if days >= 0 { "Yes" } else { "No" }))
        .collect();
    let mut out = df.clone();
    out.with_column(Column::new(new_col.into(), indicator))?;
    info!(new = new_col, source, "Employment indicator derived");
    Ok(out)
}

/// Runs the feature-derivation steps in order.
pub fn featurize(df: &DataFrame, cfg: &FeatureConfig) -> Result<DataFrame, PipelineError> {
    let with_years = day_to_year(df, &cfg.day_to_year)?;
    let out = employment_indicator(&with_years, &cfg.employed_source, &cfg.employed_column)?;
    info!("Feature engineering completed");
    Ok(out)
}

/// Projects the featurized table onto the persistence-store schema
/// (numeric then categorical columns) for the ingestion path.
pub fn select_user_columns(
    df: &DataFrame,
    numeric: &[String],
    categorical: &[String],
) -> Result<DataFrame, PipelineError> {
    let selection: Vec<&str> = numeric
        .iter()
        .chain(categorical.iter())
        .map(String::as_str)
        .collect();
    Ok(df.select(selection)?)
}

/// Builds k-1 indicator columns for one categorical column over a sorted
/// vocabulary; the first (reference) category is dropped.
pub(crate) fn dummy_columns(
    values: &[Option<&str>],
    vocab: &[String],
    col_name: &str,
) -> Vec<Column> {
    vocab
        .iter()
        .skip(1)
        .map(|category| {
            let indicators: Vec<i32> = values
                .iter()
                .map(|v| i32::from(*v == Some(category.as_str())))
                .collect();
            Column::new(format!("{}_{}", col_name, category).into(), indicators)
        })
        .collect()
}

/// One-hot encodes the selected feature set for modeling.
///
/// Numeric columns and the target pass through untouched; each
/// categorical column becomes indicator columns over its observed
/// vocabulary in lexicographic order, with the first category dropped as
/// the reference. Ordering is deterministic across runs on the same
/// vocabulary.
pub fn one_hot_encode(df: &DataFrame, cfg: &FeatureConfig) -> Result<DataFrame, PipelineError> {
    let mut columns: Vec<Column> = Vec::new();
    for name in &cfg.numeric_columns {
        columns.push(df.column(name)?.clone());
    }
    columns.push(df.column(&cfg.target_column)?.clone());
    info!(
        numeric = cfg.numeric_columns.len(),
        categorical = cfg.categorical_columns.len(),
        "Features selected for encoding"
    );

    for name in &cfg.categorical_columns {
        let series = df.column(name)?.str().map_err(|_| {
            PipelineError::FeatureEngineering(format!(
                "categorical column {} is not string-typed",
                name
            ))
        })?;
        let values: Vec<Option<&str>> = series.into_iter().collect();
        let vocab: Vec<String> = values
            .iter()
            .flatten()
            .map(|v| v.to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        debug!(column = %name, categories = vocab.len(), "Categorical column encoded");
        columns.extend(dummy_columns(&values, &vocab, name));
    }

    Ok(DataFrame::new(columns)?)
}
