use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{CleanConfig, ColumnRelabel, Replacement};
use crate::error::PipelineError;

/// Fills missing values in one column with a configured value.
pub fn fill_missing(df: &DataFrame, col_name: &str, value: &str) -> Result<DataFrame, PipelineError> {
    debug!(column = col_name, value, "Filling missing values");
    let out = df
        .clone()
        .lazy()
        .with_column(col(col_name).fill_null(lit(value)).alias(col_name))
        .collect()?;
    Ok(out)
}

/// Drops every row that still contains a missing value in any column.
pub fn drop_missing(df: &DataFrame) -> Result<DataFrame, PipelineError> {
    let out = df.clone().lazy().drop_nulls(None).collect()?;
    debug!(before = df.height(), after = out.height(), "Dropped rows with missing values");
    Ok(out)
}

/// Consolidates near-duplicate categories in one column by applying the
/// configured substring replacements in map order. Substring, not
/// full-value, so partial matches inside longer category strings are
/// rewritten too.
pub fn consolidate_categories(
    df: &DataFrame,
    col_name: &str,
    replace_map: &[Replacement],
) -> Result<DataFrame, PipelineError> {
    let mut lf = df.clone().lazy();
    for pair in replace_map {
        lf = lf.with_column(
            col(col_name)
                .str()
                .replace_all(lit(pair.from.as_str()), lit(pair.to.as_str()), true)
                .alias(col_name),
        );
    }
    debug!(column = col_name, "Categorical column consolidated");
    Ok(lf.collect()?)
}

/// Flips the sign of the given day-count columns. Raw values are stored
/// as non-positive offsets from the reference date.
pub fn negate_columns(df: &DataFrame, cols: &[String]) -> Result<DataFrame, PipelineError> {
    let mut lf = df.clone().lazy();
    for c in cols {
        lf = lf.with_column((col(c.as_str()) * lit(-1)).alias(c.as_str()));
        info!(column = %c, "Column sign flipped from negative to positive");
    }
    Ok(lf.collect()?)
}

/// Casts the given columns to their text representation. Relabeling is
/// substring-based and needs text input, so this runs before it and once
/// more after it.
pub fn coerce_to_string(df: &DataFrame, cols: &[String]) -> Result<DataFrame, PipelineError> {
    let mut lf = df.clone().lazy();
    for c in cols {
        lf = lf.with_column(col(c.as_str()).cast(DataType::String).alias(c.as_str()));
        debug!(column = %c, "Column coerced to string");
    }
    Ok(lf.collect()?)
}

/// Relabels binary categorical columns (e.g. "Y" -> "Yes") to match the
/// vocabulary the serving layer's input form uses.
pub fn relabel_binary(
    df: &DataFrame,
    relabels: &[ColumnRelabel],
) -> Result<DataFrame, PipelineError> {
    let mut lf = df.clone().lazy();
    for relabel in relabels {
        for pair in &relabel.map {
            lf = lf.with_column(
                col(relabel.column.as_str())
                    .str()
                    .replace_all(lit(pair.from.as_str()), lit(pair.to.as_str()), true)
                    .alias(relabel.column.as_str()),
            );
        }
        debug!(column = %relabel.column, "Binary categories relabeled");
    }
    Ok(lf.collect()?)
}

fn residual_null_count(df: &DataFrame) -> usize {
    df.get_columns().iter().map(|c| c.null_count()).sum()
}

/// Runs the full cleaning sequence in its fixed order. Later steps assume
/// the earlier ones already normalized their inputs.
pub fn clean(df: &DataFrame, cfg: &CleanConfig) -> Result<DataFrame, PipelineError> {
    let filled = fill_missing(df, &cfg.fill_column, &cfg.fill_value)?;
    let no_na = drop_missing(&filled)?;
    let merged_cats = consolidate_categories(&no_na, &cfg.category_column, &cfg.category_merge)?;
    let signed = negate_columns(&merged_cats, &cfg.negate_columns)?;
    let stringified = coerce_to_string(&signed, &cfg.to_string_columns)?;
    let relabeled = relabel_binary(&stringified, &cfg.binary_relabel)?;
    let out = coerce_to_string(&relabeled, &cfg.to_string_columns)?;

    // Soft invariant: warn but proceed, downstream tolerates clean-enough.
    let residual = residual_null_count(&out);
    if residual != 0 {
        warn!(residual, "Missing values remain in the cleaned table");
    } else {
        info!("No missing values remain after the cleaning steps");
    }

    Ok(out)
}

/// Inner-joins cleaned applicant attributes with derived labels on the
/// applicant identifier.
pub fn merge_on_key(
    left: &DataFrame,
    right: &DataFrame,
    key: &str,
) -> Result<DataFrame, PipelineError> {
    let out = left
        .clone()
        .lazy()
        .join(
            right.clone().lazy(),
            [col(key)],
            [col(key)],
            JoinArgs::new(JoinType::Inner),
        )
        .collect()?;
    info!(shape = ?out.shape(), "Applications merged with labels");
    Ok(out)
}
