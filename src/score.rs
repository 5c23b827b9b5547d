use polars::prelude::*;
use tracing::info;

use crate::config::ScoreConfig;
use crate::error::PipelineError;
use crate::models::Classifier;

/// Applies a fitted model to a held-out table.
///
/// The output carries the positive-class probability and the binary
/// prediction, one row per input row in input order.
pub fn compute_score(
    model: &dyn Classifier,
    test: &DataFrame,
    cfg: &ScoreConfig,
) -> Result<DataFrame, PipelineError> {
    let features = if test.column(&cfg.target_column).is_ok() {
        test.drop(&cfg.target_column)?
    } else {
        test.clone()
    };

    let mut proba = model.predict_proba(&features)?;
    proba.rename(cfg.probability_column.as_str().into());
    let mut binary = model.predict(&features)?;
    binary.rename(cfg.binary_column.as_str().into());

    let out = DataFrame::new(vec![proba.into_column(), binary.into_column()])?;
    info!(rows = out.height(), "Test set scored");
    Ok(out)
}
