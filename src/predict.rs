use polars::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::PredictConfig;
use crate::error::PipelineError;
use crate::features::dummy_columns;
use crate::models::Classifier;

/// Encodes one raw user-submitted field mapping into a single-row table
/// matching the offline encoder's column layout.
///
/// Numeric fields are parsed in configured order; categorical fields are
/// one-hot encoded with drop-first over the configured vocabulary, sorted
/// the same way the offline Featurizer sorts observed categories, so an
/// offline-trained model and online inference see identical encodings.
pub fn transform_input(
    input: &HashMap<String, String>,
    cfg: &PredictConfig,
) -> Result<DataFrame, PipelineError> {
    let mut columns: Vec<Column> = Vec::new();

    for name in &cfg.numeric_columns {
        let raw = input
            .get(name)
            .ok_or_else(|| PipelineError::InvalidInput(format!("missing field {name}")))?;
        let value: f64 = raw.trim().parse().map_err(|_| {
            PipelineError::InvalidInput(format!("field {name} is not numeric: {raw}"))
        })?;
        columns.push(Column::new(name.as_str().into(), vec![value]));
    }

    for vocab in &cfg.categorical_vocab {
        let raw = input.get(&vocab.column).ok_or_else(|| {
            PipelineError::InvalidInput(format!("missing field {}", vocab.column))
        })?;
        let mut sorted = vocab.values.clone();
        sorted.sort();
        let values = [Some(raw.as_str())];
        columns.extend(dummy_columns(&values, &sorted, &vocab.column));
    }

    let df = DataFrame::new(columns)?;
    debug!(columns = df.width(), "User input transformed into an encoded record");
    Ok(df)
}

/// Runs an encoded single-row record through a fitted model.
pub fn get_prediction(
    record: &DataFrame,
    model: &dyn Classifier,
) -> Result<(f64, i32), PipelineError> {
    let proba = model
        .predict_proba(record)?
        .f64()?
        .get(0)
        .ok_or_else(|| PipelineError::ModelPrediction("empty prediction output".into()))?;
    let binary = model
        .predict(record)?
        .i32()?
        .get(0)
        .ok_or_else(|| PipelineError::ModelPrediction("empty prediction output".into()))?;
    info!(probability = proba, label = binary, "Applicant scored");
    Ok((proba, binary))
}
