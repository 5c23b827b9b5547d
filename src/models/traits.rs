use polars::prelude::*;

use crate::error::PipelineError;

/// Capability interface for the pluggable binary classifier.
///
/// Trainer and Scorer only ever talk to this trait, so the tree-ensemble
/// implementation is swappable without touching their logic. A fitted
/// model is never mutated afterwards.
pub trait Classifier {
    /// Fits the model on a feature table and a 0/1 target column.
    fn fit(&mut self, features: &DataFrame, target: &Series) -> Result<(), PipelineError>;

    /// Probability of the positive class for each input row, in [0, 1].
    fn predict_proba(&self, features: &DataFrame) -> Result<Series, PipelineError>;

    /// Binary 0/1 prediction for each input row.
    fn predict(&self, features: &DataFrame) -> Result<Series, PipelineError>;

    /// Persists the fitted model.
    fn save(&self, path: &str) -> Result<(), PipelineError>;
}

impl std::fmt::Debug for dyn Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Classifier")
    }
}

/// Flattens a feature table into row-major f32 rows for the model.
pub fn to_feature_rows(features: &DataFrame) -> Result<Vec<Vec<f32>>, PipelineError> {
    let floats = features
        .clone()
        .lazy()
        .select([col("*").cast(DataType::Float32)])
        .collect()?;

    let columns: Vec<Vec<f32>> = floats
        .get_columns()
        .iter()
        .map(|column| {
            Ok(column
                .f32()?
                .into_iter()
                .map(|v| v.unwrap_or(0.0))
                .collect())
        })
        .collect::<Result<_, PipelineError>>()?;

    // Transpose to the row-major layout the model consumes.
    let rows = (0..floats.height())
        .map(|row_idx| columns.iter().map(|column| column[row_idx]).collect())
        .collect();
    Ok(rows)
}

/// Extracts a 0/1 target column as f32 labels.
pub fn to_labels(target: &Series) -> Result<Vec<f32>, PipelineError> {
    let casted = target.cast(&DataType::Float32)?;
    casted
        .f32()?
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| {
                PipelineError::ModelTraining("target column contains missing values".into())
            })
        })
        .collect()
}
