use polars::error::PolarsError;
use thiserror::Error;

/// Errors surfaced by the pipeline stages.
///
/// Configuration and model-fit problems are fatal and abort the stage;
/// data-quality problems inside the Cleaner are soft and only warn.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("data loading error: {0}")]
    DataLoading(#[from] PolarsError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("label derivation error: {0}")]
    LabelDerivation(String),

    #[error("feature engineering error: {0}")]
    FeatureEngineering(String),

    #[error("model training error: {0}")]
    ModelTraining(String),

    #[error("model prediction error: {0}")]
    ModelPrediction(String),

    #[error("evaluation error: {0}")]
    Evaluation(String),

    #[error("invalid input error: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
