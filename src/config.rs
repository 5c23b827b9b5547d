use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::PipelineError;

/// Full pipeline configuration, one typed section per stage.
///
/// Loaded once from a TOML document and threaded explicitly into each
/// stage call; no stage reads ambient process-wide state.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub clean: CleanConfig,
    pub label: LabelConfig,
    pub features: FeatureConfig,
    pub model: ModelConfig,
    pub score: ScoreConfig,
    pub evaluate: EvaluateConfig,
    pub predict: PredictConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PipelineError> {
        let contents = fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&contents).map_err(|e| PipelineError::Config(e.to_string()))?;
        Ok(config)
    }
}

/// File locations for the batch run.
#[derive(Debug, Deserialize)]
pub struct DataConfig {
    pub application_path: String,
    pub credit_path: String,
    pub merged_output: String,
    pub ingest_output: String,
    pub encoded_output: String,
    pub train_output: String,
    pub test_output: String,
    pub prediction_output: String,
    pub metrics_output: String,
    pub model_path: String,
}

/// An ordered old -> new substring replacement.
#[derive(Debug, Clone, Deserialize)]
pub struct Replacement {
    pub from: String,
    pub to: String,
}

/// Per-column relabeling map, applied pair by pair in listed order.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnRelabel {
    pub column: String,
    pub map: Vec<Replacement>,
}

#[derive(Debug, Deserialize)]
pub struct CleanConfig {
    /// Column whose missing values are filled before the null drop.
    pub fill_column: String,
    pub fill_value: String,
    /// Categorical column whose near-duplicate categories get merged.
    pub category_column: String,
    pub category_merge: Vec<Replacement>,
    /// Day-count columns stored as negative offsets in the raw data.
    pub negate_columns: Vec<String>,
    /// Columns coerced to text before (and again after) relabeling.
    pub to_string_columns: Vec<String>,
    pub binary_relabel: Vec<ColumnRelabel>,
    /// Join key between applications and derived labels.
    pub key_column: String,
}

#[derive(Debug, Deserialize)]
pub struct LabelConfig {
    pub id_column: String,
    pub status_column: String,
    pub target_column: String,
    /// Raw status code -> bucket name, many-to-3.
    pub status_map: Vec<Replacement>,
    /// The three bucket names. Order is semantic: the tie-break rules
    /// compare the counts positionally.
    pub buckets: [String; 3],
}

/// (new column, source day-count column) pair for calendar conversion.
#[derive(Debug, Clone, Deserialize)]
pub struct DerivedColumn {
    pub name: String,
    pub source: String,
}

#[derive(Debug, Deserialize)]
pub struct FeatureConfig {
    pub day_to_year: Vec<DerivedColumn>,
    pub employed_source: String,
    pub employed_column: String,
    pub numeric_columns: Vec<String>,
    pub categorical_columns: Vec<String>,
    pub target_column: String,
}

#[derive(Debug, Deserialize)]
pub struct ModelConfig {
    pub target_column: String,
    /// Desired minority/majority ratio after oversampling.
    pub sampling_strategy: f64,
    pub test_size: f64,
    pub n_estimators: usize,
    pub max_depth: u32,
    pub random_state: u64,
}

#[derive(Debug, Deserialize)]
pub struct ScoreConfig {
    pub target_column: String,
    pub probability_column: String,
    pub binary_column: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Auc,
    Accuracy,
    Confusion,
    ClassificationReport,
}

#[derive(Debug, Deserialize)]
pub struct EvaluateConfig {
    pub target_column: String,
    pub probability_column: String,
    pub binary_column: String,
    pub metrics: Vec<Metric>,
}

/// Category vocabulary for one form field, so the online encoder emits
/// exactly the indicator columns the offline encoder produced.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryVocab {
    pub column: String,
    pub values: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PredictConfig {
    pub numeric_columns: Vec<String>,
    pub categorical_vocab: Vec<CategoryVocab>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stage_sections() {
        let doc = r#"
            [data]
            application_path = "data/sample/application_record.csv"
            credit_path = "data/sample/credit_record.csv"
            merged_output = "data/artifacts/merged.csv"
            ingest_output = "data/artifacts/ingest_data.csv"
            encoded_output = "data/artifacts/encoded.csv"
            train_output = "data/sample/train.csv"
            test_output = "data/sample/test.csv"
            prediction_output = "data/artifacts/predictions.csv"
            metrics_output = "data/artifacts/evaluation_result.txt"
            model_path = "models/loan_risk.model"

            [clean]
            fill_column = "occupation_type"
            fill_value = "Not Specified"
            category_column = "name_education_type"
            negate_columns = ["days_birth", "days_employed"]
            to_string_columns = ["flag_mobil"]
            key_column = "id"

            [[clean.category_merge]]
            from = "Lower secondary"
            to = "Secondary education"

            [[clean.binary_relabel]]
            column = "flag_own_car"
            map = [{ from = "Y", to = "Yes" }, { from = "N", to = "No" }]

            [label]
            id_column = "id"
            status_column = "status"
            target_column = "target"
            status_map = [{ from = "C", to = "no_debt" }]
            buckets = ["severe_overdue", "moderate_overdue", "no_debt"]

            [features]
            day_to_year = [{ name = "age", source = "days_birth" }]
            employed_source = "days_employed"
            employed_column = "employed"
            numeric_columns = ["age"]
            categorical_columns = ["flag_own_car"]
            target_column = "target"

            [model]
            target_column = "target"
            sampling_strategy = 1.0
            test_size = 0.4
            n_estimators = 10
            max_depth = 10
            random_state = 0

            [score]
            target_column = "target"
            probability_column = "ypred_proba"
            binary_column = "ypred_bin"

            [evaluate]
            target_column = "target"
            probability_column = "ypred_proba"
            binary_column = "ypred_bin"
            metrics = ["auc", "accuracy", "confusion", "classification_report"]

            [predict]
            numeric_columns = ["age"]
            categorical_vocab = [{ column = "flag_own_car", values = ["Yes", "No"] }]
        "#;

        let config: Config = toml::from_str(doc).unwrap();
        assert_eq!(config.clean.fill_value, "Not Specified");
        assert_eq!(config.label.buckets[2], "no_debt");
        assert_eq!(config.model.test_size, 0.4);
        assert!(config.evaluate.metrics.contains(&Metric::ClassificationReport));
        assert_eq!(config.clean.binary_relabel[0].map[1].to, "No");
    }
}
