use polars::prelude::*;
use tracing::info;

use crate::cleaning::{clean, merge_on_key};
use crate::config::Config;
use crate::error::PipelineError;
use crate::evaluate::{compute_metrics, EvaluationReport};
use crate::features::{featurize, one_hot_encode, select_user_columns};
use crate::labels::derive_labels;
use crate::models::Classifier;
use crate::score::compute_score;
use crate::train::{train_model, TrainTestSplit};

/// Acquisition and cleaning: raw tables in, merged labeled table out.
pub fn run_clean_step(
    applications: &DataFrame,
    credit: &DataFrame,
    cfg: &Config,
) -> Result<DataFrame, PipelineError> {
    let cleaned = clean(applications, &cfg.clean)?;
    let labels = derive_labels(credit, &cfg.label)?;
    let merged = merge_on_key(&cleaned, &labels, &cfg.clean.key_column)?;
    info!(shape = ?merged.shape(), "Clean step finished");
    Ok(merged)
}

/// Feature derivation and encoding. Returns the encoded modeling table
/// and the ingestion-schema projection for the persistence store.
pub fn run_featurize_step(
    merged: &DataFrame,
    cfg: &Config,
) -> Result<(DataFrame, DataFrame), PipelineError> {
    let featurized = featurize(merged, &cfg.features)?;
    let encoded = one_hot_encode(&featurized, &cfg.features)?;
    let user = select_user_columns(
        &featurized,
        &cfg.features.numeric_columns,
        &cfg.features.categorical_columns,
    )?;
    info!(encoded_shape = ?encoded.shape(), "Featurize step finished");
    Ok((encoded, user))
}

/// Class rebalancing, splitting, and model fitting.
pub fn run_model_step(
    encoded: &DataFrame,
    cfg: &Config,
) -> Result<(Box<dyn Classifier>, TrainTestSplit), PipelineError> {
    let (model, split) = train_model(encoded, &cfg.model)?;
    info!(
        train_rows = split.x_train.height(),
        test_rows = split.x_test.height(),
        "Model step finished"
    );
    Ok((model, split))
}

/// Scoring of the held-out partition.
pub fn run_score_step(
    model: &dyn Classifier,
    test: &DataFrame,
    cfg: &Config,
) -> Result<DataFrame, PipelineError> {
    compute_score(model, test, &cfg.score)
}

fn require_no_nulls<T>(values: Vec<Option<T>>, column: &str) -> Result<Vec<T>, PipelineError> {
    values
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| {
                PipelineError::Evaluation(format!("missing value in column {column}"))
            })
        })
        .collect()
}

/// Metric computation from the labeled held-out table and the scored
/// table. A missing value in any input column would misalign the metric
/// vectors, so it is an error rather than a silent skip.
pub fn run_evaluate_step(
    test: &DataFrame,
    predictions: &DataFrame,
    cfg: &Config,
) -> Result<EvaluationReport, PipelineError> {
    let y_true = require_no_nulls(
        test.column(&cfg.evaluate.target_column)?
            .cast(&DataType::Int32)?
            .i32()?
            .into_iter()
            .collect(),
        &cfg.evaluate.target_column,
    )?;
    let proba = require_no_nulls(
        predictions
            .column(&cfg.evaluate.probability_column)?
            .f64()?
            .into_iter()
            .collect(),
        &cfg.evaluate.probability_column,
    )?;
    let binary = require_no_nulls(
        predictions
            .column(&cfg.evaluate.binary_column)?
            .i32()?
            .into_iter()
            .collect(),
        &cfg.evaluate.binary_column,
    )?;
    compute_metrics(&y_true, &proba, &binary, &cfg.evaluate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::*;
    use polars::df;

    fn test_config() -> Config {
        let replacement = |from: &str, to: &str| Replacement {
            from: from.into(),
            to: to.into(),
        };
        Config {
            data: DataConfig {
                application_path: String::new(),
                credit_path: String::new(),
                merged_output: String::new(),
                ingest_output: String::new(),
                encoded_output: String::new(),
                train_output: String::new(),
                test_output: String::new(),
                prediction_output: String::new(),
                metrics_output: String::new(),
                model_path: String::new(),
            },
            clean: CleanConfig {
                fill_column: "occupation_type".into(),
                fill_value: "Not Specified".into(),
                category_column: "name_education_type".into(),
                category_merge: vec![
                    replacement("Secondary / secondary special", "Secondary education"),
                    replacement("Lower secondary", "Secondary education"),
                    replacement("Academic degree", "Higher education"),
                ],
                negate_columns: vec!["days_birth".into(), "days_employed".into()],
                to_string_columns: vec!["flag_mobil".into()],
                binary_relabel: vec![
                    ColumnRelabel {
                        column: "flag_own_car".into(),
                        map: vec![replacement("Y", "Yes"), replacement("N", "No")],
                    },
                    ColumnRelabel {
                        column: "flag_mobil".into(),
                        map: vec![replacement("1", "Yes"), replacement("0", "No")],
                    },
                ],
                key_column: "id".into(),
            },
            label: LabelConfig {
                id_column: "id".into(),
                status_column: "status".into(),
                target_column: "target".into(),
                status_map: vec![
                    replacement("C", "no_debt"),
                    replacement("X", "no_debt"),
                    replacement("0", "moderate_overdue"),
                    replacement("1", "moderate_overdue"),
                    replacement("2", "severe_overdue"),
                    replacement("3", "severe_overdue"),
                    replacement("4", "severe_overdue"),
                    replacement("5", "severe_overdue"),
                ],
                buckets: [
                    "severe_overdue".into(),
                    "moderate_overdue".into(),
                    "no_debt".into(),
                ],
            },
            features: FeatureConfig {
                day_to_year: vec![
                    DerivedColumn { name: "age".into(), source: "days_birth".into() },
                    DerivedColumn { name: "years_employed".into(), source: "days_employed".into() },
                ],
                employed_source: "days_employed".into(),
                employed_column: "employed".into(),
                numeric_columns: vec!["amt_income_total".into(), "age".into(), "years_employed".into()],
                categorical_columns: vec![
                    "flag_own_car".into(),
                    "name_education_type".into(),
                    "employed".into(),
                ],
                target_column: "target".into(),
            },
            model: ModelConfig {
                target_column: "target".into(),
                sampling_strategy: 1.0,
                test_size: 0.4,
                n_estimators: 10,
                max_depth: 5,
                random_state: 0,
            },
            score: ScoreConfig {
                target_column: "target".into(),
                probability_column: "ypred_proba".into(),
                binary_column: "ypred_bin".into(),
            },
            evaluate: EvaluateConfig {
                target_column: "target".into(),
                probability_column: "ypred_proba".into(),
                binary_column: "ypred_bin".into(),
                metrics: vec![
                    Metric::Auc,
                    Metric::Accuracy,
                    Metric::Confusion,
                    Metric::ClassificationReport,
                ],
            },
            predict: PredictConfig {
                numeric_columns: vec![],
                categorical_vocab: vec![],
            },
        }
    }

    fn applications(n: usize) -> DataFrame {
        let ids: Vec<i64> = (1..=n as i64).collect();
        let own_car: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { "Y" } else { "N" }).collect();
        let edu: Vec<&str> = (0..n)
            .map(|i| {
                if i % 3 == 0 {
                    "Secondary / secondary special"
                } else if i % 3 == 1 {
                    "Higher education"
                } else {
                    "Incomplete higher"
                }
            })
            .collect();
        let occupation: Vec<Option<&str>> = (0..n)
            .map(|i| if i % 4 == 0 { None } else { Some("Laborers") })
            .collect();
        let income: Vec<f64> = (0..n).map(|i| 80_000.0 + 10_000.0 * i as f64).collect();
        let days_birth: Vec<i64> = (0..n).map(|i| -10_000 - 400 * i as i64).collect();
        let days_employed: Vec<i64> = (0..n)
            .map(|i| if i % 5 == 4 { 365_243 } else { -1_000 - 300 * i as i64 })
            .collect();
        let flag_mobil: Vec<i64> = (0..n).map(|i| (i % 2) as i64).collect();
        df!(
            "id" => ids,
            "flag_own_car" => own_car,
            "name_education_type" => edu,
            "occupation_type" => occupation,
            "amt_income_total" => income,
            "days_birth" => days_birth,
            "days_employed" => days_employed,
            "flag_mobil" => flag_mobil,
        )
        .unwrap()
    }

    /// 10 months per applicant: delinquent applicants are mostly severely
    /// overdue, healthy ones mostly debt-free.
    fn credit_history(ids: &[i64], delinquent: &dyn Fn(i64) -> bool) -> DataFrame {
        let mut out_ids = Vec::new();
        let mut statuses = Vec::new();
        for &id in ids {
            for month in 0..10 {
                out_ids.push(id);
                let status = if delinquent(id) {
                    if month < 8 { "5" } else { "0" }
                } else if month < 9 {
                    "C"
                } else {
                    "X"
                };
                statuses.push(status);
            }
        }
        df!("id" => out_ids, "status" => statuses).unwrap()
    }

    #[test]
    fn label_scenario_majority_status_decides() {
        // 10 applicants, credit history for 3 of them only.
        let cfg = test_config();
        let apps = applications(10);
        let credit = credit_history(&[1, 2, 3], &|id| id == 1 || id == 3);

        let merged = run_clean_step(&apps, &credit, &cfg).unwrap();
        assert_eq!(merged.height(), 3);

        let targets = merged.column("target").unwrap().i32().unwrap();
        let ids = merged.column("id").unwrap().i64().unwrap();
        for (id, target) in ids.into_no_null_iter().zip(targets.into_iter()) {
            match id {
                1 | 3 => assert_eq!(target, Some(1)),
                2 => assert_eq!(target, Some(0)),
                _ => panic!("unexpected id {id}"),
            }
        }
    }

    #[test]
    fn evaluate_step_rejects_missing_values() {
        let cfg = test_config();
        let test = df!("target" => [0i32, 1, 0]).unwrap();
        let predictions = df!(
            "ypred_proba" => [Some(0.2f64), None, Some(0.7)],
            "ypred_bin" => [0i32, 1, 1],
        )
        .unwrap();
        let err = run_evaluate_step(&test, &predictions, &cfg).unwrap_err();
        assert!(matches!(err, crate::error::PipelineError::Evaluation(_)));
    }

    #[test]
    fn full_pipeline_trains_scores_and_evaluates() {
        let cfg = test_config();
        let n = 30;
        let apps = applications(n);
        let ids: Vec<i64> = (1..=n as i64).collect();
        // Half the applicants delinquent.
        let credit = credit_history(&ids, &|id| id % 2 == 0);

        let merged = run_clean_step(&apps, &credit, &cfg).unwrap();
        let (encoded, user) = run_featurize_step(&merged, &cfg).unwrap();
        assert_eq!(user.width(), cfg.features.numeric_columns.len() + cfg.features.categorical_columns.len());
        assert!(encoded.column("target").is_ok());

        let (model, split) = run_model_step(&encoded, &cfg).unwrap();
        let mut test = split.x_test.clone();
        test.with_column(split.y_test.clone()).unwrap();

        let predictions = run_score_step(model.as_ref(), &test, &cfg).unwrap();
        assert_eq!(predictions.height(), split.x_test.height());

        let report = run_evaluate_step(&test, &predictions, &cfg).unwrap();
        let auc = report.auc.unwrap();
        assert!((0.0..=1.0).contains(&auc));
        let accuracy = report.accuracy.unwrap();
        assert!((0.0..=1.0).contains(&accuracy));
        let cm = report.confusion.unwrap();
        assert_eq!(
            cm.true_negative + cm.false_positive + cm.false_negative + cm.true_positive,
            split.x_test.height()
        );
    }
}
