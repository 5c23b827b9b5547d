use gbdt::config::Config as GbdtConfig;
use gbdt::decision_tree::{Data, DataVec};
use gbdt::gradient_boost::GBDT;
use polars::prelude::*;
use tracing::{debug, info};

use super::traits::{to_feature_rows, to_labels, Classifier};
use crate::config::ModelConfig;
use crate::error::PipelineError;

/// Gradient-boosted tree ensemble behind the `Classifier` capability.
///
/// Trained with log-likelihood loss on +-1 labels; `predict` on the
/// underlying model then yields the positive-class probability. Data and
/// feature sampling ratios are pinned to 1.0 so a fixed configuration
/// gives bit-for-bit reproducible trees.
pub struct GbdtClassifier {
    model: Option<GBDT>,
    n_estimators: usize,
    max_depth: u32,
}

impl GbdtClassifier {
    pub fn new(cfg: &ModelConfig) -> Self {
        Self {
            model: None,
            n_estimators: cfg.n_estimators,
            max_depth: cfg.max_depth,
        }
    }

    /// Restores a previously saved model for serving.
    pub fn load(path: &str) -> Result<Self, PipelineError> {
        let model = GBDT::load_model(path)
            .map_err(|e| PipelineError::ModelPrediction(e.to_string()))?;
        Ok(Self {
            model: Some(model),
            n_estimators: 0,
            max_depth: 0,
        })
    }

    fn fitted(&self) -> Result<&GBDT, PipelineError> {
        self.model
            .as_ref()
            .ok_or_else(|| PipelineError::ModelPrediction("model not trained".into()))
    }

    fn raw_proba(&self, features: &DataFrame) -> Result<Vec<f64>, PipelineError> {
        let rows = to_feature_rows(features)?;
        let test_data: DataVec = rows
            .into_iter()
            .map(|row| Data::new_test_data(row, None))
            .collect();
        let predictions = self.fitted()?.predict(&test_data);
        // Log-likelihood predictions are probabilities; clamp guards the
        // [0, 1] contract against float drift.
        Ok(predictions
            .into_iter()
            .map(|p| (p as f64).clamp(0.0, 1.0))
            .collect())
    }
}

impl Classifier for GbdtClassifier {
    fn fit(&mut self, features: &DataFrame, target: &Series) -> Result<(), PipelineError> {
        if features.width() == 0 || features.height() == 0 {
            return Err(PipelineError::ModelTraining("empty feature set".into()));
        }

        let mut config = GbdtConfig::new();
        config.set_feature_size(features.width());
        config.set_max_depth(self.max_depth);
        config.set_iterations(self.n_estimators);
        config.set_shrinkage(0.1);
        config.set_loss("LogLikelyhood");
        config.set_debug(false);
        config.set_data_sample_ratio(1.0);
        config.set_feature_sample_ratio(1.0);
        config.set_training_optimization_level(2);
        debug!(
            feature_size = features.width(),
            iterations = self.n_estimators,
            max_depth = self.max_depth,
            "GBDT configured"
        );

        let rows = to_feature_rows(features)?;
        let labels = to_labels(target)?;
        let mut train_data: DataVec = rows
            .into_iter()
            .zip(labels)
            .map(|(row, label)| {
                // Log-likelihood loss expects labels in {-1, 1}.
                let signed = if label > 0.0 { 1.0 } else { -1.0 };
                Data::new_training_data(row, 1.0, signed, None)
            })
            .collect();

        let mut model = GBDT::new(&config);
        model.fit(&mut train_data);
        self.model = Some(model);
        info!("Tree-ensemble classifier trained");
        Ok(())
    }

    fn predict_proba(&self, features: &DataFrame) -> Result<Series, PipelineError> {
        let proba = self.raw_proba(features)?;
        Ok(Series::new("proba".into(), proba))
    }

    fn predict(&self, features: &DataFrame) -> Result<Series, PipelineError> {
        let binary: Vec<i32> = self
            .raw_proba(features)?
            .into_iter()
            .map(|p| i32::from(p >= 0.5))
            .collect();
        Ok(Series::new("prediction".into(), binary))
    }

    fn save(&self, path: &str) -> Result<(), PipelineError> {
        let model = self.fitted()?;
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        model
            .save_model(path)
            .map_err(|e| PipelineError::ModelTraining(e.to_string()))?;
        info!(path, "Model saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::df;

    fn model_config() -> ModelConfig {
        ModelConfig {
            target_column: "target".into(),
            sampling_strategy: 1.0,
            test_size: 0.4,
            n_estimators: 10,
            max_depth: 3,
            random_state: 0,
        }
    }

    fn separable_frame() -> (DataFrame, Series) {
        let features = df!(
            "x" => [0.1f64, 0.2, 0.15, 0.9, 0.85, 0.95, 0.05, 0.8, 0.25, 0.7],
            "y" => [1.0f64, 1.1, 0.9, 5.0, 5.2, 4.8, 1.05, 5.1, 0.95, 4.9],
        )
        .unwrap();
        let target = Series::new("target".into(), [0i32, 0, 0, 1, 1, 1, 0, 1, 0, 1]);
        (features, target)
    }

    #[test]
    fn learns_a_separable_problem() {
        let (features, target) = separable_frame();
        let mut model = GbdtClassifier::new(&model_config());
        model.fit(&features, &target).unwrap();

        let proba = model.predict_proba(&features).unwrap();
        let proba = proba.f64().unwrap();
        assert_eq!(proba.len(), features.height());
        for p in proba.into_no_null_iter() {
            assert!((0.0..=1.0).contains(&p));
        }

        let binary = model.predict(&features).unwrap();
        let binary = binary.i32().unwrap();
        for b in binary.into_no_null_iter() {
            assert!(b == 0 || b == 1);
        }
    }

    #[test]
    fn refusing_to_predict_before_fit() {
        let (features, _) = separable_frame();
        let model = GbdtClassifier::new(&model_config());
        assert!(model.predict(&features).is_err());
    }

    #[test]
    fn empty_feature_set_is_fatal() {
        let features = DataFrame::empty();
        let target = Series::new("target".into(), Vec::<i32>::new());
        let mut model = GbdtClassifier::new(&model_config());
        assert!(model.fit(&features, &target).is_err());
    }
}
