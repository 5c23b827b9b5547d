use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::config::ModelConfig;
use crate::error::PipelineError;
use crate::models::{Classifier, GbdtClassifier};

/// Train/test partitions produced by the Trainer, row-aligned pairs of
/// feature tables and target columns.
#[derive(Debug)]
pub struct TrainTestSplit {
    pub x_train: DataFrame,
    pub x_test: DataFrame,
    pub y_train: Series,
    pub y_test: Series,
}

fn take_rows(df: &DataFrame, indices: &[u32]) -> Result<DataFrame, PipelineError> {
    let idx = UInt32Chunked::from_vec("idx".into(), indices.to_vec());
    Ok(df.take(&idx)?)
}

/// Duplicates minority-class rows (with replacement) until the configured
/// minority/majority ratio is reached. Never fabricates synthetic
/// feature values; every appended row is a copy of a real one.
fn oversample_indices(targets: &[i32], strategy: f64, rng: &mut StdRng) -> Vec<u32> {
    let positives: Vec<u32> = targets
        .iter()
        .enumerate()
        .filter(|(_, t)| **t == 1)
        .map(|(i, _)| i as u32)
        .collect();
    let negatives: Vec<u32> = targets
        .iter()
        .enumerate()
        .filter(|(_, t)| **t == 0)
        .map(|(i, _)| i as u32)
        .collect();

    let (minority, majority) = if positives.len() <= negatives.len() {
        (&positives, &negatives)
    } else {
        (&negatives, &positives)
    };

    let desired = (strategy * majority.len() as f64).round() as usize;
    let mut indices: Vec<u32> = (0..targets.len() as u32).collect();
    if desired <= minority.len() {
        debug!("Class ratio already satisfies the sampling strategy");
        return indices;
    }

    let extra = desired - minority.len();
    indices.extend((0..extra).map(|_| minority[rng.gen_range(0..minority.len())]));
    info!(
        minority_before = minority.len(),
        minority_after = desired,
        "Minority class oversampled"
    );
    indices
}

/// Shuffled train/test partition over row indices, test fraction first.
fn split_indices(n: usize, test_size: f64, rng: &mut StdRng) -> (Vec<u32>, Vec<u32>) {
    let mut indices: Vec<u32> = (0..n as u32).collect();
    indices.shuffle(rng);
    let n_test = ((n as f64) * test_size).ceil() as usize;
    let test = indices[..n_test].to_vec();
    let train = indices[n_test..].to_vec();
    (train, test)
}

/// Trains the tree-ensemble classifier on the encoded dataset.
///
/// Rebalances classes by random oversampling, splits train/test with the
/// same seed, and fits. Given identical input, configuration, and seed,
/// partitions and decision boundaries are reproducible.
pub fn train_model(
    data: &DataFrame,
    cfg: &ModelConfig,
) -> Result<(Box<dyn Classifier>, TrainTestSplit), PipelineError> {
    if data.column(&cfg.target_column).is_err() {
        return Err(PipelineError::Config(format!(
            "target column {} absent from the encoded dataset",
            cfg.target_column
        )));
    }

    // Label ambiguity upstream shows up as missing targets here.
    let labeled = data
        .clone()
        .lazy()
        .filter(col(cfg.target_column.as_str()).is_not_null())
        .collect()?;
    if labeled.height() < data.height() {
        warn!(
            dropped = data.height() - labeled.height(),
            "Rows without a derived label excluded from training"
        );
    }

    let targets: Vec<i32> = labeled
        .column(&cfg.target_column)?
        .cast(&DataType::Int32)?
        .i32()?
        .into_no_null_iter()
        .collect();
    let positives = targets.iter().filter(|t| **t == 1).count();
    let negatives = targets.len() - positives;
    info!(positives, negatives, "Initial class counts");
    if positives == 0 || negatives == 0 {
        return Err(PipelineError::ModelTraining(
            "degenerate class distribution: only one class present".into(),
        ));
    }

    let mut rng = StdRng::seed_from_u64(cfg.random_state);
    let over_indices = oversample_indices(&targets, cfg.sampling_strategy, &mut rng);
    let rebalanced = take_rows(&labeled, &over_indices)?;

    let mut rng = StdRng::seed_from_u64(cfg.random_state);
    let (train_idx, test_idx) = split_indices(rebalanced.height(), cfg.test_size, &mut rng);
    let train = take_rows(&rebalanced, &train_idx)?;
    let test = take_rows(&rebalanced, &test_idx)?;
    debug!(train = train.height(), test = test.height(), "Train/test split done");

    let split = TrainTestSplit {
        x_train: train.drop(&cfg.target_column)?,
        x_test: test.drop(&cfg.target_column)?,
        y_train: train.column(&cfg.target_column)?.as_materialized_series().clone(),
        y_test: test.column(&cfg.target_column)?.as_materialized_series().clone(),
    };

    let mut model = GbdtClassifier::new(cfg);
    model.fit(&split.x_train, &split.y_train)?;
    info!("Classifier successfully trained");

    Ok((Box::new(model), split))
}
