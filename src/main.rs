use anyhow::Result;
use loan_risk_pipeline::data_loader::{import_application_data, import_credit_data, write_csv};
use loan_risk_pipeline::pipeline::{
    run_clean_step, run_evaluate_step, run_featurize_step, run_model_step, run_score_step,
};
use loan_risk_pipeline::Config;
use tracing::{debug, info};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("Starting loan delinquency risk pipeline");

    let config_path = "config.toml";
    debug!("Loading config from path: {}", config_path);
    let config = Config::load(config_path)?;
    debug!(?config, "Config loaded successfully");

    // Acquire and clean.
    let applications = import_application_data(&config.data.application_path)?;
    let credit = import_credit_data(&config.data.credit_path)?;
    let mut merged = run_clean_step(&applications, &credit, &config)?;
    write_csv(&mut merged, &config.data.merged_output)?;

    // Featurize and encode; keep the ingestion-schema projection for the
    // persistence store's batch path.
    let (mut encoded, mut user) = run_featurize_step(&merged, &config)?;
    write_csv(&mut encoded, &config.data.encoded_output)?;
    write_csv(&mut user, &config.data.ingest_output)?;

    // Rebalance, split, and fit.
    let (model, split) = run_model_step(&encoded, &config)?;
    model.save(&config.data.model_path)?;

    let mut train = split.x_train.clone();
    train.with_column(split.y_train.clone())?;
    write_csv(&mut train, &config.data.train_output)?;
    let mut test = split.x_test.clone();
    test.with_column(split.y_test.clone())?;
    write_csv(&mut test, &config.data.test_output)?;

    // Score the held-out partition and compute the requested metrics.
    let mut predictions = run_score_step(model.as_ref(), &test, &config)?;
    write_csv(&mut predictions, &config.data.prediction_output)?;

    let report = run_evaluate_step(&test, &predictions, &config)?;
    std::fs::write(&config.data.metrics_output, report.render())?;
    info!(path = %config.data.metrics_output, "Evaluation results written");

    info!("Pipeline run complete");
    Ok(())
}
