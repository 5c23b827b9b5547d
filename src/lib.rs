pub mod cleaning;
pub mod config;
pub mod data_loader;
pub mod error;
pub mod evaluate;
pub mod features;
pub mod labels;
pub mod models;
pub mod pipeline;
pub mod predict;
pub mod score;
pub mod train;

pub use config::Config;
pub use error::PipelineError;
pub use models::{Classifier, GbdtClassifier};
