//! Direction classifier trained on the feature table.

mod dataset;
mod error;
mod logistic;
mod metrics;
mod standardizer;
mod trainer;

pub use dataset::Dataset;
pub use error::TrainingError;
pub use logistic::{Coefficients, LogisticRegression};
pub use metrics::{ClassificationMetrics, MetricLine};
pub use standardizer::Standardizer;
pub use trainer::{Direction, Prediction, TrainedModel, train_model};
