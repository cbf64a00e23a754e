//! Classifier training blueprint.

use serde::{Deserialize, Serialize};

pub struct TrainingDefaults {
    /// Share of the newest rows held out for evaluation.
    pub test_fraction: f64,
    pub learning_rate: f64,
    pub max_iterations: usize,
    /// Stop once the log-loss improves by less than this between iterations.
    pub tolerance: f64,
    pub l2_penalty: f64,
    pub decision_threshold: f64,
    pub min_rows: usize,
}

pub const TRAINING: TrainingDefaults = TrainingDefaults {
    test_fraction: 0.2,
    learning_rate: 0.1,
    max_iterations: 2000,
    tolerance: 1e-7,
    l2_penalty: 1e-3,
    decision_threshold: 0.5,
    min_rows: 50,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub test_fraction: f64,
    pub learning_rate: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub l2_penalty: f64,
    pub decision_threshold: f64,
    pub min_rows: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: TRAINING.test_fraction,
            learning_rate: TRAINING.learning_rate,
            max_iterations: TRAINING.max_iterations,
            tolerance: TRAINING.tolerance,
            l2_penalty: TRAINING.l2_penalty,
            decision_threshold: TRAINING.decision_threshold,
            min_rows: TRAINING.min_rows,
        }
    }
}
