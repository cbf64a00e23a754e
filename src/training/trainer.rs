use {
    crate::{
        config::{DF, FeatureConfig, TrainingConfig},
        models::FeatureTable,
        trace_time,
        training::{ClassificationMetrics, Dataset, LogisticRegression, Standardizer, TrainingError},
    },
    serde::{Deserialize, Serialize},
    strum_macros::{Display, EnumIter},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, Serialize, Deserialize)]
pub enum Direction {
    #[strum(to_string = "UP")]
    Up,
    #[strum(to_string = "DOWN")]
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub probability_up: f64,
    pub direction: Direction,
}

/// Everything needed to score a fresh feature vector: the pipeline settings
/// that produced the columns, the scaling fitted on the training half, and the
/// classifier itself. Evaluation results ride along for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub feature_config: FeatureConfig,
    pub columns: Vec<String>,
    pub standardizer: Standardizer,
    pub classifier: LogisticRegression,
    pub decision_threshold: f64,
    pub metrics: ClassificationMetrics,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Timestamp of the newest row seen during training or evaluation.
    pub trained_through_ms: i64,
}

impl TrainedModel {
    pub fn predict(&self, features: &[f64]) -> Result<Prediction, TrainingError> {
        let scaled = self.standardizer.transform_row(features)?;
        let probability_up = self.classifier.predict_proba(&scaled)?;
        let direction = if probability_up >= self.decision_threshold {
            Direction::Up
        } else {
            Direction::Down
        };
        Ok(Prediction {
            probability_up,
            direction,
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

fn validate(config: &TrainingConfig) -> Result<(), TrainingError> {
    let bad = |msg: String| Err(TrainingError::InvalidConfig(msg));
    if !(config.test_fraction > 0.0 && config.test_fraction < 1.0) {
        return bad(format!("test_fraction must be in (0, 1), got {}", config.test_fraction));
    }
    if !(config.learning_rate > 0.0) {
        return bad(format!("learning_rate must be positive, got {}", config.learning_rate));
    }
    if config.max_iterations == 0 {
        return bad("max_iterations must be at least 1".to_string());
    }
    if config.l2_penalty < 0.0 {
        return bad(format!("l2_penalty must not be negative, got {}", config.l2_penalty));
    }
    if !(0.0..=1.0).contains(&config.decision_threshold) {
        return bad(format!(
            "decision_threshold must be in [0, 1], got {}",
            config.decision_threshold
        ));
    }
    Ok(())
}

/// Fits a direction classifier on the older part of `table` and scores it on the newer part.
pub fn train_model(table: &FeatureTable, config: &TrainingConfig) -> Result<TrainedModel, TrainingError> {
    validate(config)?;

    let needed = config.min_rows.max(2);
    if table.len() < needed {
        return Err(TrainingError::NotEnoughRows {
            needed,
            got: table.len(),
        });
    }

    let dataset = Dataset::from_table(table);
    let (train, test) = dataset.chronological_split(config.test_fraction)?;
    if !train.has_both_classes() {
        return Err(TrainingError::SingleClass);
    }

    let standardizer = Standardizer::fit(&train.features)?;
    let train_x = standardizer.transform(&train.features)?;
    let test_x = standardizer.transform(&test.features)?;

    let mut classifier = LogisticRegression::new(config);
    trace_time!("Fit logistic regression", 2000, {
        classifier.fit(&train_x, &train.labels)
    })?;

    let predicted = classifier.predict(&test_x, config.decision_threshold)?;
    let metrics = ClassificationMetrics::from_predictions(&test.labels, &predicted);

    if DF.log_training {
        log::info!(
            "Trained on {} rows, tested on {} rows: {} iterations, loss {:.5}, accuracy {:.4}",
            train.len(),
            test.len(),
            classifier.iterations_run,
            classifier.final_loss.unwrap_or(f64::NAN),
            metrics.accuracy
        );
    }

    Ok(TrainedModel {
        feature_config: table.config.clone(),
        columns: dataset.columns.clone(),
        standardizer,
        classifier,
        decision_threshold: config.decision_threshold,
        metrics,
        train_rows: train.len(),
        test_rows: test.len(),
        trained_through_ms: dataset.timestamps.last().copied().unwrap_or_default(),
    })
}
