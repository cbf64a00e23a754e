use {
    crate::{
        domain::PairInterval,
        training::{ClassificationMetrics, TrainedModel},
        utils::now_timestamp_ms,
    },
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

/// One persisted training run: the fitted model plus where and when it was trained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRun {
    pub run_id: String,
    pub symbol: String,
    pub interval: String,
    pub created_at_ms: i64,
    pub model: TrainedModel,
}

impl ModelRun {
    pub fn new(pair: &PairInterval, model: TrainedModel) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            symbol: pair.name().to_string(),
            interval: pair.interval_str().to_string(),
            created_at_ms: now_timestamp_ms(),
            model,
        }
    }

    pub fn metrics(&self) -> &ClassificationMetrics {
        &self.model.metrics
    }
}
