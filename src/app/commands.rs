use {
    crate::{
        analysis::{FeaturePipeline, PipelineReporter},
        config::{FeatureConfig, TrainingConfig},
        data::{MarketDataProvider, MarketDataStorage},
        domain::PairInterval,
        models::{FeatureTable, ModelRun, OhlcvTimeSeries},
        training::{Prediction, train_model},
        utils::format_duration,
    },
    anyhow::{Context, Result, anyhow, bail},
};

/// Next-period call for the newest stored candle.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub run_id: String,
    pub timestamp_ms: i64,
    pub close: f64,
    pub prediction: Prediction,
}

pub async fn setup_db(storage: &dyn MarketDataStorage) -> Result<()> {
    storage.initialize().await.context("Failed to create tables")
}

/// Pulls candles from the newest stored open time onwards. The newest stored
/// candle is fetched again so a bar that was still open gets its final values.
pub async fn fetch(
    storage: &dyn MarketDataStorage,
    provider: &dyn MarketDataProvider,
    pair: &PairInterval,
) -> Result<u64> {
    let symbol = pair.name();
    let interval = pair.interval_str();
    let last = storage.last_candle_time(symbol, interval).await?;

    let candles = provider
        .fetch_candles(pair, last)
        .await
        .with_context(|| format!("Failed to fetch candles for {}", pair))?;
    storage.upsert_candles(symbol, interval, &candles).await
}

async fn load_series(storage: &dyn MarketDataStorage, pair: &PairInterval) -> Result<OhlcvTimeSeries> {
    let candles = storage
        .load_candles(pair.name(), pair.interval_str(), None)
        .await?;
    if candles.is_empty() {
        bail!("No candles stored for {}; run fetch first", pair);
    }
    let series = OhlcvTimeSeries::from_candles(pair.clone(), &candles);
    log::info!(
        "{}: {} candles covering {}",
        pair,
        series.len(),
        format_duration(series.span_ms())
    );
    Ok(series)
}

/// Rebuilds the feature table from every stored candle and replaces the stored one.
pub async fn transform(
    storage: &dyn MarketDataStorage,
    pair: &PairInterval,
    config: FeatureConfig,
    reporter: &dyn PipelineReporter,
) -> Result<FeatureTable> {
    let series = load_series(storage, pair).await?;
    let table = FeaturePipeline::new(config, reporter)?.run(&series)?;
    storage
        .replace_features(pair.name(), pair.interval_str(), &table)
        .await?;
    Ok(table)
}

pub async fn train(
    storage: &dyn MarketDataStorage,
    pair: &PairInterval,
    config: &TrainingConfig,
) -> Result<ModelRun> {
    let table = storage
        .load_features(pair.name(), pair.interval_str())
        .await?
        .ok_or_else(|| anyhow!("No feature table stored for {}; run transform first", pair))?;

    let model = train_model(&table, config).with_context(|| format!("Training failed for {}", pair))?;
    let run = ModelRun::new(pair, model);
    storage.record_model_run(&run).await?;
    Ok(run)
}

pub async fn predict(
    storage: &dyn MarketDataStorage,
    pair: &PairInterval,
    reporter: &dyn PipelineReporter,
) -> Result<Forecast> {
    let run = storage
        .latest_model_run(pair.name(), pair.interval_str())
        .await?
        .ok_or_else(|| anyhow!("No trained model stored for {}; run train first", pair))?;

    let config = run.model.feature_config.clone();
    if FeatureTable::column_names_for(&config) != run.model.columns {
        bail!("Stored model {} has a column layout this build cannot rebuild", run.run_id);
    }

    let series = load_series(storage, pair).await?;
    let latest = FeaturePipeline::new(config, reporter)?
        .latest_features(&series)?
        .ok_or_else(|| anyhow!("Not enough candles for {} to build a feature row", pair))?;

    let prediction = run.model.predict(&latest.values)?;
    Ok(Forecast {
        run_id: run.run_id,
        timestamp_ms: latest.timestamp_ms,
        close: latest.close,
        prediction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::SilentReporter,
        config::MacdSpans,
        data::SqliteStorage,
        domain::Candle,
        training::Direction,
        utils::TimeUtils,
    };
    use async_trait::async_trait;

    const START_MS: i64 = 1_600_000_000_000;

    /// Serves a fixed alternating market, honouring `start_time`.
    struct ZigzagProvider {
        bars: usize,
    }

    #[async_trait]
    impl MarketDataProvider for ZigzagProvider {
        async fn fetch_candles(
            &self,
            _pair: &PairInterval,
            start_time: Option<i64>,
        ) -> Result<Vec<Candle>> {
            Ok((0..self.bars)
                .map(|i| {
                    let swing = if i % 2 == 0 { 5.0 } else { -5.0 };
                    let close = 100.0 + swing + i as f64 * 0.01;
                    let ts = START_MS + i as i64 * TimeUtils::MS_IN_D;
                    Candle::new(ts, close, close + 1.0, close - 1.0, close, 1.0)
                })
                .filter(|c| start_time.is_none_or(|s| c.timestamp_ms >= s))
                .collect())
        }
    }

    fn small_config() -> FeatureConfig {
        FeatureConfig {
            sma_windows: vec![3],
            ema_windows: vec![3],
            rsi_window: 3,
            macd: MacdSpans {
                fast: 2,
                slow: 4,
                signal: 2,
            },
            bollinger_window: 3,
            bollinger_k: 2.0,
            lags: vec![1],
            label_horizon: 1,
        }
    }

    fn pair() -> PairInterval {
        PairInterval::new("BTCUSDT", TimeUtils::MS_IN_D)
    }

    async fn open_store(dir: &tempfile::TempDir) -> SqliteStorage {
        let path = dir.path().join("cli.sqlite");
        let store = SqliteStorage::new(path.to_str().unwrap()).await.unwrap();
        setup_db(&store).await.unwrap();
        store
    }

    #[tokio::test]
    async fn fetch_is_incremental() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        let provider = ZigzagProvider { bars: 200 };

        assert_eq!(fetch(&store, &provider, &pair()).await.unwrap(), 200);
        // Only the newest bar is asked for again
        assert_eq!(fetch(&store, &provider, &pair()).await.unwrap(), 1);

        let stored = store.load_candles("BTCUSDT", "1d", None).await.unwrap();
        assert_eq!(stored.len(), 200);
    }

    #[tokio::test]
    async fn full_cycle_forecasts_the_alternation() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        fetch(&store, &ZigzagProvider { bars: 200 }, &pair()).await.unwrap();

        let table = transform(&store, &pair(), small_config(), &SilentReporter)
            .await
            .unwrap();
        assert_eq!(table.len(), 200 - small_config().warmup_rows() - 1);

        let run = train(&store, &pair(), &TrainingConfig::default()).await.unwrap();
        assert!(run.model.metrics.accuracy >= 0.9);

        let forecast = predict(&store, &pair(), &SilentReporter).await.unwrap();
        assert_eq!(forecast.run_id, run.run_id);
        assert_eq!(forecast.timestamp_ms, START_MS + 199 * TimeUtils::MS_IN_D);
        // Bar 199 closed low, so the next one should be up
        assert_eq!(forecast.prediction.direction, Direction::Up);
    }

    #[tokio::test]
    async fn steps_out_of_order_explain_themselves() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let err = transform(&store, &pair(), small_config(), &SilentReporter)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("run fetch first"));

        let err = train(&store, &pair(), &TrainingConfig::default()).await.unwrap_err();
        assert!(err.to_string().contains("run transform first"));

        let err = predict(&store, &pair(), &SilentReporter).await.unwrap_err();
        assert!(err.to_string().contains("run train first"));
    }
}
