use {
    crate::{
        config::{DF, FeatureConfig, PERSISTENCE},
        domain::Candle,
        models::{FeatureRow, FeatureTable, ModelRun},
        training::TrainedModel,
    },
    anyhow::{Context, Result, bail},
    async_trait::async_trait,
    sqlx::{
        ConnectOptions, Pool, QueryBuilder, Row, Sqlite,
        sqlite::{
            SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
            SqliteSynchronous,
        },
    },
    std::{str::FromStr, time::Duration},
};

#[async_trait]
pub trait MarketDataStorage: Send + Sync {
    async fn initialize(&self) -> Result<()>;
    async fn last_candle_time(&self, symbol: &str, interval: &str) -> Result<Option<i64>>;
    async fn upsert_candles(&self, symbol: &str, interval: &str, candles: &[Candle]) -> Result<u64>;
    async fn load_candles(
        &self,
        symbol: &str,
        interval: &str,
        start_time: Option<i64>,
    ) -> Result<Vec<Candle>>;
    async fn replace_features(&self, symbol: &str, interval: &str, table: &FeatureTable) -> Result<u64>;
    async fn load_features(&self, symbol: &str, interval: &str) -> Result<Option<FeatureTable>>;
    async fn record_model_run(&self, run: &ModelRun) -> Result<()>;
    async fn latest_model_run(&self, symbol: &str, interval: &str) -> Result<Option<ModelRun>>;
}

pub struct SqliteStorage {
    pool: Pool<Sqlite>,
}

impl SqliteStorage {
    pub async fn new(db_path: &str) -> Result<Self> {
        let connection_options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(60))
            .synchronous(SqliteSynchronous::Normal)
            .log_slow_statements(log::LevelFilter::Warn, Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(PERSISTENCE.db.max_connections)
            .connect_with(connection_options)
            .await
            .with_context(|| format!("Failed to open database at {}", db_path))?;

        Ok(Self { pool })
    }

    fn feature_row(row: &SqliteRow) -> Result<FeatureRow> {
        let vector = |column: &str| -> Result<Vec<f64>> {
            let text: String = row.try_get(column)?;
            serde_json::from_str(&text).with_context(|| format!("Corrupt {} column", column))
        };
        let target: i64 = row.try_get("target")?;

        Ok(FeatureRow {
            timestamp_ms: row.try_get("open_time")?,
            open: row.try_get("open")?,
            high: row.try_get("high")?,
            low: row.try_get("low")?,
            close: row.try_get("close")?,
            volume: row.try_get("volume")?,
            sma: vector("sma")?,
            ema: vector("ema")?,
            rsi: row.try_get("rsi")?,
            macd: row.try_get("macd")?,
            macd_signal: row.try_get("macd_signal")?,
            macd_histogram: row.try_get("macd_histogram")?,
            bb_middle: row.try_get("bb_middle")?,
            bb_upper: row.try_get("bb_upper")?,
            bb_lower: row.try_get("bb_lower")?,
            bb_width: row.try_get("bb_width")?,
            close_lags: vector("close_lags")?,
            return_lags: vector("return_lags")?,
            target: u8::try_from(target)?,
        })
    }
}

#[async_trait]
impl MarketDataStorage for SqliteStorage {
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS klines (
                symbol TEXT NOT NULL,
                interval TEXT NOT NULL,
                open_time INTEGER NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                PRIMARY KEY (symbol, interval, open_time)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create klines table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feature_sets (
                symbol TEXT NOT NULL,
                interval TEXT NOT NULL,
                config_json TEXT NOT NULL,
                PRIMARY KEY (symbol, interval)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create feature_sets table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS features (
                symbol TEXT NOT NULL,
                interval TEXT NOT NULL,
                open_time INTEGER NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                sma TEXT NOT NULL,
                ema TEXT NOT NULL,
                rsi REAL NOT NULL,
                macd REAL NOT NULL,
                macd_signal REAL NOT NULL,
                macd_histogram REAL NOT NULL,
                bb_middle REAL NOT NULL,
                bb_upper REAL NOT NULL,
                bb_lower REAL NOT NULL,
                bb_width REAL NOT NULL,
                close_lags TEXT NOT NULL,
                return_lags TEXT NOT NULL,
                target INTEGER NOT NULL,
                PRIMARY KEY (symbol, interval, open_time)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create features table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS model_runs (
                run_id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                interval TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                accuracy REAL NOT NULL,
                precision_score REAL NOT NULL,
                recall REAL NOT NULL,
                f1 REAL NOT NULL,
                train_rows INTEGER NOT NULL,
                test_rows INTEGER NOT NULL,
                model_json TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to create model_runs table")?;

        Ok(())
    }

    async fn last_candle_time(&self, symbol: &str, interval: &str) -> Result<Option<i64>> {
        let result = sqlx::query(
            r#"
            SELECT MAX(open_time) as last_time
            FROM klines
            WHERE symbol = ? AND interval = ?
            "#,
        )
        .bind(symbol)
        .bind(interval)
        .fetch_one(&self.pool)
        .await?;

        let last_time: Option<i64> = result.try_get("last_time")?;
        Ok(last_time)
    }

    /// Re-fetched candles overwrite stored ones, so a still-forming bar is refreshed.
    async fn upsert_candles(&self, symbol: &str, interval: &str, candles: &[Candle]) -> Result<u64> {
        if candles.is_empty() {
            return Ok(0);
        }
        if let Some(bad) = candles.iter().find(|c| !c.is_finite()) {
            bail!("Refusing to store non-finite candle at {}", bad.timestamp_ms);
        }

        for chunk in candles.chunks(PERSISTENCE.db.insert_chunk) {
            let mut query_builder = QueryBuilder::new(
                "INSERT OR REPLACE INTO klines (symbol, interval, open_time, open, high, low, close, volume) ",
            );

            query_builder.push_values(chunk, |mut b, c| {
                b.push_bind(symbol)
                    .push_bind(interval)
                    .push_bind(c.timestamp_ms)
                    .push_bind(c.open_price)
                    .push_bind(c.high_price)
                    .push_bind(c.low_price)
                    .push_bind(c.close_price)
                    .push_bind(c.volume);
            });

            query_builder.build().execute(&self.pool).await?;
        }

        if DF.log_storage {
            log::info!("Stored {} candles for {} {}", candles.len(), symbol, interval);
        }
        Ok(candles.len() as u64)
    }

    async fn load_candles(
        &self,
        symbol: &str,
        interval: &str,
        start_time: Option<i64>,
    ) -> Result<Vec<Candle>> {
        let query_str = if start_time.is_some() {
            r#"
            SELECT open_time, open, high, low, close, volume
            FROM klines
            WHERE symbol = ? AND interval = ? AND open_time >= ?
            ORDER BY open_time ASC
            "#
        } else {
            r#"
            SELECT open_time, open, high, low, close, volume
            FROM klines
            WHERE symbol = ? AND interval = ?
            ORDER BY open_time ASC
            "#
        };

        let mut query = sqlx::query(query_str).bind(symbol).bind(interval);

        if let Some(ts) = start_time {
            query = query.bind(ts);
        }

        let rows = query.fetch_all(&self.pool).await?;

        let candles = rows
            .iter()
            .map(|row| {
                Ok(Candle::new(
                    row.try_get("open_time")?,
                    row.try_get("open")?,
                    row.try_get("high")?,
                    row.try_get("low")?,
                    row.try_get("close")?,
                    row.try_get("volume")?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        if DF.log_storage {
            log::info!("Loaded {} candles for {} {}", candles.len(), symbol, interval);
        }
        Ok(candles)
    }

    /// Drops every stored row for the pair, then writes the new table, in one transaction.
    async fn replace_features(&self, symbol: &str, interval: &str, table: &FeatureTable) -> Result<u64> {
        let config_json = serde_json::to_string(&table.config)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM features WHERE symbol = ? AND interval = ?")
            .bind(symbol)
            .bind(interval)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT OR REPLACE INTO feature_sets (symbol, interval, config_json) VALUES (?, ?, ?)")
            .bind(symbol)
            .bind(interval)
            .bind(&config_json)
            .execute(&mut *tx)
            .await?;

        for chunk in table.rows.chunks(PERSISTENCE.db.insert_chunk) {
            let encoded = chunk
                .iter()
                .map(|r| {
                    Ok((
                        r,
                        serde_json::to_string(&r.sma)?,
                        serde_json::to_string(&r.ema)?,
                        serde_json::to_string(&r.close_lags)?,
                        serde_json::to_string(&r.return_lags)?,
                    ))
                })
                .collect::<Result<Vec<_>>>()?;

            let mut query_builder = QueryBuilder::new(
                "INSERT INTO features (symbol, interval, open_time, open, high, low, close, volume, \
                 sma, ema, rsi, macd, macd_signal, macd_histogram, bb_middle, bb_upper, bb_lower, \
                 bb_width, close_lags, return_lags, target) ",
            );

            query_builder.push_values(encoded, |mut b, (r, sma, ema, close_lags, return_lags)| {
                b.push_bind(symbol)
                    .push_bind(interval)
                    .push_bind(r.timestamp_ms)
                    .push_bind(r.open)
                    .push_bind(r.high)
                    .push_bind(r.low)
                    .push_bind(r.close)
                    .push_bind(r.volume)
                    .push_bind(sma)
                    .push_bind(ema)
                    .push_bind(r.rsi)
                    .push_bind(r.macd)
                    .push_bind(r.macd_signal)
                    .push_bind(r.macd_histogram)
                    .push_bind(r.bb_middle)
                    .push_bind(r.bb_upper)
                    .push_bind(r.bb_lower)
                    .push_bind(r.bb_width)
                    .push_bind(close_lags)
                    .push_bind(return_lags)
                    .push_bind(i64::from(r.target));
            });

            query_builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;

        if DF.log_storage {
            log::info!("Replaced features for {} {}: {} rows", symbol, interval, table.len());
        }
        Ok(table.len() as u64)
    }

    async fn load_features(&self, symbol: &str, interval: &str) -> Result<Option<FeatureTable>> {
        let config_row = sqlx::query("SELECT config_json FROM feature_sets WHERE symbol = ? AND interval = ?")
            .bind(symbol)
            .bind(interval)
            .fetch_optional(&self.pool)
            .await?;

        let Some(config_row) = config_row else {
            return Ok(None);
        };
        let config_json: String = config_row.try_get("config_json")?;
        let config: FeatureConfig =
            serde_json::from_str(&config_json).context("Corrupt feature configuration")?;

        let rows = sqlx::query(
            r#"
            SELECT * FROM features
            WHERE symbol = ? AND interval = ?
            ORDER BY open_time ASC
            "#,
        )
        .bind(symbol)
        .bind(interval)
        .fetch_all(&self.pool)
        .await?;

        let rows = rows.iter().map(Self::feature_row).collect::<Result<Vec<_>>>()?;

        if DF.log_storage {
            log::info!("Loaded {} feature rows for {} {}", rows.len(), symbol, interval);
        }
        Ok(Some(FeatureTable { config, rows }))
    }

    async fn record_model_run(&self, run: &ModelRun) -> Result<()> {
        let model_json = run.model.to_json()?;
        let metrics = run.metrics();

        sqlx::query(
            r#"
            INSERT INTO model_runs (run_id, symbol, interval, created_at, accuracy, precision_score,
                                    recall, f1, train_rows, test_rows, model_json)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&run.run_id)
        .bind(&run.symbol)
        .bind(&run.interval)
        .bind(run.created_at_ms)
        .bind(metrics.accuracy)
        .bind(metrics.precision)
        .bind(metrics.recall)
        .bind(metrics.f1)
        .bind(run.model.train_rows as i64)
        .bind(run.model.test_rows as i64)
        .bind(model_json)
        .execute(&self.pool)
        .await
        .context("Failed to record model run")?;

        if DF.log_storage {
            log::info!("Recorded model run {} for {} {}", run.run_id, run.symbol, run.interval);
        }
        Ok(())
    }

    async fn latest_model_run(&self, symbol: &str, interval: &str) -> Result<Option<ModelRun>> {
        let row = sqlx::query(
            r#"
            SELECT run_id, symbol, interval, created_at, model_json
            FROM model_runs
            WHERE symbol = ? AND interval = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .bind(interval)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let model_json: String = row.try_get("model_json")?;
        let model = TrainedModel::from_json(&model_json).context("Corrupt stored model")?;

        Ok(Some(ModelRun {
            run_id: row.try_get("run_id")?,
            symbol: row.try_get("symbol")?,
            interval: row.try_get("interval")?,
            created_at_ms: row.try_get("created_at")?,
            model,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::{FeaturePipeline, SilentReporter},
        config::TrainingConfig,
        domain::PairInterval,
        models::OhlcvTimeSeries,
        training::{ClassificationMetrics, Coefficients, LogisticRegression, Standardizer},
        utils::TimeUtils,
    };

    async fn open_store(dir: &tempfile::TempDir) -> SqliteStorage {
        let path = dir.path().join("test.sqlite");
        let store = SqliteStorage::new(path.to_str().unwrap()).await.unwrap();
        store.initialize().await.unwrap();
        store
    }

    fn candle(ts: i64, close: f64) -> Candle {
        Candle::new(ts, close, close + 1.0, close - 1.0, close, 10.0)
    }

    fn feature_row(ts: i64, target: u8) -> FeatureRow {
        FeatureRow {
            timestamp_ms: ts,
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 100.0,
            sma: vec![1.25, 1.5],
            ema: vec![1.3],
            rsi: 55.5,
            macd: 0.1,
            macd_signal: 0.05,
            macd_histogram: 0.05,
            bb_middle: 1.5,
            bb_upper: 2.0,
            bb_lower: 1.0,
            bb_width: 0.25,
            close_lags: vec![1.375],
            return_lags: vec![0.25],
            target,
        }
    }

    fn model() -> TrainedModel {
        let mut classifier = LogisticRegression::new(&TrainingConfig::default());
        classifier.coefficients = Some(Coefficients {
            weights: vec![0.5, -0.25],
            bias: 0.125,
        });
        classifier.iterations_run = 7;
        classifier.final_loss = Some(0.5);

        TrainedModel {
            feature_config: FeatureConfig::default(),
            columns: vec!["a".to_string(), "b".to_string()],
            standardizer: Standardizer {
                means: vec![0.0, 1.0],
                std_devs: vec![1.0, 2.0],
            },
            classifier,
            decision_threshold: 0.5,
            metrics: ClassificationMetrics::from_predictions(&[1, 0, 1, 1], &[1, 0, 1, 1]),
            train_rows: 80,
            test_rows: 20,
            trained_through_ms: 1_000,
        }
    }

    #[tokio::test]
    async fn candles_round_trip_in_time_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let candles = vec![candle(300, 3.0), candle(100, 1.0), candle(200, 2.0)];
        assert_eq!(store.upsert_candles("BTCUSDT", "1d", &candles).await.unwrap(), 3);

        let loaded = store.load_candles("BTCUSDT", "1d", None).await.unwrap();
        let times: Vec<i64> = loaded.iter().map(|c| c.timestamp_ms).collect();
        assert_eq!(times, vec![100, 200, 300]);
        assert_eq!(store.last_candle_time("BTCUSDT", "1d").await.unwrap(), Some(300));

        let tail = store.load_candles("BTCUSDT", "1d", Some(200)).await.unwrap();
        assert_eq!(tail.len(), 2);

        assert!(store.load_candles("BTCUSDT", "4h", None).await.unwrap().is_empty());
        assert_eq!(store.last_candle_time("ETHUSDT", "1d").await.unwrap(), None);
    }

    #[tokio::test]
    async fn upsert_overwrites_same_open_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        store.upsert_candles("BTCUSDT", "1d", &[candle(100, 1.0)]).await.unwrap();
        store.upsert_candles("BTCUSDT", "1d", &[candle(100, 9.0)]).await.unwrap();

        let loaded = store.load_candles("BTCUSDT", "1d", None).await.unwrap();
        assert_eq!(loaded, vec![candle(100, 9.0)]);
    }

    #[tokio::test]
    async fn non_finite_candles_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let bad = vec![candle(100, 1.0), candle(200, f64::NAN)];
        assert!(store.upsert_candles("BTCUSDT", "1d", &bad).await.is_err());
        assert!(store.load_candles("BTCUSDT", "1d", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replace_features_discards_previous_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        assert_eq!(store.load_features("BTCUSDT", "1d").await.unwrap(), None);

        let first = FeatureTable {
            config: FeatureConfig::default(),
            rows: vec![feature_row(1, 0), feature_row(2, 1), feature_row(3, 1)],
        };
        store.replace_features("BTCUSDT", "1d", &first).await.unwrap();

        let second = FeatureTable {
            config: FeatureConfig::default(),
            rows: vec![feature_row(2, 0), feature_row(4, 1)],
        };
        assert_eq!(store.replace_features("BTCUSDT", "1d", &second).await.unwrap(), 2);

        let loaded = store.load_features("BTCUSDT", "1d").await.unwrap().unwrap();
        assert_eq!(loaded, second);
    }

    #[tokio::test]
    async fn pipeline_output_reloads_bit_for_bit() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;

        let closes: Vec<f64> = (0..400)
            .map(|i| {
                let t = i as f64;
                100.0 + 10.0 * (t * 0.3).sin() + 3.0 * (t * 1.7).sin() + t * 0.05
            })
            .collect();
        let series = OhlcvTimeSeries::from_closes(
            PairInterval::new("BTCUSDT", TimeUtils::MS_IN_D),
            1_600_000_000_000,
            &closes,
        );
        let table = FeaturePipeline::new(FeatureConfig::default(), &SilentReporter)
            .unwrap()
            .run(&series)
            .unwrap();
        assert_eq!(table.len(), 200);

        store.replace_features("BTCUSDT", "1d", &table).await.unwrap();
        let loaded = store.load_features("BTCUSDT", "1d").await.unwrap().unwrap();

        for (saved, back) in table.rows.iter().zip(&loaded.rows) {
            let saved_bits: Vec<u64> = saved.feature_values().iter().map(|v| v.to_bits()).collect();
            let back_bits: Vec<u64> = back.feature_values().iter().map(|v| v.to_bits()).collect();
            assert_eq!(saved_bits, back_bits, "row at {}", saved.timestamp_ms);
        }
        // Lag 1 still points exactly at the previous bar's stored close
        for pair in loaded.rows.windows(2) {
            assert_eq!(pair[1].close_lags[0].to_bits(), pair[0].close.to_bits());
        }
        assert_eq!(loaded, table);
    }

    #[tokio::test]
    async fn latest_model_run_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir).await;
        assert!(store.latest_model_run("BTCUSDT", "1d").await.unwrap().is_none());

        let mut older = ModelRun {
            run_id: "older".to_string(),
            symbol: "BTCUSDT".to_string(),
            interval: "1d".to_string(),
            created_at_ms: 1_000,
            model: model(),
        };
        store.record_model_run(&older).await.unwrap();

        older.run_id = "newer".to_string();
        older.created_at_ms = 2_000;
        store.record_model_run(&older).await.unwrap();

        let latest = store.latest_model_run("BTCUSDT", "1d").await.unwrap().unwrap();
        assert_eq!(latest.run_id, "newer");
        assert_eq!(latest.model, model());
    }
}
