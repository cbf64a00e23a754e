use itertools::Itertools;
use rayon::prelude::*;

use crate::{
    analysis::{
        PipelineError,
        indicators::{self, BollingerColumns, MacdColumns, Series},
        reporter::{PipelineReporter, PipelineStage},
    },
    config::FeatureConfig,
    models::{FeatureRow, FeatureTable, OhlcvTimeSeries},
    trace_time,
};

/// Feature vector for the newest fully warmed-up row, label not required.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestFeatures {
    pub timestamp_ms: i64,
    pub close: f64,
    pub values: Vec<f64>,
}

/// Turns an ascending OHLCV table into the feature table.
///
/// Stages run in a fixed order (moving averages, oscillator, trend, volatility
/// bands, lag features, label). No stage reads another stage's output, so the
/// order only affects column layout.
pub struct FeaturePipeline<'a> {
    config: FeatureConfig,
    reporter: &'a dyn PipelineReporter,
}

impl<'a> FeaturePipeline<'a> {
    pub fn new(
        config: FeatureConfig,
        reporter: &'a dyn PipelineReporter,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config, reporter })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Builds the labelled feature table. Rows missing any feature (warm-up)
    /// or the label (lookahead) are dropped. Input too short for a single
    /// complete row gives an empty table, not an error.
    pub fn run(&self, series: &OhlcvTimeSeries) -> Result<FeatureTable, PipelineError> {
        validate_input(series)?;

        let input_rows = series.len();
        let required = self.config.min_input_rows();
        if input_rows < required {
            self.reporter.degenerate_input(input_rows, required);
            return Ok(FeatureTable::empty(self.config.clone()));
        }

        let frame = trace_time!("Feature frame", 50_000, { self.compute_frame(series) });

        let rows: Vec<FeatureRow> = (0..input_rows)
            .filter_map(|idx| frame.labelled_row_at(series, idx))
            .collect();

        let candidates = input_rows
            .saturating_sub(self.config.label_horizon)
            .saturating_sub(self.config.warmup_rows());
        let undefined = candidates.saturating_sub(rows.len());
        if undefined > 0 {
            self.reporter.undefined_values(undefined);
        }
        self.reporter.finished(input_rows, rows.len());

        Ok(FeatureTable {
            config: self.config.clone(),
            rows,
        })
    }

    /// Features for the newest row with a complete feature set. This row is
    /// normally one the labelled table drops, since its future is unknown.
    pub fn latest_features(
        &self,
        series: &OhlcvTimeSeries,
    ) -> Result<Option<LatestFeatures>, PipelineError> {
        validate_input(series)?;
        if series.len() <= self.config.warmup_rows() {
            self.reporter
                .degenerate_input(series.len(), self.config.warmup_rows() + 1);
            return Ok(None);
        }

        let frame = self.compute_frame(series);
        let latest = (0..series.len())
            .rev()
            .find_map(|idx| frame.row_at(series, idx, 0))
            .map(|row| LatestFeatures {
                timestamp_ms: row.timestamp_ms,
                close: row.close,
                values: row.feature_values(),
            });
        Ok(latest)
    }

    fn compute_frame(&self, series: &OhlcvTimeSeries) -> IndicatorFrame {
        let cfg = &self.config;
        let closes = series.close_prices.as_slice();

        let sma: Vec<Series> = cfg
            .sma_windows
            .par_iter()
            .map(|&w| indicators::sma(closes, w))
            .collect();
        let ema: Vec<Vec<f64>> = cfg
            .ema_windows
            .par_iter()
            .map(|&w| indicators::ema(closes, w))
            .collect();
        self.reporter
            .stage_completed(PipelineStage::MovingAverages, sma.len() + ema.len());

        let rsi = indicators::rsi(closes, cfg.rsi_window);
        self.reporter.stage_completed(PipelineStage::Oscillator, 1);

        let macd = indicators::macd(closes, cfg.macd.fast, cfg.macd.slow, cfg.macd.signal);
        self.reporter.stage_completed(PipelineStage::Trend, 3);

        let bollinger = indicators::bollinger(closes, cfg.bollinger_window, cfg.bollinger_k);
        self.reporter
            .stage_completed(PipelineStage::VolatilityBands, 4);

        let close_lags: Vec<Series> = cfg
            .lags
            .iter()
            .map(|&lag| indicators::lagged(closes, lag))
            .collect();
        let return_lags: Vec<Series> = cfg
            .lags
            .iter()
            .map(|&lag| indicators::pct_change(closes, lag))
            .collect();
        self.reporter
            .stage_completed(PipelineStage::LagFeatures, close_lags.len() * 2);

        let target = indicators::forward_label(closes, cfg.label_horizon);
        self.reporter.stage_completed(PipelineStage::Label, 1);

        IndicatorFrame {
            sma,
            ema,
            rsi,
            macd,
            bollinger,
            close_lags,
            return_lags,
            target,
        }
    }
}

/// All computed columns, position-aligned with the input series.
struct IndicatorFrame {
    sma: Vec<Series>,
    ema: Vec<Vec<f64>>,
    rsi: Series,
    macd: MacdColumns,
    bollinger: BollingerColumns,
    close_lags: Vec<Series>,
    return_lags: Vec<Series>,
    target: Vec<Option<u8>>,
}

impl IndicatorFrame {
    fn labelled_row_at(&self, series: &OhlcvTimeSeries, idx: usize) -> Option<FeatureRow> {
        let target = self.target[idx]?;
        self.row_at(series, idx, target)
    }

    /// `None` if any feature at `idx` is undefined.
    fn row_at(&self, series: &OhlcvTimeSeries, idx: usize, target: u8) -> Option<FeatureRow> {
        let bb = &self.bollinger;

        Some(FeatureRow {
            timestamp_ms: series.timestamps[idx],
            open: series.open_prices[idx],
            high: series.high_prices[idx],
            low: series.low_prices[idx],
            close: series.close_prices[idx],
            volume: series.volumes[idx],
            sma: values_at(&self.sma, idx)?,
            ema: self.ema.iter().map(|col| col[idx]).collect(),
            rsi: self.rsi[idx]?,
            macd: self.macd.line[idx],
            macd_signal: self.macd.signal[idx],
            macd_histogram: self.macd.histogram[idx],
            bb_middle: bb.middle[idx]?,
            bb_upper: bb.upper[idx]?,
            bb_lower: bb.lower[idx]?,
            bb_width: bb.width[idx]?,
            close_lags: values_at(&self.close_lags, idx)?,
            return_lags: values_at(&self.return_lags, idx)?,
            target,
        })
    }
}

fn values_at(columns: &[Series], idx: usize) -> Option<Vec<f64>> {
    columns.iter().map(|col| col[idx]).collect()
}

/// Checks the input contract: non-empty, equal column lengths, strictly
/// increasing timestamps, finite values.
pub fn validate_input(series: &OhlcvTimeSeries) -> Result<(), PipelineError> {
    if series.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let expected = series.timestamps.len();
    for (column, values) in series.value_columns() {
        if values.len() != expected {
            return Err(PipelineError::ColumnLengthMismatch {
                column,
                expected,
                actual: values.len(),
            });
        }
    }

    if let Some((index, (previous, current))) = series
        .timestamps
        .iter()
        .tuple_windows()
        .enumerate()
        .find(|(_, (prev, cur))| cur <= prev)
    {
        return Err(PipelineError::NonMonotonicTimestamp {
            index: index + 1,
            previous: *previous,
            current: *current,
        });
    }

    for (column, values) in series.value_columns() {
        if let Some((index, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(PipelineError::NonFiniteValue {
                index,
                column,
                value,
            });
        }
    }

    Ok(())
}
