use std::collections::HashMap;

use btc_oracle::{
    FeatureConfig, FeaturePipeline, FeatureTable, OhlcvTimeSeries, PairInterval, SilentReporter,
    utils::TimeUtils,
};

const START_MS: i64 = 1_600_000_000_000;

fn assert_close(actual: f64, expected: f64, eps: f64) {
    assert!(
        (actual - expected).abs() <= eps,
        "expected {} within {} of {}",
        actual,
        eps,
        expected
    );
}

fn series(closes: &[f64]) -> OhlcvTimeSeries {
    OhlcvTimeSeries::from_closes(
        PairInterval::new("BTCUSDT", TimeUtils::MS_IN_D),
        START_MS,
        closes,
    )
}

/// Positive, wavy, slowly rising closes.
fn wavy(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            100.0 + 10.0 * (t * 0.3).sin() + 3.0 * (t * 1.7).sin() + t * 0.05
        })
        .collect()
}

fn run(closes: &[f64]) -> FeatureTable {
    FeaturePipeline::new(FeatureConfig::default(), &SilentReporter)
        .unwrap()
        .run(&series(closes))
        .unwrap()
}

fn column(table: &FeatureTable, name: &str) -> usize {
    table
        .column_names()
        .iter()
        .position(|c| c == name)
        .unwrap_or_else(|| panic!("no column {}", name))
}

#[test]
fn linear_uptrend_end_to_end() {
    let closes: Vec<f64> = (1..=250).map(|i| i as f64).collect();
    let table = run(&closes);

    assert_eq!(table.len(), 250 - 199 - 1);
    assert!(table.rows.iter().all(|r| r.target == 1));
    assert!(table.rows.iter().all(|r| r.rsi == 100.0));
    assert!(table.rows.iter().all(|r| r.macd_histogram > 0.0));

    // The newest bar has no label, so its features come from the inference row.
    let latest = FeaturePipeline::new(FeatureConfig::default(), &SilentReporter)
        .unwrap()
        .latest_features(&series(&closes))
        .unwrap()
        .unwrap();
    assert_eq!(latest.timestamp_ms, START_MS + 249 * TimeUtils::MS_IN_D);
    assert_close(latest.values[column(&table, "sma_50")], 225.5, 1e-9);
    assert_close(latest.values[column(&table, "sma_200")], 150.5, 1e-9);
    assert_close(latest.values[column(&table, "close_lag_1")], 249.0, 0.0);
}

#[test]
fn rerunning_gives_identical_tables() {
    let closes = wavy(400);
    assert_eq!(run(&closes), run(&closes));
}

#[test]
fn row_count_and_ordering() {
    for n in [199, 200, 201, 257, 500] {
        let table = run(&wavy(n));
        assert_eq!(table.len(), n.saturating_sub(200), "n = {}", n);
        assert!(
            table
                .rows
                .windows(2)
                .all(|w| w[0].timestamp_ms < w[1].timestamp_ms)
        );
    }
}

#[test]
fn lags_and_labels_point_at_the_right_bars() {
    let closes = wavy(320);
    let table = run(&closes);
    let by_time: HashMap<i64, usize> = series(&closes)
        .timestamps
        .iter()
        .enumerate()
        .map(|(i, t)| (*t, i))
        .collect();

    for row in &table.rows {
        let idx = by_time[&row.timestamp_ms];
        assert_eq!(row.close, closes[idx]);
        for (l, lag) in table.config.lags.iter().enumerate() {
            let past = closes[idx - lag];
            assert_eq!(row.close_lags[l], past);
            assert_close(row.return_lags[l], closes[idx] / past - 1.0, 1e-12);
        }
        let expected = u8::from(closes[idx + 1] > closes[idx]);
        assert_eq!(row.target, expected);
    }
}

#[test]
fn indicator_bounds_hold() {
    let table = run(&wavy(600));
    assert!(!table.is_empty());

    for row in &table.rows {
        assert!((0.0..=100.0).contains(&row.rsi));
        assert!(row.bb_lower <= row.bb_middle && row.bb_middle <= row.bb_upper);
        assert!(row.bb_width >= 0.0);
        assert_close(row.macd_histogram, row.macd - row.macd_signal, 1e-9);
        assert_close(row.bb_middle, row.sma[2], 1e-9);
        assert!(row.feature_values().iter().all(|v| v.is_finite()));
    }
}

#[test]
fn schema_lists_every_column_once() {
    let table = run(&wavy(260));
    let schema = table.schema();
    assert_eq!(schema.first().map(String::as_str), Some("timestamp"));
    assert_eq!(schema.last().map(String::as_str), Some("target"));
    assert_eq!(schema.len(), 6 + 32 + 1);

    let mut unique = schema.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), schema.len());

    for row in &table.rows {
        assert_eq!(row.feature_values().len(), table.column_names().len());
    }
}
