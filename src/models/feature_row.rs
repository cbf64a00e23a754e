use {
    crate::config::FeatureConfig,
    serde::{Deserialize, Serialize},
};

/// One fully populated row of the feature table.
///
/// Windowed columns are stored as vectors aligned with the window/lag lists of
/// the [`FeatureConfig`] that produced the row: `sma[i]` belongs to
/// `config.sma_windows[i]`, `close_lags[i]` to `config.lags[i]`, and so on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub timestamp_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,

    pub sma: Vec<f64>,
    pub ema: Vec<f64>,
    pub rsi: f64,

    pub macd: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,

    pub bb_middle: f64,
    pub bb_upper: f64,
    pub bb_lower: f64,
    pub bb_width: f64,

    pub close_lags: Vec<f64>,
    pub return_lags: Vec<f64>,

    /// 1 when the close `label_horizon` periods ahead is higher, else 0.
    pub target: u8,
}

impl FeatureRow {
    /// Computed feature values in [`FeatureTable::column_names`] order.
    /// Pass-through OHLCV columns and the target are not included.
    pub fn feature_values(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(
            self.sma.len() + self.ema.len() + self.close_lags.len() * 2 + 8,
        );
        out.extend_from_slice(&self.sma);
        out.extend_from_slice(&self.ema);
        out.push(self.rsi);
        out.extend([self.macd, self.macd_signal, self.macd_histogram]);
        out.extend([self.bb_middle, self.bb_upper, self.bb_lower, self.bb_width]);
        out.extend_from_slice(&self.close_lags);
        out.extend_from_slice(&self.return_lags);
        out
    }
}

/// Output of one pipeline run: rows sorted ascending by timestamp, plus the
/// configuration needed to interpret their windowed columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub config: FeatureConfig,
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub const PASS_THROUGH_COLUMNS: [&'static str; 6] =
        ["timestamp", "open", "high", "low", "close", "volume"];
    pub const TARGET_COLUMN: &'static str = "target";

    pub fn empty(config: FeatureConfig) -> Self {
        Self {
            config,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<String> {
        Self::column_names_for(&self.config)
    }

    /// Names of the computed feature columns, in evaluation order.
    pub fn column_names_for(config: &FeatureConfig) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        names.extend(config.sma_windows.iter().map(|w| format!("sma_{}", w)));
        names.extend(config.ema_windows.iter().map(|w| format!("ema_{}", w)));
        names.push(format!("rsi_{}", config.rsi_window));
        names.extend(
            ["macd", "macd_signal", "macd_histogram"]
                .iter()
                .map(|s| s.to_string()),
        );
        names.extend(
            ["bb_middle", "bb_upper", "bb_lower", "bb_width"]
                .iter()
                .map(|s| s.to_string()),
        );
        names.extend(config.lags.iter().map(|l| format!("close_lag_{}", l)));
        names.extend(config.lags.iter().map(|l| format!("return_lag_{}", l)));
        names
    }

    /// Full schema: pass-through columns, computed columns, then the target.
    pub fn schema(&self) -> Vec<String> {
        Self::PASS_THROUGH_COLUMNS
            .iter()
            .map(|s| s.to_string())
            .chain(self.column_names())
            .chain(std::iter::once(Self::TARGET_COLUMN.to_string()))
            .collect()
    }

    pub fn targets(&self) -> Vec<u8> {
        self.rows.iter().map(|r| r.target).collect()
    }

    /// Share of rows labelled 1. Zero for an empty table.
    pub fn up_ratio(&self) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        let ups = self.rows.iter().filter(|r| r.target == 1).count();
        ups as f64 / self.rows.len() as f64
    }
}
