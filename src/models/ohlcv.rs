use {
    crate::domain::{Candle, PairInterval},
    serde::{Deserialize, Serialize},
};

/// Column-oriented OHLCV table. Rows are expected in ascending timestamp
/// order; the feature pipeline checks this rather than re-sorting.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OhlcvTimeSeries {
    pub pair_interval: PairInterval,
    pub timestamps: Vec<i64>,
    pub open_prices: Vec<f64>,
    pub high_prices: Vec<f64>,
    pub low_prices: Vec<f64>,
    pub close_prices: Vec<f64>,
    pub volumes: Vec<f64>,
}

impl OhlcvTimeSeries {
    pub fn from_candles(pair_interval: PairInterval, candles: &[Candle]) -> Self {
        let len = candles.len();

        let mut ts_vec = Vec::with_capacity(len);
        let mut open_vec = Vec::with_capacity(len);
        let mut high_vec = Vec::with_capacity(len);
        let mut low_vec = Vec::with_capacity(len);
        let mut close_vec = Vec::with_capacity(len);
        let mut vol_vec = Vec::with_capacity(len);

        for c in candles {
            ts_vec.push(c.timestamp_ms);
            open_vec.push(c.open_price);
            high_vec.push(c.high_price);
            low_vec.push(c.low_price);
            close_vec.push(c.close_price);
            vol_vec.push(c.volume);
        }

        Self {
            pair_interval,
            timestamps: ts_vec,
            open_prices: open_vec,
            high_prices: high_vec,
            low_prices: low_vec,
            close_prices: close_vec,
            volumes: vol_vec,
        }
    }

    /// Convenience for tests and synthetic data: OHLC all equal to the close.
    pub fn from_closes(pair_interval: PairInterval, start_ms: i64, closes: &[f64]) -> Self {
        let step = pair_interval.interval_ms.max(1);
        let candles: Vec<Candle> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle::new(start_ms + i as i64 * step, c, c, c, c, 1.0))
            .collect();
        Self::from_candles(pair_interval, &candles)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Every column paired with its name, timestamps excluded.
    pub(crate) fn value_columns(&self) -> [(&'static str, &[f64]); 5] {
        [
            ("open", &self.open_prices),
            ("high", &self.high_prices),
            ("low", &self.low_prices),
            ("close", &self.close_prices),
            ("volume", &self.volumes),
        ]
    }

    /// Span covered by the series in milliseconds.
    pub fn span_ms(&self) -> i64 {
        match (self.timestamps.first(), self.timestamps.last()) {
            (Some(first), Some(last)) => last - first,
            _ => 0,
        }
    }
}
