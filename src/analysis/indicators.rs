//! Technical indicator calculators.
//!
//! Every calculator is a pure function over an ascending price column and
//! returns a column of the same length. Positions without enough history are
//! `None`.

use itertools::Itertools;
use statrs::statistics::Statistics;

use crate::utils::checked_ratio;

/// A computed column; `None` where the value is undefined.
pub type Series = Vec<Option<f64>>;

/// Arithmetic mean of the trailing `window` values.
pub fn sma(values: &[f64], window: usize) -> Series {
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }
    for (i, trailing) in values.windows(window).enumerate() {
        out[i + window - 1] = Some(trailing.iter().sum::<f64>() / window as f64);
    }
    out
}

/// Exponential moving average with `alpha = 2 / (span + 1)`.
///
/// Seeded with the first value and defined from position 0:
/// `ema[t] = ema[t-1] + alpha * (x[t] - ema[t-1])`.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    values
        .iter()
        .scan(None::<f64>, |prev, &x| {
            let next = match *prev {
                None => x,
                Some(p) => p + alpha * (x - p),
            };
            *prev = Some(next);
            Some(next)
        })
        .collect()
}

/// Relative strength index over simple trailing averages of gains and losses.
///
/// Position 0 has no predecessor and counts as a zero change, so the first
/// defined value sits at `window - 1`. A window without losses saturates at 100.
pub fn rsi(closes: &[f64], window: usize) -> Series {
    let mut gains = Vec::with_capacity(closes.len());
    let mut losses = Vec::with_capacity(closes.len());
    if !closes.is_empty() {
        gains.push(0.0);
        losses.push(0.0);
    }
    for (prev, cur) in closes.iter().tuple_windows() {
        let delta = cur - prev;
        gains.push(if delta > 0.0 { delta } else { 0.0 });
        losses.push(if delta < 0.0 { -delta } else { 0.0 });
    }

    let avg_gain = sma(&gains, window);
    let avg_loss = sma(&losses, window);

    avg_gain
        .into_iter()
        .zip(avg_loss)
        .map(|(gain, loss)| Some(rsi_from_averages(gain?, loss?)))
        .collect()
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// MACD line, signal line and histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdColumns {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdColumns {
    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);
    let line: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();
    let signal = ema(&line, signal);
    let histogram = line.iter().zip(&signal).map(|(m, s)| m - s).collect();

    MacdColumns {
        line,
        signal,
        histogram,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerColumns {
    pub middle: Series,
    pub upper: Series,
    pub lower: Series,
    /// `(upper - lower) / middle`; undefined when the middle band is zero.
    pub width: Series,
}

/// Bands at `k` sample standard deviations around the `window` SMA.
pub fn bollinger(closes: &[f64], window: usize, k: f64) -> BollingerColumns {
    let middle = sma(closes, window);
    let len = closes.len();

    let mut upper = vec![None; len];
    let mut lower = vec![None; len];
    let mut width = vec![None; len];

    for (idx, mid) in middle.iter().enumerate() {
        let Some(mid) = *mid else { continue };
        let trailing = &closes[idx + 1 - window..=idx];
        let band = k * trailing.iter().std_dev();
        let (up, low) = (mid + band, mid - band);
        upper[idx] = Some(up);
        lower[idx] = Some(low);
        width[idx] = checked_ratio(up - low, mid);
    }

    BollingerColumns {
        middle,
        upper,
        lower,
        width,
    }
}

/// `values[t - lag]`.
pub fn lagged(values: &[f64], lag: usize) -> Series {
    (0..values.len())
        .map(|t| t.checked_sub(lag).map(|src| values[src]))
        .collect()
}

/// `values[t] / values[t - lag] - 1`; undefined when the base value is zero.
pub fn pct_change(values: &[f64], lag: usize) -> Series {
    (0..values.len())
        .map(|t| {
            let base = values[t.checked_sub(lag)?];
            checked_ratio(values[t], base).map(|r| r - 1.0)
        })
        .collect()
}

/// 1 when the value `horizon` positions ahead is strictly greater, else 0.
/// The final `horizon` positions have no future value and stay `None`.
pub fn forward_label(closes: &[f64], horizon: usize) -> Vec<Option<u8>> {
    (0..closes.len())
        .map(|t| {
            let future = closes.get(t + horizon)?;
            Some(u8::from(*future > closes[t]))
        })
        .collect()
}
