//! Feature pipeline blueprint and the runtime configuration derived from it.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::analysis::PipelineError;

/// Compile-time defaults for every indicator window.
pub struct FeatureDefaults {
    pub sma_windows: &'static [usize],
    pub ema_windows: &'static [usize],
    pub rsi_window: usize,
    pub macd: MacdSpans,
    pub bollinger_window: usize,
    pub bollinger_k: f64,
    pub lags: &'static [usize],
    pub label_horizon: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdSpans {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

pub const FEATURES: FeatureDefaults = FeatureDefaults {
    sma_windows: &[5, 10, 20, 50, 200],
    ema_windows: &[5, 10, 20, 50, 200],
    rsi_window: 14,
    macd: MacdSpans {
        fast: 12,
        slow: 26,
        signal: 9,
    },
    bollinger_window: 20,
    bollinger_k: 2.0,
    lags: &[1, 2, 3, 5, 7, 14, 21],
    label_horizon: 1,
};

/// Runtime feature configuration. Serialized alongside trained models so that
/// prediction rebuilds exactly the columns the classifier was fitted on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub sma_windows: Vec<usize>,
    pub ema_windows: Vec<usize>,
    pub rsi_window: usize,
    pub macd: MacdSpans,
    pub bollinger_window: usize,
    pub bollinger_k: f64,
    pub lags: Vec<usize>,
    pub label_horizon: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sma_windows: FEATURES.sma_windows.to_vec(),
            ema_windows: FEATURES.ema_windows.to_vec(),
            rsi_window: FEATURES.rsi_window,
            macd: FEATURES.macd,
            bollinger_window: FEATURES.bollinger_window,
            bollinger_k: FEATURES.bollinger_k,
            lags: FEATURES.lags.to_vec(),
            label_horizon: FEATURES.label_horizon,
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if self.sma_windows.is_empty() {
            return invalid("at least one SMA window is required".into());
        }
        if self.ema_windows.is_empty() {
            return invalid("at least one EMA window is required".into());
        }
        if let Some(w) = self
            .sma_windows
            .iter()
            .chain(self.ema_windows.iter())
            .find(|&&w| w == 0)
        {
            return invalid(format!("moving-average window must be > 0 (got {})", w));
        }
        for (name, values) in [
            ("SMA windows", &self.sma_windows),
            ("EMA windows", &self.ema_windows),
            ("lags", &self.lags),
        ] {
            if !values.iter().all_unique() {
                return invalid(format!("{} must not repeat (got {:?})", name, values));
            }
        }
        if self.rsi_window == 0 {
            return invalid("RSI window must be > 0".into());
        }
        let MacdSpans { fast, slow, signal } = self.macd;
        if fast == 0 || slow == 0 || signal == 0 {
            return invalid(format!(
                "MACD spans must be > 0 (got {}/{}/{})",
                fast, slow, signal
            ));
        }
        if fast >= slow {
            return invalid(format!(
                "MACD fast span ({}) must be shorter than slow span ({})",
                fast, slow
            ));
        }
        if self.bollinger_window < 2 {
            return invalid(format!(
                "Bollinger window must be >= 2 for a sample deviation (got {})",
                self.bollinger_window
            ));
        }
        if !self.bollinger_k.is_finite() || self.bollinger_k < 0.0 {
            return invalid(format!(
                "Bollinger k must be finite and non-negative (got {})",
                self.bollinger_k
            ));
        }
        if self.lags.contains(&0) {
            return invalid("lags must be >= 1".into());
        }
        if self.label_horizon == 0 {
            return invalid("label horizon must be >= 1".into());
        }
        Ok(())
    }

    /// Number of leading rows that cannot carry a complete feature set.
    pub fn warmup_rows(&self) -> usize {
        let windowed = self
            .sma_windows
            .iter()
            .chain(std::iter::once(&self.bollinger_window))
            .chain(std::iter::once(&self.rsi_window))
            .map(|w| w.saturating_sub(1));
        let lagged = self.lags.iter().copied();

        windowed.chain(lagged).max().unwrap_or(0)
    }

    /// Minimum input length for a non-empty labelled table.
    pub fn min_input_rows(&self) -> usize {
        self.warmup_rows() + self.label_horizon + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_blueprint() {
        let cfg = FeatureConfig::default();
        assert_eq!(cfg.sma_windows, vec![5, 10, 20, 50, 200]);
        assert_eq!(cfg.lags, vec![1, 2, 3, 5, 7, 14, 21]);
        assert_eq!(cfg.macd, MacdSpans { fast: 12, slow: 26, signal: 9 });
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn default_warmup_is_longest_sma_minus_one() {
        let cfg = FeatureConfig::default();
        assert_eq!(cfg.warmup_rows(), 199);
        assert_eq!(cfg.min_input_rows(), 201);
    }

    #[test]
    fn long_lag_dominates_warmup() {
        let cfg = FeatureConfig {
            sma_windows: vec![5],
            bollinger_window: 5,
            rsi_window: 5,
            lags: vec![30],
            ..FeatureConfig::default()
        };
        assert_eq!(cfg.warmup_rows(), 30);
    }

    #[test]
    fn rejects_inverted_macd_spans() {
        let cfg = FeatureConfig {
            macd: MacdSpans { fast: 26, slow: 12, signal: 9 },
            ..FeatureConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_zero_horizon_and_zero_window() {
        let zero_horizon = FeatureConfig {
            label_horizon: 0,
            ..FeatureConfig::default()
        };
        assert!(zero_horizon.validate().is_err());

        let zero_window = FeatureConfig {
            sma_windows: vec![0, 5],
            ..FeatureConfig::default()
        };
        assert!(zero_window.validate().is_err());
    }

    #[test]
    fn rejects_repeated_windows_and_lags() {
        let repeated_sma = FeatureConfig {
            sma_windows: vec![5, 5],
            ..FeatureConfig::default()
        };
        assert!(matches!(
            repeated_sma.validate(),
            Err(PipelineError::InvalidConfig(msg)) if msg.contains("SMA")
        ));

        let repeated_ema = FeatureConfig {
            ema_windows: vec![12, 26, 12],
            ..FeatureConfig::default()
        };
        assert!(repeated_ema.validate().is_err());

        let repeated_lag = FeatureConfig {
            lags: vec![1, 2, 1],
            ..FeatureConfig::default()
        };
        assert!(repeated_lag.validate().is_err());

        // The same number may appear in different families
        let shared = FeatureConfig {
            sma_windows: vec![5, 10],
            ema_windows: vec![5, 10],
            lags: vec![5],
            ..FeatureConfig::default()
        };
        assert!(shared.validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: FeatureConfig =
            serde_json::from_str(r#"{ "sma_windows": [3, 7], "label_horizon": 2 }"#).unwrap();
        assert_eq!(cfg.sma_windows, vec![3, 7]);
        assert_eq!(cfg.label_horizon, 2);
        assert_eq!(cfg.rsi_window, 14);
    }
}
