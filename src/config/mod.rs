//! Configuration module for the forecasting pipeline.

// Can all be private now because we have a public re-export.
mod binance;
mod debug;
mod features;
mod persistence;
mod training;

// Re-export commonly used items
pub use binance::{BINANCE, BINANCE_QUOTE_ASSETS, BinanceApiConfig};
pub use debug::DF;
pub use features::{FEATURES, FeatureConfig, MacdSpans};
pub use persistence::PERSISTENCE;
pub use training::{TRAINING, TrainingConfig};

use {
    anyhow::{Context, Result},
    serde::de::DeserializeOwned,
};

/// Reads a JSON override file; fields it leaves out keep their defaults.
/// No path means all defaults.
pub fn load_json_or_default<T: DeserializeOwned + Default>(path: Option<&str>) -> Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid config file {}", path))
}
