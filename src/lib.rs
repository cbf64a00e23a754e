#![allow(clippy::collapsible_if)]
#![allow(clippy::too_many_arguments)]

// Core modules
pub mod analysis;
pub mod app;
pub mod config;
pub mod data;
pub mod domain;
pub mod models;
pub mod training;
pub mod utils;

// Re-export commonly used types outside of crate
pub use analysis::{FeaturePipeline, LogReporter, PipelineError, PipelineReporter, SilentReporter};
pub use config::{FeatureConfig, PERSISTENCE, TrainingConfig};
pub use domain::{Candle, PairInterval};
pub use models::{FeatureRow, FeatureTable, OhlcvTimeSeries};
pub use training::{TrainedModel, train_model};

// CLI argument parsing
use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Bitcoin OHLCV feature engineering and direction forecasting", long_about = None)]
pub struct Cli {
    /// SQLite database file
    #[arg(long, default_value = PERSISTENCE.db.path)]
    pub db: String,

    /// Binance spot symbol
    #[arg(long, default_value = config::BINANCE.market.symbol)]
    pub symbol: String,

    /// Candle interval in Binance shorthand (1m, 1h, 4h, 1d, ...)
    #[arg(long, default_value = "1d")]
    pub interval: String,

    /// JSON file overriding the default feature settings
    #[arg(long)]
    pub feature_config: Option<String>,

    /// JSON file overriding the default training settings
    #[arg(long)]
    pub training_config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Create the database tables
    SetupDb,
    /// Download candles newer than the last stored one
    Fetch,
    /// Rebuild the feature table from stored candles
    Transform,
    /// Train a direction classifier on the stored feature table
    Train,
    /// Forecast the next-period direction from the newest candles
    Predict,
}
