mod feature_row;
mod model_run;
mod ohlcv;

pub use feature_row::{FeatureRow, FeatureTable};
pub use model_run::ModelRun;
pub use ohlcv::OhlcvTimeSeries;
