use thiserror::Error;

/// Input-contract and configuration failures of the feature pipeline.
///
/// Inputs that are merely too short are not errors: they yield an empty table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("OHLCV input is empty")]
    EmptyInput,

    #[error("column '{column}' has {actual} rows, expected {expected}")]
    ColumnLengthMismatch {
        column: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("timestamps must be strictly increasing: row {index} has {current} after {previous}")]
    NonMonotonicTimestamp {
        index: usize,
        previous: i64,
        current: i64,
    },

    #[error("column '{column}' holds non-finite value {value} at row {index}")]
    NonFiniteValue {
        index: usize,
        column: &'static str,
        value: f64,
    },

    #[error("invalid feature configuration: {0}")]
    InvalidConfig(String),
}
