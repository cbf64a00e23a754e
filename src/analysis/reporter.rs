use strum_macros::{Display, EnumIter};

use crate::config::DF;

/// Pipeline stages in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum PipelineStage {
    #[strum(to_string = "moving averages")]
    MovingAverages,
    #[strum(to_string = "oscillator")]
    Oscillator,
    #[strum(to_string = "trend")]
    Trend,
    #[strum(to_string = "volatility bands")]
    VolatilityBands,
    #[strum(to_string = "lag features")]
    LagFeatures,
    #[strum(to_string = "label")]
    Label,
}

/// Receives progress from a pipeline run. Passed in explicitly so the
/// pipeline owns no logging state of its own.
pub trait PipelineReporter {
    fn stage_completed(&self, stage: PipelineStage, columns_added: usize);

    /// Rows whose features were all warmed up but which still held an
    /// undefined value (zero divisor in a ratio feature).
    fn undefined_values(&self, rows: usize);

    fn degenerate_input(&self, input_rows: usize, required_rows: usize);

    fn finished(&self, input_rows: usize, emitted_rows: usize);
}

/// Forwards to the `log` facade.
pub struct LogReporter;

impl PipelineReporter for LogReporter {
    fn stage_completed(&self, stage: PipelineStage, columns_added: usize) {
        if DF.log_pipeline_stages {
            log::debug!("Pipeline stage '{}' added {} columns", stage, columns_added);
        }
    }

    fn undefined_values(&self, rows: usize) {
        log::warn!(
            "{} rows dropped because a ratio feature had a zero divisor",
            rows
        );
    }

    fn degenerate_input(&self, input_rows: usize, required_rows: usize) {
        log::warn!(
            "Only {} OHLCV rows, need at least {} for a labelled feature row. Emitting empty table.",
            input_rows,
            required_rows
        );
    }

    fn finished(&self, input_rows: usize, emitted_rows: usize) {
        log::info!(
            "Feature pipeline: {} input rows -> {} feature rows ({} trimmed)",
            input_rows,
            emitted_rows,
            input_rows.saturating_sub(emitted_rows)
        );
    }
}

/// Discards everything.
pub struct SilentReporter;

impl PipelineReporter for SilentReporter {
    fn stage_completed(&self, _stage: PipelineStage, _columns_added: usize) {}
    fn undefined_values(&self, _rows: usize) {}
    fn degenerate_input(&self, _input_rows: usize, _required_rows: usize) {}
    fn finished(&self, _input_rows: usize, _emitted_rows: usize) {}
}
