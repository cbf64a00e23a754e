//! Debugging feature flags.

pub struct LogFlags {
    /// Log every pipeline stage as it completes (column counts).
    pub log_pipeline_stages: bool,

    /// Log row counts for every storage read/write.
    pub log_storage: bool,

    /// Log classifier convergence details.
    pub log_training: bool,

    /// Activate trace_time macro (for cool scope-level timing)
    pub log_performance: bool,

    /// Log each Binance page as it arrives.
    pub log_price_fetch: bool,
}

pub const DF: LogFlags = LogFlags {
    log_pipeline_stages: true,
    log_storage: false,
    log_training: false,
    log_performance: false,
    log_price_fetch: false,
};
