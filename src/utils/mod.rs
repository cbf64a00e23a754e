mod maths_utils;
mod perf;
mod time_utils;

pub use time_utils::{TimeUtils, epoch_ms_to_utc, format_duration, now_timestamp_ms};

pub(crate) use maths_utils::{checked_ratio, mean_and_stddev};
