mod bn_kline;
mod provider;
mod rate_limiter;
mod storage;

pub use {
    provider::{BinanceProvider, MarketDataProvider},
    rate_limiter::GlobalRateLimiter,
    storage::{MarketDataStorage, SqliteStorage},
};

pub(crate) use bn_kline::load_klines;
