use {
    crate::{
        config::BINANCE,
        data::{GlobalRateLimiter, load_klines},
        domain::{Candle, PairInterval},
    },
    anyhow::Result,
    async_trait::async_trait,
};

/// Abstract interface for fetching market data.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Candles for a pair from `start_time` onwards, oldest first.
    async fn fetch_candles(
        &self,
        pair: &PairInterval,
        start_time: Option<i64>,
    ) -> Result<Vec<Candle>>;
}

pub struct BinanceProvider {
    limiter: GlobalRateLimiter,
}

impl BinanceProvider {
    pub fn new(limiter: GlobalRateLimiter) -> Self {
        Self { limiter }
    }
}

impl Default for BinanceProvider {
    fn default() -> Self {
        Self::new(GlobalRateLimiter::new(BINANCE.limits.weight_limit_minute))
    }
}

#[async_trait]
impl MarketDataProvider for BinanceProvider {
    async fn fetch_candles(
        &self,
        pair: &PairInterval,
        start_time: Option<i64>,
    ) -> Result<Vec<Candle>> {
        load_klines(pair, start_time, &self.limiter).await
    }
}
