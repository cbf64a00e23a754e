use {
    anyhow::{Context, Result},
    binance_sdk::{
        config::ConfigurationRestApi,
        errors::ConnectorError,
        spot::{
            SpotRestApi,
            rest_api::{KlinesIntervalEnum, KlinesItemInner, KlinesParams, RestApi},
        },
    },
    thiserror::Error,
};

use crate::{
    config::{BINANCE, BinanceApiConfig, DF},
    data::GlobalRateLimiter,
    domain::{Candle, PairInterval},
    utils::TimeUtils,
};

pub fn try_interval_from_ms(ms: i64) -> Result<KlinesIntervalEnum, BNKlineError> {
    use TimeUtils as T;
    match ms {
        T::MS_IN_MIN => Ok(KlinesIntervalEnum::Interval1m),
        T::MS_IN_3_MIN => Ok(KlinesIntervalEnum::Interval3m),
        T::MS_IN_5_MIN => Ok(KlinesIntervalEnum::Interval5m),
        T::MS_IN_15_MIN => Ok(KlinesIntervalEnum::Interval15m),
        T::MS_IN_30_MIN => Ok(KlinesIntervalEnum::Interval30m),
        T::MS_IN_H => Ok(KlinesIntervalEnum::Interval1h),
        T::MS_IN_2_H => Ok(KlinesIntervalEnum::Interval2h),
        T::MS_IN_4_H => Ok(KlinesIntervalEnum::Interval4h),
        T::MS_IN_6_H => Ok(KlinesIntervalEnum::Interval6h),
        T::MS_IN_8_H => Ok(KlinesIntervalEnum::Interval8h),
        T::MS_IN_12_H => Ok(KlinesIntervalEnum::Interval12h),
        T::MS_IN_D => Ok(KlinesIntervalEnum::Interval1d),
        T::MS_IN_3_D => Ok(KlinesIntervalEnum::Interval3d),
        T::MS_IN_W => Ok(KlinesIntervalEnum::Interval1w),
        T::MS_IN_1_M => Ok(KlinesIntervalEnum::Interval1M),
        _ => Err(BNKlineError::UnsupportedInterval(ms)),
    }
}

/// A raw kline as Binance sends it. Numeric fields arrive as strings and any
/// of them may fail to parse.
#[derive(Debug, Clone, PartialEq)]
pub struct BNKline {
    pub open_timestamp_ms: i64,
    pub open_price: Option<f64>,
    pub high_price: Option<f64>,
    pub low_price: Option<f64>,
    pub close_price: Option<f64>,
    pub volume: Option<f64>,
}

#[derive(Error, Debug)]
pub enum BNKlineError {
    #[error("kline row is too short")]
    InvalidLength,
    #[error("invalid type for {0}")]
    InvalidType(String),
    #[error("unsupported interval: {0}ms")]
    UnsupportedInterval(i64),
    #[error("kline open time {0} does not follow the previous bar")]
    NonIncreasingOpenTime(i64),
    #[error("Binance API connection failed: {0}")]
    ConnectionFailed(String),
}

fn parse_decimal(item: Option<KlinesItemInner>) -> Option<f64> {
    match item? {
        KlinesItemInner::String(s) => s.parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

impl TryFrom<Vec<KlinesItemInner>> for BNKline {
    type Error = BNKlineError;

    fn try_from(items: Vec<KlinesItemInner>) -> Result<Self, Self::Error> {
        let mut items = items.into_iter();
        let open_timestamp_ms = match items.next().ok_or(BNKlineError::InvalidLength)? {
            KlinesItemInner::Integer(a) => a,
            _ => return Err(BNKlineError::InvalidType("open_time".to_string())),
        };

        Ok(BNKline {
            open_timestamp_ms,
            open_price: parse_decimal(items.next()),
            high_price: parse_decimal(items.next()),
            low_price: parse_decimal(items.next()),
            close_price: parse_decimal(items.next()),
            volume: parse_decimal(items.next()),
        })
    }
}

impl BNKline {
    /// None when any price or the volume is missing.
    pub fn into_candle(self) -> Option<Candle> {
        Some(Candle::new(
            self.open_timestamp_ms,
            self.open_price?,
            self.high_price?,
            self.low_price?,
            self.close_price?,
            self.volume?,
        ))
    }
}

fn configure_binance_client() -> Result<RestApi> {
    let config = BinanceApiConfig::default();
    let rest_conf = ConfigurationRestApi::builder()
        .timeout(config.timeout_ms)
        .retries(config.retries)
        .backoff(config.backoff_ms)
        .build()?;
    Ok(SpotRestApi::production(rest_conf))
}

async fn fetch_page(
    rest_client: &RestApi,
    params: KlinesParams,
    pair_interval: &PairInterval,
) -> Result<Vec<Vec<KlinesItemInner>>> {
    match rest_client.klines(params).await {
        Ok(response) => Ok(response.data().await?),
        Err(e) => {
            match e.downcast_ref::<ConnectorError>() {
                Some(ConnectorError::TooManyRequestsError(msg)) => {
                    log::warn!("{} Rate limit exceeded. {}", pair_interval, msg);
                }
                Some(ConnectorError::RateLimitBanError(msg)) => {
                    log::error!("{} IP address banned for excessive requests. {}", pair_interval, msg);
                }
                Some(ConnectorError::NetworkError(msg)) => {
                    log::error!("{} Network error: check your connection. {}", pair_interval, msg);
                }
                Some(other) => {
                    log::error!("{} Binance connector error: {:?}", pair_interval, other);
                }
                None => {
                    log::error!("{} Unexpected error: {:#}", pair_interval, e);
                }
            }
            Err(anyhow::Error::new(BNKlineError::ConnectionFailed(e.to_string()))
                .context(format!("Binance klines call failed for {}", pair_interval)))
        }
    }
}

/// Appends a page to `all_klines`, skipping the overlap with earlier pages.
/// Within the page open times must strictly increase, which keeps
/// `all_klines` free of duplicates. Returns the open time to request next, or
/// None once the page came back short.
fn process_page(
    page: Vec<Vec<KlinesItemInner>>,
    limit: i32,
    interval_ms: i64,
    all_klines: &mut Vec<BNKline>,
) -> Result<Option<i64>, BNKlineError> {
    let page_len = page.len();
    let newest_held = all_klines.last().map(|k| k.open_timestamp_ms);

    for row in page {
        let kline = BNKline::try_from(row)?;
        if newest_held.is_some_and(|t| kline.open_timestamp_ms <= t) {
            continue;
        }
        if all_klines
            .last()
            .is_some_and(|prev| kline.open_timestamp_ms <= prev.open_timestamp_ms)
        {
            return Err(BNKlineError::NonIncreasingOpenTime(kline.open_timestamp_ms));
        }
        all_klines.push(kline);
    }

    if page_len < limit as usize {
        return Ok(None);
    }
    Ok(all_klines
        .last()
        .map(|k| k.open_timestamp_ms + interval_ms)
        .filter(|next| Some(*next - interval_ms) != newest_held))
}

/// Pages forward through the spot klines endpoint from `start_time` (or the
/// pair's first listed bar) up to the newest bar, including the one still open.
pub async fn load_klines(
    pair_interval: &PairInterval,
    start_time: Option<i64>,
    limiter: &GlobalRateLimiter,
) -> Result<Vec<Candle>> {
    let rest_client = configure_binance_client()?;
    let limit = BINANCE.limits.klines_limit;

    let mut next_start = Some(start_time.unwrap_or(0));
    let mut all_klines: Vec<BNKline> = Vec::new();

    while let Some(start) = next_start {
        limiter
            .acquire(BINANCE.limits.kline_call_weight, pair_interval.name())
            .await;

        let params = KlinesParams::builder(
            pair_interval.name().to_string(),
            try_interval_from_ms(pair_interval.interval_ms)?,
        )
        .limit(limit)
        .start_time(Some(start))
        .build()?;

        let page = fetch_page(&rest_client, params, pair_interval).await?;
        if DF.log_price_fetch {
            log::info!("{}: {} klines from {}", pair_interval, page.len(), start);
        }
        next_start = process_page(page, limit, pair_interval.interval_ms, &mut all_klines)
            .with_context(|| format!("{}: malformed kline page", pair_interval))?;
    }

    let fetched = all_klines.len();
    let candles: Vec<Candle> = all_klines
        .into_iter()
        .filter_map(BNKline::into_candle)
        .collect();
    if candles.len() < fetched {
        log::warn!(
            "{}: dropped {} klines with missing fields",
            pair_interval,
            fetched - candles.len()
        );
    }
    Ok(candles)
}
