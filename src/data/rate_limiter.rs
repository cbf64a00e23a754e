use {
    std::{
        sync::Arc,
        time::{Duration, SystemTime, UNIX_EPOCH},
    },
    tokio::sync::Mutex,
};

/// Shared per-minute request weight budget, reset on the wall-clock minute
/// the way Binance counts it.
#[derive(Clone)]
pub struct GlobalRateLimiter {
    inner: Arc<Mutex<InnerLimiter>>,
}

struct InnerLimiter {
    used_weight: u32,
    // Minutes since the epoch for the window being counted
    current_minute_idx: u64,
    limit: u32,
}

impl InnerLimiter {
    /// Takes `cost` from the budget of minute `now_idx`, or reports how long
    /// to wait for the next minute.
    fn try_take(&mut self, cost: u32, now_secs: u64) -> Result<(), Duration> {
        let now_idx = now_secs / 60;
        if now_idx > self.current_minute_idx {
            self.used_weight = 0;
            self.current_minute_idx = now_idx;
        }

        if self.used_weight + cost <= self.limit {
            self.used_weight += cost;
            return Ok(());
        }

        // Land just inside the next minute
        let wait_secs = 60 - now_secs % 60;
        Err(Duration::from_secs(wait_secs) + Duration::from_millis(100))
    }
}

impl GlobalRateLimiter {
    pub fn new(limit: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(InnerLimiter {
                used_weight: 0,
                current_minute_idx: Self::now_secs() / 60,
                limit,
            })),
        }
    }

    /// Waits until `cost` weight fits in the current minute, then spends it.
    pub async fn acquire(&self, cost: u32, context: &str) {
        loop {
            let wait = {
                let mut guard = self.inner.lock().await;
                match guard.try_take(cost, Self::now_secs()) {
                    Ok(()) => return,
                    Err(wait) => {
                        log::warn!(
                            "Rate limit saturated for [{}]. Used: {}/{}. Waiting {:.1}s",
                            context,
                            guard.used_weight,
                            guard.limit,
                            wait.as_secs_f64()
                        );
                        wait
                    }
                }
            };
            tokio::time::sleep(wait).await;
        }
    }

    fn now_secs() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs()
    }
}
