use {
    crate::{config::BINANCE_QUOTE_ASSETS, utils::TimeUtils},
    serde::{Deserialize, Serialize},
};

#[derive(Serialize, Deserialize, Debug, Clone, Hash, Eq, PartialEq)]
pub struct PairInterval {
    pub name: String,
    pub interval_ms: i64,
}

impl PairInterval {
    pub fn new(name: impl Into<String>, interval_ms: i64) -> Self {
        Self {
            name: name.into(),
            interval_ms,
        }
    }

    pub(crate) fn get_base(text: &str) -> Option<&str> {
        let quote = Self::get_quote(text)?;
        text.strip_suffix(quote)
    }

    pub(crate) fn get_quote(text: &str) -> Option<&str> {
        BINANCE_QUOTE_ASSETS
            .iter()
            .find(|&&ext| text.ends_with(ext))
            .copied()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Binance-style interval shorthand, also used as the storage key.
    pub fn interval_str(&self) -> &'static str {
        TimeUtils::interval_to_string(self.interval_ms)
    }
}

impl std::fmt::Display for PairInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let base = Self::get_base(&self.name).unwrap_or("UNKNOWN_BASE");
        let quote = Self::get_quote(&self.name).unwrap_or("UNKNOWN_QUOTE");
        write!(f, "{}/{} @ {}", base, quote, self.interval_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_base_and_quote() {
        assert_eq!(PairInterval::get_base("BTCUSDT"), Some("BTC"));
        assert_eq!(PairInterval::get_quote("BTCUSDT"), Some("USDT"));
    }

    #[test]
    fn display_uses_interval_shorthand() {
        let pi = PairInterval::new("BTCUSDT", TimeUtils::MS_IN_D);
        assert_eq!(pi.to_string(), "BTC/USDT @ 1d");
    }
}
