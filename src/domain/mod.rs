// Domain types and value objects
mod candle;
mod pair_interval;

// Re-export commonly used types to the world
pub use candle::Candle;
pub use pair_interval::PairInterval;
