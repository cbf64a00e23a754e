//! File persistence configuration

/// Configuration for the SQLite store
pub struct DatabaseConfig {
    /// Path of the SQLite file holding candles, features and model runs
    pub path: &'static str,
    /// Connections kept in the pool
    pub max_connections: u32,
    /// Candles or feature rows written per INSERT statement
    pub insert_chunk: usize,
}

/// The Master Persistence Configuration
pub struct PersistenceConfig {
    pub db: DatabaseConfig,
}

pub const PERSISTENCE: PersistenceConfig = PersistenceConfig {
    db: DatabaseConfig {
        path: "btc_oracle.sqlite",
        max_connections: 5,
        // Stays within SQLite's 32k bound-parameter limit for the widest row.
        insert_chunk: 1000,
    },
};
