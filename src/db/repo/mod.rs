//! Repository layer for database operations.
//!
//! Methods are organized across submodules by domain:
//! - `auctions.rs` - auction rows and engine-owned price/leader updates
//! - `bids.rs` - bid ledger append and history queries
//! - `proxies.rs` - proxy-limit upsert and standing queries
//!
//! Mutating methods take a `SqliteConnection` so the bid desk can group a
//! ledger append, a proxy upsert, and the auction row update into one
//! transaction; both happen or neither does.

mod auctions;
mod bids;
mod proxies;

use crate::domain::Amount;
use sqlx::sqlite::SqlitePool;
use std::str::FromStr;

/// Decode a stored canonical amount, surfacing corruption as a column decode
/// error rather than silently coercing to zero.
pub(crate) fn decode_amount(value: &str, column: &str) -> Result<Amount, sqlx::Error> {
    Amount::from_str(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Access the underlying pool, e.g. to begin a transaction.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
