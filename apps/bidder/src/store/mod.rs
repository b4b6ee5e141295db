//! Backing-store abstraction for budgets and targeting data.
//!
//! Every concurrency guarantee in this crate bottoms out in
//! [`DataStore::debit_if_sufficient`]: initialize-if-absent-with-expiration
//! followed by decrement-if-sufficient, executed as one indivisible operation
//! at the store. Everything else is plain keyed reads and writes.
//!
//! Two implementations: [`RedisStore`] for production and [`MemoryStore`] as
//! the in-process double used by unit tests.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis command failed: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("unexpected store reply: {0}")]
    Reply(String),
}

/// Outcome of the atomic debit primitive.
///
/// Both arms carry a balance that is safe to report: `Debited` holds the
/// value after subtraction, `Insufficient` holds the untouched current value.
/// A store failure surfaces as [`StoreError`] instead and carries no balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitResult {
    Debited { remaining: i64 },
    Insufficient { remaining: i64 },
}

#[async_trait]
pub trait DataStore: Send + Sync {
    /// If `key` is absent, create it with `init_value` expiring at
    /// `init_expiration`; then subtract `amount` if the current value covers
    /// it. The whole sequence is a single atomic unit at the store.
    async fn debit_if_sufficient(
        &self,
        key: &str,
        amount: i64,
        init_value: i64,
        init_expiration: DateTime<Utc>,
    ) -> Result<DebitResult, StoreError>;

    async fn get_i64(&self, key: &str) -> Result<Option<i64>, StoreError>;

    /// Unconditional overwrite with an expiration instant.
    async fn set_i64(
        &self,
        key: &str,
        value: i64,
        expiration: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn delete(&self, keys: &[String]) -> Result<(), StoreError>;

    async fn hash_get_i64(&self, key: &str, field: &str) -> Result<Option<i64>, StoreError>;

    async fn hash_set_i64(&self, key: &str, field: &str, value: i64) -> Result<(), StoreError>;

    async fn set_add(&self, key: &str, members: &[String]) -> Result<(), StoreError>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Adds `member` with `score`, overwriting any previous score.
    async fn sorted_set_add(&self, key: &str, member: &str, score: i64)
        -> Result<(), StoreError>;

    /// Union of the named sorted sets, aggregating duplicate members by max
    /// score. Pair order is unspecified; callers apply their own comparator.
    async fn sorted_set_union_max(
        &self,
        keys: &[String],
    ) -> Result<Vec<(String, i64)>, StoreError>;

    /// Key enumeration. Administrative and test use only.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;
}
