//! Atomic per-campaign daily budget ledger.
//!
//! Built for the hot path of an auction: many processes debit the same
//! account concurrently and the store-side primitive keeps them from
//! overspending. Close to 100% accurate, but not an accounting system;
//! the transaction log is the record of truth for reconciliation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveTime, Utc};
use thiserror::Error;
use tracing::warn;

use crate::store::{DataStore, DebitResult, StoreError};

#[derive(Debug, Error)]
pub enum LedgerError {
    /// The account could not cover the debit. `remaining` is the unchanged
    /// balance and is safe to report.
    #[error("insufficient daily funds")]
    InsufficientFunds { remaining: i64 },

    /// The store could not complete the operation. No balance accompanies
    /// this arm; any number obtained alongside it would be untrustworthy.
    #[error("ledger transaction failed: {0}")]
    TransactionFailure(#[from] StoreError),
}

/// Tracks remaining daily budgets per account.
///
/// Safe to call concurrently from arbitrarily many processes against the
/// same account; the one atomic unit is `debit_account`'s
/// create-if-absent-then-subtract-if-sufficient sequence.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Subtracts `amount` from `account`. An absent or expired account is
    /// first initialized to `daily_budget` expiring at `expiration`,
    /// atomically with the debit attempt. Returns the new remaining balance.
    async fn debit_account(
        &self,
        account: i64,
        amount: i64,
        daily_budget: i64,
        expiration: DateTime<Utc>,
    ) -> Result<i64, LedgerError>;

    /// Remaining balance for `account`, or zero when absent or expired.
    /// Never fails; store errors read as zero.
    async fn remaining_daily_budget(&self, account: i64) -> i64;

    /// Unconditional overwrite plus expiration scheduling. Provisioning and
    /// test use.
    async fn set_remaining_daily_budget(
        &self,
        account: i64,
        amount: i64,
        expiration: DateTime<Utc>,
    ) -> Result<(), LedgerError>;

    /// Unconditional removal.
    async fn delete_account(&self, account: i64) -> Result<(), LedgerError>;
}

/// Next UTC midnight after `now`: the calendar-day boundary every daily
/// budget expires on. Calendar day, not a rolling 24 hours.
pub fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    (now.date_naive() + Days::new(1))
        .and_time(NaiveTime::MIN)
        .and_utc()
}

fn account_key(account: i64) -> String {
    format!("banker:account:{account:x}")
}

/// Store-backed [`Ledger`].
pub struct StoreLedger {
    store: Arc<dyn DataStore>,
}

impl StoreLedger {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Ledger for StoreLedger {
    async fn debit_account(
        &self,
        account: i64,
        amount: i64,
        daily_budget: i64,
        expiration: DateTime<Utc>,
    ) -> Result<i64, LedgerError> {
        let result = self
            .store
            .debit_if_sufficient(&account_key(account), amount, daily_budget, expiration)
            .await?;

        match result {
            DebitResult::Debited { remaining } => Ok(remaining),
            DebitResult::Insufficient { remaining } => {
                Err(LedgerError::InsufficientFunds { remaining })
            }
        }
    }

    async fn remaining_daily_budget(&self, account: i64) -> i64 {
        match self.store.get_i64(&account_key(account)).await {
            Ok(Some(remaining)) => remaining,
            Ok(None) => 0,
            Err(error) => {
                warn!(account, %error, "balance read failed, reporting zero");
                0
            }
        }
    }

    async fn set_remaining_daily_budget(
        &self,
        account: i64,
        amount: i64,
        expiration: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.store
            .set_i64(&account_key(account), amount, expiration)
            .await?;
        Ok(())
    }

    async fn delete_account(&self, account: i64) -> Result<(), LedgerError> {
        self.store.delete(&[account_key(account)]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn ledger() -> StoreLedger {
        StoreLedger::new(Arc::new(MemoryStore::new()))
    }

    fn tomorrow() -> DateTime<Utc> {
        next_utc_midnight(Utc::now())
    }

    #[tokio::test]
    async fn set_then_read_returns_exact_amount() {
        let ledger = ledger();
        ledger
            .set_remaining_daily_budget(7, 123_456, tomorrow())
            .await
            .unwrap();
        assert_eq!(ledger.remaining_daily_budget(7).await, 123_456);
    }

    #[tokio::test]
    async fn absent_account_reads_zero() {
        assert_eq!(ledger().remaining_daily_budget(999).await, 0);
    }

    #[tokio::test]
    async fn first_debit_initializes_to_daily_budget() {
        let ledger = ledger();
        let remaining = ledger
            .debit_account(100, 25_000, 100_000_000, tomorrow())
            .await
            .unwrap();
        assert_eq!(remaining, 99_975_000);
    }

    #[tokio::test]
    async fn insufficient_debit_reports_unchanged_remaining() {
        let ledger = ledger();
        ledger
            .set_remaining_daily_budget(100, 10, tomorrow())
            .await
            .unwrap();

        let error = ledger
            .debit_account(100, 32, 100, tomorrow())
            .await
            .unwrap_err();
        match error {
            LedgerError::InsufficientFunds { remaining } => assert_eq!(remaining, 10),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(ledger.remaining_daily_budget(100).await, 10);
    }

    #[tokio::test]
    async fn expired_account_reinitializes_before_debit() {
        let ledger = ledger();
        ledger
            .set_remaining_daily_budget(100, 10, Utc::now() - Duration::seconds(1))
            .await
            .unwrap();

        let remaining = ledger
            .debit_account(100, 32, 100, tomorrow())
            .await
            .unwrap();
        assert_eq!(remaining, 68);
    }

    #[tokio::test]
    async fn delete_account_zeroes_balance() {
        let ledger = ledger();
        ledger
            .set_remaining_daily_budget(5, 42, tomorrow())
            .await
            .unwrap();
        ledger.delete_account(5).await.unwrap();
        assert_eq!(ledger.remaining_daily_budget(5).await, 0);
    }

    #[tokio::test]
    async fn concurrent_debits_never_overspend() {
        let ledger = Arc::new(StoreLedger::new(Arc::new(MemoryStore::new())));
        let expiration = tomorrow();

        let mut handles = Vec::new();
        for _ in 0..100 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger.debit_account(1, 25, 1_000, expiration).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }

        // 1000 budget / 25 per debit: exactly 40 can land.
        assert_eq!(successes, 40);
        assert_eq!(ledger.remaining_daily_budget(1).await, 0);
    }

    #[test]
    fn midnight_is_the_next_calendar_day() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 18, 30, 45).unwrap();
        let midnight = next_utc_midnight(now);
        assert_eq!(midnight, Utc.with_ymd_and_hms(2026, 3, 16, 0, 0, 0).unwrap());

        let end_of_month = Utc.with_ymd_and_hms(2026, 1, 31, 23, 59, 59).unwrap();
        assert_eq!(
            next_utc_midnight(end_of_month),
            Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
        );
    }
}
