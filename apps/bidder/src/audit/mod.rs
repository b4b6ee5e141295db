//! Outward-facing audit seams: the transaction sink and the bid log.
//!
//! The ledger is fast but not a system of record; the transaction log is.
//! The host must confirm a consumer is listening before it starts bidding,
//! because a committed debit with no logged transaction is money nobody can
//! account for.

pub mod file;

use async_trait::async_trait;

use crate::models::transaction::{BidLogItem, Transaction};

pub use file::{FileBidLogger, FileTransactionLogger};

/// Acknowledged sink for committed debits.
#[async_trait]
pub trait TransactionLogger: Send + Sync {
    /// Whether anything is consuming this log. Hosts refuse to bid when this
    /// is false.
    async fn consumer_listening(&self) -> anyhow::Result<bool>;

    /// `Ok` means the transaction was written and acknowledged. Any error
    /// means the transaction was not logged.
    async fn log_transaction(&self, transaction: &Transaction) -> anyhow::Result<()>;
}

/// Fire-and-forget observability log, safe to call from request tasks.
pub trait BidLogProducer: Send + Sync {
    fn log_item(&self, item: BidLogItem);
}
