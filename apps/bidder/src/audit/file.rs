//! File-backed audit sinks.
//!
//! `FileTransactionLogger` writes and flushes each transaction before
//! acknowledging it. `FileBidLogger` drains a channel from a background task
//! so the request path never waits on the log file.

use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::error;

use crate::audit::{BidLogProducer, TransactionLogger};
use crate::models::money::micro_cents_to_dollars_rounded;
use crate::models::transaction::{BidLogItem, Transaction};

pub struct FileTransactionLogger {
    file: Mutex<File>,
}

impl FileTransactionLogger {
    pub async fn create(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .await
            .with_context(|| format!("opening transaction log {:?}", path.as_ref()))?;

        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl TransactionLogger for FileTransactionLogger {
    async fn consumer_listening(&self) -> anyhow::Result<bool> {
        Ok(true)
    }

    async fn log_transaction(&self, transaction: &Transaction) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(transaction)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Log line format for the bid log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BidLogFormat {
    /// One JSON object per line with the full request and response.
    Json,
    /// One human-readable summary per line.
    Summary,
}

pub struct FileBidLogger {
    sender: mpsc::UnboundedSender<BidLogItem>,
}

impl FileBidLogger {
    /// Spawns the writer task. The handle completes once every producer
    /// clone is dropped and the channel drains.
    pub fn spawn(file: File, format: BidLogFormat) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::unbounded_channel::<BidLogItem>();

        let handle = tokio::spawn(async move {
            let mut file = file;
            while let Some(item) = receiver.recv().await {
                let line = match format {
                    BidLogFormat::Json => match serde_json::to_string(&item) {
                        Ok(json) => json,
                        Err(e) => {
                            error!(%e, "failed to serialize bid log item");
                            continue;
                        }
                    },
                    BidLogFormat::Summary => summary_line(&item),
                };

                if let Err(e) = file.write_all(line.as_bytes()).await {
                    error!(%e, "failed to write bid log line");
                    continue;
                }
                if let Err(e) = file.write_all(b"\n").await {
                    error!(%e, "failed to write bid log line");
                }
            }
            let _ = file.flush().await;
        });

        (Self { sender }, handle)
    }
}

impl BidLogProducer for FileBidLogger {
    fn log_item(&self, item: BidLogItem) {
        // Send only fails when the writer task is gone; the bid log is
        // best-effort observability either way.
        let _ = self.sender.send(item);
    }
}

fn summary_line(item: &BidLogItem) -> String {
    let request_id = item
        .bid_request
        .as_ref()
        .map(|r| r.id.as_str())
        .unwrap_or("-");
    let response_time_ms = (item.end_timestamp_ns - item.start_timestamp_ns) / 1_000_000;

    let bids = item
        .bid_response
        .as_ref()
        .and_then(|r| r.seatbid.first())
        .map(|s| s.bid.as_slice())
        .unwrap_or(&[]);

    if bids.is_empty() {
        return format!("{} / Request ID: {request_id} / No bid.", item.domain);
    }

    let mut line = format!("{} / Request ID: {request_id}", item.domain);
    for bid in bids {
        let remaining = item
            .remaining_daily_budgets_micro_cents
            .get(&bid.cid)
            .copied()
            .unwrap_or(0);
        line.push_str(&format!(
            " / Campaign: {} / Bid: ${} / Remaining Daily Budget: ${} / Response Time: {response_time_ms}ms",
            bid.cid,
            bid.price,
            micro_cents_to_dollars_rounded(remaining, 5),
        ));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::response::{Bid, BidResponse, SeatBid};
    use std::collections::HashMap;

    #[tokio::test]
    async fn transaction_log_round_trips_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.log");

        let logger = FileTransactionLogger::create(&path).await.unwrap();
        assert!(logger.consumer_listening().await.unwrap());

        let tx = Transaction {
            campaign_id: 100,
            bid_response_id: "resp-1".to_string(),
            amount_micro_cents: 25_000,
            timestamp_ns: 1_700_000_000_000_000_000,
            ext: None,
        };
        logger.log_transaction(&tx).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: Transaction = serde_json::from_str(contents.trim()).unwrap();
        assert_eq!(parsed.campaign_id, 100);
        assert_eq!(parsed.bid_response_id, "resp-1");
        assert_eq!(parsed.amount_micro_cents, 25_000);
    }

    fn log_item_with_bid() -> BidLogItem {
        BidLogItem {
            domain: "rtb".to_string(),
            bid_request: None,
            bid_response: Some(BidResponse {
                seatbid: vec![SeatBid {
                    bid: vec![Bid {
                        cid: "100".to_string(),
                        price: 0.25,
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }),
            remaining_daily_budgets_micro_cents: HashMap::from([(
                "100".to_string(),
                99_975_000,
            )]),
            start_timestamp_ns: 0,
            end_timestamp_ns: 2_000_000,
        }
    }

    #[tokio::test]
    async fn bid_log_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bids.log");
        let file = File::create(&path).await.unwrap();

        let (logger, handle) = FileBidLogger::spawn(file, BidLogFormat::Json);
        logger.log_item(log_item_with_bid());
        drop(logger);
        handle.await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: BidLogItem = serde_json::from_str(contents.trim()).unwrap();
        assert_eq!(parsed.domain, "rtb");
        assert_eq!(
            parsed.remaining_daily_budgets_micro_cents["100"],
            99_975_000
        );
    }

    #[test]
    fn summary_line_reports_bids_and_budget() {
        let line = summary_line(&log_item_with_bid());
        assert!(line.contains("Campaign: 100"));
        assert!(line.contains("Bid: $0.25"));
        assert!(line.contains("Remaining Daily Budget: $0.99975"));
        assert!(line.contains("Response Time: 2ms"));
    }

    #[test]
    fn summary_line_marks_no_bid() {
        let item = BidLogItem {
            domain: "rtb".to_string(),
            bid_request: None,
            bid_response: None,
            remaining_daily_budgets_micro_cents: HashMap::new(),
            start_timestamp_ns: 0,
            end_timestamp_ns: 0,
        };
        assert!(summary_line(&item).ends_with("No bid."));
    }
}
