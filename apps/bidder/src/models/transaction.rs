//! Audit records handed to external log sinks.
//!
//! Both records are write-once: the core produces them after the fact and
//! never reads them back. Transactions are kept light so a downstream
//! accounting consumer is never the bottleneck of a bid.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::request::BidRequest;
use crate::models::response::BidResponse;

/// One committed budget debit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub campaign_id: i64,
    pub bid_response_id: String,
    pub amount_micro_cents: i64,
    pub timestamp_ns: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<serde_json::Value>,
}

/// Composite observability record for one auction request.
///
/// Field names stay short; these lines are written for every request and the
/// names match what historical log consumers already parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidLogItem {
    #[serde(rename = "d", default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
    #[serde(rename = "rq", default, skip_serializing_if = "Option::is_none")]
    pub bid_request: Option<BidRequest>,
    #[serde(rename = "rp", default, skip_serializing_if = "Option::is_none")]
    pub bid_response: Option<BidResponse>,
    /// Remaining daily budget per winning campaign id, observed at debit.
    #[serde(rename = "b", default, skip_serializing_if = "HashMap::is_empty")]
    pub remaining_daily_budgets_micro_cents: HashMap<String, i64>,
    #[serde(rename = "sts", default)]
    pub start_timestamp_ns: i64,
    #[serde(rename = "ets", default)]
    pub end_timestamp_ns: i64,
}
