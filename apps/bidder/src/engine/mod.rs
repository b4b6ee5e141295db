//! Per-request bid decisioning.
//!
//! The engine holds no cross-request state and takes no locks; every
//! concurrency guarantee is delegated to the ledger's atomic debit. Admission
//! (pacer) and commitment (debit) are two separate atomic steps, so a paced-in
//! candidate can still fail to fund; the walk just moves on to the next one.

pub mod handlers;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::ledger::{next_utc_midnight, LedgerError};
use crate::models::campaign::Campaign;
use crate::models::money::{cpm_to_micro_cents, micro_cents_to_cpm};
use crate::models::request::{BidRequest, Imp};
use crate::models::response::{Bid, BidResponse, SeatBid};
use crate::models::transaction::Transaction;
use crate::pacing::Pacer;
use crate::store::StoreError;
use crate::targeting::CampaignProvider;

/// What one auction request decided.
#[derive(Debug)]
pub struct BidOutcome {
    /// `None` when no impression produced a bid; the response is then absent
    /// entirely rather than empty.
    pub response: Option<BidResponse>,
    /// Remaining daily budget per winning campaign id, observed at its debit.
    pub remaining_budgets: HashMap<String, i64>,
    /// Committed debits, one per winning impression, for the transaction sink.
    pub transactions: Vec<Transaction>,
}

pub struct BidEngine {
    provider: Arc<dyn CampaignProvider>,
    pacer: Arc<dyn Pacer>,
}

impl BidEngine {
    pub fn new(provider: Arc<dyn CampaignProvider>, pacer: Arc<dyn Pacer>) -> Self {
        Self { provider, pacer }
    }

    /// Decides every impression of `request`.
    ///
    /// A store failure while resolving candidates fails the whole request.
    /// Failures while debiting one candidate only skip that candidate.
    pub async fn bid(
        &self,
        request: &BidRequest,
        now: DateTime<Utc>,
    ) -> Result<BidOutcome, StoreError> {
        let request_targets = request.targeting();
        let expiration = next_utc_midnight(now);
        let response_id = Uuid::new_v4().to_string();

        let mut bids = Vec::with_capacity(request.imp.len());
        let mut remaining_budgets = HashMap::new();
        let mut transactions = Vec::new();

        for imp in &request.imp {
            let mut targets = request_targets.clone();
            targets.extend(imp.targeting());

            let candidates = self
                .provider
                .read_by_targeting(cpm_to_micro_cents(imp.bidfloor), &targets)
                .await?;

            if candidates.is_empty() {
                continue;
            }

            // Funds reported by targeting may be stale; only the debit decides.
            let Some((campaign, remaining)) =
                self.first_funded(&candidates, now, expiration).await
            else {
                continue;
            };

            let amount = campaign.cost_per_impression();
            remaining_budgets.insert(campaign.id.to_string(), remaining);
            transactions.push(Transaction {
                campaign_id: campaign.id,
                bid_response_id: response_id.clone(),
                amount_micro_cents: amount,
                timestamp_ns: now.timestamp_nanos_opt().unwrap_or_default(),
                ext: None,
            });
            bids.push(build_bid(&campaign, imp));
        }

        if bids.is_empty() {
            return Ok(BidOutcome {
                response: None,
                remaining_budgets,
                transactions,
            });
        }

        let response = BidResponse {
            id: request.id.clone(),
            bidid: response_id,
            cur: "USD".to_string(),
            seatbid: vec![SeatBid {
                bid: bids,
                seat: String::new(),
            }],
        };

        Ok(BidOutcome {
            response: Some(response),
            remaining_budgets,
            transactions,
        })
    }

    /// Walks price-ordered candidates and commits the first one that is both
    /// admitted by the pacer and funded by the ledger. A successful debit is
    /// final; there is no rollback path out of this function.
    async fn first_funded(
        &self,
        candidates: &[Campaign],
        now: DateTime<Utc>,
        expiration: DateTime<Utc>,
    ) -> Option<(Campaign, i64)> {
        for campaign in candidates {
            if !self.pacer.can_bid(campaign, now).await {
                debug!(campaign = campaign.id, "paced out");
                continue;
            }

            let amount = campaign.cost_per_impression();
            match self
                .provider
                .debit_campaign(campaign.id, amount, expiration)
                .await
            {
                Ok(remaining) => return Some((campaign.clone(), remaining)),
                Err(LedgerError::InsufficientFunds { .. }) => {
                    debug!(campaign = campaign.id, "out of funds, trying next candidate");
                }
                Err(LedgerError::TransactionFailure(error)) => {
                    warn!(campaign = campaign.id, %error, "debit failed, skipping candidate");
                }
            }
        }

        None
    }
}

fn build_bid(campaign: &Campaign, imp: &Imp) -> Bid {
    Bid {
        id: Uuid::new_v4().to_string(),
        impid: imp.id.clone(),
        price: micro_cents_to_cpm(campaign.bid_cpm_micro_cents),
        cid: campaign.id.to_string(),
        ..Default::default()
    }
}
