//! Time-segmented spend pacing.
//!
//! The day is cut into fixed segments and each campaign gets a per-segment
//! impression allowance derived from its remaining budget. Admission rides
//! the same atomic store primitive the ledger uses, with a synthetic counter
//! that expires one segment ahead and so resets itself.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::ledger::{next_utc_midnight, Ledger};
use crate::models::campaign::Campaign;
use crate::store::{DataStore, DebitResult};

/// Admission gate consulted before any spend attempt.
///
/// Purely advisory: a `true` answer reserves nothing, and the ledger debit
/// that follows can still fail.
#[async_trait]
pub trait Pacer: Send + Sync {
    async fn can_bid(&self, campaign: &Campaign, now: DateTime<Utc>) -> bool;
}

fn pace_key(account: i64) -> String {
    format!("pacer:account:{account:x}")
}

/// Paces each campaign to an even spend across the remainder of the day.
pub struct TimeSegmentedPacer {
    store: Arc<dyn DataStore>,
    ledger: Arc<dyn Ledger>,
    segment: Duration,
}

impl TimeSegmentedPacer {
    pub fn new(store: Arc<dyn DataStore>, ledger: Arc<dyn Ledger>, segment: Duration) -> Self {
        Self {
            store,
            ledger,
            segment,
        }
    }

    #[allow(dead_code)]
    pub fn segment(&self) -> Duration {
        self.segment
    }
}

#[async_trait]
impl Pacer for TimeSegmentedPacer {
    async fn can_bid(&self, campaign: &Campaign, now: DateTime<Utc>) -> bool {
        let cpi = campaign.cost_per_impression();
        let budget = self.ledger.remaining_daily_budget(campaign.id).await;

        // Unconfigured or exhausted accounts are waved through; the ledger
        // debit performs the real check and configures the account.
        if budget == 0 || cpi == 0 {
            return true;
        }

        let to_midnight = next_utc_midnight(now) - now;
        let segments_remaining =
            (to_midnight.num_seconds() / self.segment.num_seconds()).max(1);

        // Derived from the live remaining budget on every call, so the
        // allowance tightens within a segment as the campaign spends.
        let allowance = (budget / cpi) / segments_remaining;

        match self
            .store
            .debit_if_sufficient(&pace_key(campaign.id), 1, allowance, now + self.segment)
            .await
        {
            Ok(DebitResult::Debited { .. }) => true,
            Ok(DebitResult::Insufficient { .. }) => false,
            Err(error) => {
                warn!(campaign = campaign.id, %error, "pace debit failed, denying admission");
                false
            }
        }
    }
}
