//! Campaign registry and price-ordered targeting lookup.

pub mod handlers;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::ledger::{Ledger, LedgerError};
use crate::models::campaign::{Campaign, Target, TargetType};
use crate::store::{DataStore, StoreError};

const CAMPAIGN_SET_KEY: &str = "campaigns";
const FIELD_BID_CPM: &str = "bid_cpm";
const FIELD_DAILY_BUDGET: &str = "daily_budget";

fn campaign_key(id: i64) -> String {
    format!("campaign:{id:x}")
}

fn campaign_targets_key(id: i64) -> String {
    format!("campaign:{id:x}:targets")
}

fn target_bucket_key(target: &Target) -> String {
    format!("targets:{}:{}", target.target_type, target.value)
}

fn target_member(target: &Target) -> String {
    format!("{}:{}", target.target_type, target.value)
}

/// Access to the campaign data store.
///
/// `read_by_targeting` measures funds availability not at all: a returned
/// campaign may already be out of budget by the time a debit is attempted.
/// Callers must debit and handle failure rather than trust the read.
#[async_trait]
pub trait CampaignProvider: Send + Sync {
    /// Persists campaign attributes and registers the id into each target's
    /// bucket, scored by the campaign's bid CPM. A campaign is discoverable
    /// through any one of its targets.
    async fn create_campaign(
        &self,
        id: i64,
        bid_cpm_micro_cents: i64,
        daily_budget_micro_cents: i64,
        targets: Vec<Target>,
    ) -> Result<Campaign, StoreError>;

    /// Reads a campaign as an eager immutable view. Unprovisioned campaigns
    /// read as zeros with no targets; absence is not an error.
    async fn read_campaign(&self, id: i64) -> Result<Campaign, StoreError>;

    /// Campaigns matching any of `targets` (union), ordered by bid CPM
    /// descending with ascending campaign id breaking ties. A campaign found
    /// in several buckets is returned once, under its maximum score.
    ///
    /// `bid_floor_micro_cents` is carried for callers that filter on it; the
    /// index itself does not enforce it.
    async fn read_by_targeting(
        &self,
        bid_floor_micro_cents: i64,
        targets: &[Target],
    ) -> Result<Vec<Campaign>, StoreError>;

    /// Debits the campaign's ledger account, initializing it from the
    /// campaign's configured daily budget when absent.
    async fn debit_campaign(
        &self,
        id: i64,
        amount_micro_cents: i64,
        expiration: DateTime<Utc>,
    ) -> Result<i64, LedgerError>;

    async fn list_campaigns(&self) -> Result<Vec<i64>, StoreError>;
}

/// Store-backed [`CampaignProvider`].
pub struct StoreTargetingIndex {
    store: Arc<dyn DataStore>,
    ledger: Arc<dyn Ledger>,
}

impl StoreTargetingIndex {
    pub fn new(store: Arc<dyn DataStore>, ledger: Arc<dyn Ledger>) -> Self {
        Self { store, ledger }
    }
}

#[async_trait]
impl CampaignProvider for StoreTargetingIndex {
    async fn create_campaign(
        &self,
        id: i64,
        bid_cpm_micro_cents: i64,
        daily_budget_micro_cents: i64,
        targets: Vec<Target>,
    ) -> Result<Campaign, StoreError> {
        let key = campaign_key(id);
        self.store
            .hash_set_i64(&key, FIELD_BID_CPM, bid_cpm_micro_cents)
            .await?;
        self.store
            .hash_set_i64(&key, FIELD_DAILY_BUDGET, daily_budget_micro_cents)
            .await?;

        let members: Vec<String> = targets.iter().map(target_member).collect();
        self.store
            .set_add(&campaign_targets_key(id), &members)
            .await?;

        self.store
            .set_add(CAMPAIGN_SET_KEY, &[id.to_string()])
            .await?;

        for target in &targets {
            self.store
                .sorted_set_add(&target_bucket_key(target), &id.to_string(), bid_cpm_micro_cents)
                .await?;
        }

        Ok(Campaign {
            id,
            bid_cpm_micro_cents,
            daily_budget_micro_cents,
            targets: targets
                .into_iter()
                .map(|t| (t.target_type, t.value))
                .collect(),
        })
    }

    async fn read_campaign(&self, id: i64) -> Result<Campaign, StoreError> {
        let key = campaign_key(id);
        let bid_cpm = self
            .store
            .hash_get_i64(&key, FIELD_BID_CPM)
            .await?
            .unwrap_or(0);
        let daily_budget = self
            .store
            .hash_get_i64(&key, FIELD_DAILY_BUDGET)
            .await?
            .unwrap_or(0);

        let mut targets = HashMap::new();
        for member in self.store.set_members(&campaign_targets_key(id)).await? {
            match parse_target_member(&member) {
                Some(target) => {
                    targets.insert(target.target_type, target.value);
                }
                None => warn!(campaign = id, member, "skipping malformed target member"),
            }
        }

        Ok(Campaign {
            id,
            bid_cpm_micro_cents: bid_cpm,
            daily_budget_micro_cents: daily_budget,
            targets,
        })
    }

    async fn read_by_targeting(
        &self,
        _bid_floor_micro_cents: i64,
        targets: &[Target],
    ) -> Result<Vec<Campaign>, StoreError> {
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let buckets: Vec<String> = targets.iter().map(target_bucket_key).collect();
        let pairs = self.store.sorted_set_union_max(&buckets).await?;

        let mut scored: Vec<(i64, i64)> = Vec::with_capacity(pairs.len());
        for (member, score) in pairs {
            match member.parse::<i64>() {
                Ok(id) => scored.push((id, score)),
                Err(_) => warn!(member, "skipping non-numeric bucket member"),
            }
        }

        // Score descending, campaign id ascending on ties. The ordering
        // contract lives here, not in the store.
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut campaigns = Vec::with_capacity(scored.len());
        for (id, _) in scored {
            campaigns.push(self.read_campaign(id).await?);
        }

        Ok(campaigns)
    }

    async fn debit_campaign(
        &self,
        id: i64,
        amount_micro_cents: i64,
        expiration: DateTime<Utc>,
    ) -> Result<i64, LedgerError> {
        let campaign = self.read_campaign(id).await?;

        self.ledger
            .debit_account(
                id,
                amount_micro_cents,
                campaign.daily_budget_micro_cents,
                expiration,
            )
            .await
    }

    async fn list_campaigns(&self) -> Result<Vec<i64>, StoreError> {
        let members = self.store.set_members(CAMPAIGN_SET_KEY).await?;
        let mut ids: Vec<i64> = members.iter().filter_map(|m| m.parse().ok()).collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

fn parse_target_member(member: &str) -> Option<Target> {
    let (raw_type, value) = member.split_once(':')?;
    let target_type = TargetType::from_i64(raw_type.parse().ok()?)?;
    Some(Target::new(target_type, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{next_utc_midnight, StoreLedger};
    use crate::store::MemoryStore;

    fn index() -> StoreTargetingIndex {
        let store: Arc<dyn DataStore> = Arc::new(MemoryStore::new());
        let ledger = Arc::new(StoreLedger::new(Arc::clone(&store)));
        StoreTargetingIndex::new(store, ledger)
    }

    fn country(value: &str) -> Target {
        Target::new(TargetType::Country, value)
    }

    #[tokio::test]
    async fn create_then_read_round_trips() {
        let index = index();
        index
            .create_campaign(
                100,
                25_000_000,
                100_000_000,
                vec![country("US"), Target::new(TargetType::Os, "Android")],
            )
            .await
            .unwrap();

        let campaign = index.read_campaign(100).await.unwrap();
        assert_eq!(campaign.id, 100);
        assert_eq!(campaign.bid_cpm_micro_cents, 25_000_000);
        assert_eq!(campaign.daily_budget_micro_cents, 100_000_000);
        assert_eq!(campaign.targets[&TargetType::Country], "US");
        assert_eq!(campaign.targets[&TargetType::Os], "Android");
    }

    #[tokio::test]
    async fn unknown_campaign_reads_as_zeros() {
        let campaign = index().read_campaign(404).await.unwrap();
        assert_eq!(campaign.bid_cpm_micro_cents, 0);
        assert_eq!(campaign.daily_budget_micro_cents, 0);
        assert!(campaign.targets.is_empty());
    }

    #[tokio::test]
    async fn targeting_results_ordered_by_descending_cpm() {
        let index = index();
        index
            .create_campaign(1, 10_000_000, 1, vec![country("US")])
            .await
            .unwrap();
        index
            .create_campaign(2, 30_000_000, 1, vec![country("US")])
            .await
            .unwrap();
        index
            .create_campaign(3, 20_000_000, 1, vec![country("US")])
            .await
            .unwrap();

        let campaigns = index.read_by_targeting(0, &[country("US")]).await.unwrap();
        let ids: Vec<i64> = campaigns.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        let cpms: Vec<i64> = campaigns.iter().map(|c| c.bid_cpm_micro_cents).collect();
        assert!(cpms.windows(2).all(|w| w[0] >= w[1]));
    }

    #[tokio::test]
    async fn equal_cpm_ties_break_on_ascending_id() {
        let index = index();
        index
            .create_campaign(9, 10_000_000, 1, vec![country("US")])
            .await
            .unwrap();
        index
            .create_campaign(3, 10_000_000, 1, vec![country("US")])
            .await
            .unwrap();

        let campaigns = index.read_by_targeting(0, &[country("US")]).await.unwrap();
        let ids: Vec<i64> = campaigns.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![3, 9]);
    }

    #[tokio::test]
    async fn union_returns_multi_bucket_campaign_once() {
        let index = index();
        index
            .create_campaign(
                1,
                10_000_000,
                1,
                vec![country("US"), Target::new(TargetType::Os, "iOS")],
            )
            .await
            .unwrap();

        let campaigns = index
            .read_by_targeting(
                0,
                &[country("US"), Target::new(TargetType::Os, "iOS")],
            )
            .await
            .unwrap();
        assert_eq!(campaigns.len(), 1);
        assert_eq!(campaigns[0].id, 1);
    }

    #[tokio::test]
    async fn or_semantics_match_on_any_single_target() {
        let index = index();
        index
            .create_campaign(
                1,
                10_000_000,
                1,
                vec![country("US"), Target::new(TargetType::Os, "iOS")],
            )
            .await
            .unwrap();

        let campaigns = index
            .read_by_targeting(0, &[Target::new(TargetType::Os, "iOS")])
            .await
            .unwrap();
        assert_eq!(campaigns.len(), 1);
    }

    #[tokio::test]
    async fn empty_target_list_matches_nothing() {
        assert!(index().read_by_targeting(0, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn debit_uses_configured_daily_budget() {
        let index = index();
        index
            .create_campaign(100, 25_000_000, 100_000_000, vec![country("US")])
            .await
            .unwrap();

        let expiration = next_utc_midnight(Utc::now());
        let remaining = index.debit_campaign(100, 25_000, expiration).await.unwrap();
        assert_eq!(remaining, 99_975_000);

        let error = index
            .debit_campaign(100, 100_000_000, expiration)
            .await
            .unwrap_err();
        assert!(matches!(error, LedgerError::InsufficientFunds { remaining } if remaining == 99_975_000));
    }

    #[tokio::test]
    async fn list_campaigns_returns_created_ids() {
        let index = index();
        index.create_campaign(2, 1, 1, vec![]).await.unwrap();
        index.create_campaign(1, 1, 1, vec![]).await.unwrap();
        assert_eq!(index.list_campaigns().await.unwrap(), vec![1, 2]);
    }
}
