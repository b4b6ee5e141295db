use std::sync::Arc;

use crate::audit::{BidLogProducer, TransactionLogger};
use crate::config::Config;
use crate::engine::BidEngine;
use crate::ledger::Ledger;
use crate::pacing::Pacer;
use crate::targeting::CampaignProvider;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Every collaborator is held behind its capability trait, so the store-backed
/// production implementations and the in-memory doubles are interchangeable.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BidEngine>,
    pub provider: Arc<dyn CampaignProvider>,
    pub ledger: Arc<dyn Ledger>,
    /// The engine holds its own handle; kept here for future admin surface.
    #[allow(dead_code)]
    pub pacer: Arc<dyn Pacer>,
    pub transaction_log: Arc<dyn TransactionLogger>,
    pub bid_log: Arc<dyn BidLogProducer>,
    pub config: Config,
}
