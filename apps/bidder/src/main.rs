mod audit;
mod config;
mod engine;
mod errors;
mod ledger;
mod models;
mod pacing;
mod routes;
mod state;
mod store;
mod targeting;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::audit::file::BidLogFormat;
use crate::audit::{FileBidLogger, FileTransactionLogger, TransactionLogger};
use crate::config::Config;
use crate::engine::BidEngine;
use crate::ledger::{Ledger, StoreLedger};
use crate::pacing::{Pacer, TimeSegmentedPacer};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{DataStore, RedisStore};
use crate::targeting::{CampaignProvider, StoreTargetingIndex};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting bidder v{}", env!("CARGO_PKG_VERSION"));

    // Store client is constructed here and injected everywhere; its
    // lifecycle belongs to this function, not to a global.
    let store: Arc<dyn DataStore> =
        Arc::new(RedisStore::connect(&config.redis_url, &config.app_domain).await?);

    let ledger: Arc<dyn Ledger> = Arc::new(StoreLedger::new(Arc::clone(&store)));
    let provider: Arc<dyn CampaignProvider> = Arc::new(StoreTargetingIndex::new(
        Arc::clone(&store),
        Arc::clone(&ledger),
    ));
    let pacer: Arc<dyn Pacer> = Arc::new(TimeSegmentedPacer::new(
        Arc::clone(&store),
        Arc::clone(&ledger),
        Duration::seconds(config.pacing_segment_secs),
    ));
    let engine = Arc::new(BidEngine::new(Arc::clone(&provider), Arc::clone(&pacer)));

    let transaction_log: Arc<dyn TransactionLogger> =
        Arc::new(FileTransactionLogger::create(&config.transaction_log_path).await?);

    // Committed debits must land somewhere; with no consumer on the
    // transaction log this process must not bid at all.
    if !transaction_log.consumer_listening().await? {
        bail!("no consumer is listening to the transaction log; refusing to bid");
    }

    let bid_log_file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.bid_log_path)
        .await?;
    let bid_log_format = if config.bid_log_full {
        BidLogFormat::Json
    } else {
        BidLogFormat::Summary
    };
    let (bid_log, _bid_log_task) = FileBidLogger::spawn(bid_log_file, bid_log_format);
    info!("Audit sinks initialized");

    let state = AppState {
        engine,
        provider,
        ledger,
        pacer,
        transaction_log,
        bid_log: Arc::new(bid_log),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
