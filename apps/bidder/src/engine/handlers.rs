use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use tracing::error;

use crate::errors::AppError;
use crate::models::request::BidRequest;
use crate::models::transaction::BidLogItem;
use crate::state::AppState;

/// POST /api/v1/bid
///
/// Runs the decision engine for one auction request. A winning decision is
/// already committed by the time this returns; logging failures are reported
/// but cannot unwind the spend. No bid is 204, not an empty response body.
pub async fn handle_bid(
    State(state): State<AppState>,
    Json(request): Json<BidRequest>,
) -> Result<Response, AppError> {
    let start = Utc::now();
    let outcome = state.engine.bid(&request, start).await?;

    for transaction in &outcome.transactions {
        if let Err(e) = state.transaction_log.log_transaction(transaction).await {
            error!(
                campaign = transaction.campaign_id,
                %e,
                "committed transaction was not logged"
            );
        }
    }

    let end = Utc::now();
    state.bid_log.log_item(BidLogItem {
        domain: state.config.app_domain.clone(),
        bid_request: Some(request),
        bid_response: outcome.response.clone(),
        remaining_daily_budgets_micro_cents: outcome.remaining_budgets,
        start_timestamp_ns: start.timestamp_nanos_opt().unwrap_or_default(),
        end_timestamp_ns: end.timestamp_nanos_opt().unwrap_or_default(),
    });

    Ok(match outcome.response {
        Some(response) => Json(response).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}
