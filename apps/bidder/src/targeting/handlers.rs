use std::collections::HashSet;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::ledger::next_utc_midnight;
use crate::models::campaign::{Campaign, Target};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub id: i64,
    pub bid_cpm_micro_cents: i64,
    pub daily_budget_micro_cents: i64,
    #[serde(default)]
    pub targets: Vec<Target>,
}

/// POST /api/v1/campaigns
pub async fn handle_create_campaign(
    State(state): State<AppState>,
    Json(body): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if body.bid_cpm_micro_cents < 0 {
        return Err(AppError::Validation(
            "bid_cpm_micro_cents must not be negative".to_string(),
        ));
    }
    if body.daily_budget_micro_cents < 0 {
        return Err(AppError::Validation(
            "daily_budget_micro_cents must not be negative".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for target in &body.targets {
        if !seen.insert(target.target_type) {
            return Err(AppError::Validation(format!(
                "duplicate target type {}",
                target.target_type
            )));
        }
    }

    let campaign = state
        .provider
        .create_campaign(
            body.id,
            body.bid_cpm_micro_cents,
            body.daily_budget_micro_cents,
            body.targets,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(campaign_json(&campaign))))
}

/// GET /api/v1/campaigns
pub async fn handle_list_campaigns(
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let ids = state.provider.list_campaigns().await?;
    Ok(Json(json!({ "campaigns": ids })))
}

/// GET /api/v1/campaigns/:id
pub async fn handle_read_campaign(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    let ids = state.provider.list_campaigns().await?;
    if !ids.contains(&id) {
        return Err(AppError::NotFound(format!("campaign {id}")));
    }

    let campaign = state.provider.read_campaign(id).await?;
    Ok(Json(campaign_json(&campaign)))
}

#[derive(Debug, Deserialize)]
pub struct SetBudgetRequest {
    pub amount_micro_cents: i64,
    /// Defaults to the next UTC midnight.
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
}

/// PUT /api/v1/campaigns/:id/budget
pub async fn handle_set_budget(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<SetBudgetRequest>,
) -> Result<StatusCode, AppError> {
    if body.amount_micro_cents < 0 {
        return Err(AppError::Validation(
            "amount_micro_cents must not be negative".to_string(),
        ));
    }

    let expiration = body
        .expiration
        .unwrap_or_else(|| next_utc_midnight(Utc::now()));
    state
        .ledger
        .set_remaining_daily_budget(id, body.amount_micro_cents, expiration)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/campaigns/:id/budget
pub async fn handle_delete_budget(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state.ledger.delete_account(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn campaign_json(campaign: &Campaign) -> Value {
    let mut targets = campaign.target_list();
    targets.sort_by_key(|t| t.target_type.as_i64());

    json!({
        "id": campaign.id,
        "bid_cpm_micro_cents": campaign.bid_cpm_micro_cents,
        "daily_budget_micro_cents": campaign.daily_budget_micro_cents,
        "targets": targets,
    })
}
