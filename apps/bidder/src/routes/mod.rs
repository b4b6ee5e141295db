pub mod health;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::engine::handlers as bid_handlers;
use crate::state::AppState;
use crate::targeting::handlers as campaign_handlers;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Auction decisioning
        .route("/api/v1/bid", post(bid_handlers::handle_bid))
        // Campaign administration
        .route(
            "/api/v1/campaigns",
            post(campaign_handlers::handle_create_campaign)
                .get(campaign_handlers::handle_list_campaigns),
        )
        .route(
            "/api/v1/campaigns/:id",
            get(campaign_handlers::handle_read_campaign),
        )
        .route(
            "/api/v1/campaigns/:id/budget",
            put(campaign_handlers::handle_set_budget)
                .delete(campaign_handlers::handle_delete_budget),
        )
        .with_state(state)
}
