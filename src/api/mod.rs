pub mod auctions;
pub mod bids;
pub mod health;

use crate::db::Repository;
use crate::orchestration::BidDesk;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub desk: Arc<BidDesk>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, desk: Arc<BidDesk>) -> Self {
        Self { repo, desk }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/auctions", post(auctions::create_auction))
        .route("/v1/auctions/:id", get(auctions::get_auction_state))
        .route(
            "/v1/auctions/:id/bids",
            get(auctions::get_bid_history).post(bids::place_manual_bid),
        )
        .route("/v1/auctions/:id/proxy-limit", put(bids::set_proxy_limit))
        .layer(cors)
        .with_state(state)
}
