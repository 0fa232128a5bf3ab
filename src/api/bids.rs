use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::auctions::{parse_amount, parse_user_id, BidDto};
use super::AppState;
use crate::domain::AuctionId;
use crate::engine::Outcome;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceBidRequest {
    pub bidder_id: String,
    pub amount: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyLimitRequest {
    pub bidder_id: String,
    pub ceiling: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeResponse {
    pub current_price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_leader_id: Option<String>,
    /// Ledger entries this operation appended, in ledger order: the manual
    /// bid (if any) followed by synthetic proxy counter-bids.
    pub appended: Vec<BidDto>,
}

impl OutcomeResponse {
    fn from_outcome(outcome: &Outcome) -> Self {
        OutcomeResponse {
            current_price: outcome.current_price.to_canonical_string(),
            current_leader_id: outcome
                .current_leader
                .as_ref()
                .map(|u| u.as_str().to_string()),
            appended: outcome.appended.iter().map(BidDto::from_bid).collect(),
        }
    }
}

pub async fn place_manual_bid(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<PlaceBidRequest>,
) -> Result<Json<OutcomeResponse>, AppError> {
    let bidder_id = parse_user_id(&req.bidder_id)?;
    let amount = parse_amount(&req.amount)?;

    let outcome = state
        .desk
        .place_manual_bid(&AuctionId::new(id), bidder_id, amount)
        .await?;

    Ok(Json(OutcomeResponse::from_outcome(&outcome)))
}

pub async fn set_proxy_limit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ProxyLimitRequest>,
) -> Result<Json<OutcomeResponse>, AppError> {
    let bidder_id = parse_user_id(&req.bidder_id)?;
    let ceiling = parse_amount(&req.ceiling)?;

    let outcome = state
        .desk
        .set_proxy_limit(&AuctionId::new(id), bidder_id, ceiling)
        .await?;

    Ok(Json(OutcomeResponse::from_outcome(&outcome)))
}
