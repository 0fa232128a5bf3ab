use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::AppState;
use crate::domain::{Amount, AuctionId, Bid, TimeMs, UserId};
use crate::engine::BidError;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuctionRequest {
    pub seller_id: String,
    pub start_price: String,
    pub bid_increment: String,
    pub end_time_ms: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionStateResponse {
    pub auction_id: String,
    pub seller_id: String,
    pub status: String,
    pub start_price: String,
    pub bid_increment: String,
    pub current_price: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_leader_id: Option<String>,
    pub end_time_ms: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidHistoryResponse {
    pub bids: Vec<BidDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BidDto {
    pub bid_id: String,
    pub bidder_id: String,
    pub amount: String,
    pub source: String,
    pub created_at_ms: i64,
}

impl BidDto {
    pub fn from_bid(bid: &Bid) -> Self {
        BidDto {
            bid_id: bid.id.as_str().to_string(),
            bidder_id: bid.bidder_id.as_str().to_string(),
            amount: bid.amount.to_canonical_string(),
            source: bid.source.to_string(),
            created_at_ms: bid.created_at.as_i64(),
        }
    }
}

pub async fn create_auction(
    State(state): State<AppState>,
    Json(req): Json<CreateAuctionRequest>,
) -> Result<Json<AuctionStateResponse>, AppError> {
    let seller_id = parse_user_id(&req.seller_id)?;
    let start_price = parse_amount(&req.start_price)?;
    let bid_increment = parse_amount(&req.bid_increment)?;

    let auction = state
        .desk
        .create_auction(seller_id, start_price, bid_increment, TimeMs::new(req.end_time_ms))
        .await?;

    Ok(Json(auction_response(&auction)))
}

pub async fn get_auction_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AuctionStateResponse>, AppError> {
    let auction = state.desk.auction_state(&AuctionId::new(id)).await?;
    Ok(Json(auction_response(&auction)))
}

pub async fn get_bid_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BidHistoryResponse>, AppError> {
    let bids = state.desk.bid_history(&AuctionId::new(id)).await?;
    Ok(Json(BidHistoryResponse {
        bids: bids.iter().map(BidDto::from_bid).collect(),
    }))
}

fn auction_response(auction: &crate::domain::Auction) -> AuctionStateResponse {
    AuctionStateResponse {
        auction_id: auction.id.as_str().to_string(),
        seller_id: auction.seller_id.as_str().to_string(),
        status: auction.status.to_string(),
        start_price: auction.start_price.to_canonical_string(),
        bid_increment: auction.bid_increment.to_canonical_string(),
        current_price: auction.current_price.to_canonical_string(),
        current_leader_id: auction
            .current_leader
            .as_ref()
            .map(|u| u.as_str().to_string()),
        end_time_ms: auction.end_time_ms.as_i64(),
    }
}

pub(super) fn parse_amount(raw: &str) -> Result<Amount, AppError> {
    Amount::from_str(raw).map_err(|_| AppError::Bid(BidError::InvalidAmount))
}

pub(super) fn parse_user_id(raw: &str) -> Result<UserId, AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::BadRequest("user id must not be empty".into()));
    }
    Ok(UserId::new(trimmed.to_string()))
}
