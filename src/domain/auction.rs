//! Auction record and lifecycle status.

use crate::domain::{Amount, AuctionId, TimeMs, UserId};
use serde::{Deserialize, Serialize};

/// Lifecycle status of an auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionStatus {
    /// Accepting bids.
    Open,
    /// Past its deadline; price and leader are frozen.
    Closed,
}

impl AuctionStatus {
    /// Parse a status from its stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(AuctionStatus::Open),
            "closed" => Some(AuctionStatus::Closed),
            _ => None,
        }
    }
}

impl std::fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuctionStatus::Open => write!(f, "open"),
            AuctionStatus::Closed => write!(f, "closed"),
        }
    }
}

/// One item listing with a deadline, start price, and bid increment.
///
/// `current_price` and `current_leader` are derived fields, mutated only by the
/// resolution engine. `current_price` never decreases and never falls below
/// `start_price`; `current_leader` is never the seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    pub id: AuctionId,
    pub seller_id: UserId,
    pub start_price: Amount,
    pub bid_increment: Amount,
    pub end_time_ms: TimeMs,
    pub status: AuctionStatus,
    pub current_price: Amount,
    pub current_leader: Option<UserId>,
    pub created_at: TimeMs,
}

impl Auction {
    /// Create a fresh OPEN auction with no bids.
    pub fn new(
        id: AuctionId,
        seller_id: UserId,
        start_price: Amount,
        bid_increment: Amount,
        end_time_ms: TimeMs,
        created_at: TimeMs,
    ) -> Self {
        Auction {
            id,
            seller_id,
            start_price,
            bid_increment,
            end_time_ms,
            status: AuctionStatus::Open,
            current_price: start_price,
            current_leader: None,
            created_at,
        }
    }

    /// True once the deadline has been reached at `now`.
    pub fn is_past_deadline(&self, now: TimeMs) -> bool {
        now >= self.end_time_ms
    }
}
