//! Bid ledger entries.

use crate::domain::{Amount, AuctionId, BidId, TimeMs, UserId};
use serde::{Deserialize, Serialize};

/// How a ledger entry was authored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidSource {
    /// Explicit one-time bid submitted by a user.
    Manual,
    /// Synthetic counter-bid placed by the engine on behalf of a proxy ceiling.
    Proxy,
}

impl BidSource {
    /// Parse a source from its stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(BidSource::Manual),
            "proxy" => Some(BidSource::Proxy),
            _ => None,
        }
    }
}

impl std::fmt::Display for BidSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BidSource::Manual => write!(f, "manual"),
            BidSource::Proxy => write!(f, "proxy"),
        }
    }
}

/// One accepted bid. Entries are append-only; the engine never updates or
/// deletes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub auction_id: AuctionId,
    pub bidder_id: UserId,
    pub amount: Amount,
    pub source: BidSource,
    pub created_at: TimeMs,
}

impl Bid {
    pub fn new(
        auction_id: AuctionId,
        bidder_id: UserId,
        amount: Amount,
        source: BidSource,
        created_at: TimeMs,
    ) -> Self {
        Bid {
            id: BidId::generate(),
            auction_id,
            bidder_id,
            amount,
            source,
            created_at,
        }
    }
}
