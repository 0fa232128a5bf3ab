//! Standing proxy ("auto-bid") limits.

use crate::domain::{Amount, AuctionId, TimeMs, UserId};
use serde::{Deserialize, Serialize};

/// A standing maximum a bidder authorizes the engine to bid up to on their
/// behalf. At most one per (auction, bidder); re-registering replaces the
/// ceiling but keeps `created_at`, so registration order is the first
/// registration and ceiling ties resolve deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyLimit {
    pub auction_id: AuctionId,
    pub bidder_id: UserId,
    pub ceiling: Amount,
    pub created_at: TimeMs,
    pub updated_at: TimeMs,
}

impl ProxyLimit {
    pub fn new(auction_id: AuctionId, bidder_id: UserId, ceiling: Amount, now: TimeMs) -> Self {
        ProxyLimit {
            auction_id,
            bidder_id,
            ceiling,
            created_at: now,
            updated_at: now,
        }
    }
}
