//! Domain types for the auction bidding service.
//!
//! This module provides:
//! - Lossless monetary handling via the Amount wrapper
//! - Domain primitives: AuctionId, UserId, BidId, TimeMs
//! - Auction, Bid, and ProxyLimit records with canonical JSON serialization

pub mod auction;
pub mod bid;
pub mod money;
pub mod primitives;
pub mod proxy;

pub use auction::{Auction, AuctionStatus};
pub use bid::{Bid, BidSource};
pub use money::Amount;
pub use primitives::{AuctionId, BidId, TimeMs, UserId};
pub use proxy::ProxyLimit;
