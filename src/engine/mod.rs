//! Pure computation engine for deterministic bid resolution.

use crate::domain::{Amount, Bid};
use thiserror::Error;

pub mod resolution;

pub use resolution::{resolve, AuctionSnapshot, BidEvent, ProxyStanding, Resolution, SyntheticBid};

/// Typed failure for both engine operations. Returned to callers as values,
/// never panics; validation failures are not retried by the engine.
#[derive(Debug, Error)]
pub enum BidError {
    #[error("auction not found")]
    AuctionNotFound,
    #[error("auction is closed")]
    AuctionClosed,
    #[error("sellers cannot bid on their own auction")]
    SelfDealing,
    #[error("amount must be positive with at most the configured precision")]
    InvalidAmount,
    #[error("end time must be in the future")]
    InvalidDeadline,
    #[error("bid must be at least {minimum}")]
    BidTooLow { minimum: Amount },
    #[error("bidder is already the current leader")]
    AlreadyLeading,
    #[error("auction is busy, retry")]
    Busy,
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),
}

impl BidError {
    /// Transient SQLite write contention (SQLITE_BUSY/SQLITE_LOCKED), raised
    /// when a deferred transaction's read-to-write upgrade loses to another
    /// writer. The whole transaction was rolled back, so the operation is safe
    /// to rerun against a fresh snapshot.
    pub fn is_write_contention(&self) -> bool {
        match self {
            BidError::StoreUnavailable(sqlx::Error::Database(db)) => {
                matches!(db.code().as_deref(), Some("5") | Some("6"))
                    || db.message().contains("locked")
            }
            _ => false,
        }
    }

    /// Stable machine-readable code surfaced in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            BidError::AuctionNotFound => "AUCTION_NOT_FOUND",
            BidError::AuctionClosed => "AUCTION_CLOSED",
            BidError::SelfDealing => "SELF_DEALING",
            BidError::InvalidAmount => "INVALID_AMOUNT",
            BidError::InvalidDeadline => "INVALID_DEADLINE",
            BidError::BidTooLow { .. } => "BID_TOO_LOW",
            BidError::AlreadyLeading => "ALREADY_LEADING",
            BidError::Busy => "BUSY",
            BidError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }
}

/// Result of a successful engine operation: the persisted price/leader plus
/// every ledger entry the operation appended, in ledger order.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub current_price: Amount,
    pub current_leader: Option<crate::domain::UserId>,
    pub appended: Vec<Bid>,
}
