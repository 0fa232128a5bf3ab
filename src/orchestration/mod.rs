//! Serialization and persistence around the pure resolution engine.

pub mod bid_desk;
pub mod locks;
pub mod sweeper;

pub use bid_desk::BidDesk;
pub use locks::AuctionLocks;
pub use sweeper::CloseSweeper;
