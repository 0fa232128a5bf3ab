//! Background deadline sweep.
//!
//! The write path closes an auction lazily on first touch past the deadline;
//! this task closes idle auctions too, so read views and final results do not
//! depend on a bid arriving. The engine's guarded row update makes the sweep
//! safe to run unsynchronized with in-flight bids.

use crate::clock::Clock;
use crate::db::Repository;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, error};

use super::locks::AuctionLocks;

pub struct CloseSweeper {
    repo: Arc<Repository>,
    clock: Arc<dyn Clock>,
    interval_ms: u64,
    locks: Arc<AuctionLocks>,
}

impl CloseSweeper {
    pub fn new(
        repo: Arc<Repository>,
        clock: Arc<dyn Clock>,
        interval_ms: u64,
        locks: Arc<AuctionLocks>,
    ) -> Self {
        CloseSweeper {
            repo,
            clock,
            interval_ms,
            locks,
        }
    }

    /// Spawn the sweep loop.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(self.interval_ms));
            loop {
                ticker.tick().await;
                match self.repo.close_expired_auctions(self.clock.now()).await {
                    Ok(closed) if closed.is_empty() => {}
                    Ok(closed) => {
                        for auction_id in &closed {
                            self.locks.prune(auction_id);
                        }
                        debug!(closed = closed.len(), "deadline sweep closed auctions");
                    }
                    Err(e) => error!("deadline sweep failed: {}", e),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::migrations::init_db;
    use crate::domain::{Amount, Auction, AuctionId, AuctionStatus, TimeMs, UserId};
    use std::str::FromStr;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sweeper_closes_expired_auction() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.unwrap();
        let repo = Arc::new(Repository::new(pool));

        let auction = Auction::new(
            AuctionId::new("a1".to_string()),
            UserId::new("seller".to_string()),
            Amount::from_str("100").unwrap(),
            Amount::from_str("10").unwrap(),
            TimeMs::new(1_000),
            TimeMs::new(0),
        );
        repo.insert_auction(&auction).await.unwrap();

        let clock = Arc::new(ManualClock::new(2_000));
        let sweeper = CloseSweeper::new(repo.clone(), clock, 10, Arc::new(AuctionLocks::new()));
        let handle = sweeper.start();

        // Poll until the sweep has run at least once.
        for _ in 0..100 {
            let status = repo.get_auction(&auction.id).await.unwrap().unwrap().status;
            if status == AuctionStatus::Closed {
                handle.abort();
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();
        panic!("sweeper never closed the expired auction");
    }
}
