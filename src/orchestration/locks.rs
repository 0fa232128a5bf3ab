//! Per-auction serialization locks.
//!
//! One logical write lock per auction identifier: operations on the same
//! auction run one at a time, operations on different auctions proceed fully
//! in parallel. Acquisition is bounded by a timeout so a contended caller gets
//! a Busy failure instead of waiting forever.

use crate::domain::AuctionId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct AuctionLocks {
    locks: StdMutex<HashMap<AuctionId, Arc<Mutex<()>>>>,
}

impl AuctionLocks {
    pub fn new() -> Self {
        AuctionLocks {
            locks: StdMutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, auction_id: &AuctionId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock registry poisoned");
        locks
            .entry(auction_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquire the auction's lock, waiting at most `wait`. Returns None on
    /// timeout; the caller decides whether to retry or surface Busy.
    pub async fn acquire(
        &self,
        auction_id: &AuctionId,
        wait: Duration,
    ) -> Option<OwnedMutexGuard<()>> {
        let lock = self.lock_for(auction_id);
        tokio::time::timeout(wait, lock.lock_owned()).await.ok()
    }

    /// Drop the registry entry for a closed auction so the map does not grow
    /// forever. A no-op while any holder or waiter still references the lock;
    /// those callers keep full serialization through their own Arc.
    pub fn prune(&self, auction_id: &AuctionId) {
        let mut locks = self.locks.lock().expect("lock registry poisoned");
        if let Some(entry) = locks.get(auction_id) {
            if Arc::strong_count(entry) == 1 {
                locks.remove(auction_id);
            }
        }
    }
}

#[cfg(test)]
impl AuctionLocks {
    fn contains(&self, auction_id: &AuctionId) -> bool {
        self.locks
            .lock()
            .expect("lock registry poisoned")
            .contains_key(auction_id)
    }
}
