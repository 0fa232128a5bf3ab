//! The bid desk: serialized write path of the resolution engine.
//!
//! Every mutating operation takes the auction's lock, loads a consistent
//! snapshot inside one transaction, runs the pure resolver, and persists the
//! ledger append, any proxy upsert, and the auction row update together. A
//! validation failure or store error rolls the whole transaction back, so no
//! partial state is ever visible.

use crate::clock::Clock;
use crate::config::Config;
use crate::db::Repository;
use crate::domain::{
    Amount, Auction, AuctionId, AuctionStatus, Bid, BidSource, ProxyLimit, TimeMs, UserId,
};
use crate::engine::{
    resolve, AuctionSnapshot, BidError, BidEvent, Outcome, ProxyStanding, Resolution,
};
use sqlx::{Sqlite, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::locks::AuctionLocks;

pub struct BidDesk {
    repo: Arc<Repository>,
    locks: Arc<AuctionLocks>,
    clock: Arc<dyn Clock>,
    config: Config,
}

impl BidDesk {
    pub fn new(repo: Arc<Repository>, clock: Arc<dyn Clock>, config: Config) -> Self {
        BidDesk {
            repo,
            locks: Arc::new(AuctionLocks::new()),
            clock,
            config,
        }
    }

    /// The per-auction lock registry, shared with the deadline sweep so closed
    /// auctions get pruned from it.
    pub fn locks(&self) -> Arc<AuctionLocks> {
        self.locks.clone()
    }

    /// Create a new OPEN auction listing.
    ///
    /// # Errors
    /// Rejects non-positive or over-precise prices and a deadline that is not
    /// in the future.
    pub async fn create_auction(
        &self,
        seller_id: UserId,
        start_price: Amount,
        bid_increment: Amount,
        end_time_ms: TimeMs,
    ) -> Result<Auction, BidError> {
        if !start_price.is_valid_money(self.config.amount_scale)
            || !bid_increment.is_valid_money(self.config.amount_scale)
        {
            return Err(BidError::InvalidAmount);
        }
        let now = self.clock.now();
        if end_time_ms <= now {
            return Err(BidError::InvalidDeadline);
        }

        let auction = Auction::new(
            AuctionId::generate(),
            seller_id,
            start_price,
            bid_increment,
            end_time_ms,
            now,
        );
        self.repo.insert_auction(&auction).await?;
        info!(auction_id = %auction.id, "auction created");
        Ok(auction)
    }

    /// Place a one-time explicit bid. See the resolver for the escalation
    /// semantics; this method owns serialization and atomic persistence.
    pub async fn place_manual_bid(
        &self,
        auction_id: &AuctionId,
        bidder_id: UserId,
        amount: Amount,
    ) -> Result<Outcome, BidError> {
        let guard = self.acquire_lock(auction_id).await?;

        let mut attempt = 0;
        let result = loop {
            match self.resolve_manual_bid(auction_id, bidder_id.clone(), amount).await {
                Err(err) if err.is_write_contention() => {
                    if attempt >= self.config.lock_retries {
                        break Err(BidError::Busy);
                    }
                    attempt += 1;
                    warn!(auction_id = %auction_id, attempt, "store contention, retrying bid");
                }
                other => break other,
            }
        };
        self.finish(guard, auction_id, result)
    }

    async fn resolve_manual_bid(
        &self,
        auction_id: &AuctionId,
        bidder_id: UserId,
        amount: Amount,
    ) -> Result<Outcome, BidError> {
        let now = self.clock.now();

        let tx = self.repo.pool().begin().await?;
        let (auction, mut tx) = self.load_open_auction(tx, auction_id, now).await?;
        let proxies = Repository::query_proxy_limits_conn(&mut tx, auction_id).await?;

        let standings: Vec<ProxyStanding> = proxies.iter().map(ProxyStanding::from).collect();
        let snapshot =
            AuctionSnapshot::from_auction(&auction, standings, self.config.amount_scale);
        let event = BidEvent::Manual {
            bidder_id: bidder_id.clone(),
            amount,
        };
        let resolution = resolve(&snapshot, &event)?;

        let manual = Bid::new(
            auction_id.clone(),
            bidder_id,
            amount,
            BidSource::Manual,
            now,
        );
        Repository::insert_bid(&mut tx, &manual).await?;

        let mut appended = vec![manual];
        self.commit_resolution(tx, auction_id, &resolution, now, &mut appended)
            .await?;

        debug!(
            auction_id = %auction_id,
            price = %resolution.new_price,
            "manual bid resolved"
        );
        Ok(Outcome {
            current_price: resolution.new_price,
            current_leader: Some(resolution.new_leader),
            appended,
        })
    }

    /// Register or replace a standing proxy ceiling. Escalation runs
    /// immediately, so callers never observe a stale leader afterwards.
    pub async fn set_proxy_limit(
        &self,
        auction_id: &AuctionId,
        bidder_id: UserId,
        ceiling: Amount,
    ) -> Result<Outcome, BidError> {
        let guard = self.acquire_lock(auction_id).await?;

        let mut attempt = 0;
        let result = loop {
            match self.resolve_proxy_limit(auction_id, bidder_id.clone(), ceiling).await {
                Err(err) if err.is_write_contention() => {
                    if attempt >= self.config.lock_retries {
                        break Err(BidError::Busy);
                    }
                    attempt += 1;
                    warn!(auction_id = %auction_id, attempt, "store contention, retrying ceiling");
                }
                other => break other,
            }
        };
        self.finish(guard, auction_id, result)
    }

    async fn resolve_proxy_limit(
        &self,
        auction_id: &AuctionId,
        bidder_id: UserId,
        ceiling: Amount,
    ) -> Result<Outcome, BidError> {
        let now = self.clock.now();

        let tx = self.repo.pool().begin().await?;
        let (auction, mut tx) = self.load_open_auction(tx, auction_id, now).await?;
        let proxies = Repository::query_proxy_limits_conn(&mut tx, auction_id).await?;

        // Registration order is the first registration; a replacement keeps it.
        let registered_at = proxies
            .iter()
            .find(|p| p.bidder_id == bidder_id)
            .map(|p| p.created_at)
            .unwrap_or(now);

        let mut standings: Vec<ProxyStanding> = proxies
            .iter()
            .filter(|p| p.bidder_id != bidder_id)
            .map(ProxyStanding::from)
            .collect();
        standings.push(ProxyStanding {
            bidder_id: bidder_id.clone(),
            ceiling,
            registered_at,
        });

        let snapshot =
            AuctionSnapshot::from_auction(&auction, standings, self.config.amount_scale);
        let event = BidEvent::ProxyCeiling {
            bidder_id: bidder_id.clone(),
            ceiling,
        };
        let resolution = resolve(&snapshot, &event)?;

        let mut proxy = ProxyLimit::new(auction_id.clone(), bidder_id, ceiling, registered_at);
        proxy.updated_at = now;
        Repository::upsert_proxy_limit(&mut tx, &proxy).await?;

        let mut appended = Vec::new();
        self.commit_resolution(tx, auction_id, &resolution, now, &mut appended)
            .await?;

        debug!(
            auction_id = %auction_id,
            price = %resolution.new_price,
            "proxy ceiling resolved"
        );
        Ok(Outcome {
            current_price: resolution.new_price,
            current_leader: Some(resolution.new_leader),
            appended,
        })
    }

    /// Read-only auction state. Reports CLOSED once the deadline has passed
    /// even if no write has flipped the row yet; takes no lock.
    pub async fn auction_state(&self, auction_id: &AuctionId) -> Result<Auction, BidError> {
        let mut auction = self
            .repo
            .get_auction(auction_id)
            .await?
            .ok_or(BidError::AuctionNotFound)?;

        if auction.status == AuctionStatus::Open && auction.is_past_deadline(self.clock.now()) {
            auction.status = AuctionStatus::Closed;
        }
        Ok(auction)
    }

    /// Bid history, most recent first.
    pub async fn bid_history(&self, auction_id: &AuctionId) -> Result<Vec<Bid>, BidError> {
        if self.repo.get_auction(auction_id).await?.is_none() {
            return Err(BidError::AuctionNotFound);
        }
        Ok(self.repo.query_bid_history(auction_id).await?)
    }

    /// Release the lock, and once the auction is known closed drop its
    /// registry entry so the lock map does not grow without bound.
    fn finish(
        &self,
        guard: tokio::sync::OwnedMutexGuard<()>,
        auction_id: &AuctionId,
        result: Result<Outcome, BidError>,
    ) -> Result<Outcome, BidError> {
        if matches!(result, Err(BidError::AuctionClosed)) {
            drop(guard);
            self.locks.prune(auction_id);
        }
        result
    }

    /// Take the auction's serialization lock, retrying a bounded number of
    /// times before surfacing Busy.
    async fn acquire_lock(
        &self,
        auction_id: &AuctionId,
    ) -> Result<tokio::sync::OwnedMutexGuard<()>, BidError> {
        let wait = Duration::from_millis(self.config.lock_wait_ms);
        for attempt in 0..=self.config.lock_retries {
            if let Some(guard) = self.locks.acquire(auction_id, wait).await {
                return Ok(guard);
            }
            warn!(
                auction_id = %auction_id,
                attempt,
                "timed out waiting for auction lock"
            );
        }
        Err(BidError::Busy)
    }

    /// Load the auction and enforce the lifecycle gate. The first operation to
    /// arrive past the deadline flips the row to CLOSED and commits that flip
    /// before failing with AuctionClosed.
    async fn load_open_auction<'a>(
        &self,
        mut tx: Transaction<'a, Sqlite>,
        auction_id: &AuctionId,
        now: TimeMs,
    ) -> Result<(Auction, Transaction<'a, Sqlite>), BidError> {
        let auction = Repository::get_auction_conn(&mut tx, auction_id)
            .await?
            .ok_or(BidError::AuctionNotFound)?;

        match auction.status {
            AuctionStatus::Closed => Err(BidError::AuctionClosed),
            AuctionStatus::Open if auction.is_past_deadline(now) => {
                Repository::close_auction(&mut tx, auction_id).await?;
                tx.commit().await?;
                info!(auction_id = %auction_id, "auction closed at deadline");
                Err(BidError::AuctionClosed)
            }
            AuctionStatus::Open => Ok((auction, tx)),
        }
    }

    /// Append synthetic bids, persist the resolved price/leader, and commit.
    /// A concurrent close makes the guarded row update a no-op, in which case
    /// everything rolls back and the caller sees AuctionClosed.
    async fn commit_resolution(
        &self,
        mut tx: Transaction<'_, Sqlite>,
        auction_id: &AuctionId,
        resolution: &Resolution,
        now: TimeMs,
        appended: &mut Vec<Bid>,
    ) -> Result<(), BidError> {
        for synthetic in &resolution.synthetic_bids {
            let bid = Bid::new(
                auction_id.clone(),
                synthetic.bidder_id.clone(),
                synthetic.amount,
                BidSource::Proxy,
                now,
            );
            Repository::insert_bid(&mut tx, &bid).await?;
            appended.push(bid);
        }

        let updated = Repository::update_resolution(
            &mut tx,
            auction_id,
            resolution.new_price,
            &resolution.new_leader,
        )
        .await?;
        if !updated {
            appended.clear();
            return Err(BidError::AuctionClosed);
        }

        tx.commit().await?;
        Ok(())
    }
}
