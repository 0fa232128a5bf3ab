//! Bid ledger operations. Append-only: nothing here updates or deletes.

use super::Repository;
use crate::domain::{Amount, AuctionId, Bid, BidId, BidSource, TimeMs, UserId};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use tracing::warn;

impl Repository {
    /// Append one bid to the ledger within the caller's transaction.
    pub async fn insert_bid(conn: &mut SqliteConnection, bid: &Bid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO bids (id, auction_id, bidder_id, amount, source, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(bid.id.as_str())
        .bind(bid.auction_id.as_str())
        .bind(bid.bidder_id.as_str())
        .bind(bid.amount.to_canonical_string())
        .bind(bid.source.to_string())
        .bind(bid.created_at.as_i64())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Bid history for one auction, most recent first. Ties on created_at are
    /// broken by rowid, so entries read back in serialization order even when
    /// one resolution appended several bids in the same millisecond.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_bid_history(&self, auction_id: &AuctionId) -> Result<Vec<Bid>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, auction_id, bidder_id, amount, source, created_at
            FROM bids
            WHERE auction_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(auction_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_bid_row).collect()
    }

    /// Number of ledger entries for one auction.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn count_bids(&self, auction_id: &AuctionId) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bids WHERE auction_id = ?")
            .bind(auction_id.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }
}

fn map_bid_row(row: &SqliteRow) -> Result<Bid, sqlx::Error> {
    let amount: String = row.get("amount");
    let source_str: String = row.get("source");
    let source = BidSource::parse(&source_str).unwrap_or_else(|| {
        warn!("unknown bid source '{}', treating as manual", source_str);
        BidSource::Manual
    });

    Ok(Bid {
        id: BidId::new(row.get("id")),
        auction_id: AuctionId::new(row.get("auction_id")),
        bidder_id: UserId::new(row.get("bidder_id")),
        amount: super::decode_amount(&amount, "amount")?,
        source,
        created_at: TimeMs::new(row.get("created_at")),
    })
}
