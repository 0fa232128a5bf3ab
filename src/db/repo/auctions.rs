//! Auction row operations.

use super::Repository;
use crate::domain::{Amount, Auction, AuctionId, AuctionStatus, TimeMs, UserId};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use tracing::warn;

impl Repository {
    /// Insert a freshly created auction.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_auction(&self, auction: &Auction) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO auctions (
                id, seller_id, start_price, bid_increment, end_time_ms,
                status, current_price, current_leader_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(auction.id.as_str())
        .bind(auction.seller_id.as_str())
        .bind(auction.start_price.to_canonical_string())
        .bind(auction.bid_increment.to_canonical_string())
        .bind(auction.end_time_ms.as_i64())
        .bind(auction.status.to_string())
        .bind(auction.current_price.to_canonical_string())
        .bind(auction.current_leader.as_ref().map(|u| u.as_str().to_string()))
        .bind(auction.created_at.as_i64())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get an auction by id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_auction(&self, id: &AuctionId) -> Result<Option<Auction>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        Self::get_auction_conn(&mut conn, id).await
    }

    /// Get an auction by id on a specific connection (transaction-scoped read).
    pub async fn get_auction_conn(
        conn: &mut SqliteConnection,
        id: &AuctionId,
    ) -> Result<Option<Auction>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, seller_id, start_price, bid_increment, end_time_ms,
                   status, current_price, current_leader_id, created_at
            FROM auctions
            WHERE id = ?
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&mut *conn)
        .await?;

        row.map(|r| map_auction_row(&r)).transpose()
    }

    /// Persist the engine's resolved price and leader for an auction.
    ///
    /// Guarded on `status = 'open'` so a concurrent close wins: returns false
    /// when no open row was updated and the caller must roll back.
    pub async fn update_resolution(
        conn: &mut SqliteConnection,
        id: &AuctionId,
        price: Amount,
        leader: &UserId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE auctions SET current_price = ?, current_leader_id = ? WHERE id = ? AND status = 'open'",
        )
        .bind(price.to_canonical_string())
        .bind(leader.as_str())
        .bind(id.as_str())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark one auction closed; its price/leader become the permanent result.
    pub async fn close_auction(
        conn: &mut SqliteConnection,
        id: &AuctionId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE auctions SET status = 'closed' WHERE id = ? AND status = 'open'")
            .bind(id.as_str())
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Close every open auction whose deadline has passed. Returns the ids of
    /// the auctions closed so the sweep can release per-auction resources.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn close_expired_auctions(&self, now: TimeMs) -> Result<Vec<AuctionId>, sqlx::Error> {
        let rows = sqlx::query(
            "UPDATE auctions SET status = 'closed' WHERE status = 'open' AND end_time_ms <= ? RETURNING id",
        )
        .bind(now.as_i64())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| AuctionId::new(r.get("id")))
            .collect())
    }
}

fn map_auction_row(row: &SqliteRow) -> Result<Auction, sqlx::Error> {
    let status_str: String = row.get("status");
    let status = AuctionStatus::parse(&status_str).unwrap_or_else(|| {
        warn!("unknown auction status '{}', treating as closed", status_str);
        AuctionStatus::Closed
    });

    let start_price: String = row.get("start_price");
    let bid_increment: String = row.get("bid_increment");
    let current_price: String = row.get("current_price");
    let leader: Option<String> = row.get("current_leader_id");

    Ok(Auction {
        id: AuctionId::new(row.get("id")),
        seller_id: UserId::new(row.get("seller_id")),
        start_price: super::decode_amount(&start_price, "start_price")?,
        bid_increment: super::decode_amount(&bid_increment, "bid_increment")?,
        end_time_ms: TimeMs::new(row.get("end_time_ms")),
        status,
        current_price: super::decode_amount(&current_price, "current_price")?,
        current_leader: leader.map(UserId::new),
        created_at: TimeMs::new(row.get("created_at")),
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::setup_test_db;
    use crate::domain::{Amount, Auction, AuctionId, AuctionStatus, TimeMs, UserId};
    use std::str::FromStr;

    fn auction(id: &str, end_time_ms: i64) -> Auction {
        Auction::new(
            AuctionId::new(id.to_string()),
            UserId::new("seller".to_string()),
            Amount::from_str("100").unwrap(),
            Amount::from_str("10").unwrap(),
            TimeMs::new(end_time_ms),
            TimeMs::new(0),
        )
    }

    #[tokio::test]
    async fn test_insert_and_get_auction() {
        let (repo, _temp) = setup_test_db().await;

        let a = auction("a1", 10_000);
        repo.insert_auction(&a).await.expect("insert failed");

        let loaded = repo
            .get_auction(&a.id)
            .await
            .expect("query failed")
            .expect("auction missing");
        assert_eq!(loaded, a);
    }

    #[tokio::test]
    async fn test_get_auction_missing_returns_none() {
        let (repo, _temp) = setup_test_db().await;

        let loaded = repo
            .get_auction(&AuctionId::new("nope".to_string()))
            .await
            .expect("query failed");
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_update_resolution_persists_price_and_leader() {
        let (repo, _temp) = setup_test_db().await;

        let a = auction("a1", 10_000);
        repo.insert_auction(&a).await.unwrap();

        let mut conn = repo.pool().acquire().await.unwrap();
        let updated = super::Repository::update_resolution(
            &mut conn,
            &a.id,
            Amount::from_str("150").unwrap(),
            &UserId::new("bob".to_string()),
        )
        .await
        .unwrap();
        assert!(updated);
        drop(conn);

        let loaded = repo.get_auction(&a.id).await.unwrap().unwrap();
        assert_eq!(loaded.current_price, Amount::from_str("150").unwrap());
        assert_eq!(loaded.current_leader, Some(UserId::new("bob".to_string())));
    }

    #[tokio::test]
    async fn test_update_resolution_refuses_closed_auction() {
        let (repo, _temp) = setup_test_db().await;

        let a = auction("a1", 1_000);
        repo.insert_auction(&a).await.unwrap();
        repo.close_expired_auctions(TimeMs::new(1_000)).await.unwrap();

        let mut conn = repo.pool().acquire().await.unwrap();
        let updated = super::Repository::update_resolution(
            &mut conn,
            &a.id,
            Amount::from_str("999").unwrap(),
            &UserId::new("bob".to_string()),
        )
        .await
        .unwrap();
        assert!(!updated);
        drop(conn);

        let loaded = repo.get_auction(&a.id).await.unwrap().unwrap();
        assert_eq!(loaded.current_price, a.current_price);
        assert!(loaded.current_leader.is_none());
    }

    #[tokio::test]
    async fn test_close_expired_auctions_only_past_deadline() {
        let (repo, _temp) = setup_test_db().await;

        repo.insert_auction(&auction("early", 1_000)).await.unwrap();
        repo.insert_auction(&auction("late", 10_000)).await.unwrap();

        let closed = repo
            .close_expired_auctions(TimeMs::new(5_000))
            .await
            .unwrap();
        assert_eq!(closed, vec![AuctionId::new("early".to_string())]);

        let early = repo
            .get_auction(&AuctionId::new("early".to_string()))
            .await
            .unwrap()
            .unwrap();
        let late = repo
            .get_auction(&AuctionId::new("late".to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(early.status, AuctionStatus::Closed);
        assert_eq!(late.status, AuctionStatus::Open);
    }

    #[tokio::test]
    async fn test_close_expired_is_idempotent() {
        let (repo, _temp) = setup_test_db().await;

        repo.insert_auction(&auction("a1", 1_000)).await.unwrap();

        let first = repo.close_expired_auctions(TimeMs::new(1_000)).await.unwrap();
        let second = repo.close_expired_auctions(TimeMs::new(2_000)).await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_stored_amount_surfaces_as_error() {
        let (repo, _temp) = setup_test_db().await;

        let a = auction("a1", 10_000);
        repo.insert_auction(&a).await.unwrap();

        sqlx::query("UPDATE auctions SET current_price = 'garbage' WHERE id = 'a1'")
            .execute(repo.pool())
            .await
            .unwrap();

        let result = repo.get_auction(&a.id).await;
        assert!(matches!(result, Err(sqlx::Error::ColumnDecode { .. })));
    }
}
