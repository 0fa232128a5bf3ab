//! Proxy-limit operations: upsert keyed on (auction, bidder) and standing reads.

use super::Repository;
use crate::domain::{Amount, AuctionId, ProxyLimit, TimeMs, UserId};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

impl Repository {
    /// Register or replace a bidder's ceiling within the caller's transaction.
    ///
    /// `created_at` is preserved on replacement: registration order is the
    /// first registration, which carries the escalation tie-break.
    pub async fn upsert_proxy_limit(
        conn: &mut SqliteConnection,
        proxy: &ProxyLimit,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO proxy_limits (auction_id, bidder_id, ceiling, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(auction_id, bidder_id) DO UPDATE SET
                ceiling = excluded.ceiling,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(proxy.auction_id.as_str())
        .bind(proxy.bidder_id.as_str())
        .bind(proxy.ceiling.to_canonical_string())
        .bind(proxy.created_at.as_i64())
        .bind(proxy.updated_at.as_i64())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// All standing ceilings for one auction in registration order, on a
    /// specific connection (transaction-scoped read).
    pub async fn query_proxy_limits_conn(
        conn: &mut SqliteConnection,
        auction_id: &AuctionId,
    ) -> Result<Vec<ProxyLimit>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT auction_id, bidder_id, ceiling, created_at, updated_at
            FROM proxy_limits
            WHERE auction_id = ?
            ORDER BY created_at ASC, bidder_id ASC
            "#,
        )
        .bind(auction_id.as_str())
        .fetch_all(&mut *conn)
        .await?;

        rows.iter().map(map_proxy_row).collect()
    }

    /// All standing ceilings for one auction in registration order.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_proxy_limits(
        &self,
        auction_id: &AuctionId,
    ) -> Result<Vec<ProxyLimit>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        Self::query_proxy_limits_conn(&mut conn, auction_id).await
    }
}

fn map_proxy_row(row: &SqliteRow) -> Result<ProxyLimit, sqlx::Error> {
    let ceiling: String = row.get("ceiling");

    Ok(ProxyLimit {
        auction_id: AuctionId::new(row.get("auction_id")),
        bidder_id: UserId::new(row.get("bidder_id")),
        ceiling: super::decode_amount(&ceiling, "ceiling")?,
        created_at: TimeMs::new(row.get("created_at")),
        updated_at: TimeMs::new(row.get("updated_at")),
    })
}
