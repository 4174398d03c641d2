//! Perps sync repository
//!
//! `sync_agent_data` is the atomic unit of the sync pipeline: position
//! upserts, stale-position closure, and the account-summary append share
//! one transaction. A failure in any step leaves the agent's prior state
//! intact; the unit is per agent, never per batch.

use sqlx::PgPool;
use uuid::Uuid;

use perpsarena_types::{ProviderAccountSummary, ProviderPosition};

use crate::{DbPerpsPosition, DbResult};

/// Row counts from one agent sync
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncStats {
    pub upserted: usize,
    pub closed_stale: u64,
}

pub struct PerpsSyncRepo {
    pool: PgPool,
}

impl PerpsSyncRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist one agent's provider snapshot atomically:
    /// upsert positions, close the ones the venue stopped reporting,
    /// append the account summary.
    pub async fn sync_agent_data(
        &self,
        competition_id: Uuid,
        agent_id: Uuid,
        positions: &[ProviderPosition],
        summary: &ProviderAccountSummary,
    ) -> DbResult<SyncStats> {
        let mut tx = self.pool.begin().await?;

        for position in positions {
            // Conflict overwrites only the mutable fields; identity and
            // entry fields keep their first-synced values.
            sqlx::query(
                r#"
                INSERT INTO perps_positions
                    (provider_position_id, competition_id, agent_id, asset, side, leverage,
                     size, collateral, entry_price, current_price, liquidation_price,
                     unrealized_pnl, realized_pnl, status)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                ON CONFLICT (provider_position_id, competition_id)
                DO UPDATE SET
                    size = EXCLUDED.size,
                    collateral = EXCLUDED.collateral,
                    current_price = EXCLUDED.current_price,
                    liquidation_price = EXCLUDED.liquidation_price,
                    unrealized_pnl = EXCLUDED.unrealized_pnl,
                    realized_pnl = EXCLUDED.realized_pnl,
                    status = EXCLUDED.status,
                    updated_at = NOW(),
                    closed_at = CASE
                        WHEN EXCLUDED.status <> 'open' AND perps_positions.closed_at IS NULL THEN NOW()
                        WHEN EXCLUDED.status = 'open' THEN NULL
                        ELSE perps_positions.closed_at
                    END
                "#,
            )
            .bind(&position.provider_position_id)
            .bind(competition_id)
            .bind(agent_id)
            .bind(&position.asset)
            .bind(position.side.as_str())
            .bind(position.leverage)
            .bind(position.size)
            .bind(position.collateral)
            .bind(position.entry_price)
            .bind(position.current_price)
            .bind(position.liquidation_price)
            .bind(position.unrealized_pnl)
            .bind(position.realized_pnl)
            .bind(position.status.as_str())
            .execute(&mut *tx)
            .await?;
        }

        // Close everything previously open that the venue no longer reports
        // as open. An empty payload closes all open positions: absence means
        // the venue stopped reporting them.
        let open_ids: Vec<String> = positions
            .iter()
            .filter(|p| p.status.is_open())
            .map(|p| p.provider_position_id.clone())
            .collect();

        let closed_stale = sqlx::query(
            r#"
            UPDATE perps_positions
            SET status = 'closed', closed_at = NOW(), updated_at = NOW()
            WHERE competition_id = $1 AND agent_id = $2 AND status = 'open'
              AND NOT (provider_position_id = ANY($3))
            "#,
        )
        .bind(competition_id)
        .bind(agent_id)
        .bind(&open_ids)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query(
            r#"
            INSERT INTO account_summaries
                (agent_id, competition_id, total_equity, initial_capital, total_volume,
                 total_unrealized_pnl, total_realized_pnl, total_pnl, roi,
                 total_trades, open_positions)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(agent_id)
        .bind(competition_id)
        .bind(summary.total_equity)
        .bind(summary.initial_capital)
        .bind(summary.total_volume)
        .bind(summary.total_unrealized_pnl)
        .bind(summary.total_realized_pnl)
        .bind(summary.total_pnl)
        .bind(summary.roi)
        .bind(summary.total_trades)
        .bind(summary.open_positions)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(SyncStats {
            upserted: positions.len(),
            closed_stale,
        })
    }

    pub async fn find_position(
        &self,
        competition_id: Uuid,
        provider_position_id: &str,
    ) -> DbResult<Option<DbPerpsPosition>> {
        let position = sqlx::query_as::<_, DbPerpsPosition>(
            "SELECT * FROM perps_positions WHERE competition_id = $1 AND provider_position_id = $2",
        )
        .bind(competition_id)
        .bind(provider_position_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(position)
    }

    pub async fn list_positions(
        &self,
        competition_id: Uuid,
        agent_id: Uuid,
    ) -> DbResult<Vec<DbPerpsPosition>> {
        let positions = sqlx::query_as::<_, DbPerpsPosition>(
            r#"
            SELECT * FROM perps_positions
            WHERE competition_id = $1 AND agent_id = $2
            ORDER BY created_at
            "#,
        )
        .bind(competition_id)
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(positions)
    }

    pub async fn list_open_positions(
        &self,
        competition_id: Uuid,
        agent_id: Uuid,
    ) -> DbResult<Vec<DbPerpsPosition>> {
        let positions = sqlx::query_as::<_, DbPerpsPosition>(
            r#"
            SELECT * FROM perps_positions
            WHERE competition_id = $1 AND agent_id = $2 AND status = 'open'
            ORDER BY created_at
            "#,
        )
        .bind(competition_id)
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(positions)
    }
}
