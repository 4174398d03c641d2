//! Risk metrics repository
//!
//! Every computation appends one history row (the auditable time series)
//! and upserts the latest row keyed by `(agent_id, competition_id)` that
//! leaderboard reads hit. Both writes share one transaction. `NULL`
//! columns mean "metric unavailable" and are stored as-is; they are never
//! coerced to zero.

use sqlx::PgPool;
use uuid::Uuid;

use perpsarena_types::RiskMetrics;

use crate::{DbResult, DbRiskMetrics};

pub struct RiskRepo {
    pool: PgPool,
}

impl RiskRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append to the time series and refresh the latest record
    pub async fn record(&self, metrics: &RiskMetrics) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO risk_metrics_history
                (agent_id, competition_id, simple_return, annualized_return, max_drawdown,
                 calmar_ratio, downside_deviation, sortino_ratio, computed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(metrics.agent_id.0)
        .bind(metrics.competition_id.0)
        .bind(metrics.simple_return)
        .bind(metrics.annualized_return)
        .bind(metrics.max_drawdown)
        .bind(metrics.calmar_ratio)
        .bind(metrics.downside_deviation)
        .bind(metrics.sortino_ratio)
        .bind(metrics.computed_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO risk_metrics_latest
                (agent_id, competition_id, simple_return, annualized_return, max_drawdown,
                 calmar_ratio, downside_deviation, sortino_ratio, computed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (agent_id, competition_id)
            DO UPDATE SET
                simple_return = EXCLUDED.simple_return,
                annualized_return = EXCLUDED.annualized_return,
                max_drawdown = EXCLUDED.max_drawdown,
                calmar_ratio = EXCLUDED.calmar_ratio,
                downside_deviation = EXCLUDED.downside_deviation,
                sortino_ratio = EXCLUDED.sortino_ratio,
                computed_at = EXCLUDED.computed_at
            "#,
        )
        .bind(metrics.agent_id.0)
        .bind(metrics.competition_id.0)
        .bind(metrics.simple_return)
        .bind(metrics.annualized_return)
        .bind(metrics.max_drawdown)
        .bind(metrics.calmar_ratio)
        .bind(metrics.downside_deviation)
        .bind(metrics.sortino_ratio)
        .bind(metrics.computed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn latest(
        &self,
        competition_id: Uuid,
        agent_id: Uuid,
    ) -> DbResult<Option<DbRiskMetrics>> {
        let metrics = sqlx::query_as::<_, DbRiskMetrics>(
            "SELECT * FROM risk_metrics_latest WHERE competition_id = $1 AND agent_id = $2",
        )
        .bind(competition_id)
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(metrics)
    }

    /// Latest metrics for every agent in a competition
    pub async fn latest_for_competition(
        &self,
        competition_id: Uuid,
    ) -> DbResult<Vec<DbRiskMetrics>> {
        let metrics = sqlx::query_as::<_, DbRiskMetrics>(
            "SELECT * FROM risk_metrics_latest WHERE competition_id = $1",
        )
        .bind(competition_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(metrics)
    }

    /// Metric time series for one agent, oldest first
    pub async fn history(
        &self,
        competition_id: Uuid,
        agent_id: Uuid,
        limit: i64,
    ) -> DbResult<Vec<DbRiskMetrics>> {
        let metrics = sqlx::query_as::<_, DbRiskMetrics>(
            r#"
            SELECT agent_id, competition_id, simple_return, annualized_return, max_drawdown,
                   calmar_ratio, downside_deviation, sortino_ratio, computed_at
            FROM risk_metrics_history
            WHERE competition_id = $1 AND agent_id = $2
            ORDER BY computed_at
            LIMIT $3
            "#,
        )
        .bind(competition_id)
        .bind(agent_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(metrics)
    }
}
