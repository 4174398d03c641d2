//! Account summary repository
//!
//! Summaries are append-only; writers go through the sync transaction in
//! `PerpsSyncRepo`. This repo is the read side: latest snapshot per agent
//! and the ordered equity curve the risk engine consumes.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbAccountSummary, DbEquityPoint, DbResult};

pub struct SummaryRepo {
    pool: PgPool,
}

impl SummaryRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn latest(
        &self,
        competition_id: Uuid,
        agent_id: Uuid,
    ) -> DbResult<Option<DbAccountSummary>> {
        let summary = sqlx::query_as::<_, DbAccountSummary>(
            r#"
            SELECT * FROM account_summaries
            WHERE competition_id = $1 AND agent_id = $2
            ORDER BY captured_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(competition_id)
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(summary)
    }

    /// Latest snapshot per agent across a whole competition
    pub async fn latest_for_competition(
        &self,
        competition_id: Uuid,
    ) -> DbResult<Vec<DbAccountSummary>> {
        let summaries = sqlx::query_as::<_, DbAccountSummary>(
            r#"
            SELECT DISTINCT ON (agent_id) * FROM account_summaries
            WHERE competition_id = $1
            ORDER BY agent_id, captured_at DESC, id DESC
            "#,
        )
        .bind(competition_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(summaries)
    }

    /// Ordered equity curve for one agent, oldest first
    pub async fn equity_series(
        &self,
        competition_id: Uuid,
        agent_id: Uuid,
    ) -> DbResult<Vec<DbEquityPoint>> {
        let points = sqlx::query_as::<_, DbEquityPoint>(
            r#"
            SELECT total_equity, captured_at FROM account_summaries
            WHERE competition_id = $1 AND agent_id = $2
            ORDER BY captured_at, id
            "#,
        )
        .bind(competition_id)
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(points)
    }

    pub async fn snapshot_count(&self, competition_id: Uuid, agent_id: Uuid) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM account_summaries WHERE competition_id = $1 AND agent_id = $2",
        )
        .bind(competition_id)
        .bind(agent_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
