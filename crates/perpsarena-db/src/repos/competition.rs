//! Competition repository
//!
//! Lifecycle transitions are single conditional statements: the status
//! predicate rides in the same `UPDATE` that performs the write, so exactly
//! one concurrent caller observes a changed row and everyone else gets
//! `None` back (already handled, not an error).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbCompetition, DbResult};

pub struct CompetitionRepo {
    pool: PgPool,
}

impl CompetitionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        id: Uuid,
        name: &str,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        max_participants: Option<i32>,
        initial_capital: Decimal,
        evaluation_metric: &str,
    ) -> DbResult<DbCompetition> {
        let comp = sqlx::query_as::<_, DbCompetition>(
            r#"
            INSERT INTO arena_competitions
                (id, name, status, start_date, end_date, max_participants, initial_capital, evaluation_metric)
            VALUES ($1, $2, 'pending', $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(start_date)
        .bind(end_date)
        .bind(max_participants)
        .bind(initial_capital)
        .bind(evaluation_metric)
        .fetch_one(&self.pool)
        .await?;
        Ok(comp)
    }

    pub async fn find(&self, id: Uuid) -> DbResult<Option<DbCompetition>> {
        let comp = sqlx::query_as::<_, DbCompetition>(
            "SELECT * FROM arena_competitions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comp)
    }

    pub async fn list_by_status(&self, status: &str) -> DbResult<Vec<DbCompetition>> {
        let comps = sqlx::query_as::<_, DbCompetition>(
            "SELECT * FROM arena_competitions WHERE status = $1 ORDER BY start_date",
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(comps)
    }

    /// Transition `pending -> active`
    ///
    /// Returns the updated row, or `None` when the competition was not
    /// pending (already started by another caller).
    pub async fn mark_active(&self, id: Uuid) -> DbResult<Option<DbCompetition>> {
        let comp = sqlx::query_as::<_, DbCompetition>(
            r#"
            UPDATE arena_competitions
            SET status = 'active'
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comp)
    }

    /// Transition `active -> ending`, stamping the actual end time
    ///
    /// Exactly one of any number of concurrent callers receives `Some`;
    /// the rest receive `None` and must treat the transition as already
    /// claimed.
    pub async fn mark_ending(&self, id: Uuid) -> DbResult<Option<DbCompetition>> {
        let comp = sqlx::query_as::<_, DbCompetition>(
            r#"
            UPDATE arena_competitions
            SET status = 'ending', end_date = NOW()
            WHERE id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comp)
    }

    /// Transition `ending -> ended`
    ///
    /// The single-writer guard for finalization: reward computation and
    /// rank freezing run only for the caller that gets `Some` back.
    pub async fn mark_ended(&self, id: Uuid) -> DbResult<Option<DbCompetition>> {
        let comp = sqlx::query_as::<_, DbCompetition>(
            r#"
            UPDATE arena_competitions
            SET status = 'ended'
            WHERE id = $1 AND status = 'ending'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comp)
    }

    /// Competitions a scheduler should try to finalize: active ones past
    /// their end date, plus any stuck in `ending` after a crash.
    pub async fn find_needing_ending(&self) -> DbResult<Vec<DbCompetition>> {
        let comps = sqlx::query_as::<_, DbCompetition>(
            r#"
            SELECT * FROM arena_competitions
            WHERE (status = 'active' AND end_date <= NOW()) OR status = 'ending'
            ORDER BY end_date
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(comps)
    }
}
