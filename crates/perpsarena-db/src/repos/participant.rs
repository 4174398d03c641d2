//! Participant repository
//!
//! Capacity is enforced under an explicit row lock on the competition:
//! every join/leave takes `SELECT ... FOR UPDATE` on the parent before
//! touching the counter, which serializes concurrent membership changes
//! against the same competition. The denormalized
//! `registered_participants` counter moves in the same transaction as the
//! participant row, keeping it equal to the count of `active` rows at all
//! times.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbCompetition, DbError, DbParticipant, DbResult};

/// Result of a join attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// A new participant row was inserted
    Joined,
    /// The agent was already registered; nothing changed
    AlreadyJoined,
}

pub struct ParticipantRepo {
    pool: PgPool,
}

impl ParticipantRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register an agent for a competition.
    ///
    /// Insert-first, validate-after: the participant row goes in with
    /// `ON CONFLICT DO NOTHING`, and only when a row was actually inserted
    /// is capacity re-checked against the locked parent. A violation rolls
    /// the whole transaction back, insert included. A naive
    /// read-count-then-insert would admit over-capacity joins under
    /// concurrency.
    pub async fn join(
        &self,
        competition_id: Uuid,
        agent_id: Uuid,
        wallet_address: &str,
    ) -> DbResult<JoinOutcome> {
        let mut tx = self.pool.begin().await?;

        let comp = sqlx::query_as::<_, DbCompetition>(
            "SELECT * FROM arena_competitions WHERE id = $1 FOR UPDATE",
        )
        .bind(competition_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("competition {}", competition_id)))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO arena_participants (competition_id, agent_id, wallet_address, status)
            VALUES ($1, $2, $3, 'active')
            ON CONFLICT (competition_id, agent_id) DO NOTHING
            "#,
        )
        .bind(competition_id)
        .bind(agent_id)
        .bind(wallet_address)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            // Duplicate join is an idempotent no-op; tx dropped unchanged
            return Ok(JoinOutcome::AlreadyJoined);
        }

        if let Some(max) = comp.max_participants {
            if comp.registered_participants + 1 > max {
                // Dropping the transaction rolls back the insert
                return Err(DbError::CapacityExceeded { max });
            }
        }

        sqlx::query(
            "UPDATE arena_competitions SET registered_participants = registered_participants + 1 WHERE id = $1",
        )
        .bind(competition_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(JoinOutcome::Joined)
    }

    /// Register a batch of agents, filtering duplicates before the capacity
    /// arithmetic so a retried batch is idempotent.
    ///
    /// Returns the agent ids actually inserted.
    pub async fn bulk_join(
        &self,
        competition_id: Uuid,
        agents: &[(Uuid, String)],
    ) -> DbResult<Vec<Uuid>> {
        let mut tx = self.pool.begin().await?;

        let comp = sqlx::query_as::<_, DbCompetition>(
            "SELECT * FROM arena_competitions WHERE id = $1 FOR UPDATE",
        )
        .bind(competition_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("competition {}", competition_id)))?;

        let candidate_ids: Vec<Uuid> = agents.iter().map(|(id, _)| *id).collect();
        let existing: Vec<Uuid> = sqlx::query_scalar(
            "SELECT agent_id FROM arena_participants WHERE competition_id = $1 AND agent_id = ANY($2)",
        )
        .bind(competition_id)
        .bind(&candidate_ids)
        .fetch_all(&mut *tx)
        .await?;

        let mut fresh: Vec<(Uuid, &str)> = Vec::new();
        for (agent_id, wallet) in agents {
            if !existing.contains(agent_id) && !fresh.iter().any(|(id, _)| id == agent_id) {
                fresh.push((*agent_id, wallet.as_str()));
            }
        }

        if fresh.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(max) = comp.max_participants {
            if comp.registered_participants + fresh.len() as i32 > max {
                return Err(DbError::CapacityExceeded { max });
            }
        }

        for (agent_id, wallet) in &fresh {
            sqlx::query(
                r#"
                INSERT INTO arena_participants (competition_id, agent_id, wallet_address, status)
                VALUES ($1, $2, $3, 'active')
                "#,
            )
            .bind(competition_id)
            .bind(*agent_id)
            .bind(*wallet)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "UPDATE arena_competitions SET registered_participants = registered_participants + $2 WHERE id = $1",
        )
        .bind(competition_id)
        .bind(fresh.len() as i32)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(fresh.into_iter().map(|(id, _)| id).collect())
    }

    /// Transition a participant away from `active`, recording the reason
    /// and decrementing the competition counter.
    ///
    /// Returns `false` when the participant was not active (already left);
    /// the counter is untouched in that case.
    pub async fn deactivate(
        &self,
        competition_id: Uuid,
        agent_id: Uuid,
        new_status: &str,
        reason: Option<&str>,
    ) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT id FROM arena_competitions WHERE id = $1 FOR UPDATE")
            .bind(competition_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("competition {}", competition_id)))?;

        let changed = sqlx::query(
            r#"
            UPDATE arena_participants
            SET status = $3, deactivation_reason = $4, deactivated_at = NOW()
            WHERE competition_id = $1 AND agent_id = $2 AND status = 'active'
            "#,
        )
        .bind(competition_id)
        .bind(agent_id)
        .bind(new_status)
        .bind(reason)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if changed == 0 {
            return Ok(false);
        }

        sqlx::query(
            "UPDATE arena_competitions SET registered_participants = registered_participants - 1 WHERE id = $1",
        )
        .bind(competition_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Re-activate a previously deactivated participant, re-validating
    /// capacity before incrementing the counter.
    pub async fn reactivate(&self, competition_id: Uuid, agent_id: Uuid) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;

        let comp = sqlx::query_as::<_, DbCompetition>(
            "SELECT * FROM arena_competitions WHERE id = $1 FOR UPDATE",
        )
        .bind(competition_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("competition {}", competition_id)))?;

        let changed = sqlx::query(
            r#"
            UPDATE arena_participants
            SET status = 'active', deactivation_reason = NULL, deactivated_at = NULL
            WHERE competition_id = $1 AND agent_id = $2 AND status <> 'active'
            "#,
        )
        .bind(competition_id)
        .bind(agent_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if changed == 0 {
            return Ok(false);
        }

        if let Some(max) = comp.max_participants {
            if comp.registered_participants + 1 > max {
                return Err(DbError::CapacityExceeded { max });
            }
        }

        sqlx::query(
            "UPDATE arena_competitions SET registered_participants = registered_participants + 1 WHERE id = $1",
        )
        .bind(competition_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    pub async fn find(
        &self,
        competition_id: Uuid,
        agent_id: Uuid,
    ) -> DbResult<Option<DbParticipant>> {
        let p = sqlx::query_as::<_, DbParticipant>(
            "SELECT * FROM arena_participants WHERE competition_id = $1 AND agent_id = $2",
        )
        .bind(competition_id)
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(p)
    }

    pub async fn list(&self, competition_id: Uuid) -> DbResult<Vec<DbParticipant>> {
        let participants = sqlx::query_as::<_, DbParticipant>(
            "SELECT * FROM arena_participants WHERE competition_id = $1 ORDER BY joined_at",
        )
        .bind(competition_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(participants)
    }

    pub async fn list_active(&self, competition_id: Uuid) -> DbResult<Vec<DbParticipant>> {
        let participants = sqlx::query_as::<_, DbParticipant>(
            r#"
            SELECT * FROM arena_participants
            WHERE competition_id = $1 AND status = 'active'
            ORDER BY joined_at
            "#,
        )
        .bind(competition_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(participants)
    }

    pub async fn count_active(&self, competition_id: Uuid) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM arena_participants WHERE competition_id = $1 AND status = 'active'",
        )
        .bind(competition_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
