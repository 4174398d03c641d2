//! Competition lifecycle service
//!
//! Thin service over the competition repository. Transitions return
//! `Ok(Some(_))` for the caller that claimed them and `Ok(None)` for
//! everyone else; a `None` is an idempotent success signal, not an error,
//! so two schedulers racing on the same competition both complete cleanly.

use tracing::{debug, info};

use perpsarena_db::CompetitionRepo;
use perpsarena_types::{Competition, CompetitionId};

use crate::{ArenaError, ArenaResult};

pub struct CompetitionLifecycle {
    competitions: CompetitionRepo,
}

impl CompetitionLifecycle {
    pub fn new(competitions: CompetitionRepo) -> Self {
        Self { competitions }
    }

    pub async fn create(&self, competition: &Competition) -> ArenaResult<Competition> {
        let row = self
            .competitions
            .create(
                competition.id.0,
                &competition.name,
                competition.start_date,
                competition.end_date,
                competition.max_participants,
                competition.initial_capital,
                competition.evaluation_metric.as_str(),
            )
            .await?;
        Ok(row.into_domain()?)
    }

    pub async fn get(&self, id: CompetitionId) -> ArenaResult<Competition> {
        let row = self
            .competitions
            .find(id.0)
            .await?
            .ok_or_else(|| ArenaError::NotFound(format!("competition {}", id)))?;
        Ok(row.into_domain()?)
    }

    /// Start a pending competition; `None` when already started
    pub async fn mark_active(&self, id: CompetitionId) -> ArenaResult<Option<Competition>> {
        match self.competitions.mark_active(id.0).await? {
            Some(row) => {
                info!(competition = %id, "competition started");
                Ok(Some(row.into_domain()?))
            }
            None => {
                debug!(competition = %id, "start already claimed, skipping");
                Ok(None)
            }
        }
    }

    /// Claim the `active -> ending` transition
    ///
    /// Exactly one of any number of concurrent callers gets `Some` back;
    /// the rest observe that no row changed and treat the competition as
    /// already handled.
    pub async fn mark_ending(&self, id: CompetitionId) -> ArenaResult<Option<Competition>> {
        match self.competitions.mark_ending(id.0).await? {
            Some(row) => {
                info!(competition = %id, "competition marked ending");
                Ok(Some(row.into_domain()?))
            }
            None => {
                debug!(competition = %id, "ending already claimed, skipping");
                Ok(None)
            }
        }
    }

    /// Claim the `ending -> ended` transition
    ///
    /// The single-writer guard for finalization: rank freezing and reward
    /// computation run only on the `Some` path, even when several
    /// schedulers fire at once.
    pub async fn mark_ended(&self, id: CompetitionId) -> ArenaResult<Option<Competition>> {
        match self.competitions.mark_ended(id.0).await? {
            Some(row) => {
                info!(competition = %id, "competition ended");
                Ok(Some(row.into_domain()?))
            }
            None => {
                debug!(competition = %id, "end already claimed, skipping");
                Ok(None)
            }
        }
    }

    /// Competitions a scheduler should finalize: active past their end
    /// date, plus any stuck in `ending` from a crashed run.
    pub async fn needing_ending(&self) -> ArenaResult<Vec<Competition>> {
        let rows = self.competitions.find_needing_ending().await?;
        let mut competitions = Vec::with_capacity(rows.len());
        for row in rows {
            competitions.push(row.into_domain()?);
        }
        Ok(competitions)
    }
}
