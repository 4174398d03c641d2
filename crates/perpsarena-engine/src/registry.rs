//! Participant registry service
//!
//! Membership mutations delegate to the repository's locked transactions;
//! this layer adds logging and the error mapping callers see. Capacity
//! violations surface as `ArenaError::CapacityExceeded`; duplicate joins
//! and already-left leaves are idempotent no-ops.

use tracing::info;

use perpsarena_db::{JoinOutcome, ParticipantRepo};
use perpsarena_types::{AgentId, CompetitionId, Participant, ParticipantStatus};

use crate::ArenaResult;

pub struct ParticipantRegistry {
    participants: ParticipantRepo,
}

impl ParticipantRegistry {
    pub fn new(participants: ParticipantRepo) -> Self {
        Self { participants }
    }

    /// Register an agent; duplicate joins succeed without changing anything
    pub async fn join(
        &self,
        competition_id: CompetitionId,
        agent_id: AgentId,
        wallet_address: &str,
    ) -> ArenaResult<JoinOutcome> {
        let outcome = self
            .participants
            .join(competition_id.0, agent_id.0, wallet_address)
            .await?;
        if outcome == JoinOutcome::Joined {
            info!(competition = %competition_id, agent = %agent_id, "agent joined competition");
        }
        Ok(outcome)
    }

    /// Register a batch of agents; duplicates are filtered before the
    /// capacity check so a retried batch is idempotent.
    pub async fn bulk_join(
        &self,
        competition_id: CompetitionId,
        agents: &[(AgentId, String)],
    ) -> ArenaResult<Vec<AgentId>> {
        let rows: Vec<(uuid::Uuid, String)> = agents
            .iter()
            .map(|(id, wallet)| (id.0, wallet.clone()))
            .collect();
        let joined = self.participants.bulk_join(competition_id.0, &rows).await?;
        info!(
            competition = %competition_id,
            joined = joined.len(),
            requested = agents.len(),
            "bulk join complete"
        );
        Ok(joined.into_iter().map(AgentId::from_uuid).collect())
    }

    /// Voluntary exit; returns `false` when the agent was not active
    pub async fn leave(
        &self,
        competition_id: CompetitionId,
        agent_id: AgentId,
        reason: Option<&str>,
    ) -> ArenaResult<bool> {
        let changed = self
            .participants
            .deactivate(
                competition_id.0,
                agent_id.0,
                ParticipantStatus::Withdrawn.as_str(),
                reason,
            )
            .await?;
        if changed {
            info!(competition = %competition_id, agent = %agent_id, "agent withdrew");
        }
        Ok(changed)
    }

    /// Forced removal for rule violations
    pub async fn disqualify(
        &self,
        competition_id: CompetitionId,
        agent_id: AgentId,
        reason: &str,
    ) -> ArenaResult<bool> {
        let changed = self
            .participants
            .deactivate(
                competition_id.0,
                agent_id.0,
                ParticipantStatus::Disqualified.as_str(),
                Some(reason),
            )
            .await?;
        if changed {
            info!(competition = %competition_id, agent = %agent_id, reason, "agent disqualified");
        }
        Ok(changed)
    }

    /// Bring a previously deactivated agent back, re-validating capacity
    pub async fn reactivate(
        &self,
        competition_id: CompetitionId,
        agent_id: AgentId,
    ) -> ArenaResult<bool> {
        let changed = self
            .participants
            .reactivate(competition_id.0, agent_id.0)
            .await?;
        if changed {
            info!(competition = %competition_id, agent = %agent_id, "agent reactivated");
        }
        Ok(changed)
    }

    pub async fn find(
        &self,
        competition_id: CompetitionId,
        agent_id: AgentId,
    ) -> ArenaResult<Option<Participant>> {
        match self.participants.find(competition_id.0, agent_id.0).await? {
            Some(row) => Ok(Some(row.into_domain()?)),
            None => Ok(None),
        }
    }

    /// Every participant, active or not
    pub async fn all_participants(
        &self,
        competition_id: CompetitionId,
    ) -> ArenaResult<Vec<Participant>> {
        let rows = self.participants.list(competition_id.0).await?;
        let mut participants = Vec::with_capacity(rows.len());
        for row in rows {
            participants.push(row.into_domain()?);
        }
        Ok(participants)
    }

    /// Agents eligible for sync and metric computation
    pub async fn active_participants(
        &self,
        competition_id: CompetitionId,
    ) -> ArenaResult<Vec<Participant>> {
        let rows = self.participants.list_active(competition_id.0).await?;
        let mut participants = Vec::with_capacity(rows.len());
        for row in rows {
            participants.push(row.into_domain()?);
        }
        Ok(participants)
    }
}
