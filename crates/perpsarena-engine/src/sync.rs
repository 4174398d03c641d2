//! Position sync orchestration
//!
//! One agent's sync is the unit of atomicity: the provider fetch feeds a
//! single repository transaction (upsert positions, close stale, append
//! summary). A provider timeout or a persistence failure discards that
//! agent's unit and nothing else; the prior consistent state stays in
//! place.

use std::sync::Arc;

use tracing::debug;

use perpsarena_db::{PerpsSyncRepo, SyncStats};
use perpsarena_provider::ProviderGateway;
use perpsarena_types::{
    AgentId, Competition, CompetitionId, Participant, ProviderAccountSummary, ProviderPosition,
};

use crate::ArenaResult;

pub struct PositionSyncer<G> {
    gateway: Arc<G>,
    sync_repo: PerpsSyncRepo,
}

impl<G: ProviderGateway> PositionSyncer<G> {
    pub fn new(gateway: Arc<G>, sync_repo: PerpsSyncRepo) -> Self {
        Self { gateway, sync_repo }
    }

    /// Fetch one agent's venue state and persist it atomically
    pub async fn sync_agent(
        &self,
        competition: &Competition,
        participant: &Participant,
    ) -> ArenaResult<SyncStats> {
        let data = self
            .gateway
            .get_account_data_batch(
                &participant.wallet_address,
                Some(competition.initial_capital),
            )
            .await?;

        let stats = self
            .persist_snapshot(
                competition.id,
                participant.agent_id,
                &data.positions,
                &data.account_summary,
            )
            .await?;

        debug!(
            competition = %competition.id,
            agent = %participant.agent_id,
            upserted = stats.upserted,
            closed_stale = stats.closed_stale,
            "agent synced"
        );
        Ok(stats)
    }

    /// Persist an already-fetched snapshot as one transaction
    ///
    /// Positions absent from the payload's open set are closed, including
    /// all of them when the venue reports zero open positions. Callers
    /// must distinguish a provider error from a legitimately empty
    /// response before invoking this, or transient failures would read as
    /// mass closures.
    pub async fn persist_snapshot(
        &self,
        competition_id: CompetitionId,
        agent_id: AgentId,
        positions: &[ProviderPosition],
        summary: &ProviderAccountSummary,
    ) -> ArenaResult<SyncStats> {
        let stats = self
            .sync_repo
            .sync_agent_data(competition_id.0, agent_id.0, positions, summary)
            .await?;
        Ok(stats)
    }
}
