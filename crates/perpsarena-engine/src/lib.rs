//! PerpsArena Engine - Competition Lifecycle and Sync/Ranking Core
//!
//! This crate is the heart of the platform: it advances competitions
//! through their lifecycle with exactly-once transition semantics, enforces
//! participant capacity under concurrent joins, pulls position and account
//! data from the trading venue, computes risk-adjusted performance metrics,
//! and assembles the ranked leaderboard.
//!
//! # Components
//!
//! - [`lifecycle::CompetitionLifecycle`]: conditional status transitions
//! - [`registry::ParticipantRegistry`]: capacity-checked membership
//! - [`sync::PositionSyncer`]: atomic per-agent position/account sync
//! - [`batch::BatchCoordinator`]: bounded-concurrency fan-out with
//!   partial-failure isolation and systemic-failure detection
//! - [`risk::RiskEngine`]: Calmar/Sortino/drawdown computation
//! - [`ranking::LeaderboardRanker`]: total ordering with null-last metrics
//!
//! # Failure Policy
//!
//! Single-entity operations return typed errors on any invariant
//! violation. Batch operations never throw on partial failure: they return
//! a structured success/failure partition, and systemic-failure detection
//! is an observability signal rather than a control-flow abort.
//!
//! # Example
//!
//! ```ignore
//! use perpsarena_engine::{BatchConfig, PerpsEngine};
//!
//! let engine = PerpsEngine::new(&db, gateway, BatchConfig::default());
//! engine.join_competition(competition_id, agent_id, "0xabc...").await?;
//!
//! // Invoked periodically by the external job runner
//! let report = engine.process_perps_competition(competition_id).await?;
//! println!("synced {}, failed {}", report.sync.successful.len(), report.sync.failed.len());
//! ```

pub mod batch;
pub mod lifecycle;
pub mod ranking;
pub mod registry;
pub mod risk;
pub mod sync;

use std::sync::Arc;

use thiserror::Error;

use perpsarena_db::{Database, DbError};
use perpsarena_provider::{ProviderError, ProviderGateway};
use perpsarena_types::{AgentId, Competition, CompetitionId, Participant};

pub use batch::{AgentFailure, BatchConfig, BatchCoordinator, BatchOutcome, ProcessReport, RiskOutcome};
pub use lifecycle::CompetitionLifecycle;
pub use ranking::{AgentStanding, LeaderboardPage, LeaderboardRanker};
pub use registry::ParticipantRegistry;
pub use risk::{compute_risk_metrics, EquityPoint, RiskComputation, RiskEngine};
pub use sync::PositionSyncer;

// Re-export the join outcome so callers don't need the db crate
pub use perpsarena_db::JoinOutcome;

/// Engine errors
#[derive(Debug, Error)]
pub enum ArenaError {
    #[error("Competition is full (max {max} participants)")]
    CapacityExceeded { max: i32 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Database error: {0}")]
    Db(DbError),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<DbError> for ArenaError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::CapacityExceeded { max } => ArenaError::CapacityExceeded { max },
            DbError::NotFound(what) => ArenaError::NotFound(what),
            other => ArenaError::Db(other),
        }
    }
}

/// Result type for engine operations
pub type ArenaResult<T> = Result<T, ArenaError>;

/// Facade wiring the engine components over one database and one provider
/// gateway
///
/// This is the surface the HTTP layer and the external job scheduler call
/// into.
pub struct PerpsEngine<G> {
    lifecycle: CompetitionLifecycle,
    registry: ParticipantRegistry,
    coordinator: BatchCoordinator<G>,
    ranker: LeaderboardRanker,
}

impl<G: ProviderGateway> PerpsEngine<G> {
    pub fn new(db: &Database, gateway: Arc<G>, config: BatchConfig) -> Self {
        let syncer = PositionSyncer::new(gateway, db.sync_repo());
        let risk = RiskEngine::new(db.summary_repo(), db.risk_repo());
        let coordinator = BatchCoordinator::new(
            CompetitionLifecycle::new(db.competition_repo()),
            ParticipantRegistry::new(db.participant_repo()),
            syncer,
            risk,
            config,
        );

        Self {
            lifecycle: CompetitionLifecycle::new(db.competition_repo()),
            registry: ParticipantRegistry::new(db.participant_repo()),
            coordinator,
            ranker: LeaderboardRanker::new(
                db.competition_repo(),
                db.participant_repo(),
                db.summary_repo(),
                db.risk_repo(),
            ),
        }
    }

    // ------------------------------------------------------------------
    // Competitions
    // ------------------------------------------------------------------

    pub async fn create_competition(&self, competition: &Competition) -> ArenaResult<Competition> {
        self.lifecycle.create(competition).await
    }

    pub async fn get_competition(&self, id: CompetitionId) -> ArenaResult<Competition> {
        self.lifecycle.get(id).await
    }

    pub async fn start_competition(&self, id: CompetitionId) -> ArenaResult<Option<Competition>> {
        self.lifecycle.mark_active(id).await
    }

    /// Claim the end of an active competition; `None` means another
    /// scheduler already did.
    pub async fn mark_competition_as_ending(
        &self,
        id: CompetitionId,
    ) -> ArenaResult<Option<Competition>> {
        self.lifecycle.mark_ending(id).await
    }

    /// Finalize an ending competition exactly once.
    pub async fn mark_competition_as_ended(
        &self,
        id: CompetitionId,
    ) -> ArenaResult<Option<Competition>> {
        self.lifecycle.mark_ended(id).await
    }

    /// Competitions the scheduler should try to finalize
    pub async fn competitions_needing_ending(&self) -> ArenaResult<Vec<Competition>> {
        self.lifecycle.needing_ending().await
    }

    // ------------------------------------------------------------------
    // Participants
    // ------------------------------------------------------------------

    pub async fn join_competition(
        &self,
        competition_id: CompetitionId,
        agent_id: AgentId,
        wallet_address: &str,
    ) -> ArenaResult<JoinOutcome> {
        self.registry.join(competition_id, agent_id, wallet_address).await
    }

    pub async fn bulk_join(
        &self,
        competition_id: CompetitionId,
        agents: &[(AgentId, String)],
    ) -> ArenaResult<Vec<AgentId>> {
        self.registry.bulk_join(competition_id, agents).await
    }

    pub async fn leave_competition(
        &self,
        competition_id: CompetitionId,
        agent_id: AgentId,
        reason: Option<&str>,
    ) -> ArenaResult<bool> {
        self.registry.leave(competition_id, agent_id, reason).await
    }

    pub async fn disqualify_agent(
        &self,
        competition_id: CompetitionId,
        agent_id: AgentId,
        reason: &str,
    ) -> ArenaResult<bool> {
        self.registry.disqualify(competition_id, agent_id, reason).await
    }

    pub async fn reactivate_agent(
        &self,
        competition_id: CompetitionId,
        agent_id: AgentId,
    ) -> ArenaResult<bool> {
        self.registry.reactivate(competition_id, agent_id).await
    }

    pub async fn get_participant(
        &self,
        competition_id: CompetitionId,
        agent_id: AgentId,
    ) -> ArenaResult<Option<Participant>> {
        self.registry.find(competition_id, agent_id).await
    }

    // ------------------------------------------------------------------
    // Sync & Leaderboard
    // ------------------------------------------------------------------

    /// The scheduled entry point: sync every active agent, then recompute
    /// risk metrics for the agents that synced.
    pub async fn process_perps_competition(
        &self,
        competition_id: CompetitionId,
    ) -> ArenaResult<ProcessReport> {
        self.coordinator.process_competition_agents(competition_id).await
    }

    /// Ranked leaderboard page for a competition
    pub async fn get_competition_agents_with_metrics(
        &self,
        competition_id: CompetitionId,
        offset: usize,
        limit: usize,
    ) -> ArenaResult<LeaderboardPage> {
        self.ranker
            .competition_agents_with_metrics(competition_id, offset, limit)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_error_surfaces_from_db_layer() {
        let err: ArenaError = DbError::CapacityExceeded { max: 2 }.into();
        assert!(matches!(err, ArenaError::CapacityExceeded { max: 2 }));
    }

    #[test]
    fn test_not_found_maps_through() {
        let err: ArenaError = DbError::NotFound("competition x".to_string()).into();
        assert!(matches!(err, ArenaError::NotFound(_)));
    }

    #[test]
    fn test_provider_timeout_wraps() {
        let err: ArenaError = ProviderError::Timeout.into();
        assert!(matches!(err, ArenaError::Provider(ProviderError::Timeout)));
    }
}
