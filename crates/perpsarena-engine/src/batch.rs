//! Batch sync coordination
//!
//! Drives the per-agent sync and the downstream risk computation across a
//! whole competition. Agents are processed in fixed-size groups with the
//! provider calls issued concurrently inside each group; every task
//! returns its own `Result`, so one agent's failure never cancels or rolls
//! back a sibling. The run always produces a structured success/failure
//! partition; partial leaderboard data beats none during a live
//! competition.
//!
//! Two failure tiers are tracked: a group whose failure rate crosses
//! `group_failure_threshold` is a local anomaly (logged); when the share
//! of such groups crosses `systemic_threshold` the run raises a systemic
//! alert (venue-wide outage territory) and keeps processing the rest.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info, warn};

use perpsarena_provider::ProviderGateway;
use perpsarena_types::{AgentId, CompetitionId};

use crate::lifecycle::CompetitionLifecycle;
use crate::registry::ParticipantRegistry;
use crate::risk::RiskEngine;
use crate::sync::PositionSyncer;
use crate::ArenaResult;

/// Coordinator policy knobs
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Agents per concurrently-processed group
    pub group_size: usize,
    /// Failure rate at which a single group counts as degraded
    pub group_failure_threshold: f64,
    /// Share of degraded groups that raises the systemic alert
    pub systemic_threshold: f64,
    /// Retry attempts for downstream risk computation
    pub max_retries: u32,
    /// First retry delay; doubles per attempt
    pub base_delay: Duration,
    /// Ceiling on the retry delay
    pub max_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            group_size: 10,
            group_failure_threshold: 0.8,
            systemic_threshold: 0.5,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// A failed agent with the error that sank it
#[derive(Debug, Clone, Serialize)]
pub struct AgentFailure {
    pub agent_id: AgentId,
    pub error: String,
}

/// Success/failure partition of one sync pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub successful: Vec<AgentId>,
    pub failed: Vec<AgentFailure>,
}

impl BatchOutcome {
    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len()
    }
}

/// Success/failure partition of the risk-metric stage
#[derive(Debug, Clone, Default, Serialize)]
pub struct RiskOutcome {
    pub computed: Vec<AgentId>,
    pub failed: Vec<AgentFailure>,
}

/// Everything one scheduled run produced
#[derive(Debug, Clone, Serialize)]
pub struct ProcessReport {
    pub competition_id: CompetitionId,
    pub sync: BatchOutcome,
    pub risk: RiskOutcome,
    /// Raised when degraded groups crossed the systemic threshold
    pub systemic_alert: bool,
}

/// Fraction of a group that failed
pub(crate) fn group_failure_rate(group_len: usize, failures: usize) -> f64 {
    if group_len == 0 {
        return 0.0;
    }
    failures as f64 / group_len as f64
}

/// Whether the run as a whole looks like an upstream outage
pub(crate) fn is_systemic(degraded_groups: usize, total_groups: usize, threshold: f64) -> bool {
    if total_groups == 0 {
        return false;
    }
    degraded_groups as f64 / total_groups as f64 >= threshold
}

/// Exponential backoff delay for the given attempt (0-based)
pub(crate) fn backoff_delay(base: Duration, cap: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt)).min(cap)
}

/// Retry an async operation with capped exponential backoff
pub(crate) async fn retry_with_backoff<T, E, F, Fut>(
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_with_backoff_if(max_retries, base_delay, max_delay, operation, |_| true).await
}

/// Retry with backoff, but only while `retryable` holds for the error
///
/// A non-retryable error is returned immediately: a failed transaction is
/// not a transient venue hiccup and replaying it buys nothing.
pub(crate) async fn retry_with_backoff_if<T, E, F, Fut, P>(
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    mut operation: F,
    retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_retries || !retryable(&e) => return Err(e),
            Err(_) => {
                tokio::time::sleep(backoff_delay(base_delay, max_delay, attempt)).await;
                attempt += 1;
            }
        }
    }
}

pub struct BatchCoordinator<G> {
    lifecycle: CompetitionLifecycle,
    registry: ParticipantRegistry,
    syncer: PositionSyncer<G>,
    risk: RiskEngine,
    config: BatchConfig,
}

impl<G: ProviderGateway> BatchCoordinator<G> {
    pub fn new(
        lifecycle: CompetitionLifecycle,
        registry: ParticipantRegistry,
        syncer: PositionSyncer<G>,
        risk: RiskEngine,
        config: BatchConfig,
    ) -> Self {
        Self {
            lifecycle,
            registry,
            syncer,
            risk,
            config,
        }
    }

    /// Sync every active agent in a competition and recompute metrics for
    /// the ones that synced.
    ///
    /// The failure counters here are local to this run; concurrent runs
    /// for other competitions keep their own.
    pub async fn process_competition_agents(
        &self,
        competition_id: CompetitionId,
    ) -> ArenaResult<ProcessReport> {
        let competition = self.lifecycle.get(competition_id).await?;
        let agents = self.registry.active_participants(competition_id).await?;

        info!(
            competition = %competition_id,
            agents = agents.len(),
            group_size = self.config.group_size,
            "processing competition agents"
        );

        let mut sync = BatchOutcome::default();
        let mut degraded_groups = 0usize;
        let mut total_groups = 0usize;

        for group in agents.chunks(self.config.group_size.max(1)) {
            total_groups += 1;

            let results = join_all(group.iter().map(|participant| {
                let competition = &competition;
                async move {
                    // Transient venue failures retry; a persistence failure
                    // already rolled the agent's unit back and fails as-is
                    let outcome = retry_with_backoff_if(
                        self.config.max_retries,
                        self.config.base_delay,
                        self.config.max_delay,
                        || self.syncer.sync_agent(competition, participant),
                        |e| matches!(e, crate::ArenaError::Provider(_)),
                    )
                    .await;
                    (participant.agent_id, outcome)
                }
            }))
            .await;

            let mut group_failures = 0usize;
            for (agent_id, outcome) in results {
                match outcome {
                    Ok(_) => sync.successful.push(agent_id),
                    Err(e) => {
                        group_failures += 1;
                        warn!(
                            competition = %competition_id,
                            agent = %agent_id,
                            error = %e,
                            "agent sync failed"
                        );
                        sync.failed.push(AgentFailure {
                            agent_id,
                            error: e.to_string(),
                        });
                    }
                }
            }

            if group_failure_rate(group.len(), group_failures)
                >= self.config.group_failure_threshold
            {
                degraded_groups += 1;
                warn!(
                    competition = %competition_id,
                    group_failures,
                    group_size = group.len(),
                    "degraded sync group"
                );
            }
        }

        let systemic_alert = is_systemic(
            degraded_groups,
            total_groups,
            self.config.systemic_threshold,
        );
        if systemic_alert {
            // Observability signal only; remaining work still runs
            error!(
                competition = %competition_id,
                degraded_groups,
                total_groups,
                "systemic sync failure detected, likely venue-wide outage"
            );
        }

        let risk = self.compute_risk_metrics(competition_id, &sync.successful).await;

        info!(
            competition = %competition_id,
            synced = sync.successful.len(),
            sync_failed = sync.failed.len(),
            metrics_computed = risk.computed.len(),
            metrics_failed = risk.failed.len(),
            "competition processing complete"
        );

        Ok(ProcessReport {
            competition_id,
            sync,
            risk,
            systemic_alert,
        })
    }

    /// Risk metrics per synced agent, each retried independently
    async fn compute_risk_metrics(
        &self,
        competition_id: CompetitionId,
        agents: &[AgentId],
    ) -> RiskOutcome {
        let mut outcome = RiskOutcome::default();

        for group in agents.chunks(self.config.group_size.max(1)) {
            let results = join_all(group.iter().map(|agent_id| async move {
                let result = retry_with_backoff(
                    self.config.max_retries,
                    self.config.base_delay,
                    self.config.max_delay,
                    || self.risk.compute_and_store(competition_id, *agent_id),
                )
                .await;
                (*agent_id, result)
            }))
            .await;

            for (agent_id, result) in results {
                match result {
                    Ok(_) => outcome.computed.push(agent_id),
                    Err(e) => {
                        warn!(
                            competition = %competition_id,
                            agent = %agent_id,
                            error = %e,
                            "risk metric computation exhausted retries"
                        );
                        outcome.failed.push(AgentFailure {
                            agent_id,
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_group_failure_rate() {
        assert_eq!(group_failure_rate(10, 0), 0.0);
        assert_eq!(group_failure_rate(10, 8), 0.8);
        assert_eq!(group_failure_rate(0, 0), 0.0);
    }

    #[test]
    fn test_systemic_detection() {
        // Half the groups degraded at a 0.5 threshold: systemic
        assert!(is_systemic(2, 4, 0.5));
        assert!(is_systemic(4, 4, 0.5));
        assert!(!is_systemic(1, 4, 0.5));
        assert!(!is_systemic(0, 0, 0.5));
    }

    #[test]
    fn test_backoff_delay_doubles_and_caps() {
        let base = Duration::from_millis(500);
        let cap = Duration::from_secs(10);

        assert_eq!(backoff_delay(base, cap, 0), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, cap, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, cap, 2), Duration::from_secs(2));
        // Attempt 6 would be 32s uncapped
        assert_eq!(backoff_delay(base, cap, 6), cap);
        assert_eq!(backoff_delay(base, cap, 30), cap);
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);

        let result: Result<u32, &str> = retry_with_backoff(
            3,
            Duration::from_millis(1),
            Duration::from_millis(2),
            || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err("transient")
                    } else {
                        Ok(attempt)
                    }
                }
            },
        )
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_fast() {
        let calls = AtomicU32::new(0);

        let result: Result<u32, &str> = retry_with_backoff_if(
            5,
            Duration::from_millis(1),
            Duration::from_millis(2),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("fatal") }
            },
            |e| *e != "fatal",
        )
        .await;

        assert_eq!(result, Err("fatal"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);

        let result: Result<u32, &str> = retry_with_backoff(
            2,
            Duration::from_millis(1),
            Duration::from_millis(2),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("down") }
            },
        )
        .await;

        assert_eq!(result, Err("down"));
        // Initial attempt plus two retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_batch_outcome_total() {
        let outcome = BatchOutcome {
            successful: vec![AgentId::new(), AgentId::new()],
            failed: vec![AgentFailure {
                agent_id: AgentId::new(),
                error: "timeout".to_string(),
            }],
        };
        assert_eq!(outcome.total(), 3);
    }

    #[test]
    fn test_default_config_preserves_two_tier_thresholds() {
        let config = BatchConfig::default();
        assert!(config.group_failure_threshold > config.systemic_threshold);
        assert_eq!(config.group_size, 10);
    }
}
