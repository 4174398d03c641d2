//! Leaderboard ranking
//!
//! Entries are composed at query time from participant status, the latest
//! account snapshot, and the latest risk metrics. Active agents are ordered
//! by the competition's evaluation metric descending with missing metrics
//! strictly last and ties broken by equity descending; inactive agents sit
//! outside the metric ordering entirely, all at rank == total agent count,
//! so stale data can never lift a withdrawn agent above an active one.

use std::cmp::Ordering;
use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use perpsarena_db::{CompetitionRepo, ParticipantRepo, RiskRepo, SummaryRepo};
use perpsarena_types::{
    AgentId, CompetitionId, EvaluationMetric, ParticipantStatus, RankedAgent, RiskMetrics,
};

use crate::{ArenaError, ArenaResult};

/// Raw material for one leaderboard row
#[derive(Debug, Clone)]
pub struct AgentStanding {
    pub agent_id: AgentId,
    pub wallet_address: String,
    pub status: ParticipantStatus,
    pub equity: Decimal,
    pub metrics: Option<RiskMetrics>,
}

/// One page of a ranked leaderboard
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardPage {
    pub agents: Vec<RankedAgent>,
    pub total: usize,
}

/// Produce the total ordering for a set of standings
///
/// Every standing receives exactly one rank. Active agents are ranked
/// 1..=n by the selected metric; inactive agents all receive the last
/// place, rank == total standing count.
pub fn rank_agents(standings: Vec<AgentStanding>, metric: EvaluationMetric) -> Vec<RankedAgent> {
    let total = standings.len();
    let (mut active, inactive): (Vec<AgentStanding>, Vec<AgentStanding>) = standings
        .into_iter()
        .partition(|s| s.status.is_active());

    active.sort_by(|a, b| compare_standings(a, b, metric));

    let mut ranked: Vec<RankedAgent> = active
        .into_iter()
        .enumerate()
        .map(|(i, standing)| to_ranked(standing, i + 1, metric))
        .collect();

    ranked.extend(
        inactive
            .into_iter()
            .map(|standing| to_ranked(standing, total, metric)),
    );

    ranked
}

fn compare_standings(a: &AgentStanding, b: &AgentStanding, metric: EvaluationMetric) -> Ordering {
    let value_a = a.metrics.as_ref().and_then(|m| m.metric_value(metric));
    let value_b = b.metrics.as_ref().and_then(|m| m.metric_value(metric));

    match (value_a, value_b) {
        // Metric descending, equity descending on ties
        (Some(x), Some(y)) => y.cmp(&x).then_with(|| b.equity.cmp(&a.equity)),
        // An agent lacking the metric ranks behind every agent that has it
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => b.equity.cmp(&a.equity),
    }
}

fn to_ranked(standing: AgentStanding, rank: usize, metric: EvaluationMetric) -> RankedAgent {
    let metric_value = standing
        .metrics
        .as_ref()
        .and_then(|m| m.metric_value(metric));
    RankedAgent {
        rank,
        agent_id: standing.agent_id,
        wallet_address: standing.wallet_address,
        status: standing.status,
        equity: standing.equity,
        metric_value,
        risk_metrics: standing.metrics,
    }
}

/// Query-time leaderboard assembly
pub struct LeaderboardRanker {
    competitions: CompetitionRepo,
    participants: ParticipantRepo,
    summaries: SummaryRepo,
    risk: RiskRepo,
}

impl LeaderboardRanker {
    pub fn new(
        competitions: CompetitionRepo,
        participants: ParticipantRepo,
        summaries: SummaryRepo,
        risk: RiskRepo,
    ) -> Self {
        Self {
            competitions,
            participants,
            summaries,
            risk,
        }
    }

    /// Ranked agents for a competition, paged
    pub async fn competition_agents_with_metrics(
        &self,
        competition_id: CompetitionId,
        offset: usize,
        limit: usize,
    ) -> ArenaResult<LeaderboardPage> {
        let competition = self
            .competitions
            .find(competition_id.0)
            .await?
            .ok_or_else(|| ArenaError::NotFound(format!("competition {}", competition_id)))?
            .into_domain()?;

        let participants = self.participants.list(competition_id.0).await?;

        let equities: HashMap<uuid::Uuid, Decimal> = self
            .summaries
            .latest_for_competition(competition_id.0)
            .await?
            .into_iter()
            .map(|s| (s.agent_id, s.total_equity))
            .collect();

        let metrics: HashMap<uuid::Uuid, RiskMetrics> = self
            .risk
            .latest_for_competition(competition_id.0)
            .await?
            .into_iter()
            .map(|m| (m.agent_id, m.into_domain()))
            .collect();

        let mut standings = Vec::with_capacity(participants.len());
        for row in participants {
            let participant = row.into_domain()?;
            standings.push(AgentStanding {
                equity: equities
                    .get(&participant.agent_id.0)
                    .copied()
                    .unwrap_or(Decimal::ZERO),
                metrics: metrics.get(&participant.agent_id.0).cloned(),
                agent_id: participant.agent_id,
                wallet_address: participant.wallet_address,
                status: participant.status,
            });
        }

        let ranked = rank_agents(standings, competition.evaluation_metric);
        let total = ranked.len();
        let agents = ranked.into_iter().skip(offset).take(limit).collect();

        Ok(LeaderboardPage { agents, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn standing(
        status: ParticipantStatus,
        equity: Decimal,
        calmar: Option<Decimal>,
    ) -> AgentStanding {
        let agent_id = AgentId::new();
        let metrics = calmar.map(|value| {
            let mut m = RiskMetrics::unavailable(agent_id, CompetitionId::new());
            m.calmar_ratio = Some(value);
            m
        });
        AgentStanding {
            agent_id,
            wallet_address: format!("0x{}", agent_id.0.simple()),
            status,
            equity,
            metrics,
        }
    }

    #[test]
    fn test_metric_descending_with_equity_tie_break() {
        // A: calmar 1.5 / equity 1200, B: calmar null / equity 1500,
        // C: calmar 1.5 / equity 1300. Expect C, A, B
        let a = standing(ParticipantStatus::Active, dec!(1200), Some(dec!(1.5)));
        let b = standing(ParticipantStatus::Active, dec!(1500), None);
        let c = standing(ParticipantStatus::Active, dec!(1300), Some(dec!(1.5)));
        let (a_id, b_id, c_id) = (a.agent_id, b.agent_id, c.agent_id);

        let ranked = rank_agents(vec![a, b, c], EvaluationMetric::CalmarRatio);

        assert_eq!(ranked[0].agent_id, c_id);
        assert_eq!(ranked[1].agent_id, a_id);
        // B ranks last despite the highest equity: metric presence dominates
        assert_eq!(ranked[2].agent_id, b_id);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].rank, 2);
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn test_inactive_agents_all_take_last_place() {
        let active = standing(ParticipantStatus::Active, dec!(900), Some(dec!(0.5)));
        let withdrawn = standing(ParticipantStatus::Withdrawn, dec!(5000), Some(dec!(9.9)));
        let disqualified = standing(ParticipantStatus::Disqualified, dec!(4000), None);
        let active_id = active.agent_id;

        let ranked = rank_agents(
            vec![withdrawn, active, disqualified],
            EvaluationMetric::CalmarRatio,
        );

        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].agent_id, active_id);
        assert_eq!(ranked[0].rank, 1);
        // Inactive agents never outrank an active one, whatever their data says
        assert_eq!(ranked[1].rank, 3);
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn test_every_agent_receives_exactly_one_rank() {
        let standings = vec![
            standing(ParticipantStatus::Active, dec!(100), Some(dec!(2))),
            standing(ParticipantStatus::Active, dec!(200), None),
            standing(ParticipantStatus::Withdrawn, dec!(300), None),
            standing(ParticipantStatus::Active, dec!(400), Some(dec!(1))),
        ];
        let ids: Vec<AgentId> = standings.iter().map(|s| s.agent_id).collect();

        let ranked = rank_agents(standings, EvaluationMetric::CalmarRatio);

        assert_eq!(ranked.len(), ids.len());
        for id in ids {
            assert_eq!(ranked.iter().filter(|r| r.agent_id == id).count(), 1);
        }
    }

    #[test]
    fn test_all_null_metrics_fall_back_to_equity() {
        let poor = standing(ParticipantStatus::Active, dec!(800), None);
        let rich = standing(ParticipantStatus::Active, dec!(2000), None);
        let rich_id = rich.agent_id;

        let ranked = rank_agents(vec![poor, rich], EvaluationMetric::SortinoRatio);
        assert_eq!(ranked[0].agent_id, rich_id);
    }

    #[test]
    fn test_empty_leaderboard() {
        let ranked = rank_agents(Vec::new(), EvaluationMetric::SimpleReturn);
        assert!(ranked.is_empty());
    }
}
