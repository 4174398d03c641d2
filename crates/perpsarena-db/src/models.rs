//! Database row models
//!
//! Rows are plain `FromRow` structs with text-encoded enums; `into_domain`
//! converts to the shared domain types, rejecting rows whose enum columns
//! no longer parse.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use perpsarena_types::{
    AccountSummary, AgentId, Competition, CompetitionId, CompetitionStatus, EvaluationMetric,
    Participant, ParticipantStatus, PerpsPosition, PositionSide, PositionStatus, RiskMetrics,
};

use crate::DbResult;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbCompetition {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub max_participants: Option<i32>,
    pub registered_participants: i32,
    pub initial_capital: Decimal,
    pub evaluation_metric: String,
    pub created_at: DateTime<Utc>,
}

impl DbCompetition {
    pub fn into_domain(self) -> DbResult<Competition> {
        Ok(Competition {
            id: CompetitionId::from_uuid(self.id),
            name: self.name,
            status: CompetitionStatus::parse(&self.status)?,
            start_date: self.start_date,
            end_date: self.end_date,
            max_participants: self.max_participants,
            registered_participants: self.registered_participants,
            initial_capital: self.initial_capital,
            evaluation_metric: EvaluationMetric::parse(&self.evaluation_metric)?,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbParticipant {
    pub competition_id: Uuid,
    pub agent_id: Uuid,
    pub wallet_address: String,
    pub status: String,
    pub deactivation_reason: Option<String>,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub joined_at: DateTime<Utc>,
}

impl DbParticipant {
    pub fn into_domain(self) -> DbResult<Participant> {
        Ok(Participant {
            competition_id: CompetitionId::from_uuid(self.competition_id),
            agent_id: AgentId::from_uuid(self.agent_id),
            wallet_address: self.wallet_address,
            status: ParticipantStatus::parse(&self.status)?,
            deactivation_reason: self.deactivation_reason,
            deactivated_at: self.deactivated_at,
            joined_at: self.joined_at,
        })
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbPerpsPosition {
    pub provider_position_id: String,
    pub competition_id: Uuid,
    pub agent_id: Uuid,
    pub asset: String,
    pub side: String,
    pub leverage: Decimal,
    pub size: Decimal,
    pub collateral: Decimal,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    pub liquidation_price: Option<Decimal>,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl DbPerpsPosition {
    pub fn into_domain(self) -> DbResult<PerpsPosition> {
        Ok(PerpsPosition {
            provider_position_id: self.provider_position_id,
            competition_id: CompetitionId::from_uuid(self.competition_id),
            agent_id: AgentId::from_uuid(self.agent_id),
            asset: self.asset,
            side: PositionSide::parse(&self.side)?,
            leverage: self.leverage,
            size: self.size,
            collateral: self.collateral,
            entry_price: self.entry_price,
            current_price: self.current_price,
            liquidation_price: self.liquidation_price,
            unrealized_pnl: self.unrealized_pnl,
            realized_pnl: self.realized_pnl,
            status: PositionStatus::parse(&self.status)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            closed_at: self.closed_at,
        })
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbAccountSummary {
    pub id: i64,
    pub agent_id: Uuid,
    pub competition_id: Uuid,
    pub total_equity: Decimal,
    pub initial_capital: Decimal,
    pub total_volume: Decimal,
    pub total_unrealized_pnl: Decimal,
    pub total_realized_pnl: Decimal,
    pub total_pnl: Decimal,
    pub roi: Decimal,
    pub total_trades: i32,
    pub open_positions: i32,
    pub captured_at: DateTime<Utc>,
}

impl DbAccountSummary {
    pub fn into_domain(self) -> AccountSummary {
        AccountSummary {
            agent_id: AgentId::from_uuid(self.agent_id),
            competition_id: CompetitionId::from_uuid(self.competition_id),
            total_equity: self.total_equity,
            initial_capital: self.initial_capital,
            total_volume: self.total_volume,
            total_unrealized_pnl: self.total_unrealized_pnl,
            total_realized_pnl: self.total_realized_pnl,
            total_pnl: self.total_pnl,
            roi: self.roi,
            total_trades: self.total_trades,
            open_positions: self.open_positions,
            captured_at: self.captured_at,
        }
    }
}

/// One point of an agent's equity curve
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbEquityPoint {
    pub total_equity: Decimal,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbRiskMetrics {
    pub agent_id: Uuid,
    pub competition_id: Uuid,
    pub simple_return: Option<Decimal>,
    pub annualized_return: Option<Decimal>,
    pub max_drawdown: Option<Decimal>,
    pub calmar_ratio: Option<Decimal>,
    pub downside_deviation: Option<Decimal>,
    pub sortino_ratio: Option<Decimal>,
    pub computed_at: DateTime<Utc>,
}

impl DbRiskMetrics {
    pub fn into_domain(self) -> RiskMetrics {
        RiskMetrics {
            agent_id: AgentId::from_uuid(self.agent_id),
            competition_id: CompetitionId::from_uuid(self.competition_id),
            simple_return: self.simple_return,
            annualized_return: self.annualized_return,
            max_drawdown: self.max_drawdown,
            calmar_ratio: self.calmar_ratio,
            downside_deviation: self.downside_deviation,
            sortino_ratio: self.sortino_ratio,
            computed_at: self.computed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_competition_row(status: &str) -> DbCompetition {
        DbCompetition {
            id: Uuid::new_v4(),
            name: "Perps Cup".to_string(),
            status: status.to_string(),
            start_date: Utc::now(),
            end_date: Utc::now(),
            max_participants: Some(100),
            registered_participants: 3,
            initial_capital: dec!(10000),
            evaluation_metric: "calmar_ratio".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_competition_into_domain() {
        let comp = sample_competition_row("active").into_domain().unwrap();
        assert_eq!(comp.status, CompetitionStatus::Active);
        assert_eq!(comp.registered_participants, 3);
        assert_eq!(comp.evaluation_metric, EvaluationMetric::CalmarRatio);
    }

    #[test]
    fn test_corrupt_status_rejected() {
        let result = sample_competition_row("paused").into_domain();
        assert!(matches!(result, Err(crate::DbError::CorruptRow(_))));
    }
}
