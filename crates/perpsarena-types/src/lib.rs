//! PerpsArena Types - Domain Types for Perpetual-Futures Trading Competitions
//!
//! This crate defines the core types shared across the PerpsArena platform:
//! - Competition and participant identities and lifecycles
//! - Perpetual-futures positions synced from the trading venue
//! - Account equity snapshots and risk-adjusted performance metrics
//! - Leaderboard entries and evaluation metric selection
//!
//! # Numeric Handling
//!
//! Every money or ratio value is a [`rust_decimal::Decimal`] end-to-end.
//! Values arriving from the venue as floats or strings are converted through
//! the helpers in [`decimal`] at the boundary; non-finite inputs normalize to
//! zero (amounts) or `None` (optional ratios) and are never stored as floats.
//!
//! # Example
//!
//! ```ignore
//! use perpsarena_types::{Competition, CompetitionStatus, EvaluationMetric};
//!
//! let comp = Competition::new("Q3 Perps Cup", start, end, Some(100), dec!(10000));
//! assert_eq!(comp.status, CompetitionStatus::Pending);
//! assert!(comp.status.can_advance_to(CompetitionStatus::Active));
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Competition identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompetitionId(pub Uuid);

impl CompetitionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for CompetitionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CompetitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Agent identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Parse Errors
// ============================================================================

/// Error returned when a persisted enum value cannot be parsed
#[derive(Debug, Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

// ============================================================================
// Competition
// ============================================================================

/// Competition lifecycle status
///
/// Transitions are strictly forward: `Pending → Active → Ending → Ended`.
/// `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetitionStatus {
    /// Created but not yet started
    Pending,
    /// Competition is live, agents are being synced and ranked
    Active,
    /// End claimed by a scheduler, finalization in progress
    Ending,
    /// Finalized, results frozen
    Ended,
}

impl CompetitionStatus {
    /// String form as persisted in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Ending => "ending",
            Self::Ended => "ended",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ParseEnumError> {
        match value {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "ending" => Ok(Self::Ending),
            "ended" => Ok(Self::Ended),
            other => Err(ParseEnumError {
                kind: "competition status",
                value: other.to_string(),
            }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended)
    }

    /// Check whether a forward transition to `target` is legal
    pub fn can_advance_to(&self, target: CompetitionStatus) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Active)
                | (Self::Active, Self::Ending)
                | (Self::Ending, Self::Ended)
        )
    }
}

impl fmt::Display for CompetitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A trading competition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Competition {
    /// Competition ID
    pub id: CompetitionId,
    /// Display name
    pub name: String,
    /// Current lifecycle status
    pub status: CompetitionStatus,
    /// Scheduled start
    pub start_date: DateTime<Utc>,
    /// Scheduled (or actual, once ending) end
    pub end_date: DateTime<Utc>,
    /// Participant capacity; `None` means unlimited
    pub max_participants: Option<i32>,
    /// Denormalized count of participants whose status is `active`
    pub registered_participants: i32,
    /// Starting equity per agent, passed to the venue as the initial-capital hint
    pub initial_capital: Decimal,
    /// Metric the public leaderboard ranks by
    pub evaluation_metric: EvaluationMetric,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
}

impl Competition {
    /// Create a new pending competition
    pub fn new(
        name: impl Into<String>,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        max_participants: Option<i32>,
        initial_capital: Decimal,
    ) -> Self {
        Self {
            id: CompetitionId::new(),
            name: name.into(),
            status: CompetitionStatus::Pending,
            start_date,
            end_date,
            max_participants,
            registered_participants: 0,
            initial_capital,
            evaluation_metric: EvaluationMetric::default(),
            created_at: Utc::now(),
        }
    }

    /// Check whether `additional` more active participants would fit
    pub fn has_capacity_for(&self, additional: i32) -> bool {
        match self.max_participants {
            Some(max) => self.registered_participants + additional <= max,
            None => true,
        }
    }

    /// Check whether the scheduled end has passed
    pub fn is_past_end(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_date
    }
}

// ============================================================================
// Participant
// ============================================================================

/// Participation status of an agent within a competition
///
/// Soft state only: participant rows are never deleted, they transition
/// away from `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    Active,
    Withdrawn,
    Disqualified,
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Withdrawn => "withdrawn",
            Self::Disqualified => "disqualified",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ParseEnumError> {
        match value {
            "active" => Ok(Self::Active),
            "withdrawn" => Ok(Self::Withdrawn),
            "disqualified" => Ok(Self::Disqualified),
            other => Err(ParseEnumError {
                kind: "participant status",
                value: other.to_string(),
            }),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for ParticipantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An agent's membership in a competition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub competition_id: CompetitionId,
    pub agent_id: AgentId,
    /// Venue account the sync pipeline pulls position data from
    pub wallet_address: String,
    pub status: ParticipantStatus,
    /// Reason recorded when the participant left `Active`
    pub deactivation_reason: Option<String>,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub joined_at: DateTime<Utc>,
}

// ============================================================================
// Perpetual-Futures Positions
// ============================================================================

/// Position direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ParseEnumError> {
        match value {
            "long" => Ok(Self::Long),
            "short" => Ok(Self::Short),
            other => Err(ParseEnumError {
                kind: "position side",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Position lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    /// Reported open by the venue in the most recent sync
    Open,
    /// No longer reported open; stamped with `closed_at`
    Closed,
    /// Force-closed by the venue's liquidation engine
    Liquidated,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Liquidated => "liquidated",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ParseEnumError> {
        match value {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            "liquidated" => Ok(Self::Liquidated),
            other => Err(ParseEnumError {
                kind: "position status",
                value: other.to_string(),
            }),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A perpetual-futures position as synced from the venue
///
/// Identity is `(provider_position_id, competition_id)`. Re-syncing the same
/// provider data overwrites only the mutable fields (current price, P&L,
/// status, timestamps), never the identity or entry fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerpsPosition {
    /// Venue-assigned position identifier
    pub provider_position_id: String,
    pub competition_id: CompetitionId,
    pub agent_id: AgentId,
    /// Underlying asset symbol (e.g. "ETH", "BTC")
    pub asset: String,
    pub side: PositionSide,
    pub leverage: Decimal,
    /// Position size in base units, always positive
    pub size: Decimal,
    /// Margin backing the position
    pub collateral: Decimal,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    pub liquidation_price: Option<Decimal>,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub status: PositionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Account Summary
// ============================================================================

/// Point-in-time account snapshot for an agent in a competition
///
/// Append-only; the latest row by `captured_at` is the current value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSummary {
    pub agent_id: AgentId,
    pub competition_id: CompetitionId,
    /// Total account equity (collateral + unrealized P&L)
    pub total_equity: Decimal,
    /// Capital the agent started the competition with
    pub initial_capital: Decimal,
    /// Cumulative traded volume
    pub total_volume: Decimal,
    pub total_unrealized_pnl: Decimal,
    pub total_realized_pnl: Decimal,
    pub total_pnl: Decimal,
    /// Return on initial capital
    pub roi: Decimal,
    pub total_trades: i32,
    pub open_positions: i32,
    pub captured_at: DateTime<Utc>,
}

// ============================================================================
// Risk Metrics
// ============================================================================

/// Metric the leaderboard ranks agents by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMetric {
    CalmarRatio,
    SortinoRatio,
    SimpleReturn,
}

impl EvaluationMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CalmarRatio => "calmar_ratio",
            Self::SortinoRatio => "sortino_ratio",
            Self::SimpleReturn => "simple_return",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ParseEnumError> {
        match value {
            "calmar_ratio" => Ok(Self::CalmarRatio),
            "sortino_ratio" => Ok(Self::SortinoRatio),
            "simple_return" => Ok(Self::SimpleReturn),
            other => Err(ParseEnumError {
                kind: "evaluation metric",
                value: other.to_string(),
            }),
        }
    }
}

impl Default for EvaluationMetric {
    fn default() -> Self {
        Self::CalmarRatio
    }
}

impl fmt::Display for EvaluationMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Risk-adjusted performance metrics for an agent in a competition
///
/// A metric that cannot be computed (insufficient history, zero drawdown,
/// no losing periods) is `None`. `None` and zero are distinct: a missing
/// value must never be conflated with a computed zero downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub agent_id: AgentId,
    pub competition_id: CompetitionId,
    /// (latest equity - initial capital) / initial capital
    pub simple_return: Option<Decimal>,
    /// Linearized annualization of the simple return
    pub annualized_return: Option<Decimal>,
    /// Largest peak-to-trough relative equity decline
    pub max_drawdown: Option<Decimal>,
    /// Annualized return / max drawdown
    pub calmar_ratio: Option<Decimal>,
    /// Deviation of negative inter-snapshot returns
    pub downside_deviation: Option<Decimal>,
    /// Annualized return / downside deviation
    pub sortino_ratio: Option<Decimal>,
    pub computed_at: DateTime<Utc>,
}

impl RiskMetrics {
    /// Create an empty metrics record (everything unavailable)
    pub fn unavailable(agent_id: AgentId, competition_id: CompetitionId) -> Self {
        Self {
            agent_id,
            competition_id,
            simple_return: None,
            annualized_return: None,
            max_drawdown: None,
            calmar_ratio: None,
            downside_deviation: None,
            sortino_ratio: None,
            computed_at: Utc::now(),
        }
    }

    /// Value of the selected evaluation metric, if available
    pub fn metric_value(&self, metric: EvaluationMetric) -> Option<Decimal> {
        match metric {
            EvaluationMetric::CalmarRatio => self.calmar_ratio,
            EvaluationMetric::SortinoRatio => self.sortino_ratio,
            EvaluationMetric::SimpleReturn => self.simple_return,
        }
    }
}

// ============================================================================
// Leaderboard
// ============================================================================

/// A ranked agent as returned by leaderboard queries
///
/// Composed at query time from participant status, the latest account
/// snapshot, and the latest risk metrics. Never persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedAgent {
    /// 1-indexed rank; inactive agents all carry rank == total agent count
    pub rank: usize,
    pub agent_id: AgentId,
    pub wallet_address: String,
    pub status: ParticipantStatus,
    /// Latest total equity; zero when no snapshot exists yet
    pub equity: Decimal,
    /// Value of the competition's evaluation metric, if computed
    pub metric_value: Option<Decimal>,
    /// Full latest risk metrics, when computed
    pub risk_metrics: Option<RiskMetrics>,
}

// ============================================================================
// Provider Payloads
// ============================================================================

/// A position as reported by the venue data provider, already normalized
/// through `Decimal`
///
/// Carries no competition or agent identity; the sync pipeline attaches
/// those when persisting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderPosition {
    pub provider_position_id: String,
    pub asset: String,
    pub side: PositionSide,
    pub leverage: Decimal,
    pub size: Decimal,
    pub collateral: Decimal,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    pub liquidation_price: Option<Decimal>,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub status: PositionStatus,
}

/// An account snapshot as reported by the venue data provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAccountSummary {
    pub total_equity: Decimal,
    pub initial_capital: Decimal,
    pub total_volume: Decimal,
    pub total_unrealized_pnl: Decimal,
    pub total_realized_pnl: Decimal,
    pub total_pnl: Decimal,
    pub roi: Decimal,
    pub total_trades: i32,
    pub open_positions: i32,
}

/// Combined account payload, used when the venue exposes a single endpoint
/// for both summary and positions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAccountData {
    pub account_summary: ProviderAccountSummary,
    pub positions: Vec<ProviderPosition>,
}

// ============================================================================
// Decimal Boundary Helpers
// ============================================================================

/// Conversions for values crossing the venue boundary
pub mod decimal {
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    /// Convert a float from a venue payload into a `Decimal`
    ///
    /// Non-finite inputs (NaN, ±inf) return `None`.
    pub fn from_f64(value: f64) -> Option<Decimal> {
        if !value.is_finite() {
            return None;
        }
        Decimal::from_f64(value)
    }

    /// Convert a float, normalizing anything unrepresentable to zero
    pub fn from_f64_or_zero(value: f64) -> Decimal {
        from_f64(value).unwrap_or(Decimal::ZERO)
    }

    /// Parse a decimal string from a venue payload
    ///
    /// Venues commonly serialize amounts as strings to dodge float precision;
    /// scientific notation is accepted. Unparseable input returns `None`.
    pub fn parse(value: &str) -> Option<Decimal> {
        Decimal::from_str(value)
            .ok()
            .or_else(|| Decimal::from_scientific(value).ok())
    }

    /// Parse a decimal string, normalizing unparseable input to zero
    pub fn parse_or_zero(value: &str) -> Decimal {
        parse(value).unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_transitions_are_forward_only() {
        use CompetitionStatus::*;

        assert!(Pending.can_advance_to(Active));
        assert!(Active.can_advance_to(Ending));
        assert!(Ending.can_advance_to(Ended));

        assert!(!Active.can_advance_to(Pending));
        assert!(!Ending.can_advance_to(Active));
        assert!(!Ended.can_advance_to(Ending));
        assert!(!Pending.can_advance_to(Ending));
        assert!(Ended.is_terminal());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            CompetitionStatus::Pending,
            CompetitionStatus::Active,
            CompetitionStatus::Ending,
            CompetitionStatus::Ended,
        ] {
            assert_eq!(CompetitionStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(CompetitionStatus::parse("cancelled").is_err());
    }

    #[test]
    fn test_participant_status_round_trip() {
        for status in [
            ParticipantStatus::Active,
            ParticipantStatus::Withdrawn,
            ParticipantStatus::Disqualified,
        ] {
            assert_eq!(ParticipantStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(ParticipantStatus::Active.is_active());
        assert!(!ParticipantStatus::Withdrawn.is_active());
    }

    #[test]
    fn test_competition_capacity() {
        let now = Utc::now();
        let mut comp = Competition::new("Test", now, now, Some(2), dec!(10000));

        assert!(comp.has_capacity_for(1));
        assert!(comp.has_capacity_for(2));
        assert!(!comp.has_capacity_for(3));

        comp.registered_participants = 2;
        assert!(!comp.has_capacity_for(1));

        comp.max_participants = None;
        assert!(comp.has_capacity_for(1000));
    }

    #[test]
    fn test_metric_selection() {
        let mut metrics = RiskMetrics::unavailable(AgentId::new(), CompetitionId::new());
        metrics.calmar_ratio = Some(dec!(1.5));
        metrics.simple_return = Some(dec!(0.2));

        assert_eq!(metrics.metric_value(EvaluationMetric::CalmarRatio), Some(dec!(1.5)));
        assert_eq!(metrics.metric_value(EvaluationMetric::SimpleReturn), Some(dec!(0.2)));
        assert_eq!(metrics.metric_value(EvaluationMetric::SortinoRatio), None);
    }

    #[test]
    fn test_decimal_from_f64() {
        assert_eq!(decimal::from_f64(1.5), Some(dec!(1.5)));
        assert_eq!(decimal::from_f64(f64::NAN), None);
        assert_eq!(decimal::from_f64(f64::INFINITY), None);
        assert_eq!(decimal::from_f64_or_zero(f64::NEG_INFINITY), Decimal::ZERO);
    }

    #[test]
    fn test_decimal_parse() {
        assert_eq!(decimal::parse("3245.07"), Some(dec!(3245.07)));
        assert_eq!(decimal::parse("-0.25"), Some(dec!(-0.25)));
        // Scientific notation must not corrupt stored values
        assert_eq!(decimal::parse("1.2e3"), Some(dec!(1200)));
        assert_eq!(decimal::parse("garbage"), None);
        assert_eq!(decimal::parse_or_zero("garbage"), Decimal::ZERO);
    }

    #[test]
    fn test_evaluation_metric_round_trip() {
        for metric in [
            EvaluationMetric::CalmarRatio,
            EvaluationMetric::SortinoRatio,
            EvaluationMetric::SimpleReturn,
        ] {
            assert_eq!(EvaluationMetric::parse(metric.as_str()).unwrap(), metric);
        }
        assert!(EvaluationMetric::parse("sharpe_ratio").is_err());
    }
}
