//! Risk-adjusted performance metrics
//!
//! Metrics are computed from the ordered equity curve of account
//! snapshots. A metric that cannot be computed (too little history, zero
//! drawdown, no losing periods) is `None`, never zero: "unavailable" and
//! "zero" mean different things to the ranker and must stay distinct.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use perpsarena_db::{RiskRepo, SummaryRepo};
use perpsarena_types::{AgentId, CompetitionId, RiskMetrics};

use crate::ArenaResult;

/// One point of an agent's equity curve
#[derive(Debug, Clone, Copy)]
pub struct EquityPoint {
    pub equity: Decimal,
    pub captured_at: DateTime<Utc>,
}

/// Computed metric values; `None` marks an unavailable metric
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskComputation {
    pub simple_return: Option<Decimal>,
    pub annualized_return: Option<Decimal>,
    pub max_drawdown: Option<Decimal>,
    pub calmar_ratio: Option<Decimal>,
    pub downside_deviation: Option<Decimal>,
    pub sortino_ratio: Option<Decimal>,
}

/// Compute all metrics from an ordered (oldest-first) equity series
pub fn compute_risk_metrics(series: &[EquityPoint], initial_capital: Decimal) -> RiskComputation {
    let mut out = RiskComputation::default();

    let latest = match series.last() {
        Some(point) => point.equity,
        None => return out,
    };

    if initial_capital > Decimal::ZERO {
        out.simple_return = Some((latest - initial_capital) / initial_capital);
    }

    out.annualized_return = annualized_return(series, out.simple_return);
    out.max_drawdown = max_drawdown(series);

    out.calmar_ratio = match (out.annualized_return, out.max_drawdown) {
        (Some(annualized), Some(drawdown)) if drawdown > Decimal::ZERO => {
            Some(annualized / drawdown)
        }
        _ => None,
    };

    let returns = period_returns(series);
    out.downside_deviation = downside_deviation(&returns);
    out.sortino_ratio = match (out.annualized_return, out.downside_deviation) {
        (Some(annualized), Some(deviation)) if deviation > Decimal::ZERO => {
            Some(annualized / deviation)
        }
        _ => None,
    };

    out
}

/// Linearized annualization of the simple return over the observed span
fn annualized_return(series: &[EquityPoint], simple_return: Option<Decimal>) -> Option<Decimal> {
    let simple = simple_return?;
    let (first, last) = match (series.first(), series.last()) {
        (Some(f), Some(l)) => (f, l),
        _ => return None,
    };

    let elapsed_secs = (last.captured_at - first.captured_at).num_seconds();
    if elapsed_secs <= 0 {
        return None;
    }

    let elapsed_days = Decimal::from(elapsed_secs) / dec!(86400);
    Some(simple * dec!(365) / elapsed_days)
}

/// Largest peak-to-trough relative decline across the series
///
/// `None` below two points: a single snapshot has no drawdown to measure.
fn max_drawdown(series: &[EquityPoint]) -> Option<Decimal> {
    if series.len() < 2 {
        return None;
    }

    let mut peak = series[0].equity;
    let mut max_dd = Decimal::ZERO;
    for point in &series[1..] {
        if point.equity > peak {
            peak = point.equity;
        } else if peak > Decimal::ZERO {
            let decline = (peak - point.equity) / peak;
            if decline > max_dd {
                max_dd = decline;
            }
        }
    }
    Some(max_dd)
}

/// Relative returns between consecutive snapshots
fn period_returns(series: &[EquityPoint]) -> Vec<Decimal> {
    series
        .windows(2)
        .filter_map(|pair| {
            let prev = pair[0].equity;
            if prev > Decimal::ZERO {
                Some((pair[1].equity - prev) / prev)
            } else {
                None
            }
        })
        .collect()
}

/// Deviation of the negative-return periods only
///
/// `None` when no period lost money: an agent with no downside has no
/// downside deviation, which is not the same as a deviation of zero.
fn downside_deviation(returns: &[Decimal]) -> Option<Decimal> {
    let negative: Vec<Decimal> = returns.iter().copied().filter(|r| *r < Decimal::ZERO).collect();
    if negative.is_empty() {
        return None;
    }

    let n = Decimal::from(negative.len() as u64);
    let variance = negative.iter().map(|r| r * r).sum::<Decimal>() / n;
    decimal_sqrt(variance)
}

/// Decimal square root via Newton's method
fn decimal_sqrt(value: Decimal) -> Option<Decimal> {
    if value < Decimal::ZERO {
        return None;
    }
    if value.is_zero() {
        return Some(Decimal::ZERO);
    }

    let two = dec!(2);
    let tolerance = dec!(0.0000001);
    let mut guess = value / two;
    if guess.is_zero() {
        guess = value;
    }
    for _ in 0..20 {
        let next = (guess + value / guess) / two;
        if (next - guess).abs() < tolerance {
            return Some(next);
        }
        guess = next;
    }
    Some(guess)
}

/// Computes and persists metrics for one agent
pub struct RiskEngine {
    summaries: SummaryRepo,
    risk: RiskRepo,
}

impl RiskEngine {
    pub fn new(summaries: SummaryRepo, risk: RiskRepo) -> Self {
        Self { summaries, risk }
    }

    /// Recompute an agent's metrics from its full equity history, append
    /// the time-series row, and refresh the latest record.
    pub async fn compute_and_store(
        &self,
        competition_id: CompetitionId,
        agent_id: AgentId,
    ) -> ArenaResult<RiskMetrics> {
        let points = self
            .summaries
            .equity_series(competition_id.0, agent_id.0)
            .await?;
        let series: Vec<EquityPoint> = points
            .iter()
            .map(|p| EquityPoint {
                equity: p.total_equity,
                captured_at: p.captured_at,
            })
            .collect();

        let initial_capital = self
            .summaries
            .latest(competition_id.0, agent_id.0)
            .await?
            .map(|s| s.initial_capital)
            .unwrap_or(Decimal::ZERO);

        let computation = compute_risk_metrics(&series, initial_capital);
        let metrics = RiskMetrics {
            agent_id,
            competition_id,
            simple_return: computation.simple_return,
            annualized_return: computation.annualized_return,
            max_drawdown: computation.max_drawdown,
            calmar_ratio: computation.calmar_ratio,
            downside_deviation: computation.downside_deviation,
            sortino_ratio: computation.sortino_ratio,
            computed_at: Utc::now(),
        };

        self.risk.record(&metrics).await?;
        debug!(
            competition = %competition_id,
            agent = %agent_id,
            snapshots = series.len(),
            "risk metrics stored"
        );
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn series(equities: &[Decimal]) -> Vec<EquityPoint> {
        let start = Utc::now() - Duration::days(equities.len() as i64);
        equities
            .iter()
            .enumerate()
            .map(|(i, equity)| EquityPoint {
                equity: *equity,
                captured_at: start + Duration::days(i as i64),
            })
            .collect()
    }

    #[test]
    fn test_empty_series_everything_unavailable() {
        let result = compute_risk_metrics(&[], dec!(10000));
        assert_eq!(result.simple_return, None);
        assert_eq!(result.max_drawdown, None);
        assert_eq!(result.calmar_ratio, None);
        assert_eq!(result.sortino_ratio, None);
    }

    #[test]
    fn test_simple_return() {
        let points = series(&[dec!(10000), dec!(11000), dec!(12000)]);
        let result = compute_risk_metrics(&points, dec!(10000));
        assert_eq!(result.simple_return, Some(dec!(0.2)));
    }

    #[test]
    fn test_simple_return_unavailable_without_capital() {
        let points = series(&[dec!(10000), dec!(12000)]);
        let result = compute_risk_metrics(&points, Decimal::ZERO);
        assert_eq!(result.simple_return, None);
        assert_eq!(result.calmar_ratio, None);
    }

    #[test]
    fn test_max_drawdown_peak_to_trough() {
        // Peak 120, trough 90: drawdown 25%
        let points = series(&[dec!(100), dec!(120), dec!(90), dec!(110)]);
        let result = compute_risk_metrics(&points, dec!(100));
        assert_eq!(result.max_drawdown, Some(dec!(0.25)));
    }

    #[test]
    fn test_single_snapshot_has_no_drawdown() {
        let points = series(&[dec!(100)]);
        let result = compute_risk_metrics(&points, dec!(100));
        assert_eq!(result.max_drawdown, None);
    }

    #[test]
    fn test_zero_drawdown_leaves_calmar_unavailable() {
        // Monotonic climb: drawdown exists and is exactly zero
        let points = series(&[dec!(100), dec!(110), dec!(125)]);
        let result = compute_risk_metrics(&points, dec!(100));
        assert_eq!(result.max_drawdown, Some(Decimal::ZERO));
        assert_eq!(result.calmar_ratio, None);
        assert!(result.annualized_return.is_some());
    }

    #[test]
    fn test_calmar_is_annualized_over_drawdown() {
        let points = series(&[dec!(100), dec!(120), dec!(90), dec!(110)]);
        let result = compute_risk_metrics(&points, dec!(100));

        let annualized = result.annualized_return.unwrap();
        let drawdown = result.max_drawdown.unwrap();
        assert_eq!(result.calmar_ratio, Some(annualized / drawdown));
    }

    #[test]
    fn test_no_losing_periods_leaves_sortino_unavailable() {
        let points = series(&[dec!(100), dec!(105), dec!(111)]);
        let result = compute_risk_metrics(&points, dec!(100));
        assert_eq!(result.downside_deviation, None);
        assert_eq!(result.sortino_ratio, None);
    }

    #[test]
    fn test_downside_deviation_only_counts_losses() {
        // Returns: +20%, -25%, +22.2...%; one losing period of -0.25
        let points = series(&[dec!(100), dec!(120), dec!(90), dec!(110)]);
        let result = compute_risk_metrics(&points, dec!(100));

        let deviation = result.downside_deviation.unwrap();
        assert!((deviation - dec!(0.25)).abs() < dec!(0.0001));
        assert!(result.sortino_ratio.is_some());
    }

    #[test]
    fn test_decimal_sqrt() {
        assert!((decimal_sqrt(dec!(4)).unwrap() - dec!(2)).abs() < dec!(0.0001));
        assert!((decimal_sqrt(dec!(0.0625)).unwrap() - dec!(0.25)).abs() < dec!(0.0001));
        assert_eq!(decimal_sqrt(Decimal::ZERO), Some(Decimal::ZERO));
        assert_eq!(decimal_sqrt(dec!(-1)), None);
    }
}
