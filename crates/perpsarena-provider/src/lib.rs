//! PerpsArena Provider - Venue Data Gateway
//!
//! This crate abstracts the perpetual-futures venue the sync pipeline pulls
//! position and account data from. The engine depends only on the
//! [`ProviderGateway`] trait; [`HttpProviderGateway`] is the REST
//! implementation used in production.
//!
//! Every gateway call is fallible and slow by contract: callers must treat
//! timeouts identically to venue errors and must not depend on call
//! ordering.
//!
//! # Example
//!
//! ```ignore
//! use perpsarena_provider::{HttpProviderGateway, ProviderConfig, ProviderGateway};
//!
//! let gateway = HttpProviderGateway::new(ProviderConfig::default())?;
//! let data = gateway.get_account_data_batch("0xabc...", Some(dec!(10000))).await?;
//! println!("{} open positions", data.positions.len());
//! ```

pub mod cache;
pub mod http;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

pub use cache::TtlCache;
pub use http::{HttpProviderGateway, ProviderConfig};
pub use perpsarena_types::{ProviderAccountData, ProviderAccountSummary, ProviderPosition};

/// Provider gateway errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Venue error ({status}): {message}")]
    Venue { status: u16, message: String },

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Http(e.to_string())
        }
    }
}

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Data source for per-agent account and position state on the venue
///
/// `get_account_data_batch` has a provided implementation that issues both
/// single calls; venues with a combined endpoint override it to halve the
/// round-trips.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Fetch the account snapshot for a wallet
    ///
    /// `initial_capital_hint` supplies the competition's starting capital
    /// for venues that do not track it themselves.
    async fn get_account_summary(
        &self,
        wallet_address: &str,
        initial_capital_hint: Option<Decimal>,
    ) -> ProviderResult<ProviderAccountSummary>;

    /// Fetch all positions the venue reports for a wallet
    async fn get_positions(&self, wallet_address: &str) -> ProviderResult<Vec<ProviderPosition>>;

    /// Fetch summary and positions together
    async fn get_account_data_batch(
        &self,
        wallet_address: &str,
        initial_capital_hint: Option<Decimal>,
    ) -> ProviderResult<ProviderAccountData> {
        let account_summary = self
            .get_account_summary(wallet_address, initial_capital_hint)
            .await?;
        let positions = self.get_positions(wallet_address).await?;
        Ok(ProviderAccountData {
            account_summary,
            positions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use perpsarena_types::{PositionSide, PositionStatus};
    use rust_decimal_macros::dec;

    struct FixedGateway {
        equity: Decimal,
        fail_positions: bool,
    }

    #[async_trait]
    impl ProviderGateway for FixedGateway {
        async fn get_account_summary(
            &self,
            _wallet_address: &str,
            initial_capital_hint: Option<Decimal>,
        ) -> ProviderResult<ProviderAccountSummary> {
            Ok(ProviderAccountSummary {
                total_equity: self.equity,
                initial_capital: initial_capital_hint.unwrap_or(Decimal::ZERO),
                total_volume: Decimal::ZERO,
                total_unrealized_pnl: Decimal::ZERO,
                total_realized_pnl: Decimal::ZERO,
                total_pnl: Decimal::ZERO,
                roi: Decimal::ZERO,
                total_trades: 0,
                open_positions: 1,
            })
        }

        async fn get_positions(
            &self,
            _wallet_address: &str,
        ) -> ProviderResult<Vec<ProviderPosition>> {
            if self.fail_positions {
                return Err(ProviderError::Timeout);
            }
            Ok(vec![ProviderPosition {
                provider_position_id: "pos-1".to_string(),
                asset: "ETH".to_string(),
                side: PositionSide::Long,
                leverage: dec!(5),
                size: dec!(2),
                collateral: dec!(1200),
                entry_price: dec!(3000),
                current_price: dec!(3050),
                liquidation_price: None,
                unrealized_pnl: dec!(100),
                realized_pnl: Decimal::ZERO,
                status: PositionStatus::Open,
            }])
        }
    }

    #[tokio::test]
    async fn test_default_batch_combines_both_calls() {
        let gateway = FixedGateway {
            equity: dec!(11000),
            fail_positions: false,
        };

        let data = gateway
            .get_account_data_batch("0xabc", Some(dec!(10000)))
            .await
            .unwrap();

        assert_eq!(data.account_summary.total_equity, dec!(11000));
        assert_eq!(data.account_summary.initial_capital, dec!(10000));
        assert_eq!(data.positions.len(), 1);
    }

    #[tokio::test]
    async fn test_default_batch_propagates_either_failure() {
        let gateway = FixedGateway {
            equity: dec!(11000),
            fail_positions: true,
        };

        let result = gateway.get_account_data_batch("0xabc", None).await;
        assert!(matches!(result, Err(ProviderError::Timeout)));
    }
}
