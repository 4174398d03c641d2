//! REST implementation of the provider gateway
//!
//! Talks to the venue's account-data API and normalizes every numeric
//! field through `Decimal` at the boundary. Amounts the venue serializes
//! as unparseable or non-finite values become zero; optional prices become
//! `None`. Structurally malformed payloads (unknown side/status) are
//! rejected as `InvalidPayload`.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

use perpsarena_types::{
    decimal, PositionSide, PositionStatus, ProviderAccountData, ProviderAccountSummary,
    ProviderPosition,
};

use crate::cache::TtlCache;
use crate::{ProviderError, ProviderGateway, ProviderResult};

/// Provider connection configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the venue's data API
    pub base_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Max age of cached account data in seconds
    pub cache_max_age_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: std::env::var("PROVIDER_API_URL")
                .unwrap_or_else(|_| "http://localhost:9010".to_string()),
            request_timeout_secs: 10,
            cache_max_age_secs: 30,
        }
    }
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("PROVIDER_API_URL").expect("PROVIDER_API_URL must be set"),
            request_timeout_secs: std::env::var("PROVIDER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            cache_max_age_secs: std::env::var("PROVIDER_CACHE_MAX_AGE_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        }
    }
}

// ============================================================================
// Wire DTOs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AccountSummaryDto {
    pub equity: String,
    #[serde(default)]
    pub initial_capital: Option<String>,
    #[serde(default)]
    pub volume: Option<String>,
    pub unrealized_pnl: String,
    pub realized_pnl: String,
    #[serde(default)]
    pub trade_count: i32,
    #[serde(default)]
    pub open_position_count: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PositionDto {
    pub id: String,
    pub asset: String,
    pub side: String,
    #[serde(default)]
    pub leverage: Option<String>,
    pub size: String,
    pub collateral: String,
    pub entry_price: String,
    pub mark_price: String,
    #[serde(default)]
    pub liquidation_price: Option<String>,
    pub unrealized_pnl: String,
    #[serde(default)]
    pub realized_pnl: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PositionsDto {
    pub positions: Vec<PositionDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AccountDataDto {
    pub summary: AccountSummaryDto,
    pub positions: Vec<PositionDto>,
}

impl AccountSummaryDto {
    /// Normalize through `Decimal`, filling the initial capital from the
    /// competition hint when the venue does not track it.
    pub(crate) fn normalize(
        self,
        initial_capital_hint: Option<Decimal>,
    ) -> ProviderAccountSummary {
        let total_equity = decimal::parse_or_zero(&self.equity);
        let initial_capital = self
            .initial_capital
            .as_deref()
            .and_then(decimal::parse)
            .or(initial_capital_hint)
            .unwrap_or(Decimal::ZERO);
        let total_unrealized_pnl = decimal::parse_or_zero(&self.unrealized_pnl);
        let total_realized_pnl = decimal::parse_or_zero(&self.realized_pnl);
        let total_pnl = total_unrealized_pnl + total_realized_pnl;
        let roi = if initial_capital > Decimal::ZERO {
            total_pnl / initial_capital
        } else {
            Decimal::ZERO
        };

        ProviderAccountSummary {
            total_equity,
            initial_capital,
            total_volume: self.volume.as_deref().map(decimal::parse_or_zero).unwrap_or(Decimal::ZERO),
            total_unrealized_pnl,
            total_realized_pnl,
            total_pnl,
            roi,
            total_trades: self.trade_count,
            open_positions: self.open_position_count,
        }
    }
}

impl PositionDto {
    pub(crate) fn normalize(self) -> ProviderResult<ProviderPosition> {
        let side = PositionSide::parse(&self.side)
            .map_err(|e| ProviderError::InvalidPayload(e.to_string()))?;
        let status = PositionStatus::parse(&self.status)
            .map_err(|e| ProviderError::InvalidPayload(e.to_string()))?;

        Ok(ProviderPosition {
            provider_position_id: self.id,
            asset: self.asset,
            side,
            leverage: self
                .leverage
                .as_deref()
                .and_then(decimal::parse)
                .unwrap_or(Decimal::ONE),
            size: decimal::parse_or_zero(&self.size),
            collateral: decimal::parse_or_zero(&self.collateral),
            entry_price: decimal::parse_or_zero(&self.entry_price),
            current_price: decimal::parse_or_zero(&self.mark_price),
            liquidation_price: self.liquidation_price.as_deref().and_then(decimal::parse),
            unrealized_pnl: decimal::parse_or_zero(&self.unrealized_pnl),
            realized_pnl: self
                .realized_pnl
                .as_deref()
                .map(decimal::parse_or_zero)
                .unwrap_or(Decimal::ZERO),
            status,
        })
    }
}

// ============================================================================
// HTTP Gateway
// ============================================================================

/// REST gateway against the venue's account-data API
pub struct HttpProviderGateway {
    client: reqwest::Client,
    base_url: String,
    /// Account-data cache keyed by wallet address
    cache: TtlCache<String, ProviderAccountData>,
}

impl HttpProviderGateway {
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache: TtlCache::new(Duration::from_secs(config.cache_max_age_secs)),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> ProviderResult<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Venue {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::InvalidPayload(e.to_string()))
    }
}

#[async_trait]
impl ProviderGateway for HttpProviderGateway {
    async fn get_account_summary(
        &self,
        wallet_address: &str,
        initial_capital_hint: Option<Decimal>,
    ) -> ProviderResult<ProviderAccountSummary> {
        let dto: AccountSummaryDto = self
            .get_json(&format!("/accounts/{}/summary", wallet_address))
            .await?;
        Ok(dto.normalize(initial_capital_hint))
    }

    async fn get_positions(&self, wallet_address: &str) -> ProviderResult<Vec<ProviderPosition>> {
        let dto: PositionsDto = self
            .get_json(&format!("/accounts/{}/positions", wallet_address))
            .await?;
        dto.positions.into_iter().map(|p| p.normalize()).collect()
    }

    /// Combined endpoint; one round-trip per wallet, cached briefly so
    /// overlapping runs don't hammer the venue.
    async fn get_account_data_batch(
        &self,
        wallet_address: &str,
        initial_capital_hint: Option<Decimal>,
    ) -> ProviderResult<ProviderAccountData> {
        let key = wallet_address.to_string();
        if let Some(cached) = self.cache.get(&key) {
            debug!(wallet = wallet_address, "provider cache hit");
            return Ok(cached);
        }

        let dto: AccountDataDto = self
            .get_json(&format!("/accounts/{}", wallet_address))
            .await?;

        let account_summary = dto.summary.normalize(initial_capital_hint);
        let positions: Vec<ProviderPosition> = dto
            .positions
            .into_iter()
            .map(|p| p.normalize())
            .collect::<ProviderResult<_>>()?;

        let data = ProviderAccountData {
            account_summary,
            positions,
        };
        self.cache.insert(key, data.clone());
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position_dto(side: &str, status: &str) -> PositionDto {
        PositionDto {
            id: "pos-1".to_string(),
            asset: "ETH".to_string(),
            side: side.to_string(),
            leverage: Some("10".to_string()),
            size: "1.5".to_string(),
            collateral: "450".to_string(),
            entry_price: "3000".to_string(),
            mark_price: "3100".to_string(),
            liquidation_price: Some("2500".to_string()),
            unrealized_pnl: "150".to_string(),
            realized_pnl: Some("25".to_string()),
            status: status.to_string(),
        }
    }

    #[test]
    fn test_position_normalization() {
        let position = position_dto("long", "open").normalize().unwrap();

        assert_eq!(position.side, PositionSide::Long);
        assert_eq!(position.status, PositionStatus::Open);
        assert_eq!(position.size, dec!(1.5));
        assert_eq!(position.current_price, dec!(3100));
        assert_eq!(position.liquidation_price, Some(dec!(2500)));
    }

    #[test]
    fn test_unknown_side_is_invalid_payload() {
        let result = position_dto("sideways", "open").normalize();
        assert!(matches!(result, Err(ProviderError::InvalidPayload(_))));
    }

    #[test]
    fn test_malformed_numerics_normalize_to_zero() {
        let mut dto = position_dto("short", "open");
        dto.size = "not-a-number".to_string();
        dto.liquidation_price = Some("also-garbage".to_string());

        let position = dto.normalize().unwrap();
        assert_eq!(position.size, Decimal::ZERO);
        assert_eq!(position.liquidation_price, None);
    }

    #[test]
    fn test_summary_uses_initial_capital_hint() {
        let dto = AccountSummaryDto {
            equity: "10500".to_string(),
            initial_capital: None,
            volume: Some("25000".to_string()),
            unrealized_pnl: "300".to_string(),
            realized_pnl: "200".to_string(),
            trade_count: 12,
            open_position_count: 2,
        };

        let summary = dto.normalize(Some(dec!(10000)));
        assert_eq!(summary.initial_capital, dec!(10000));
        assert_eq!(summary.total_pnl, dec!(500));
        assert_eq!(summary.roi, dec!(0.05));
    }

    #[test]
    fn test_summary_zero_capital_zero_roi() {
        let dto = AccountSummaryDto {
            equity: "100".to_string(),
            initial_capital: None,
            volume: None,
            unrealized_pnl: "50".to_string(),
            realized_pnl: "0".to_string(),
            trade_count: 1,
            open_position_count: 1,
        };

        let summary = dto.normalize(None);
        assert_eq!(summary.initial_capital, Decimal::ZERO);
        assert_eq!(summary.roi, Decimal::ZERO);
    }

    #[test]
    fn test_scientific_notation_survives_parsing() {
        let mut dto = position_dto("long", "open");
        dto.size = "1.2e2".to_string();

        let position = dto.normalize().unwrap();
        assert_eq!(position.size, dec!(120));
    }
}
