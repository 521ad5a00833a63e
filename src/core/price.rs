//! Gold price abstractions and the fallback-guarded price service.

use crate::core::asset::{DEFAULT_GOLD_PRICE_USD, GRAMS_PER_TROY_OUNCE};
use crate::core::cache::Cache;
use crate::core::error::{EngineError, Result as EngineResult};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const GOLD_CACHE_KEY: &str = "XAU/USD";

#[async_trait]
pub trait GoldPriceProvider: Send + Sync {
    /// USD price of one troy ounce.
    async fn fetch_gold_price(&self) -> Result<Decimal>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoldUnit {
    Ounce,
    Gram,
}

impl Display for GoldUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GoldUnit::Ounce => write!(f, "oz"),
            GoldUnit::Gram => write!(f, "g"),
        }
    }
}

impl GoldUnit {
    /// Converts a USD per troy ounce price into this unit.
    pub fn from_ounce_price(self, per_ounce: Decimal) -> Decimal {
        match self {
            GoldUnit::Ounce => per_ounce,
            GoldUnit::Gram => per_ounce / GRAMS_PER_TROY_OUNCE,
        }
    }
}

/// Wraps the configured provider. [`GoldPriceService::current_gold_price`]
/// never fails: provider errors and non-positive prices degrade to
/// [`DEFAULT_GOLD_PRICE_USD`].
pub struct GoldPriceService {
    provider: Arc<dyn GoldPriceProvider>,
    cache: Cache<String, Decimal>,
    cache_ttl: Option<Duration>,
}

impl GoldPriceService {
    pub fn new(provider: Arc<dyn GoldPriceProvider>, cache_ttl: Option<Duration>) -> Self {
        Self {
            provider,
            cache: Cache::new(),
            cache_ttl,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Provider price, with failures and non-positive prices reported as
    /// [`EngineError::UpstreamPrice`]. Successful prices are cached.
    pub async fn try_gold_price(&self) -> EngineResult<Decimal> {
        if self.cache_ttl.is_some() {
            if let Some(price) = self.cache.get(&GOLD_CACHE_KEY.to_string()).await {
                return Ok(price);
            }
        }

        let price = self
            .provider
            .fetch_gold_price()
            .await
            .map_err(|e| EngineError::upstream(format!("{e:#}")))?;
        if price <= Decimal::ZERO {
            return Err(EngineError::upstream(format!("invalid gold price {price}")));
        }
        debug!(provider = self.provider.name(), %price, "Fetched gold price");
        if self.cache_ttl.is_some() {
            self.cache
                .put(GOLD_CACHE_KEY.to_string(), price, self.cache_ttl)
                .await;
        }
        Ok(price)
    }

    pub async fn current_gold_price(&self) -> Decimal {
        self.try_gold_price().await.unwrap_or_else(|e| {
            warn!(provider = self.provider.name(), error = %e, "Error getting gold price, using fallback");
            DEFAULT_GOLD_PRICE_USD
        })
    }
}
