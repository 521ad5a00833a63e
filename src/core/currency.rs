//! Currency conversion abstractions and the USD exchange-rate table.

use crate::core::cache::Cache;
use crate::core::error::{EngineError, Result as EngineResult};
use crate::store::Store;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const BASE_CURRENCY: &str = "USD";
pub const TOKEN_CURRENCY: &str = "ACT";

/// Currencies refreshed by default: African currencies plus EUR and GBP.
pub const DEFAULT_TRACKED_CURRENCIES: [&str; 17] = [
    "NGN", "GHS", "KES", "ZAR", "TZS", "UGX", "RWF", "ETB", "EGP", "MAD", "ZWL", "ZMW", "MWK",
    "BWP", "MZN", "EUR", "GBP",
];

#[async_trait]
pub trait ExchangeRateProvider: Send + Sync {
    /// Units of each currency per one unit of `base`.
    async fn fetch_rates(&self, base: &str) -> Result<HashMap<String, Decimal>>;

    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub from_currency: String,
    pub to_currency: String,
    pub rate: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RateUpdateSummary {
    pub success: bool,
    pub updated: usize,
    pub errors: Vec<String>,
}

pub struct ExchangeRateService {
    provider: Arc<dyn ExchangeRateProvider>,
    store: Arc<dyn Store>,
    currencies: Vec<String>,
    cache: Cache<String, HashMap<String, Decimal>>,
    cache_ttl: Option<Duration>,
}

impl ExchangeRateService {
    pub fn new(
        provider: Arc<dyn ExchangeRateProvider>,
        store: Arc<dyn Store>,
        currencies: Vec<String>,
        cache_ttl: Option<Duration>,
    ) -> Self {
        Self {
            provider,
            store,
            currencies,
            cache: Cache::new(),
            cache_ttl,
        }
    }

    async fn fetch_rates(&self) -> Result<HashMap<String, Decimal>> {
        if self.cache_ttl.is_some() {
            if let Some(rates) = self.cache.get(&BASE_CURRENCY.to_string()).await {
                return Ok(rates);
            }
        }
        let rates = self.provider.fetch_rates(BASE_CURRENCY).await?;
        if self.cache_ttl.is_some() {
            self.cache
                .put(BASE_CURRENCY.to_string(), rates.clone(), self.cache_ttl)
                .await;
        }
        Ok(rates)
    }

    /// Refreshes USD→currency rows for every tracked currency plus ACT
    /// (pinned to 1). Currencies missing from the provider response get 1.
    pub async fn update_all_rates(&self) -> RateUpdateSummary {
        let mut summary = RateUpdateSummary::default();

        let rates = match self.fetch_rates().await {
            Ok(rates) => rates,
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "Failed to fetch rates");
                summary.errors.push(format!("Failed to fetch rates: {e}"));
                return summary;
            }
        };

        let targets = self
            .currencies
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(TOKEN_CURRENCY));
        for code in targets {
            let rate = if code == TOKEN_CURRENCY {
                Decimal::ONE
            } else {
                rates.get(code).copied().unwrap_or_else(|| {
                    debug!(currency = code, "Rate missing from provider response, using 1");
                    Decimal::ONE
                })
            };

            let row = ExchangeRate {
                from_currency: BASE_CURRENCY.to_string(),
                to_currency: code.to_string(),
                rate,
                updated_at: Utc::now(),
            };
            match self.store.upsert_exchange_rate(row).await {
                Ok(()) => summary.updated += 1,
                Err(e) => summary.errors.push(format!("Failed to update {code}: {e}")),
            }
        }

        summary.success = summary.errors.is_empty();
        info!(updated = summary.updated, errors = summary.errors.len(), "Exchange rates refreshed");
        summary
    }

    pub async fn get_rate(&self, from: &str, to: &str) -> EngineResult<Option<Decimal>> {
        Ok(self.store.exchange_rate(from, to).await?.map(|r| r.rate))
    }

    /// Converts with the stored rate. Fails with `NotFound` when no rate is
    /// stored for the pair.
    pub async fn convert_amount(&self, amount: Decimal, from: &str, to: &str) -> EngineResult<Decimal> {
        if from == to {
            return Ok(amount);
        }
        let rate = self
            .get_rate(from, to)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("exchange rate {from}->{to}")))?;
        amount
            .checked_mul(rate)
            .ok_or_else(|| EngineError::validation(format!("{amount} {from} is out of range in {to}")))
    }
}
