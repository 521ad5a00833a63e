use super::util::HttpClient;
use crate::core::config::ApiConfig;
use crate::core::currency::ExchangeRateProvider;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

pub const EXCHANGERATE_BASE_URL: &str = "https://v6.exchangerate-api.com/v6";

/// Approximate USD rates served when the API is unusable.
pub fn fallback_rates() -> HashMap<String, Decimal> {
    [
        ("NGN", dec!(750)),
        ("GHS", dec!(12)),
        ("KES", dec!(130)),
        ("ZAR", dec!(18.5)),
        ("TZS", dec!(2500)),
        ("UGX", dec!(3700)),
        ("RWF", dec!(1100)),
        ("ETB", dec!(55)),
        ("EGP", dec!(31)),
        ("MAD", dec!(10)),
        ("ZWL", dec!(322)),
        ("ZMW", dec!(20)),
        ("MWK", dec!(1050)),
        ("BWP", dec!(13.5)),
        ("MZN", dec!(64)),
        ("EUR", dec!(0.92)),
        ("GBP", dec!(0.79)),
    ]
    .into_iter()
    .map(|(code, rate)| (code.to_string(), rate))
    .collect()
}

#[derive(Debug, Deserialize)]
struct ExchangeRateApiResponse {
    result: String,
    #[serde(default)]
    conversion_rates: HashMap<String, Decimal>,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
}

/// ExchangeRate-API v6. Without a key, or when the request fails, the
/// fallback table is returned instead of an error.
pub struct ExchangeRateApiProvider {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl ExchangeRateApiProvider {
    pub fn new(http: HttpClient, config: &ApiConfig) -> Self {
        Self {
            http,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| EXCHANGERATE_BASE_URL.to_string()),
            api_key: config.api_key.clone(),
        }
    }

    async fn fetch_live(&self, api_key: &str, base: &str) -> Result<HashMap<String, Decimal>> {
        let url = format!("{}/{}/latest/{}", self.base_url, api_key, base);
        let data: ExchangeRateApiResponse = self.http.get_json(&url, &[]).await?;
        if data.result != "success" {
            return Err(anyhow!(
                "ExchangeRate-API error: {}",
                data.error_type.unwrap_or(data.result)
            ));
        }
        Ok(data.conversion_rates)
    }
}

#[async_trait]
impl ExchangeRateProvider for ExchangeRateApiProvider {
    #[instrument(name = "ExchangeRateApiFetch", skip(self))]
    async fn fetch_rates(&self, base: &str) -> Result<HashMap<String, Decimal>> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("ExchangeRate-API key not configured, using fallback rates");
            return Ok(fallback_rates());
        };

        match self.fetch_live(api_key, base).await {
            Ok(rates) => {
                debug!(count = rates.len(), "Received ExchangeRate-API rates");
                Ok(rates)
            }
            Err(e) => {
                warn!(error = %e, "Error fetching exchange rates, using fallback rates");
                Ok(fallback_rates())
            }
        }
    }

    fn name(&self) -> &'static str {
        "exchangerate"
    }
}
