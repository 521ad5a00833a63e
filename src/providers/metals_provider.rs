use super::util::HttpClient;
use crate::core::config::ApiConfig;
use crate::core::price::GoldPriceProvider;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

pub const METALS_BASE_URL: &str = "https://metals-api.com/api";

#[derive(Debug, Deserialize)]
struct MetalsResponse {
    success: Option<bool>,
    #[serde(default)]
    rates: HashMap<String, Decimal>,
    error: Option<serde_json::Value>,
}

impl MetalsResponse {
    // Rates are ounces per USD; the spot price is the inverse.
    fn ounce_price(&self) -> Result<Decimal> {
        let rate = self
            .rates
            .get("XAU")
            .copied()
            .ok_or_else(|| anyhow!("XAU rate missing from response"))?;
        Decimal::ONE
            .checked_div(rate)
            .filter(|_| rate > Decimal::ZERO)
            .ok_or_else(|| anyhow!("Invalid XAU rate: {rate}"))
    }
}

fn base_url(config: &ApiConfig) -> String {
    config
        .base_url
        .clone()
        .unwrap_or_else(|| METALS_BASE_URL.to_string())
}

/// Key-less `latest` endpoint.
pub struct MetalsLiveProvider {
    http: HttpClient,
    base_url: String,
}

impl MetalsLiveProvider {
    pub fn new(http: HttpClient, config: &ApiConfig) -> Self {
        Self {
            http,
            base_url: base_url(config),
        }
    }
}

#[async_trait]
impl GoldPriceProvider for MetalsLiveProvider {
    #[instrument(name = "MetalsLiveFetch", skip(self))]
    async fn fetch_gold_price(&self) -> Result<Decimal> {
        let url = format!("{}/latest?base=USD&symbols=XAU", self.base_url);
        let data: MetalsResponse = self.http.get_json(&url, &[]).await?;
        let price = data.ounce_price()?;
        debug!(%price, "Received Metals.live price");
        Ok(price)
    }

    fn name(&self) -> &'static str {
        "metalslive"
    }
}

/// Metals-API with an `access_key`; responses must report `success`.
pub struct MetalsApiProvider {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl MetalsApiProvider {
    pub fn new(http: HttpClient, config: &ApiConfig) -> Self {
        Self {
            http,
            base_url: base_url(config),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl GoldPriceProvider for MetalsApiProvider {
    #[instrument(name = "MetalsApiFetch", skip(self))]
    async fn fetch_gold_price(&self) -> Result<Decimal> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("Metals-API key not configured"))?;

        let url = format!(
            "{}/latest?access_key={}&base=USD&symbols=XAU",
            self.base_url, api_key
        );
        let data: MetalsResponse = self.http.get_json(&url, &[]).await?;
        if data.success != Some(true) {
            return Err(anyhow!(
                "Metals-API request unsuccessful: {}",
                data.error.map(|e| e.to_string()).unwrap_or_default()
            ));
        }
        let price = data.ounce_price()?;
        debug!(%price, "Received Metals-API price");
        Ok(price)
    }

    fn name(&self) -> &'static str {
        "metalsapi"
    }
}
