use super::util::HttpClient;
use crate::core::config::ApiConfig;
use crate::core::currency::ExchangeRateProvider;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

pub const OPENEXCHANGE_BASE_URL: &str = "https://openexchangerates.org/api";

#[derive(Debug, Deserialize)]
struct OpenExchangeResponse {
    #[serde(default)]
    error: bool,
    description: Option<String>,
    #[serde(default)]
    rates: HashMap<String, Decimal>,
}

pub struct OpenExchangeProvider {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl OpenExchangeProvider {
    pub fn new(http: HttpClient, config: &ApiConfig) -> Self {
        Self {
            http,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENEXCHANGE_BASE_URL.to_string()),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl ExchangeRateProvider for OpenExchangeProvider {
    #[instrument(name = "OpenExchangeFetch", skip(self))]
    async fn fetch_rates(&self, base: &str) -> Result<HashMap<String, Decimal>> {
        let app_id = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("Open Exchange Rates app id not configured"))?;

        let url = format!("{}/latest.json?app_id={}&base={}", self.base_url, app_id, base);
        let data: OpenExchangeResponse = self.http.get_json(&url, &[]).await?;
        if data.error {
            return Err(anyhow!(
                "Open Exchange Rates error: {}",
                data.description.unwrap_or_default()
            ));
        }
        debug!(count = data.rates.len(), "Received Open Exchange Rates");
        Ok(data.rates)
    }

    fn name(&self) -> &'static str {
        "openexchange"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_rates() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/latest.json"))
            .and(query_param("app_id", "oxr"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"base": "USD", "rates": {"ZAR": 18.2, "EGP": 47.9}}"#),
            )
            .mount(&mock_server)
            .await;

        let provider = OpenExchangeProvider::new(
            HttpClient::new(Duration::from_secs(5), 0).unwrap(),
            &ApiConfig {
                base_url: Some(mock_server.uri()),
                api_key: Some("oxr".to_string()),
            },
        );
        let rates = provider.fetch_rates("USD").await.unwrap();
        assert_eq!(rates.get("ZAR"), Some(&dec!(18.2)));
        assert_eq!(rates.get("EGP"), Some(&dec!(47.9)));
    }

    #[tokio::test]
    async fn test_requires_app_id() {
        let provider = OpenExchangeProvider::new(
            HttpClient::new(Duration::from_secs(5), 0).unwrap(),
            &ApiConfig::default(),
        );
        assert!(provider.fetch_rates("USD").await.is_err());
    }
}
