use super::util::HttpClient;
use crate::core::config::ApiConfig;
use crate::core::currency::ExchangeRateProvider;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

pub const FIXER_BASE_URL: &str = "https://api.fixer.io";

#[derive(Debug, Deserialize)]
struct FixerResponse {
    success: bool,
    #[serde(default)]
    rates: HashMap<String, Decimal>,
    error: Option<serde_json::Value>,
}

pub struct FixerProvider {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl FixerProvider {
    pub fn new(http: HttpClient, config: &ApiConfig) -> Self {
        Self {
            http,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| FIXER_BASE_URL.to_string()),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl ExchangeRateProvider for FixerProvider {
    #[instrument(name = "FixerFetch", skip(self))]
    async fn fetch_rates(&self, base: &str) -> Result<HashMap<String, Decimal>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("Fixer API key not configured"))?;

        let url = format!("{}/latest?access_key={}&base={}", self.base_url, api_key, base);
        let data: FixerResponse = self.http.get_json(&url, &[]).await?;
        if !data.success {
            return Err(anyhow!(
                "Fixer API error: {}",
                data.error.map(|e| e.to_string()).unwrap_or_default()
            ));
        }
        debug!(count = data.rates.len(), "Received Fixer rates");
        Ok(data.rates)
    }

    fn name(&self) -> &'static str {
        "fixer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_mock_server(mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/latest"))
            .and(query_param("access_key", "fk"))
            .and(query_param("base", "USD"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn provider(uri: &str) -> FixerProvider {
        FixerProvider::new(
            HttpClient::new(Duration::from_secs(5), 0).unwrap(),
            &ApiConfig {
                base_url: Some(uri.to_string()),
                api_key: Some("fk".to_string()),
            },
        )
    }

    #[tokio::test]
    async fn test_fetch_rates() {
        let mock_server =
            create_mock_server(r#"{"success": true, "base": "USD", "rates": {"GHS": 12.4}}"#)
                .await;
        let rates = provider(&mock_server.uri()).fetch_rates("USD").await.unwrap();
        assert_eq!(rates.get("GHS"), Some(&dec!(12.4)));
    }

    #[tokio::test]
    async fn test_unsuccessful_response_is_error() {
        let mock_server = create_mock_server(
            r#"{"success": false, "error": {"code": 105, "type": "base_currency_access_restricted"}}"#,
        )
        .await;
        let err = provider(&mock_server.uri())
            .fetch_rates("USD")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("base_currency_access_restricted"));
    }
}
