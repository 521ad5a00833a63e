use super::util::HttpClient;
use crate::core::config::ApiConfig;
use crate::core::currency::ExchangeRateProvider;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

pub const CURRENCYAPI_BASE_URL: &str = "https://api.currencyapi.com";

#[derive(Debug, Deserialize)]
struct CurrencyValue {
    value: Decimal,
}

#[derive(Debug, Deserialize)]
struct CurrencyApiResponse {
    data: Option<HashMap<String, CurrencyValue>>,
    message: Option<String>,
}

pub struct CurrencyApiProvider {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl CurrencyApiProvider {
    pub fn new(http: HttpClient, config: &ApiConfig) -> Self {
        Self {
            http,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| CURRENCYAPI_BASE_URL.to_string()),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl ExchangeRateProvider for CurrencyApiProvider {
    #[instrument(name = "CurrencyApiFetch", skip(self))]
    async fn fetch_rates(&self, base: &str) -> Result<HashMap<String, Decimal>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("CurrencyAPI key not configured"))?;

        let url = format!(
            "{}/v3/latest?apikey={}&base_currency={}",
            self.base_url, api_key, base
        );
        let response: CurrencyApiResponse = self.http.get_json(&url, &[]).await?;
        let data = response.data.ok_or_else(|| {
            anyhow!(
                "CurrencyAPI error: {}",
                response.message.unwrap_or_else(|| "missing data".to_string())
            )
        })?;
        debug!(count = data.len(), "Received CurrencyAPI rates");
        Ok(data
            .into_iter()
            .map(|(code, value)| (code, value.value))
            .collect())
    }

    fn name(&self) -> &'static str {
        "currencyapi"
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
            .and(path("/v3/latest"))
            .and(query_param("apikey", "ck"))
            .and(query_param("base_currency", "USD"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn provider(uri: &str) -> CurrencyApiProvider {
        CurrencyApiProvider::new(
            HttpClient::new(Duration::from_secs(5), 0).unwrap(),
            &ApiConfig {
                base_url: Some(uri.to_string()),
                api_key: Some("ck".to_string()),
            },
        )
    }

    #[tokio::test]
    async fn test_fetch_rates_flattens_values() {
        let mock_server = create_mock_server(
            r#"{"meta": {"last_updated_at": "2026-01-01T00:00:00Z"}, "data": {"UGX": {"code": "UGX", "value": 3712.5}, "RWF": {"code": "RWF", "value": 1285}}}"#,
        )
        .await;
        let rates = provider(&mock_server.uri()).fetch_rates("USD").await.unwrap();
        assert_eq!(rates.get("UGX"), Some(&dec!(3712.5)));
        assert_eq!(rates.get("RWF"), Some(&dec!(1285)));
    }

    #[tokio::test]
    async fn test_missing_data_is_error() {
        let mock_server = create_mock_server(r#"{"message": "Invalid authentication credentials"}"#).await;
        let err = provider(&mock_server.uri())
            .fetch_rates("USD")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Invalid authentication credentials"));
    }
}
