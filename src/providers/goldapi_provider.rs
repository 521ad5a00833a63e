use super::util::HttpClient;
use crate::core::config::ApiConfig;
use crate::core::price::GoldPriceProvider;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument};

pub const GOLDAPI_BASE_URL: &str = "https://www.goldapi.io/api";

#[derive(Debug, Deserialize)]
struct GoldApiResponse {
    price: Decimal,
}

/// goldapi.io spot price, authenticated with the `x-access-token` header.
pub struct GoldApiProvider {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
}

impl GoldApiProvider {
    pub fn new(http: HttpClient, config: &ApiConfig) -> Self {
        Self {
            http,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| GOLDAPI_BASE_URL.to_string()),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl GoldPriceProvider for GoldApiProvider {
    #[instrument(name = "GoldApiFetch", skip(self))]
    async fn fetch_gold_price(&self) -> Result<Decimal> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("GoldAPI key not configured"))?;

        let url = format!("{}/XAU/USD", self.base_url);
        let data: GoldApiResponse = self
            .http
            .get_json(&url, &[("x-access-token", api_key)])
            .await?;
        debug!(price = %data.price, "Received GoldAPI price");
        Ok(data.price)
    }

    fn name(&self) -> &'static str {
        "goldapi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, ResponseTemplate};

    async fn create_mock_server(status: u16, mock_response: &str) -> wiremock::MockServer {
        let mock_server = wiremock::MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/XAU/USD"))
            .and(header("x-access-token", "test-key"))
            .respond_with(ResponseTemplate::new(status).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn provider(base_url: &str, api_key: Option<&str>) -> GoldApiProvider {
        GoldApiProvider::new(
            HttpClient::new(Duration::from_secs(5), 0).unwrap(),
            &ApiConfig {
                base_url: Some(base_url.to_string()),
                api_key: api_key.map(str::to_string),
            },
        )
    }

    #[tokio::test]
    async fn test_fetch_gold_price() {
        let mock_server = create_mock_server(
            200,
            r#"{"timestamp": 1718000000, "metal": "XAU", "currency": "USD", "price": 2345.67}"#,
        )
        .await;

        let price = provider(&mock_server.uri(), Some("test-key"))
            .fetch_gold_price()
            .await
            .unwrap();
        assert_eq!(price, dec!(2345.67));
    }

    #[tokio::test]
    async fn test_fetch_fails_without_key() {
        let mock_server = create_mock_server(200, r#"{"price": 2345.67}"#).await;
        let err = provider(&mock_server.uri(), None)
            .fetch_gold_price()
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "GoldAPI key not configured");
    }

    #[tokio::test]
    async fn test_fetch_fails_on_http_error() {
        let mock_server = create_mock_server(403, r#"{"error": "Invalid API Key"}"#).await;
        let result = provider(&mock_server.uri(), Some("test-key"))
            .fetch_gold_price()
            .await;
        assert!(result.is_err());
    }
}
