pub mod currencyapi_provider;
pub mod exchangerate_provider;
pub mod fixer_provider;
pub mod goldapi_provider;
pub mod manual_provider;
pub mod metals_provider;
pub mod openexchange_provider;
pub mod util;

use crate::core::config::ProvidersConfig;
use crate::core::currency::ExchangeRateProvider;
use crate::core::price::GoldPriceProvider;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};
use util::HttpClient;

pub fn http_client(config: &ProvidersConfig) -> Result<HttpClient> {
    HttpClient::new(config.timeout(), config.retries)
}

/// Builds the gold provider named by `providers.gold.primary`. Unknown names
/// select the manual provider.
pub fn gold_provider(config: &ProvidersConfig) -> Result<Arc<dyn GoldPriceProvider>> {
    let http = http_client(config)?;
    let gold = &config.gold;
    let provider: Arc<dyn GoldPriceProvider> = match gold.primary.to_lowercase().as_str() {
        "goldapi" => Arc::new(goldapi_provider::GoldApiProvider::new(http, &gold.goldapi)),
        "metalslive" => Arc::new(metals_provider::MetalsLiveProvider::new(http, &gold.metals_live)),
        "metalsapi" => Arc::new(metals_provider::MetalsApiProvider::new(http, &gold.metals_api)),
        "manual" => Arc::new(manual_provider::ManualGoldProvider::default()),
        other => {
            warn!(provider = other, "Unknown gold price provider, using manual");
            Arc::new(manual_provider::ManualGoldProvider::default())
        }
    };
    debug!(provider = provider.name(), "Selected gold price provider");
    Ok(provider)
}

/// Builds the rate provider named by `providers.rates.primary`. Unknown
/// names select ExchangeRate-API.
pub fn rate_provider(config: &ProvidersConfig) -> Result<Arc<dyn ExchangeRateProvider>> {
    let http = http_client(config)?;
    let rates = &config.rates;
    let provider: Arc<dyn ExchangeRateProvider> = match rates.primary.to_lowercase().as_str() {
        "exchangerate" => Arc::new(exchangerate_provider::ExchangeRateApiProvider::new(
            http,
            &rates.exchangerate,
        )),
        "fixer" => Arc::new(fixer_provider::FixerProvider::new(http, &rates.fixer)),
        "openexchange" => Arc::new(openexchange_provider::OpenExchangeProvider::new(
            http,
            &rates.openexchange,
        )),
        "currencyapi" => Arc::new(currencyapi_provider::CurrencyApiProvider::new(
            http,
            &rates.currencyapi,
        )),
        other => {
            warn!(provider = other, "Unknown exchange rate provider, using exchangerate");
            Arc::new(exchangerate_provider::ExchangeRateApiProvider::new(
                http,
                &rates.exchangerate,
            ))
        }
    };
    debug!(provider = provider.name(), "Selected exchange rate provider");
    Ok(provider)
}
