//! Scheduled refresh jobs: fetch upstream prices, record them and persist a
//! new ACT snapshot.

use crate::core::asset::AssetType;
use crate::core::currency::{ExchangeRateService, RateUpdateSummary};
use crate::core::price::GoldPriceService;
use crate::core::valuation::ValuationEngine;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const GOLD_REFRESH_SOURCE: &str = "cron_gold_update";
pub const SCHEDULED_REFRESH_SOURCE: &str = "cron_job";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoldRefreshSummary {
    pub success: bool,
    #[serde(with = "rust_decimal::serde::float")]
    pub gold_price: Decimal,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub act_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StepOutcome {
    pub success: bool,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResults {
    pub exchange_rates: RateUpdateSummary,
    pub gold_price: StepOutcome,
    pub act_price: StepOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct FullRefreshSummary {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<RefreshResults>,
}

pub struct RefreshJobs {
    gold: Arc<GoldPriceService>,
    rates: Arc<ExchangeRateService>,
    engine: Arc<ValuationEngine>,
    auto_update_rates: bool,
}

impl RefreshJobs {
    pub fn new(
        gold: Arc<GoldPriceService>,
        rates: Arc<ExchangeRateService>,
        engine: Arc<ValuationEngine>,
        auto_update_rates: bool,
    ) -> Self {
        Self {
            gold,
            rates,
            engine,
            auto_update_rates,
        }
    }

    async fn record_gold(&self, source: &str) -> (Decimal, StepOutcome) {
        let price = self.gold.current_gold_price().await;
        let outcome = match self
            .engine
            .record_asset_price(AssetType::Gold, price, source)
            .await
        {
            Ok(_) => StepOutcome {
                success: true,
                price: Some(price),
                error: None,
            },
            Err(e) => {
                warn!(error = %e, "Failed to record gold price");
                StepOutcome {
                    success: false,
                    price: Some(price),
                    error: Some(e.to_string()),
                }
            }
        };
        (price, outcome)
    }

    // A computed price is reported even when saving the snapshot fails.
    async fn snapshot(&self) -> StepOutcome {
        let snapshot = match self.engine.compute_current().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Failed to compute ACT price");
                return StepOutcome {
                    success: false,
                    price: None,
                    error: Some(e.to_string()),
                };
            }
        };
        let price = Some(snapshot.price_usd);
        match self.engine.persist_snapshot(snapshot).await {
            Ok(_) => StepOutcome {
                success: true,
                price,
                error: None,
            },
            Err(e) => {
                warn!(error = %e, "Failed to save ACT price");
                StepOutcome {
                    success: false,
                    price,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Records the current gold price and persists a fresh snapshot.
    #[instrument(name = "GoldRefresh", skip_all, fields(provider = self.gold.provider_name()))]
    pub async fn refresh_gold(&self) -> GoldRefreshSummary {
        let (gold_price, gold) = self.record_gold(GOLD_REFRESH_SOURCE).await;
        let act = self.snapshot().await;

        let error = gold.error.or(act.error);
        let summary = GoldRefreshSummary {
            success: gold.success && act.success,
            gold_price,
            act_price: act.price,
            error,
            timestamp: Utc::now(),
        };
        info!(success = summary.success, %gold_price, "Gold refresh finished");
        summary
    }

    /// Exchange rates, gold and a snapshot in one pass. Each step runs even
    /// when an earlier one failed.
    #[instrument(name = "FullRefresh", skip_all)]
    pub async fn refresh_all(&self) -> FullRefreshSummary {
        if !self.auto_update_rates {
            info!("Automatic rate updates are disabled");
            return FullRefreshSummary {
                success: false,
                message: Some("Automatic rate updates are disabled".to_string()),
                timestamp: None,
                results: None,
            };
        }

        let exchange_rates = self.rates.update_all_rates().await;
        let (_, gold_price) = self.record_gold(SCHEDULED_REFRESH_SOURCE).await;
        let act_price = self.snapshot().await;

        let success = exchange_rates.success && gold_price.success && act_price.success;
        info!(success, rates_updated = exchange_rates.updated, "Full refresh finished");
        FullRefreshSummary {
            success,
            message: None,
            timestamp: Some(Utc::now()),
            results: Some(RefreshResults {
                exchange_rates,
                gold_price,
                act_price,
            }),
        }
    }
}
