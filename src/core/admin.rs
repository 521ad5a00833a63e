//! Privileged operations behind the admin gate.
//!
//! Handlers never return `Err`: every outcome is folded into an
//! [`ActionResponse`] so callers can forward it as-is.

use crate::core::asset::AssetType;
use crate::core::auth::{AccessLevel, AdminGate};
use crate::core::basket::{BasketComposition, BasketRegistry};
use crate::core::error::Result;
use crate::core::reserve::{DEFAULT_TRANSACTION_LIMIT, ReserveBalance, ReserveLedger, ReserveTransaction};
use crate::core::valuation::{ActPriceSnapshot, ValuationEngine};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ActionResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

impl<T> From<Result<T>> for ActionResponse<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => ActionResponse::ok(data),
            Err(e) => ActionResponse::failed(e.to_string()),
        }
    }
}

pub struct AdminService {
    gate: AdminGate,
    registry: Arc<BasketRegistry>,
    ledger: Arc<ReserveLedger>,
    engine: Arc<ValuationEngine>,
}

impl AdminService {
    pub fn new(
        gate: AdminGate,
        registry: Arc<BasketRegistry>,
        ledger: Arc<ReserveLedger>,
        engine: Arc<ValuationEngine>,
    ) -> Self {
        Self {
            gate,
            registry,
            ledger,
            engine,
        }
    }

    // The mutation already committed; a failed snapshot only leaves the
    // price history one step behind.
    async fn refresh_after_mutation(&self) {
        if let Err(e) = self.engine.refresh().await {
            warn!(error = %e, "Failed to refresh ACT price after mutation");
        }
    }

    pub async fn basket_history(&self, actor: Option<&str>) -> ActionResponse<Vec<BasketComposition>> {
        if let Err(e) = self.gate.authorize(actor, AccessLevel::Admin) {
            return ActionResponse::failed(e.to_string());
        }
        self.registry.history().await.into()
    }

    pub async fn update_basket(
        &self,
        actor: Option<&str>,
        gold_weight: Decimal,
        usd_weight: Decimal,
        eur_weight: Decimal,
        notes: &str,
    ) -> ActionResponse<BasketComposition> {
        let actor = match self.gate.authorize(actor, AccessLevel::SuperAdmin) {
            Ok(()) => actor.unwrap_or_default(),
            Err(e) => return ActionResponse::failed(e.to_string()),
        };
        match self
            .registry
            .replace_active(gold_weight, usd_weight, eur_weight, notes, actor)
            .await
        {
            Ok(basket) => {
                self.refresh_after_mutation().await;
                ActionResponse::ok(basket)
            }
            Err(e) => ActionResponse::failed(e.to_string()),
        }
    }

    pub async fn reserves(&self, actor: Option<&str>) -> ActionResponse<Vec<ReserveBalance>> {
        if let Err(e) = self.gate.authorize(actor, AccessLevel::Admin) {
            return ActionResponse::failed(e.to_string());
        }
        self.ledger.list_balances().await.into()
    }

    pub async fn add_reserve(
        &self,
        actor: Option<&str>,
        asset_type: AssetType,
        amount: Decimal,
        amount_usd: Decimal,
        location: Option<String>,
        custody_provider: Option<String>,
    ) -> ActionResponse<ReserveBalance> {
        let actor = match self.gate.authorize(actor, AccessLevel::SuperAdmin) {
            Ok(()) => actor.unwrap_or_default(),
            Err(e) => return ActionResponse::failed(e.to_string()),
        };
        match self
            .ledger
            .add_reserve(asset_type, amount, amount_usd, location, custody_provider, actor)
            .await
        {
            Ok(balance) => {
                self.refresh_after_mutation().await;
                ActionResponse::ok(balance)
            }
            Err(e) => ActionResponse::failed(e.to_string()),
        }
    }

    pub async fn withdraw_reserve(
        &self,
        actor: Option<&str>,
        asset_type: AssetType,
        amount: Decimal,
        amount_usd: Decimal,
        reason: &str,
    ) -> ActionResponse<ReserveBalance> {
        let actor = match self.gate.authorize(actor, AccessLevel::SuperAdmin) {
            Ok(()) => actor.unwrap_or_default(),
            Err(e) => return ActionResponse::failed(e.to_string()),
        };
        match self
            .ledger
            .withdraw_reserve(asset_type, amount, amount_usd, reason, actor)
            .await
        {
            Ok(balance) => {
                self.refresh_after_mutation().await;
                ActionResponse::ok(balance)
            }
            Err(e) => ActionResponse::failed(e.to_string()),
        }
    }

    pub async fn reserve_transactions(
        &self,
        actor: Option<&str>,
    ) -> ActionResponse<Vec<ReserveTransaction>> {
        if let Err(e) = self.gate.authorize(actor, AccessLevel::Admin) {
            return ActionResponse::failed(e.to_string());
        }
        self.ledger
            .list_transactions(DEFAULT_TRANSACTION_LIMIT)
            .await
            .into()
    }

    pub async fn force_price_update(&self, actor: Option<&str>) -> ActionResponse<ActPriceSnapshot> {
        if let Err(e) = self.gate.authorize(actor, AccessLevel::Admin) {
            return ActionResponse::failed(e.to_string());
        }
        match self.engine.refresh().await {
            Ok(snapshot) => ActionResponse::ok(snapshot),
            Err(e) => {
                error!(error = %e, "Forced price update failed");
                ActionResponse::failed("Failed to save ACT price")
            }
        }
    }

    pub async fn price_history(&self, limit: usize) -> ActionResponse<Vec<ActPriceSnapshot>> {
        self.engine.list_snapshots(limit).await.into()
    }

    pub async fn current_price(&self) -> ActionResponse<ActPriceSnapshot> {
        self.engine.compute_current().await.into()
    }
}
