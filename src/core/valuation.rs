//! Reserve-backed valuation of the ACT token.
//!
//! [`compute_price`] is a pure function over already-fetched inputs. The
//! [`ValuationEngine`] gathers those inputs from the store, degrading to the
//! fallback asset prices when they cannot be read, and persists snapshots to
//! the price history.

use crate::core::asset::{AssetPrice, AssetPrices, AssetType};
use crate::core::basket::BasketComposition;
use crate::core::error::{EngineError, Result};
use crate::core::reserve::ReserveAmounts;
use crate::store::Store;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_TOTAL_SUPPLY: Decimal = dec!(1000000);
pub const DEFAULT_REBALANCE_THRESHOLD: Decimal = dec!(0.8);

/// USD price the token is meant to hold; `peg_ratio` is measured against it.
pub const PEG_TARGET_USD: Decimal = Decimal::ONE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActPriceSnapshot {
    pub id: Uuid,
    pub price_usd: Decimal,
    pub total_supply: Decimal,
    pub total_reserve_usd: Decimal,
    /// Reserves over `total_supply * price_usd`. Since `price_usd` derives
    /// from the same reserves this is 1 whenever reserves and supply exist.
    pub reserve_ratio: Decimal,
    /// Reserves over `total_supply * PEG_TARGET_USD`.
    pub peg_ratio: Decimal,
    pub gold_component_usd: Decimal,
    pub usd_component: Decimal,
    pub eur_component_usd: Decimal,
    pub basket_composition_id: Option<Uuid>,
    pub calculated_at: DateTime<Utc>,
}

/// USD value of `reserves` at `prices`, or `None` when it is not
/// representable as a `Decimal`.
pub fn reserve_value_usd(prices: &AssetPrices, reserves: &ReserveAmounts) -> Option<Decimal> {
    AssetType::ALL.iter().try_fold(Decimal::ZERO, |total, &asset| {
        reserves
            .get(asset)
            .checked_mul(prices.get(asset))
            .and_then(|component| total.checked_add(component))
    })
}

/// Computes the token price and collateralization for the given inputs.
///
/// Never fails and never divides by zero: zero supply yields a price and
/// ratios of 1, zero reserves yield a price and ratios of 0. Values beyond
/// the `Decimal` range saturate at `Decimal::MAX`.
pub fn compute_price(
    prices: &AssetPrices,
    basket: Option<&BasketComposition>,
    reserves: &ReserveAmounts,
    total_supply: Decimal,
) -> ActPriceSnapshot {
    let gold_component_usd = reserves.gold.saturating_mul(prices.gold);
    let usd_component = reserves.usd.saturating_mul(prices.usd);
    let eur_component_usd = reserves.eur.saturating_mul(prices.eur);
    let total_reserve_usd = gold_component_usd
        .saturating_add(usd_component)
        .saturating_add(eur_component_usd);

    let (price_usd, reserve_ratio, peg_ratio) = if total_supply > Decimal::ZERO {
        let price_usd = total_reserve_usd
            .checked_div(total_supply)
            .unwrap_or(Decimal::ONE);
        let reserve_ratio = total_reserve_usd
            .checked_div(total_supply.saturating_mul(price_usd))
            .unwrap_or(Decimal::ZERO);
        let peg_ratio = total_reserve_usd
            .checked_div(total_supply.saturating_mul(PEG_TARGET_USD))
            .unwrap_or(Decimal::ZERO);
        (price_usd, reserve_ratio, peg_ratio)
    } else {
        (Decimal::ONE, Decimal::ONE, Decimal::ONE)
    };

    ActPriceSnapshot {
        id: Uuid::now_v7(),
        price_usd,
        total_supply,
        total_reserve_usd,
        reserve_ratio,
        peg_ratio,
        gold_component_usd,
        usd_component,
        eur_component_usd,
        basket_composition_id: basket.map(|b| b.id),
        calculated_at: Utc::now(),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ValuationSettings {
    pub total_supply: Decimal,
    pub rebalance_threshold: Decimal,
}

impl Default for ValuationSettings {
    fn default() -> Self {
        Self {
            total_supply: DEFAULT_TOTAL_SUPPLY,
            rebalance_threshold: DEFAULT_REBALANCE_THRESHOLD,
        }
    }
}

pub struct ValuationEngine {
    store: Arc<dyn Store>,
    settings: ValuationSettings,
}

impl ValuationEngine {
    pub fn new(store: Arc<dyn Store>, settings: ValuationSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &ValuationSettings {
        &self.settings
    }

    /// Current price per asset. A failed read is not an error here: every
    /// asset falls back to its default price.
    pub async fn current_asset_prices(&self) -> AssetPrices {
        match self.store.latest_asset_prices().await {
            Ok(observations) => AssetPrices::from_observations(&observations),
            Err(e) => {
                warn!(error = %e, "Error fetching asset prices, using fallback prices");
                AssetPrices::default()
            }
        }
    }

    /// Appends a price observation. Prices must be positive.
    pub async fn record_asset_price(
        &self,
        asset_type: AssetType,
        price_usd: Decimal,
        source: &str,
    ) -> Result<AssetPrice> {
        if price_usd <= Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "{asset_type} price must be positive, got {price_usd}"
            )));
        }
        let observation = AssetPrice {
            asset_type,
            price_usd,
            source: source.to_string(),
            fetched_at: Utc::now(),
        };
        self.store.insert_asset_price(observation.clone()).await?;
        debug!(asset = %asset_type, %price_usd, source, "Recorded asset price");
        Ok(observation)
    }

    pub async fn compute_current(&self) -> Result<ActPriceSnapshot> {
        let prices = self.current_asset_prices().await;
        let basket = self.store.active_basket().await?;
        let balances = self.store.reserve_balances().await?;
        let reserves = ReserveAmounts::from_balances(&balances);

        let snapshot = compute_price(
            &prices,
            basket.as_ref(),
            &reserves,
            self.settings.total_supply,
        );
        debug!(
            price_usd = %snapshot.price_usd,
            total_reserve_usd = %snapshot.total_reserve_usd,
            "Computed ACT price"
        );
        Ok(snapshot)
    }

    /// Stamps the currently active basket onto the snapshot and appends it to
    /// the price history.
    pub async fn persist_snapshot(&self, mut snapshot: ActPriceSnapshot) -> Result<ActPriceSnapshot> {
        snapshot.basket_composition_id = self.store.active_basket().await?.map(|b| b.id);
        self.store.insert_snapshot(snapshot.clone()).await?;
        info!(
            snapshot_id = %snapshot.id,
            price_usd = %snapshot.price_usd,
            "Saved ACT price snapshot"
        );
        Ok(snapshot)
    }

    pub async fn refresh(&self) -> Result<ActPriceSnapshot> {
        let snapshot = self.compute_current().await?;
        self.persist_snapshot(snapshot).await
    }

    pub async fn latest_snapshot(&self) -> Result<Option<ActPriceSnapshot>> {
        Ok(self.store.snapshots(1).await?.into_iter().next())
    }

    /// Most recent snapshots first.
    pub async fn list_snapshots(&self, limit: usize) -> Result<Vec<ActPriceSnapshot>> {
        self.store.snapshots(limit).await
    }

    /// True when reserves cover less than `threshold` of the supply valued at
    /// the peg target.
    pub async fn needs_rebalancing(&self, threshold: Option<Decimal>) -> Result<bool> {
        let threshold = threshold.unwrap_or(self.settings.rebalance_threshold);
        let snapshot = self.compute_current().await?;
        Ok(snapshot.peg_ratio < threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reserve::ReserveDelta;
    use crate::store::memory::MemoryStore;

    fn scenario_prices() -> AssetPrices {
        AssetPrices {
            gold: dec!(2000),
            usd: dec!(1),
            eur: dec!(1.08),
        }
    }

    fn scenario_reserves() -> ReserveAmounts {
        ReserveAmounts {
            gold: dec!(10),
            usd: dec!(500000),
            eur: dec!(200000),
        }
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for (asset_type, amount, amount_usd) in [
            (AssetType::Gold, dec!(10), dec!(20000)),
            (AssetType::Usd, dec!(500000), dec!(500000)),
            (AssetType::Eur, dec!(200000), dec!(216000)),
        ] {
            store
                .apply_reserve_delta(ReserveDelta {
                    asset_type,
                    amount,
                    amount_usd,
                    location: None,
                    custody_provider: None,
                })
                .await
                .unwrap();
        }
        store
    }

    #[test]
    fn test_reference_scenario() {
        let snapshot = compute_price(
            &scenario_prices(),
            None,
            &scenario_reserves(),
            DEFAULT_TOTAL_SUPPLY,
        );
        assert_eq!(snapshot.gold_component_usd, dec!(20000));
        assert_eq!(snapshot.usd_component, dec!(500000));
        assert_eq!(snapshot.eur_component_usd, dec!(216000));
        assert_eq!(snapshot.total_reserve_usd, dec!(736000));
        assert_eq!(snapshot.price_usd, dec!(0.736));
        assert_eq!(snapshot.reserve_ratio, Decimal::ONE);
        assert_eq!(snapshot.peg_ratio, dec!(0.736));
        assert_eq!(snapshot.total_supply, dec!(1000000));
    }

    #[test]
    fn test_out_of_range_reserves_saturate() {
        let reserves = ReserveAmounts {
            gold: Decimal::from_i128_with_scale(10_i128.pow(26), 0),
            usd: dec!(0),
            eur: dec!(0),
        };
        assert_eq!(reserve_value_usd(&scenario_prices(), &reserves), None);

        let snapshot = compute_price(&scenario_prices(), None, &reserves, DEFAULT_TOTAL_SUPPLY);
        assert_eq!(snapshot.gold_component_usd, Decimal::MAX);
        assert_eq!(snapshot.total_reserve_usd, Decimal::MAX);
        assert!(snapshot.price_usd > Decimal::ZERO);
    }

    #[test]
    fn test_compute_is_deterministic() {
        let a = compute_price(&scenario_prices(), None, &scenario_reserves(), dec!(250000));
        let b = compute_price(&scenario_prices(), None, &scenario_reserves(), dec!(250000));
        assert_eq!(a.price_usd, b.price_usd);
        assert_eq!(a.total_reserve_usd, b.total_reserve_usd);
        assert_eq!(a.reserve_ratio, b.reserve_ratio);
        assert_eq!(a.peg_ratio, b.peg_ratio);
    }

    #[test]
    fn test_zero_reserves_price_is_zero() {
        let snapshot = compute_price(
            &scenario_prices(),
            None,
            &ReserveAmounts::default(),
            DEFAULT_TOTAL_SUPPLY,
        );
        assert_eq!(snapshot.total_reserve_usd, Decimal::ZERO);
        assert_eq!(snapshot.price_usd, Decimal::ZERO);
        assert_eq!(snapshot.reserve_ratio, Decimal::ZERO);
        assert_eq!(snapshot.peg_ratio, Decimal::ZERO);
    }

    #[test]
    fn test_zero_supply_falls_back_to_one() {
        let snapshot = compute_price(
            &scenario_prices(),
            None,
            &scenario_reserves(),
            Decimal::ZERO,
        );
        assert_eq!(snapshot.price_usd, Decimal::ONE);
        assert_eq!(snapshot.reserve_ratio, Decimal::ONE);
        assert_eq!(snapshot.total_reserve_usd, dec!(736000));
    }

    #[tokio::test]
    async fn test_compute_current_uses_fallback_prices() {
        let store = seeded_store().await;
        let engine = ValuationEngine::new(store, ValuationSettings::default());

        let snapshot = engine.compute_current().await.unwrap();
        assert_eq!(snapshot.price_usd, dec!(0.736));
        assert!(snapshot.basket_composition_id.is_none());
    }

    #[tokio::test]
    async fn test_recorded_gold_price_changes_valuation() {
        let store = seeded_store().await;
        let engine = ValuationEngine::new(store, ValuationSettings::default());

        engine
            .record_asset_price(AssetType::Gold, dec!(2500), "test")
            .await
            .unwrap();
        let snapshot = engine.compute_current().await.unwrap();
        assert_eq!(snapshot.gold_component_usd, dec!(25000));
        assert_eq!(snapshot.price_usd, dec!(0.741));
    }

    #[tokio::test]
    async fn test_non_positive_price_rejected() {
        let engine = ValuationEngine::new(Arc::new(MemoryStore::new()), ValuationSettings::default());
        let err = engine
            .record_asset_price(AssetType::Eur, dec!(-1.08), "test")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(engine.current_asset_prices().await, AssetPrices::default());
    }

    #[tokio::test]
    async fn test_persisted_snapshot_round_trips() {
        let store = seeded_store().await;
        let engine = ValuationEngine::new(store, ValuationSettings::default());

        let computed = engine.compute_current().await.unwrap();
        let saved = engine.persist_snapshot(computed.clone()).await.unwrap();

        let listed = engine.list_snapshots(1).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], saved);
        assert_eq!(listed[0].price_usd, computed.price_usd);
        assert_eq!(listed[0].total_reserve_usd, computed.total_reserve_usd);
        assert_eq!(listed[0].eur_component_usd, computed.eur_component_usd);
        assert_eq!(engine.latest_snapshot().await.unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn test_persist_stamps_active_basket() {
        let store = seeded_store().await;
        let basket = crate::core::basket::BasketRegistry::new(store.clone())
            .replace_active(dec!(0.4), dec!(0.3), dec!(0.3), "", "root")
            .await
            .unwrap();
        let engine = ValuationEngine::new(store, ValuationSettings::default());

        let snapshot = compute_price(&scenario_prices(), None, &scenario_reserves(), dec!(1));
        let saved = engine.persist_snapshot(snapshot).await.unwrap();
        assert_eq!(saved.basket_composition_id, Some(basket.id));
    }

    #[tokio::test]
    async fn test_needs_rebalancing_uses_peg_ratio() {
        let store = seeded_store().await;
        let engine = ValuationEngine::new(store, ValuationSettings::default());

        // peg ratio 0.736 is under the default 0.8 threshold
        assert!(engine.needs_rebalancing(None).await.unwrap());
        assert!(!engine.needs_rebalancing(Some(dec!(0.7))).await.unwrap());
    }
}
