use super::{Store, latest_per_asset, newest_first};
use crate::core::asset::{AssetPrice, AssetType};
use crate::core::basket::BasketComposition;
use crate::core::error::Result;
use crate::core::currency::ExchangeRate;
use crate::core::reserve::{ReserveBalance, ReserveDelta, ReserveTransaction};
use crate::core::valuation::ActPriceSnapshot;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct Tables {
    asset_prices: Vec<AssetPrice>,
    baskets: Vec<BasketComposition>,
    reserves: BTreeMap<AssetType, ReserveBalance>,
    transactions: Vec<ReserveTransaction>,
    snapshots: Vec<ActPriceSnapshot>,
    exchange_rates: HashMap<(String, String), ExchangeRate>,
}

/// In-memory store. One lock guards every table, so each call is atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_asset_price(&self, price: AssetPrice) -> Result<()> {
        let mut tables = self.inner.lock().await;
        tables.asset_prices.push(price);
        Ok(())
    }

    async fn latest_asset_prices(&self) -> Result<Vec<AssetPrice>> {
        let tables = self.inner.lock().await;
        Ok(latest_per_asset(tables.asset_prices.iter().cloned()))
    }

    async fn active_basket(&self) -> Result<Option<BasketComposition>> {
        let tables = self.inner.lock().await;
        Ok(tables.baskets.iter().find(|b| b.is_active).cloned())
    }

    async fn replace_active_basket(&self, next: BasketComposition) -> Result<BasketComposition> {
        let mut tables = self.inner.lock().await;
        for basket in tables.baskets.iter_mut().filter(|b| b.is_active) {
            debug!(basket_id = %basket.id, "Deactivating basket composition");
            basket.is_active = false;
        }
        tables.baskets.push(next.clone());
        Ok(next)
    }

    async fn baskets(&self) -> Result<Vec<BasketComposition>> {
        let tables = self.inner.lock().await;
        Ok(newest_first(
            tables.baskets.clone(),
            |b| b.activated_at,
            usize::MAX,
        ))
    }

    async fn reserve_balances(&self) -> Result<Vec<ReserveBalance>> {
        let tables = self.inner.lock().await;
        Ok(tables.reserves.values().cloned().collect())
    }

    async fn apply_reserve_delta(&self, delta: ReserveDelta) -> Result<ReserveBalance> {
        let mut tables = self.inner.lock().await;
        let updated = delta.apply_to(tables.reserves.get(&delta.asset_type))?;
        tables.reserves.insert(delta.asset_type, updated.clone());
        Ok(updated)
    }

    async fn insert_reserve_transaction(&self, tx: ReserveTransaction) -> Result<()> {
        let mut tables = self.inner.lock().await;
        tables.transactions.push(tx);
        Ok(())
    }

    async fn reserve_transactions(&self, limit: usize) -> Result<Vec<ReserveTransaction>> {
        let tables = self.inner.lock().await;
        Ok(newest_first(
            tables.transactions.clone(),
            |t| t.executed_at,
            limit,
        ))
    }

    async fn insert_snapshot(&self, snapshot: ActPriceSnapshot) -> Result<()> {
        let mut tables = self.inner.lock().await;
        tables.snapshots.push(snapshot);
        Ok(())
    }

    async fn snapshots(&self, limit: usize) -> Result<Vec<ActPriceSnapshot>> {
        let tables = self.inner.lock().await;
        Ok(newest_first(
            tables.snapshots.clone(),
            |s| s.calculated_at,
            limit,
        ))
    }

    async fn upsert_exchange_rate(&self, rate: ExchangeRate) -> Result<()> {
        let mut tables = self.inner.lock().await;
        let key = (rate.from_currency.clone(), rate.to_currency.clone());
        tables.exchange_rates.insert(key, rate);
        Ok(())
    }

    async fn exchange_rate(&self, from: &str, to: &str) -> Result<Option<ExchangeRate>> {
        let tables = self.inner.lock().await;
        Ok(tables
            .exchange_rates
            .get(&(from.to_string(), to.to_string()))
            .cloned())
    }
}

/// Memory store with switchable write failures and a hideable active basket.
#[cfg(test)]
pub(crate) struct FailingStore {
    pub inner: MemoryStore,
    pub fail_snapshots: bool,
    pub fail_transactions: bool,
    pub hide_active_basket: bool,
}

#[cfg(test)]
impl FailingStore {
    fn healthy() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_snapshots: false,
            fail_transactions: false,
            hide_active_basket: false,
        }
    }

    pub fn snapshots_fail() -> Self {
        Self {
            fail_snapshots: true,
            ..Self::healthy()
        }
    }

    pub fn transactions_fail() -> Self {
        Self {
            fail_transactions: true,
            ..Self::healthy()
        }
    }

    /// Accepts basket replacements but never reports an active row.
    pub fn active_basket_missing() -> Self {
        Self {
            hide_active_basket: true,
            ..Self::healthy()
        }
    }
}

#[cfg(test)]
#[async_trait]
impl Store for FailingStore {
    async fn insert_asset_price(&self, price: AssetPrice) -> Result<()> {
        self.inner.insert_asset_price(price).await
    }
    async fn latest_asset_prices(&self) -> Result<Vec<AssetPrice>> {
        self.inner.latest_asset_prices().await
    }
    async fn active_basket(&self) -> Result<Option<BasketComposition>> {
        if self.hide_active_basket {
            return Ok(None);
        }
        self.inner.active_basket().await
    }
    async fn replace_active_basket(&self, next: BasketComposition) -> Result<BasketComposition> {
        self.inner.replace_active_basket(next).await
    }
    async fn baskets(&self) -> Result<Vec<BasketComposition>> {
        self.inner.baskets().await
    }
    async fn reserve_balances(&self) -> Result<Vec<ReserveBalance>> {
        self.inner.reserve_balances().await
    }
    async fn apply_reserve_delta(&self, delta: ReserveDelta) -> Result<ReserveBalance> {
        self.inner.apply_reserve_delta(delta).await
    }
    async fn insert_reserve_transaction(&self, tx: ReserveTransaction) -> Result<()> {
        if self.fail_transactions {
            return Err(crate::core::error::EngineError::persistence("disk full"));
        }
        self.inner.insert_reserve_transaction(tx).await
    }
    async fn reserve_transactions(&self, limit: usize) -> Result<Vec<ReserveTransaction>> {
        self.inner.reserve_transactions(limit).await
    }
    async fn insert_snapshot(&self, snapshot: ActPriceSnapshot) -> Result<()> {
        if self.fail_snapshots {
            return Err(crate::core::error::EngineError::persistence("disk full"));
        }
        self.inner.insert_snapshot(snapshot).await
    }
    async fn snapshots(&self, limit: usize) -> Result<Vec<ActPriceSnapshot>> {
        self.inner.snapshots(limit).await
    }
    async fn upsert_exchange_rate(&self, rate: ExchangeRate) -> Result<()> {
        self.inner.upsert_exchange_rate(rate).await
    }
    async fn exchange_rate(&self, from: &str, to: &str) -> Result<Option<ExchangeRate>> {
        self.inner.exchange_rate(from, to).await
    }
}
