//! Persistence layer for the ledger, registry and price history.
//!
//! Every mutation that touches more than one record (basket replacement,
//! reserve deltas) is a single `Store` call so implementations can apply it
//! atomically.

pub mod disk;
pub mod memory;

use crate::core::asset::AssetPrice;
use crate::core::basket::BasketComposition;
use crate::core::config::{AppConfig, StorageKind};
use crate::core::error::Result;
use crate::core::currency::ExchangeRate;
use crate::core::reserve::{ReserveBalance, ReserveDelta, ReserveTransaction};
use crate::core::valuation::ActPriceSnapshot;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use disk::DiskStore;
use memory::MemoryStore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_asset_price(&self, price: AssetPrice) -> Result<()>;

    /// Most recent observation per asset type.
    async fn latest_asset_prices(&self) -> Result<Vec<AssetPrice>>;

    async fn active_basket(&self) -> Result<Option<BasketComposition>>;

    /// Deactivates the current active row (if any) and inserts `next` as the
    /// only active row, as one atomic change.
    async fn replace_active_basket(&self, next: BasketComposition) -> Result<BasketComposition>;

    /// Newest first.
    async fn baskets(&self) -> Result<Vec<BasketComposition>>;

    /// Ordered by asset type.
    async fn reserve_balances(&self) -> Result<Vec<ReserveBalance>>;

    /// Applies a signed delta to one balance row, creating it when missing.
    /// Rejects deltas that would make either field negative.
    async fn apply_reserve_delta(&self, delta: ReserveDelta) -> Result<ReserveBalance>;

    async fn insert_reserve_transaction(&self, tx: ReserveTransaction) -> Result<()>;

    /// Newest first.
    async fn reserve_transactions(&self, limit: usize) -> Result<Vec<ReserveTransaction>>;

    async fn insert_snapshot(&self, snapshot: ActPriceSnapshot) -> Result<()>;

    /// Newest first.
    async fn snapshots(&self, limit: usize) -> Result<Vec<ActPriceSnapshot>>;

    async fn upsert_exchange_rate(&self, rate: ExchangeRate) -> Result<()>;

    async fn exchange_rate(&self, from: &str, to: &str) -> Result<Option<ExchangeRate>>;
}

/// Opens the store selected by the configuration.
pub fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    match config.storage {
        StorageKind::Memory => {
            debug!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageKind::Disk => {
            let path = config.default_data_path()?.join("ledger");
            debug!("Opening disk store at {}", path.display());
            let store = DiskStore::open(&path)
                .with_context(|| format!("Failed to open store at {}", path.display()))?;
            Ok(Arc::new(store))
        }
    }
}

pub(crate) fn latest_per_asset(observations: impl IntoIterator<Item = AssetPrice>) -> Vec<AssetPrice> {
    let mut latest: HashMap<_, AssetPrice> = HashMap::new();
    for obs in observations {
        match latest.get(&obs.asset_type) {
            Some(current) if current.fetched_at > obs.fetched_at => {}
            _ => {
                latest.insert(obs.asset_type, obs);
            }
        }
    }
    let mut prices: Vec<AssetPrice> = latest.into_values().collect();
    prices.sort_by_key(|p| p.asset_type);
    prices
}

/// Sorts insertion-ordered records newest first. Records sharing a timestamp
/// keep reverse insertion order.
pub(crate) fn newest_first<T, F>(mut items: Vec<T>, timestamp: F, limit: usize) -> Vec<T>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.reverse();
    items.sort_by(|a, b| timestamp(b).cmp(&timestamp(a)));
    items.truncate(limit);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::asset::AssetType;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[test]
    fn test_latest_per_asset() {
        let now = Utc::now();
        let obs = |asset_type, price, mins| AssetPrice {
            asset_type,
            price_usd: price,
            source: "test".into(),
            fetched_at: now - Duration::minutes(mins),
        };
        let latest = latest_per_asset(vec![
            obs(AssetType::Eur, dec!(1.07), 10),
            obs(AssetType::Gold, dec!(2000), 10),
            obs(AssetType::Gold, dec!(2100), 0),
            obs(AssetType::Eur, dec!(1.09), 20),
        ]);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].price_usd, dec!(2100));
        assert_eq!(latest[1].price_usd, dec!(1.07));
    }

    #[test]
    fn test_newest_first_breaks_ties_by_insertion() {
        let now = Utc::now();
        let items = vec![(1, now), (2, now), (3, now - Duration::seconds(1))];
        let sorted = newest_first(items, |(_, ts)| *ts, 10);
        let ids: Vec<i32> = sorted.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2, 1, 3]);

        let limited = newest_first(vec![(1, now), (2, now)], |(_, ts)| *ts, 1);
        assert_eq!(limited[0].0, 2);
    }
}
