use super::{Store, latest_per_asset, newest_first};
use crate::core::asset::{AssetPrice, AssetType};
use crate::core::basket::BasketComposition;
use crate::core::error::{EngineError, Result};
use crate::core::currency::ExchangeRate;
use crate::core::reserve::{ReserveBalance, ReserveDelta, ReserveTransaction};
use crate::core::valuation::ActPriceSnapshot;
use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::{Serialize, de::DeserializeOwned};
use std::path::Path;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Store backed by an fjall keyspace with one partition per collection.
///
/// Writers take `write_lock`, so read-modify-write sequences never
/// interleave. Changes spanning several records are committed as one batch.
pub struct DiskStore {
    keyspace: Keyspace,
    asset_prices: PartitionHandle,
    baskets: PartitionHandle,
    reserves: PartitionHandle,
    transactions: PartitionHandle,
    snapshots: PartitionHandle,
    exchange_rates: PartitionHandle,
    write_lock: Mutex<()>,
}

impl DiskStore {
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(EngineError::persistence)?;
        let keyspace = fjall::Config::new(path).open()?;
        let open = |name: &str| keyspace.open_partition(name, PartitionCreateOptions::default());
        let asset_prices = open("asset_prices")?;
        let baskets = open("act_basket_composition")?;
        let reserves = open("act_reserves")?;
        let transactions = open("reserve_transactions")?;
        let snapshots = open("act_price_history")?;
        let exchange_rates = open("exchange_rates")?;
        debug!("Opened ledger keyspace at {}", path.display());

        Ok(Self {
            keyspace,
            asset_prices,
            baskets,
            reserves,
            transactions,
            snapshots,
            exchange_rates,
            write_lock: Mutex::new(()),
        })
    }

    fn insert_record<T: Serialize>(&self, partition: &PartitionHandle, key: &str, value: &T) -> Result<()> {
        partition.insert(key.as_bytes(), serde_json::to_vec(value)?)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }

    fn read_all<T: DeserializeOwned>(partition: &PartitionHandle) -> Result<Vec<T>> {
        let mut records = Vec::new();
        for item in partition.iter() {
            let (_, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }

    /// Up to `limit` records in descending key order.
    fn read_newest<T: DeserializeOwned>(partition: &PartitionHandle, limit: usize) -> Result<Vec<T>> {
        let mut records = Vec::new();
        for item in partition.iter().rev().take(limit) {
            let (_, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }

    fn read_one<T: DeserializeOwned>(partition: &PartitionHandle, key: &str) -> Result<Option<T>> {
        match partition.get(key.as_bytes())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }
}

// Append-only records are keyed by a v7 uuid so key order follows insertion.
fn append_key() -> String {
    Uuid::now_v7().to_string()
}

fn rate_key(from: &str, to: &str) -> String {
    format!("{from}:{to}")
}

#[async_trait]
impl Store for DiskStore {
    async fn insert_asset_price(&self, price: AssetPrice) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.insert_record(&self.asset_prices, &append_key(), &price)
    }

    // Scans from the newest insertion and stops once every asset is seen.
    async fn latest_asset_prices(&self) -> Result<Vec<AssetPrice>> {
        let mut latest: Vec<AssetPrice> = Vec::with_capacity(AssetType::ALL.len());
        for item in self.asset_prices.iter().rev() {
            let (_, value) = item?;
            let observation: AssetPrice = serde_json::from_slice(&value)?;
            if latest.iter().all(|p| p.asset_type != observation.asset_type) {
                latest.push(observation);
                if latest.len() == AssetType::ALL.len() {
                    break;
                }
            }
        }
        Ok(latest_per_asset(latest))
    }

    // The active row is normally the newest key.
    async fn active_basket(&self) -> Result<Option<BasketComposition>> {
        for item in self.baskets.iter().rev() {
            let (_, value) = item?;
            let basket: BasketComposition = serde_json::from_slice(&value)?;
            if basket.is_active {
                return Ok(Some(basket));
            }
        }
        Ok(None)
    }

    async fn replace_active_basket(&self, next: BasketComposition) -> Result<BasketComposition> {
        let _guard = self.write_lock.lock().await;

        let mut batch = self.keyspace.batch();
        let current: Vec<BasketComposition> = Self::read_all(&self.baskets)?;
        for mut basket in current.into_iter().filter(|b| b.is_active) {
            debug!(basket_id = %basket.id, "Deactivating basket composition");
            basket.is_active = false;
            batch.insert(
                &self.baskets,
                basket.id.to_string().into_bytes(),
                serde_json::to_vec(&basket)?,
            );
        }
        batch.insert(
            &self.baskets,
            next.id.to_string().into_bytes(),
            serde_json::to_vec(&next)?,
        );
        batch.commit()?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(next)
    }

    async fn baskets(&self) -> Result<Vec<BasketComposition>> {
        let baskets: Vec<BasketComposition> = Self::read_all(&self.baskets)?;
        Ok(newest_first(baskets, |b| b.activated_at, usize::MAX))
    }

    async fn reserve_balances(&self) -> Result<Vec<ReserveBalance>> {
        let mut balances: Vec<ReserveBalance> = Self::read_all(&self.reserves)?;
        balances.sort_by_key(|b| b.asset_type);
        Ok(balances)
    }

    async fn apply_reserve_delta(&self, delta: ReserveDelta) -> Result<ReserveBalance> {
        let _guard = self.write_lock.lock().await;
        let key = delta.asset_type.as_str();
        let current: Option<ReserveBalance> = Self::read_one(&self.reserves, key)?;
        let updated = delta.apply_to(current.as_ref())?;
        self.insert_record(&self.reserves, key, &updated)?;
        Ok(updated)
    }

    async fn insert_reserve_transaction(&self, tx: ReserveTransaction) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.insert_record(&self.transactions, &tx.id.to_string(), &tx)
    }

    async fn reserve_transactions(&self, limit: usize) -> Result<Vec<ReserveTransaction>> {
        Self::read_newest(&self.transactions, limit)
    }

    async fn insert_snapshot(&self, snapshot: ActPriceSnapshot) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.insert_record(&self.snapshots, &snapshot.id.to_string(), &snapshot)
    }

    async fn snapshots(&self, limit: usize) -> Result<Vec<ActPriceSnapshot>> {
        Self::read_newest(&self.snapshots, limit)
    }

    async fn upsert_exchange_rate(&self, rate: ExchangeRate) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = rate_key(&rate.from_currency, &rate.to_currency);
        self.insert_record(&self.exchange_rates, &key, &rate)
    }

    async fn exchange_rate(&self, from: &str, to: &str) -> Result<Option<ExchangeRate>> {
        Self::read_one(&self.exchange_rates, &rate_key(from, to))
    }
}
