//! Reserve ledger: per-asset balances plus an append-only transaction log.

use crate::core::asset::{AssetPrices, AssetType};
use crate::core::error::{EngineError, Result};
use crate::core::valuation::reserve_value_usd;
use crate::store::Store;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, info, instrument};
use uuid::Uuid;

pub const DEFAULT_TRANSACTION_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveBalance {
    pub asset_type: AssetType,
    pub amount: Decimal,
    pub amount_usd: Decimal,
    pub location: Option<String>,
    pub custody_provider: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Deposit => write!(f, "deposit"),
            TransactionType::Withdrawal => write!(f, "withdrawal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveTransaction {
    pub id: Uuid,
    pub transaction_type: TransactionType,
    pub asset_type: AssetType,
    pub amount: Decimal,
    pub amount_usd: Decimal,
    pub new_balance: Decimal,
    pub reason: String,
    pub executed_by: String,
    pub status: String,
    pub executed_at: DateTime<Utc>,
}

/// Signed change to one balance row, applied atomically by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ReserveDelta {
    pub asset_type: AssetType,
    pub amount: Decimal,
    pub amount_usd: Decimal,
    pub location: Option<String>,
    pub custody_provider: Option<String>,
}

impl ReserveDelta {
    /// Computes the post-delta row. A missing row starts from zero; location
    /// and custody provider are only overwritten when the delta carries them.
    pub fn apply_to(&self, current: Option<&ReserveBalance>) -> Result<ReserveBalance> {
        let (amount, amount_usd) = current
            .map(|b| (b.amount, b.amount_usd))
            .unwrap_or((Decimal::ZERO, Decimal::ZERO));

        let (Some(new_amount), Some(new_amount_usd)) = (
            amount.checked_add(self.amount),
            amount_usd.checked_add(self.amount_usd),
        ) else {
            return Err(EngineError::Validation(format!(
                "{} reserve balance out of range",
                self.asset_type
            )));
        };
        if new_amount < Decimal::ZERO || new_amount_usd < Decimal::ZERO {
            return Err(EngineError::Validation(format!(
                "insufficient {} reserves: balance {amount} ({amount_usd} USD)",
                self.asset_type
            )));
        }

        Ok(ReserveBalance {
            asset_type: self.asset_type,
            amount: new_amount,
            amount_usd: new_amount_usd,
            location: self
                .location
                .clone()
                .or_else(|| current.and_then(|b| b.location.clone())),
            custody_provider: self
                .custody_provider
                .clone()
                .or_else(|| current.and_then(|b| b.custody_provider.clone())),
            updated_at: Utc::now(),
        })
    }
}

/// Native amount of every reserve asset; missing rows count as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReserveAmounts {
    pub gold: Decimal,
    pub usd: Decimal,
    pub eur: Decimal,
}

impl ReserveAmounts {
    pub fn from_balances(balances: &[ReserveBalance]) -> Self {
        let mut amounts = ReserveAmounts::default();
        for balance in balances {
            match balance.asset_type {
                AssetType::Gold => amounts.gold = balance.amount,
                AssetType::Usd => amounts.usd = balance.amount,
                AssetType::Eur => amounts.eur = balance.amount,
            }
        }
        amounts
    }

    pub fn get(&self, asset: AssetType) -> Decimal {
        match asset {
            AssetType::Gold => self.gold,
            AssetType::Usd => self.usd,
            AssetType::Eur => self.eur,
        }
    }

    pub fn set(&mut self, asset: AssetType, amount: Decimal) {
        match asset {
            AssetType::Gold => self.gold = amount,
            AssetType::Usd => self.usd = amount,
            AssetType::Eur => self.eur = amount,
        }
    }
}

fn validate_amounts(amount: Decimal, amount_usd: Decimal) -> Result<()> {
    if amount < Decimal::ZERO {
        return Err(EngineError::validation("amount must not be negative"));
    }
    if amount_usd < Decimal::ZERO {
        return Err(EngineError::validation("amount_usd must not be negative"));
    }
    Ok(())
}

pub struct ReserveLedger {
    store: Arc<dyn Store>,
    audit_failures: AtomicU64,
}

impl ReserveLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            audit_failures: AtomicU64::new(0),
        }
    }

    /// Number of transaction log writes that failed after their balance
    /// update had already been applied.
    pub fn audit_failures(&self) -> u64 {
        self.audit_failures.load(Ordering::Relaxed)
    }

    #[instrument(name = "ReserveDeposit", skip_all, fields(asset = %asset_type, actor = %actor))]
    pub async fn add_reserve(
        &self,
        asset_type: AssetType,
        amount: Decimal,
        amount_usd: Decimal,
        location: Option<String>,
        custody_provider: Option<String>,
        actor: &str,
    ) -> Result<ReserveBalance> {
        validate_amounts(amount, amount_usd)?;
        self.ensure_valuable(asset_type, amount).await?;

        let balance = self
            .store
            .apply_reserve_delta(ReserveDelta {
                asset_type,
                amount,
                amount_usd,
                location,
                custody_provider,
            })
            .await?;
        info!(%amount, %amount_usd, new_balance = %balance.amount, "Reserve deposited");

        self.record(
            TransactionType::Deposit,
            &balance,
            amount,
            amount_usd,
            "Reserve addition",
            actor,
        )
        .await;
        Ok(balance)
    }

    #[instrument(name = "ReserveWithdrawal", skip_all, fields(asset = %asset_type, actor = %actor))]
    pub async fn withdraw_reserve(
        &self,
        asset_type: AssetType,
        amount: Decimal,
        amount_usd: Decimal,
        reason: &str,
        actor: &str,
    ) -> Result<ReserveBalance> {
        validate_amounts(amount, amount_usd)?;

        let balance = self
            .store
            .apply_reserve_delta(ReserveDelta {
                asset_type,
                amount: -amount,
                amount_usd: -amount_usd,
                location: None,
                custody_provider: None,
            })
            .await?;
        info!(%amount, %amount_usd, new_balance = %balance.amount, "Reserve withdrawn");

        let reason = if reason.is_empty() {
            "Reserve withdrawal"
        } else {
            reason
        };
        self.record(
            TransactionType::Withdrawal,
            &balance,
            amount,
            amount_usd,
            reason,
            actor,
        )
        .await;
        Ok(balance)
    }

    // Rejects a deposit that would make the reserves impossible to value at
    // the latest recorded prices.
    async fn ensure_valuable(&self, asset_type: AssetType, amount: Decimal) -> Result<()> {
        let prices = AssetPrices::from_observations(&self.store.latest_asset_prices().await?);
        let mut reserves = ReserveAmounts::from_balances(&self.store.reserve_balances().await?);
        let projected = reserves
            .get(asset_type)
            .checked_add(amount)
            .ok_or_else(|| {
                EngineError::Validation(format!("{asset_type} reserve balance out of range"))
            })?;
        reserves.set(asset_type, projected);
        if reserve_value_usd(&prices, &reserves).is_none() {
            return Err(EngineError::Validation(format!(
                "{asset_type} deposit would put the reserve valuation out of range"
            )));
        }
        Ok(())
    }

    /// Balances ordered gold, usd, eur.
    pub async fn list_balances(&self) -> Result<Vec<ReserveBalance>> {
        self.store.reserve_balances().await
    }

    /// Most recent transactions first.
    pub async fn list_transactions(&self, limit: usize) -> Result<Vec<ReserveTransaction>> {
        self.store.reserve_transactions(limit).await
    }

    // Audit write after the balance is committed. Its failure is reported
    // through the log and the counter, never to the caller.
    async fn record(
        &self,
        transaction_type: TransactionType,
        balance: &ReserveBalance,
        amount: Decimal,
        amount_usd: Decimal,
        reason: &str,
        actor: &str,
    ) {
        let tx = ReserveTransaction {
            id: Uuid::now_v7(),
            transaction_type,
            asset_type: balance.asset_type,
            amount,
            amount_usd,
            new_balance: balance.amount,
            reason: reason.to_string(),
            executed_by: actor.to_string(),
            status: "executed".to_string(),
            executed_at: Utc::now(),
        };
        if let Err(e) = self.store.insert_reserve_transaction(tx).await {
            let failures = self.audit_failures.fetch_add(1, Ordering::Relaxed) + 1;
            error!(
                error = %e,
                %transaction_type,
                asset = %balance.asset_type,
                audit_failures = failures,
                "Error logging reserve transaction"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{FailingStore, MemoryStore};
    use rust_decimal_macros::dec;

    fn ledger() -> ReserveLedger {
        ReserveLedger::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_first_deposit_creates_row() {
        let ledger = ledger();
        let balance = ledger
            .add_reserve(
                AssetType::Gold,
                dec!(10),
                dec!(20000),
                Some("Zurich".to_string()),
                Some("Brinks".to_string()),
                "root",
            )
            .await
            .unwrap();

        assert_eq!(balance.amount, dec!(10));
        assert_eq!(balance.amount_usd, dec!(20000));
        assert_eq!(balance.location.as_deref(), Some("Zurich"));

        let txs = ledger.list_transactions(10).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].transaction_type, TransactionType::Deposit);
        assert_eq!(txs[0].new_balance, dec!(10));
        assert_eq!(txs[0].reason, "Reserve addition");
        assert_eq!(txs[0].status, "executed");
    }

    #[tokio::test]
    async fn test_deposit_increments_existing_balance() {
        let ledger = ledger();
        ledger
            .add_reserve(AssetType::Usd, dec!(500000), dec!(500000), None, None, "root")
            .await
            .unwrap();

        let balance = ledger
            .add_reserve(AssetType::Usd, dec!(1000), dec!(1000), None, None, "root")
            .await
            .unwrap();
        assert_eq!(balance.amount, dec!(501000));
        assert_eq!(balance.amount_usd, dec!(501000));

        let txs = ledger.list_transactions(DEFAULT_TRANSACTION_LIMIT).await.unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].new_balance, dec!(501000));
        assert_eq!(txs[0].amount, dec!(1000));
    }

    #[tokio::test]
    async fn test_deposit_keeps_location_when_omitted() {
        let ledger = ledger();
        ledger
            .add_reserve(AssetType::Gold, dec!(1), dec!(2000), Some("Vault A".into()), None, "root")
            .await
            .unwrap();
        let balance = ledger
            .add_reserve(AssetType::Gold, dec!(1), dec!(2000), None, None, "root")
            .await
            .unwrap();
        assert_eq!(balance.location.as_deref(), Some("Vault A"));
    }

    #[tokio::test]
    async fn test_negative_amounts_rejected() {
        let ledger = ledger();
        let err = ledger
            .add_reserve(AssetType::Eur, dec!(-5), dec!(5), None, None, "root")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let err = ledger
            .add_reserve(AssetType::Eur, dec!(5), dec!(-5), None, None, "root")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        assert!(ledger.list_balances().await.unwrap().is_empty());
        assert!(ledger.list_transactions(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_withdrawal_cannot_overdraw() {
        let ledger = ledger();
        ledger
            .add_reserve(AssetType::Eur, dec!(200000), dec!(216000), None, None, "root")
            .await
            .unwrap();

        let balance = ledger
            .withdraw_reserve(AssetType::Eur, dec!(50000), dec!(54000), "", "root")
            .await
            .unwrap();
        assert_eq!(balance.amount, dec!(150000));
        assert_eq!(balance.amount_usd, dec!(162000));

        let err = ledger
            .withdraw_reserve(AssetType::Eur, dec!(150001), dec!(1), "too much", "root")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("insufficient eur reserves"));

        let balances = ledger.list_balances().await.unwrap();
        assert_eq!(balances[0].amount, dec!(150000));

        let txs = ledger.list_transactions(10).await.unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].transaction_type, TransactionType::Withdrawal);
        assert_eq!(txs[0].reason, "Reserve withdrawal");
        assert_eq!(txs[0].new_balance, dec!(150000));
    }

    #[tokio::test]
    async fn test_balances_ordered_by_asset() {
        let ledger = ledger();
        for asset in [AssetType::Eur, AssetType::Gold, AssetType::Usd] {
            ledger
                .add_reserve(asset, dec!(1), dec!(1), None, None, "root")
                .await
                .unwrap();
        }
        let order: Vec<AssetType> = ledger
            .list_balances()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.asset_type)
            .collect();
        assert_eq!(order, AssetType::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_deposit_beyond_decimal_range_rejected() {
        let ledger = ledger();
        ledger
            .add_reserve(AssetType::Usd, Decimal::MAX, dec!(1), None, None, "root")
            .await
            .unwrap();
        let err = ledger
            .add_reserve(AssetType::Usd, Decimal::MAX, dec!(1), None, None, "root")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(ledger.list_balances().await.unwrap()[0].amount, Decimal::MAX);
    }

    #[tokio::test]
    async fn test_deposit_that_cannot_be_valued_rejected() {
        let ledger = ledger();
        // 1e26 oz at the 2000 USD fallback exceeds the Decimal range
        let ounces = Decimal::from_i128_with_scale(10_i128.pow(26), 0);
        let err = ledger
            .add_reserve(AssetType::Gold, ounces, dec!(1), None, None, "root")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert!(ledger.list_balances().await.unwrap().is_empty());
        assert!(ledger.list_transactions(10).await.unwrap().is_empty());
    }

    #[test]
    fn test_delta_overflow_is_an_error() {
        let current = ReserveBalance {
            asset_type: AssetType::Eur,
            amount: Decimal::MAX,
            amount_usd: dec!(1),
            location: None,
            custody_provider: None,
            updated_at: Utc::now(),
        };
        let delta = ReserveDelta {
            asset_type: AssetType::Eur,
            amount: dec!(1),
            amount_usd: dec!(1),
            location: None,
            custody_provider: None,
        };
        assert!(matches!(
            delta.apply_to(Some(&current)),
            Err(EngineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_audit_failure_keeps_balance() {
        let store = Arc::new(FailingStore::transactions_fail());
        let ledger = ReserveLedger::new(store.clone());
        let balance = ledger
            .add_reserve(AssetType::Usd, dec!(250), dec!(250), None, None, "root")
            .await
            .unwrap();

        assert_eq!(balance.amount, dec!(250));
        assert_eq!(ledger.audit_failures(), 1);
        assert!(ledger.list_transactions(10).await.unwrap().is_empty());
        assert_eq!(ledger.list_balances().await.unwrap()[0].amount, dec!(250));
    }

    #[test]
    fn test_reserve_amounts_missing_rows_are_zero() {
        let amounts = ReserveAmounts::from_balances(&[ReserveBalance {
            asset_type: AssetType::Gold,
            amount: dec!(10),
            amount_usd: dec!(20000),
            location: None,
            custody_provider: None,
            updated_at: Utc::now(),
        }]);
        assert_eq!(amounts.gold, dec!(10));
        assert_eq!(amounts.usd, Decimal::ZERO);
        assert_eq!(amounts.eur, Decimal::ZERO);
    }
}
