//! Versioned basket composition registry.
//!
//! Every change of weights is a new immutable row. Exactly one row is active;
//! replacing it flips the previous row's `is_active` and inserts the new row
//! in a single store operation.

use crate::core::error::{EngineError, Result};
use crate::store::Store;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Allowed distance of the weight sum from 1.0.
pub const WEIGHT_SUM_TOLERANCE: Decimal = dec!(0.0001);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasketComposition {
    pub id: Uuid,
    pub gold_weight: Decimal,
    pub usd_weight: Decimal,
    pub eur_weight: Decimal,
    pub is_active: bool,
    pub activated_by: String,
    pub activated_at: DateTime<Utc>,
    pub notes: String,
}

/// Validates a weight triple: each weight in [0, 1] and the sum within
/// [`WEIGHT_SUM_TOLERANCE`] of 1.0.
pub fn validate_weights(gold: Decimal, usd: Decimal, eur: Decimal) -> Result<()> {
    for (name, weight) in [("gold", gold), ("usd", usd), ("eur", eur)] {
        if weight < Decimal::ZERO || weight > Decimal::ONE {
            return Err(EngineError::validation(format!(
                "{name} weight must be between 0 and 1, got {weight}"
            )));
        }
    }
    if (gold + usd + eur - Decimal::ONE).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(EngineError::validation("Weights must sum to 1.0"));
    }
    Ok(())
}

pub struct BasketRegistry {
    store: Arc<dyn Store>,
}

impl BasketRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get_active(&self) -> Result<Option<BasketComposition>> {
        self.store.active_basket().await
    }

    /// All compositions ever activated, newest first.
    pub async fn history(&self) -> Result<Vec<BasketComposition>> {
        self.store.baskets().await
    }

    #[instrument(name = "BasketReplace", skip_all, fields(actor = %actor))]
    pub async fn replace_active(
        &self,
        gold_weight: Decimal,
        usd_weight: Decimal,
        eur_weight: Decimal,
        notes: &str,
        actor: &str,
    ) -> Result<BasketComposition> {
        validate_weights(gold_weight, usd_weight, eur_weight)?;

        let next = BasketComposition {
            id: Uuid::now_v7(),
            gold_weight,
            usd_weight,
            eur_weight,
            is_active: true,
            activated_by: actor.to_string(),
            activated_at: Utc::now(),
            notes: notes.to_string(),
        };
        let inserted = self.store.replace_active_basket(next).await?;

        // The store applies both steps together, so some row must be active.
        // A different id only means a concurrent replace superseded this one.
        match self.store.active_basket().await? {
            Some(active) if active.id != inserted.id => {
                debug!(basket_id = %inserted.id, active_id = %active.id, "Basket superseded by a concurrent replace");
            }
            Some(_) => {}
            None => {
                return Err(EngineError::Persistence(
                    "no active basket composition after replace".to_string(),
                ));
            }
        }

        info!(
            basket_id = %inserted.id,
            gold = %gold_weight,
            usd = %usd_weight,
            eur = %eur_weight,
            "Activated basket composition"
        );
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{FailingStore, MemoryStore};

    fn registry() -> BasketRegistry {
        BasketRegistry::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_no_active_composition_initially() {
        let registry = registry();
        assert!(registry.get_active().await.unwrap().is_none());
        assert!(registry.history().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replace_active_deactivates_previous() {
        let registry = registry();

        let first = registry
            .replace_active(dec!(0.4), dec!(0.3), dec!(0.3), "initial", "root")
            .await
            .unwrap();
        let second = registry
            .replace_active(dec!(0.5), dec!(0.25), dec!(0.25), "more gold", "root")
            .await
            .unwrap();

        let active = registry.get_active().await.unwrap().unwrap();
        assert_eq!(active.id, second.id);
        assert_eq!(active.gold_weight, dec!(0.5));
        assert_eq!(active.usd_weight, dec!(0.25));
        assert_eq!(active.eur_weight, dec!(0.25));
        assert!(active.is_active);
        assert_eq!(active.activated_by, "root");

        let history = registry.history().await.unwrap();
        assert_eq!(history.len(), 2);
        let previous = history.iter().find(|b| b.id == first.id).unwrap();
        assert!(!previous.is_active);
        assert_eq!(history.iter().filter(|b| b.is_active).count(), 1);
    }

    #[tokio::test]
    async fn test_weights_within_tolerance_accepted() {
        let registry = registry();
        let basket = registry
            .replace_active(dec!(0.33333), dec!(0.33333), dec!(0.33333), "", "root")
            .await
            .unwrap();
        assert!(basket.is_active);
        assert_eq!(registry.get_active().await.unwrap().unwrap().id, basket.id);
    }

    #[tokio::test]
    async fn test_missing_active_row_after_replace_is_an_error() {
        let store = Arc::new(FailingStore::active_basket_missing());
        let registry = BasketRegistry::new(store.clone());

        let err = registry
            .replace_active(dec!(0.4), dec!(0.3), dec!(0.3), "", "root")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::Persistence("no active basket composition after replace".to_string())
        );
        // the row itself was written
        assert_eq!(store.inner.baskets().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_weights_leave_active_unchanged() {
        let registry = registry();
        let original = registry
            .replace_active(dec!(0.4), dec!(0.3), dec!(0.3), "initial", "root")
            .await
            .unwrap();

        let err = registry
            .replace_active(dec!(0.5), dec!(0.3), dec!(0.3), "too heavy", "root")
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::validation("Weights must sum to 1.0"));

        let err = registry
            .replace_active(dec!(0.4), dec!(0.3), dec!(0.2998), "too light", "root")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let active = registry.get_active().await.unwrap().unwrap();
        assert_eq!(active, original);
        assert_eq!(registry.history().await.unwrap().len(), 1);
    }

    #[test]
    fn test_negative_weight_rejected() {
        let err = validate_weights(dec!(1.2), dec!(-0.1), dec!(-0.1)).unwrap_err();
        assert!(err.to_string().contains("gold weight"));
        assert!(validate_weights(dec!(1), dec!(0), dec!(0)).is_ok());
    }
}
