use crate::core::asset::DEFAULT_GOLD_PRICE_USD;
use crate::core::price::GoldPriceProvider;
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Fixed gold price for offline operation.
pub struct ManualGoldProvider {
    price: Decimal,
}

impl ManualGoldProvider {
    pub fn new(price: Decimal) -> Self {
        Self { price }
    }
}

impl Default for ManualGoldProvider {
    fn default() -> Self {
        Self::new(DEFAULT_GOLD_PRICE_USD)
    }
}

#[async_trait]
impl GoldPriceProvider for ManualGoldProvider {
    async fn fetch_gold_price(&self) -> Result<Decimal> {
        Ok(self.price)
    }

    fn name(&self) -> &'static str {
        "manual"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_manual_price() {
        assert_eq!(
            ManualGoldProvider::default().fetch_gold_price().await.unwrap(),
            dec!(2000)
        );
    }
}
