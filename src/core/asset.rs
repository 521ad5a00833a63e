//! Reserve asset types and their USD price observations.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Fallback gold price per troy ounce when no observation is available.
pub const DEFAULT_GOLD_PRICE_USD: Decimal = dec!(2000);
pub const DEFAULT_USD_PRICE_USD: Decimal = Decimal::ONE;
pub const DEFAULT_EUR_PRICE_USD: Decimal = dec!(1.08);

/// Grams in one troy ounce.
pub const GRAMS_PER_TROY_OUNCE: Decimal = dec!(31.1035);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    Gold,
    Usd,
    Eur,
}

impl AssetType {
    pub const ALL: [AssetType; 3] = [AssetType::Gold, AssetType::Usd, AssetType::Eur];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Gold => "gold",
            AssetType::Usd => "usd",
            AssetType::Eur => "eur",
        }
    }

    /// Unit the reserve amount is denominated in.
    pub fn native_unit(&self) -> &'static str {
        match self {
            AssetType::Gold => "oz",
            AssetType::Usd => "USD",
            AssetType::Eur => "EUR",
        }
    }
}

impl Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gold" | "xau" => Ok(AssetType::Gold),
            "usd" => Ok(AssetType::Usd),
            "eur" => Ok(AssetType::Eur),
            _ => Err(anyhow::anyhow!("Invalid asset type: {}", s)),
        }
    }
}

/// A single append-only price observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetPrice {
    pub asset_type: AssetType,
    pub price_usd: Decimal,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

/// Current USD price per unit of every reserve asset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssetPrices {
    pub gold: Decimal,
    pub usd: Decimal,
    pub eur: Decimal,
}

impl Default for AssetPrices {
    fn default() -> Self {
        AssetPrices {
            gold: DEFAULT_GOLD_PRICE_USD,
            usd: DEFAULT_USD_PRICE_USD,
            eur: DEFAULT_EUR_PRICE_USD,
        }
    }
}

impl AssetPrices {
    /// Picks the most recently fetched observation per asset. Assets with no
    /// observation keep their fallback price.
    pub fn from_observations<'a, I>(observations: I) -> Self
    where
        I: IntoIterator<Item = &'a AssetPrice>,
    {
        let mut latest: [Option<&AssetPrice>; 3] = [None, None, None];
        for obs in observations {
            let slot = &mut latest[obs.asset_type as usize];
            if slot.is_none_or(|current| obs.fetched_at >= current.fetched_at) {
                *slot = Some(obs);
            }
        }

        let mut prices = AssetPrices::default();
        for obs in latest.into_iter().flatten() {
            prices.set(obs.asset_type, obs.price_usd);
        }
        prices
    }

    pub fn get(&self, asset: AssetType) -> Decimal {
        match asset {
            AssetType::Gold => self.gold,
            AssetType::Usd => self.usd,
            AssetType::Eur => self.eur,
        }
    }

    pub fn set(&mut self, asset: AssetType, price_usd: Decimal) {
        match asset {
            AssetType::Gold => self.gold = price_usd,
            AssetType::Usd => self.usd = price_usd,
            AssetType::Eur => self.eur = price_usd,
        }
    }
}
