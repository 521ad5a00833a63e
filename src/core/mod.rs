//! Core business logic abstractions

pub mod admin;
pub mod asset;
pub mod auth;
pub mod basket;
pub mod cache;
pub mod config;
pub mod currency;
pub mod error;
pub mod log;
pub mod price;
pub mod refresh;
pub mod reserve;
pub mod valuation;

// Re-export main types for cleaner imports
pub use currency::ExchangeRateProvider;
pub use error::{EngineError, Result};
pub use price::GoldPriceProvider;
