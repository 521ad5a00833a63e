pub mod cli;
pub mod core;
pub mod providers;
pub mod server;
pub mod store;

use crate::core::admin::AdminService;
use crate::core::asset::AssetType;
use crate::core::auth::{AdminGate, ConfigRoles};
use crate::core::basket::BasketRegistry;
use crate::core::config::AppConfig;
use crate::core::currency::ExchangeRateService;
use crate::core::price::GoldPriceService;
use crate::core::refresh::RefreshJobs;
use crate::core::reserve::ReserveLedger;
use crate::core::valuation::ValuationEngine;
use crate::store::Store;
use anyhow::Result;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::debug;

/// Snapshots shown when no limit is given.
pub const DEFAULT_HISTORY_LIMIT: usize = 30;

/// Services wired over one store, shared by the CLI and the HTTP server.
pub struct AppContext {
    pub config: AppConfig,
    pub store: Arc<dyn Store>,
    pub registry: Arc<BasketRegistry>,
    pub ledger: Arc<ReserveLedger>,
    pub engine: Arc<ValuationEngine>,
    pub gold: Arc<GoldPriceService>,
    pub rates: Arc<ExchangeRateService>,
    pub admin: Arc<AdminService>,
    pub jobs: Arc<RefreshJobs>,
}

impl AppContext {
    pub fn new(config: AppConfig, store: Arc<dyn Store>) -> Result<Self> {
        let registry = Arc::new(BasketRegistry::new(store.clone()));
        let ledger = Arc::new(ReserveLedger::new(store.clone()));
        let engine = Arc::new(ValuationEngine::new(
            store.clone(),
            config.valuation_settings(),
        ));

        let gold = Arc::new(GoldPriceService::new(
            providers::gold_provider(&config.providers)?,
            config.providers.gold_cache_ttl(),
        ));
        let rates = Arc::new(ExchangeRateService::new(
            providers::rate_provider(&config.providers)?,
            store.clone(),
            config.providers.rates.currencies.clone(),
            config.providers.rates_cache_ttl(),
        ));

        let gate = AdminGate::new(Arc::new(ConfigRoles::new(config.roles.clone())));
        let admin = Arc::new(AdminService::new(
            gate,
            registry.clone(),
            ledger.clone(),
            engine.clone(),
        ));
        let jobs = Arc::new(RefreshJobs::new(
            gold.clone(),
            rates.clone(),
            engine.clone(),
            config.cron.auto_update_rates,
        ));

        Ok(Self {
            config,
            store,
            registry,
            ledger,
            engine,
            gold,
            rates,
            admin,
            jobs,
        })
    }

    pub fn from_config(config: AppConfig) -> Result<Self> {
        let store = store::open_store(&config)?;
        Self::new(config, store)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BasketCommand {
    Show {
        actor: Option<String>,
    },
    Set {
        actor: String,
        gold: Decimal,
        usd: Decimal,
        eur: Decimal,
        notes: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReserveCommand {
    List {
        actor: String,
    },
    Add {
        actor: String,
        asset: AssetType,
        amount: Decimal,
        amount_usd: Decimal,
        location: Option<String>,
        custody_provider: Option<String>,
    },
    Withdraw {
        actor: String,
        asset: AssetType,
        amount: Decimal,
        amount_usd: Decimal,
        reason: String,
    },
    Log {
        actor: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Serve,
    Refresh { gold_only: bool },
    Price,
    History { limit: usize },
    ForceUpdate { actor: String },
    Basket(BasketCommand),
    Reserve(ReserveCommand),
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let ctx = Arc::new(AppContext::from_config(config)?);
    run_with_context(command, ctx).await
}

pub async fn run_with_context(command: AppCommand, ctx: Arc<AppContext>) -> Result<()> {
    match command {
        AppCommand::Serve => server::serve(ctx).await,
        AppCommand::Refresh { gold_only } => cli::price::run_refresh(&ctx, gold_only).await,
        AppCommand::Price => cli::price::run_price(&ctx).await,
        AppCommand::History { limit } => cli::price::run_history(&ctx, limit).await,
        AppCommand::ForceUpdate { actor } => cli::price::run_force_update(&ctx, &actor).await,
        AppCommand::Basket(cmd) => cli::basket::run(&ctx, cmd).await,
        AppCommand::Reserve(cmd) => cli::reserve::run(&ctx, cmd).await,
    }
}
