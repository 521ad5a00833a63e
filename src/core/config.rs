use crate::core::auth::Role;
use crate::core::currency::DEFAULT_TRACKED_CURRENCIES;
use crate::core::valuation::{DEFAULT_REBALANCE_THRESHOLD, DEFAULT_TOTAL_SUPPLY, ValuationSettings};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Disk,
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ValuationConfig {
    #[serde(default = "default_total_supply")]
    pub total_supply: Decimal,
    #[serde(default = "default_rebalance_threshold")]
    pub rebalance_threshold: Decimal,
}

fn default_total_supply() -> Decimal {
    DEFAULT_TOTAL_SUPPLY
}

fn default_rebalance_threshold() -> Decimal {
    DEFAULT_REBALANCE_THRESHOLD
}

impl Default for ValuationConfig {
    fn default() -> Self {
        ValuationConfig {
            total_supply: DEFAULT_TOTAL_SUPPLY,
            rebalance_threshold: DEFAULT_REBALANCE_THRESHOLD,
        }
    }
}

/// Endpoint settings for one upstream API. A missing `base_url` selects the
/// provider's public endpoint.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GoldProvidersConfig {
    #[serde(default = "default_gold_primary")]
    pub primary: String,
    #[serde(default)]
    pub goldapi: ApiConfig,
    #[serde(default)]
    pub metals_live: ApiConfig,
    #[serde(default)]
    pub metals_api: ApiConfig,
}

fn default_gold_primary() -> String {
    "goldapi".to_string()
}

impl Default for GoldProvidersConfig {
    fn default() -> Self {
        GoldProvidersConfig {
            primary: default_gold_primary(),
            goldapi: ApiConfig::default(),
            metals_live: ApiConfig::default(),
            metals_api: ApiConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateProvidersConfig {
    #[serde(default = "default_rates_primary")]
    pub primary: String,
    #[serde(default)]
    pub exchangerate: ApiConfig,
    #[serde(default)]
    pub fixer: ApiConfig,
    #[serde(default)]
    pub openexchange: ApiConfig,
    #[serde(default)]
    pub currencyapi: ApiConfig,
    #[serde(default = "default_currencies")]
    pub currencies: Vec<String>,
}

fn default_rates_primary() -> String {
    "exchangerate".to_string()
}

fn default_currencies() -> Vec<String> {
    DEFAULT_TRACKED_CURRENCIES
        .iter()
        .map(|c| c.to_string())
        .collect()
}

impl Default for RateProvidersConfig {
    fn default() -> Self {
        RateProvidersConfig {
            primary: default_rates_primary(),
            exchangerate: ApiConfig::default(),
            fixer: ApiConfig::default(),
            openexchange: ApiConfig::default(),
            currencyapi: ApiConfig::default(),
            currencies: default_currencies(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: usize,
    #[serde(default = "default_gold_cache_ttl_secs")]
    pub gold_cache_ttl_secs: u64,
    #[serde(default = "default_rates_cache_ttl_secs")]
    pub rates_cache_ttl_secs: u64,
    #[serde(default)]
    pub gold: GoldProvidersConfig,
    #[serde(default)]
    pub rates: RateProvidersConfig,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retries() -> usize {
    3
}

fn default_gold_cache_ttl_secs() -> u64 {
    1800
}

fn default_rates_cache_ttl_secs() -> u64 {
    3600
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            gold_cache_ttl_secs: default_gold_cache_ttl_secs(),
            rates_cache_ttl_secs: default_rates_cache_ttl_secs(),
            gold: GoldProvidersConfig::default(),
            rates: RateProvidersConfig::default(),
        }
    }
}

impl ProvidersConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// `None` disables caching.
    pub fn gold_cache_ttl(&self) -> Option<Duration> {
        (self.gold_cache_ttl_secs > 0).then(|| Duration::from_secs(self.gold_cache_ttl_secs))
    }

    /// `None` disables caching.
    pub fn rates_cache_ttl(&self) -> Option<Duration> {
        (self.rates_cache_ttl_secs > 0).then(|| Duration::from_secs(self.rates_cache_ttl_secs))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CronConfig {
    /// Bearer secret for the refresh endpoints. Unset leaves them open.
    pub secret: Option<String>,
    #[serde(default = "default_true")]
    pub auto_update_rates: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CronConfig {
    fn default() -> Self {
        CronConfig {
            secret: None,
            auto_update_rates: true,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: default_listen_addr(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    pub data_path: Option<String>,
    #[serde(default)]
    pub storage: StorageKind,
    #[serde(default)]
    pub valuation: ValuationConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub cron: CronConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Actor id to role.
    #[serde(default)]
    pub roles: HashMap<String, Role>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "act", "actr")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("org", "act", "actr")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn valuation_settings(&self) -> ValuationSettings {
        ValuationSettings {
            total_supply: self.valuation.total_supply,
            rebalance_threshold: self.valuation.rebalance_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
data_path: /var/lib/actr
storage: memory
valuation:
  total_supply: 2500000
  rebalance_threshold: 0.75
providers:
  timeout_secs: 5
  gold:
    primary: metalsapi
    metals_api:
      base_url: "http://localhost:9000/api"
      api_key: "metals-key"
  rates:
    primary: fixer
    fixer:
      api_key: "fixer-key"
    currencies: [NGN, KES]
cron:
  secret: "s3cret"
  auto_update_rates: false
server:
  listen_addr: "0.0.0.0:8080"
roles:
  ops-1: admin
  treasury: super_admin
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.data_path.as_deref(), Some("/var/lib/actr"));
        assert_eq!(config.storage, StorageKind::Memory);
        assert_eq!(config.valuation.total_supply, dec!(2500000));
        assert_eq!(config.valuation.rebalance_threshold, dec!(0.75));
        assert_eq!(config.providers.timeout(), Duration::from_secs(5));
        assert_eq!(config.providers.retries, 3);
        assert_eq!(config.providers.gold.primary, "metalsapi");
        assert_eq!(
            config.providers.gold.metals_api.base_url.as_deref(),
            Some("http://localhost:9000/api")
        );
        assert!(config.providers.gold.goldapi.api_key.is_none());
        assert_eq!(config.providers.rates.primary, "fixer");
        assert_eq!(config.providers.rates.currencies, vec!["NGN", "KES"]);
        assert_eq!(config.cron.secret.as_deref(), Some("s3cret"));
        assert!(!config.cron.auto_update_rates);
        assert_eq!(config.server.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.roles.get("ops-1"), Some(&Role::Admin));
        assert_eq!(config.roles.get("treasury"), Some(&Role::SuperAdmin));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.storage, StorageKind::Disk);
        assert_eq!(config.valuation_settings().total_supply, dec!(1000000));
        assert_eq!(config.valuation_settings().rebalance_threshold, dec!(0.8));
        assert_eq!(config.providers.gold.primary, "goldapi");
        assert_eq!(config.providers.rates.primary, "exchangerate");
        assert_eq!(config.providers.rates.currencies.len(), 17);
        assert_eq!(
            config.providers.gold_cache_ttl(),
            Some(Duration::from_secs(1800))
        );
        assert_eq!(
            config.providers.rates_cache_ttl(),
            Some(Duration::from_secs(3600))
        );
        assert!(config.cron.secret.is_none());
        assert!(config.cron.auto_update_rates);
        assert!(config.roles.is_empty());
    }

    #[test]
    fn test_zero_cache_ttl_disables_cache() {
        let config: AppConfig =
            serde_yaml::from_str("providers:\n  gold_cache_ttl_secs: 0\n  rates_cache_ttl_secs: 0\n")
                .unwrap();
        assert!(config.providers.gold_cache_ttl().is_none());
        assert!(config.providers.rates_cache_ttl().is_none());
    }

    #[test]
    fn test_custom_data_path() {
        let config: AppConfig = serde_yaml::from_str("data_path: /tmp/actr-data\n").unwrap();
        assert_eq!(
            config.default_data_path().unwrap(),
            PathBuf::from("/tmp/actr-data")
        );
    }
}
