use std::env;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::ConfigError;
use crate::models::StakeMode;

/// Priority-ordered, independently enable-able data providers. Mirrors
/// `original_source/src/fh_over/config.py::ProviderConfig`'s `priority:
/// List[str]` plus per-provider `_enabled: bool` fields (§6, §11).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub fixture_priority: Vec<String>,
    pub odds_priority: Vec<String>,
    pub api_football_enabled: bool,
    pub pinnacle_enabled: bool,
    pub betfair_enabled: bool,
    pub bet365_enabled: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            fixture_priority: vec!["api_football".to_string()],
            odds_priority: vec!["pinnacle".to_string(), "betfair".to_string(), "bet365".to_string()],
            api_football_enabled: true,
            pinnacle_enabled: true,
            betfair_enabled: true,
            bet365_enabled: true,
        }
    }
}

impl ProviderConfig {
    fn is_odds_provider_enabled(&self, name: &str) -> bool {
        match name {
            "pinnacle" => self.pinnacle_enabled,
            "betfair" => self.betfair_enabled,
            "bet365" => self.bet365_enabled,
            _ => false,
        }
    }

    /// Mirrors `config.py::get_enabled_odds_providers`: enabled providers,
    /// in priority order.
    pub fn enabled_odds_providers(&self) -> Vec<&str> {
        self.odds_priority
            .iter()
            .map(|s| s.as_str())
            .filter(|name| self.is_odds_provider_enabled(name))
            .collect()
    }

    fn is_fixture_provider_enabled(&self, name: &str) -> bool {
        match name {
            "api_football" => self.api_football_enabled,
            _ => false,
        }
    }

    /// Mirrors `config.py::get_enabled_providers`: enabled fixture
    /// providers, in priority order.
    pub fn enabled_fixture_providers(&self) -> Vec<&str> {
        self.fixture_priority
            .iter()
            .map(|s| s.as_str())
            .filter(|name| self.is_fixture_provider_enabled(name))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub lambda_threshold: f64,
    pub min_samples_home: usize,
    pub min_samples_away: usize,
    pub min_edge_pct: f64,
    pub max_prob_ci_width: f64,
    pub min_matches_required: usize,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            lambda_threshold: 1.5,
            min_samples_home: 8,
            min_samples_away: 8,
            min_edge_pct: 3.0,
            max_prob_ci_width: 0.20,
            min_matches_required: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StakingConfig {
    pub mode: StakeMode,
    pub bankroll: f64,
    pub kelly_fraction: f64,
    pub tau_conf: f64,
    pub target_edge_pct: f64,
    pub stake_cap: f64,
    pub flat_size: f64,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            mode: StakeMode::Dynamic,
            bankroll: 1000.0,
            kelly_fraction: 0.5,
            tau_conf: 0.20,
            target_edge_pct: 5.0,
            stake_cap: 0.03,
            flat_size: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub scan_horizon_days: i64,
    pub max_concurrency: usize,
    pub request_delay_secs: f64,
    pub request_timeout_secs: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            scan_horizon_days: 2,
            max_concurrency: 16,
            request_delay_secs: 1.5,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub providers: ProviderConfig,
    #[serde(default)]
    pub thresholds: ThresholdConfig,
    #[serde(default)]
    pub staking: StakingConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub api_football_key: Option<String>,
    #[serde(default)]
    pub odds_api_key: Option<String>,
}

impl Config {
    /// Load environment variables (`.env` first, exactly as the service
    /// entry point does), then overlay an optional `config.toml` on top
    /// of the env-derived defaults.
    pub fn load() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let mut cfg = Self::from_env();
        if Path::new("config.toml").exists() {
            let text = std::fs::read_to_string("config.toml")?;
            let file_cfg: Config = toml::from_str(&text)?;
            // Overlay the file's sections on top of the env-derived defaults;
            // keep the env-sourced secrets unless the file explicitly repeats them.
            cfg.providers = file_cfg.providers;
            cfg.thresholds = file_cfg.thresholds;
            cfg.staking = file_cfg.staking;
            cfg.scan = file_cfg.scan;
            cfg.database_url = file_cfg.database_url.or(cfg.database_url);
            cfg.api_football_key = file_cfg.api_football_key.or(cfg.api_football_key);
            cfg.odds_api_key = file_cfg.odds_api_key.or(cfg.odds_api_key);
        }
        cfg.validate().map_err(|e| anyhow::anyhow!(e))?;
        Ok(cfg)
    }

    fn from_env() -> Self {
        Self {
            providers: ProviderConfig::default(),
            thresholds: ThresholdConfig::default(),
            staking: StakingConfig::default(),
            scan: ScanConfig::default(),
            database_url: env::var("DATABASE_URL").ok(),
            api_football_key: env::var("API_FOOTBALL_KEY").ok(),
            odds_api_key: env::var("ODDS_API_KEY").ok(),
        }
    }

    /// §7 CONFIG_ERROR: invalid configuration is fatal at scan start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thresholds.lambda_threshold <= 0.0 {
            return Err(ConfigError("lambda_threshold must be > 0".to_string()));
        }
        if self.staking.stake_cap <= 0.0 || self.staking.stake_cap > 1.0 {
            return Err(ConfigError("stake_cap must be in (0, 1]".to_string()));
        }
        if self.staking.kelly_fraction < 0.0 || self.staking.kelly_fraction > 1.0 {
            return Err(ConfigError("kelly_fraction must be in [0, 1]".to_string()));
        }
        if self.staking.tau_conf <= 0.0 {
            return Err(ConfigError("tau_conf must be > 0".to_string()));
        }
        if self.thresholds.min_matches_required == 0 {
            return Err(ConfigError("min_matches_required must be >= 1".to_string()));
        }
        Ok(())
    }
}
