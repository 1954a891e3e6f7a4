use crate::config::constants::{
    GRADUATION_POLL_INTERVAL_DEFAULT_MS, TRIGGER_SWEEP_INTERVAL_DEFAULT_MS,
};
use config::{Config, ConfigError, Environment, File};
use serde_derive::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct SolanaConfig {
    /// Primary then fallbacks; overridden by SOLANA_RPC_1..3.
    #[serde(default)]
    pub rpc_urls: Vec<String>,
    /// WebSocket endpoints for logsSubscribe; derived from rpc_urls when
    /// empty.
    #[serde(default)]
    pub ws_urls: Vec<String>,
}

impl SolanaConfig {
    pub fn ws_urls_or_derived(&self) -> Vec<String> {
        if !self.ws_urls.is_empty() {
            return self.ws_urls.clone();
        }
        self.rpc_urls
            .iter()
            .map(|u| u.replacen("https://", "wss://", 1).replacen("http://", "ws://", 1))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub database_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignerConfig {
    pub endpoint: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// pump.pro REST metadata base; versioned endpoints are configuration,
    /// never hardcoded.
    pub pump_rest_base: String,
    #[serde(default = "default_true")]
    pub pumpfun_enabled: bool,
    #[serde(default = "default_true")]
    pub meteora_dbc_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Global gate: when off, candidates are scored and accepted but no trade
    /// jobs are created.
    #[serde(default)]
    pub auto_execute_enabled: bool,
    #[serde(default = "default_true")]
    pub simulate_execution: bool,
    /// Chain-default priority fee, used when the strategy sets none.
    #[serde(default = "default_priority_fee")]
    pub default_priority_fee_lamports: i64,
    /// When true a strategy's priority_fee_lamports wins over the chain
    /// default.
    #[serde(default = "default_true")]
    pub prefer_strategy_priority_fee: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Qualification floor; surfaced alongside the configured scale in every
    /// score output.
    #[serde(default = "default_min_score")]
    pub min_qualification_score: i32,
    /// Strict mode turns missing social metadata into hard stops.
    #[serde(default)]
    pub strict_social_metadata: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraduationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_graduation_poll_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriggerConfig {
    #[serde(default = "default_sweep_ms")]
    pub sweep_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutboxConfig {
    /// External notification sink endpoint (type + payload POSTs).
    pub sink_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AmmConfig {
    /// Aggregator quote API base (Jupiter-compatible).
    pub quote_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggerConfig {
    pub level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub solana: SolanaConfig,
    pub storage: StorageConfig,
    pub signer: SignerConfig,
    pub discovery: DiscoveryConfig,
    pub execution: ExecutionConfig,
    pub scoring: ScoringConfig,
    pub graduation: GraduationConfig,
    pub triggers: TriggerConfig,
    pub outbox: OutboxConfig,
    pub amm: AmmConfig,
    pub logger: LoggerConfig,
}

fn default_true() -> bool {
    true
}
fn default_priority_fee() -> i64 {
    100_000
}
fn default_min_score() -> i32 {
    23
}
fn default_graduation_poll_ms() -> u64 {
    GRADUATION_POLL_INTERVAL_DEFAULT_MS
}
fn default_sweep_ms() -> u64 {
    TRIGGER_SWEEP_INTERVAL_DEFAULT_MS
}

impl Settings {
    /// Layered load: config file, then RAPTOR_* overrides, then the plain
    /// env vars named in the deployment contract (SOLANA_RPC_1..3,
    /// PUMP_REST_BASE, AUTO_EXECUTE_ENABLED, GRADUATION_*).
    pub fn new(config_filename: &str) -> Result<Self, ConfigError> {
        let base = Config::builder()
            .add_source(File::with_name(config_filename))
            .add_source(Environment::with_prefix("RAPTOR").separator("__"))
            .build()?;
        let mut settings: Settings = base.try_deserialize()?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        let rpc_urls: Vec<String> = (1..=3)
            .filter_map(|i| env::var(format!("SOLANA_RPC_{i}")).ok())
            .filter(|u| !u.is_empty())
            .collect();
        if !rpc_urls.is_empty() {
            self.solana.rpc_urls = rpc_urls;
        }
        if let Ok(base) = env::var("PUMP_REST_BASE") {
            if !base.is_empty() {
                self.discovery.pump_rest_base = base;
            }
        }
        if let Ok(v) = env::var("AUTO_EXECUTE_ENABLED") {
            self.execution.auto_execute_enabled = parse_bool(&v);
        }
        if let Ok(v) = env::var("GRADUATION_ENABLED") {
            self.graduation.enabled = parse_bool(&v);
        }
        if let Ok(v) = env::var("GRADUATION_POLL_INTERVAL_MS") {
            if let Ok(ms) = v.parse() {
                self.graduation.poll_interval_ms = ms;
            }
        }
        if let Ok(v) = env::var("SIGNER_ENDPOINT") {
            if !v.is_empty() {
                self.signer.endpoint = v;
            }
        }
    }
}

fn parse_bool(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_env_parsing() {
        assert!(parse_bool("true"));
        assert!(parse_bool("1"));
        assert!(parse_bool("YES"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn ws_urls_derived_from_rpc() {
        let cfg = SolanaConfig {
            rpc_urls: vec!["https://rpc.example.com".into()],
            ws_urls: vec![],
        };
        assert_eq!(cfg.ws_urls_or_derived(), vec!["wss://rpc.example.com"]);
        let explicit = SolanaConfig {
            rpc_urls: vec!["https://rpc.example.com".into()],
            ws_urls: vec!["wss://ws.example.com".into()],
        };
        assert_eq!(explicit.ws_urls_or_derived(), vec!["wss://ws.example.com"]);
    }
}
