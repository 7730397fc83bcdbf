// ⚙️ Configuration - TOML file with environment variable fallbacks
//
// Env vars only fill fields the file left unset; the file always wins.

use crate::error::ScreenerError;
use crate::provider::BlockmateConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

// ============================================================================
// CONFIG TYPES
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub ledger: LedgerConfig,
    pub provider: ProviderConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Listen address, e.g. `0.0.0.0:8080`.
    pub address: String,
    /// Burst of requests admitted before throttling.
    pub rate_limit: u32,
    /// One request worth of capacity comes back every this many seconds.
    pub rate_threshold_secs: u64,
    pub shutdown_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            address: "0.0.0.0:8080".to_string(),
            rate_limit: 60,
            rate_threshold_secs: 60,
            shutdown_timeout_secs: 5,
        }
    }
}

impl HttpConfig {
    pub fn rate_threshold(&self) -> Duration {
        Duration::from_secs(self.rate_threshold_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            path: PathBuf::from("wallet-screener.db"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub blockmate: BlockmateConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ============================================================================
// ENVIRONMENT FALLBACKS
// ============================================================================

#[derive(Clone, Copy)]
enum EnvKind {
    Str,
    Int,
    Bool,
}

struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: EnvKind,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping { var_name: "WALLET_SCREENER_HTTP_ADDRESS", field_path: "http.address", kind: EnvKind::Str },
    EnvMapping { var_name: "WALLET_SCREENER_RATE_LIMIT", field_path: "http.rate_limit", kind: EnvKind::Int },
    EnvMapping {
        var_name: "WALLET_SCREENER_RATE_THRESHOLD_SECS",
        field_path: "http.rate_threshold_secs",
        kind: EnvKind::Int,
    },
    EnvMapping {
        var_name: "WALLET_SCREENER_SHUTDOWN_TIMEOUT_SECS",
        field_path: "http.shutdown_timeout_secs",
        kind: EnvKind::Int,
    },
    EnvMapping { var_name: "WALLET_SCREENER_LEDGER_PATH", field_path: "ledger.path", kind: EnvKind::Str },
    EnvMapping { var_name: "BLOCKMATE_API_KEY", field_path: "provider.blockmate.api_key", kind: EnvKind::Str },
    EnvMapping { var_name: "BLOCKMATE_BASE_URL", field_path: "provider.blockmate.base_url", kind: EnvKind::Str },
    EnvMapping { var_name: "BLOCKMATE_CHAIN", field_path: "provider.blockmate.chain", kind: EnvKind::Str },
    EnvMapping { var_name: "WALLET_SCREENER_LOG_LEVEL", field_path: "log.level", kind: EnvKind::Str },
    EnvMapping { var_name: "WALLET_SCREENER_LOG_JSON", field_path: "log.json", kind: EnvKind::Bool },
];

fn lookup<'a>(root: &'a toml::Value, path: &str) -> Option<&'a toml::Value> {
    path.split('.').try_fold(root, |value, key| value.get(key))
}

fn insert(root: &mut toml::Value, path: &str, leaf: toml::Value) -> Result<()> {
    let mut keys: Vec<&str> = path.split('.').collect();
    let last = keys.pop().context("empty config path")?;

    let mut table = root.as_table_mut().context("config root is not a table")?;
    for key in keys {
        table = table
            .entry(key)
            .or_insert(toml::Value::Table(toml::map::Map::new()))
            .as_table_mut()
            .with_context(|| format!("config key {key} is not a table"))?;
    }
    table.insert(last.to_string(), leaf);
    Ok(())
}

/// Fill unset fields of `merged` from `env_vars`. Returns how many were applied.
fn apply_env_fallbacks(merged: &mut toml::Value, env_vars: &HashMap<String, String>) -> Result<usize> {
    let mut count = 0;

    for mapping in ENV_MAPPINGS {
        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };
        if lookup(merged, mapping.field_path).is_some() {
            continue;
        }

        let value = match mapping.kind {
            EnvKind::Str => toml::Value::String(raw.clone()),
            EnvKind::Int => toml::Value::Integer(
                raw.trim()
                    .parse()
                    .with_context(|| format!("{} must be an integer, got {raw:?}", mapping.var_name))?,
            ),
            EnvKind::Bool => toml::Value::Boolean(
                raw.trim()
                    .parse()
                    .with_context(|| format!("{} must be true or false, got {raw:?}", mapping.var_name))?,
            ),
        };

        insert(merged, mapping.field_path, value)?;
        debug!(var = mapping.var_name, field = mapping.field_path, "config value taken from environment");
        count += 1;
    }

    Ok(count)
}

// ============================================================================
// LOADING
// ============================================================================

impl Config {
    /// Load from an optional TOML file plus the process environment.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let contents = match path {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("failed reading config: {}", path.display()))?,
            None => String::new(),
        };
        let env_vars: HashMap<String, String> = std::env::vars().collect();

        Self::from_toml_str(&contents, &env_vars)
            .with_context(|| format!("failed to load config: {}", path.map_or("<env>".into(), |p| p.display().to_string())))
    }

    pub fn from_toml_str(contents: &str, env_vars: &HashMap<String, String>) -> Result<Config> {
        let mut merged: toml::Value = toml::from_str(contents).context("invalid TOML")?;
        apply_env_fallbacks(&mut merged, env_vars)?;

        let config = toml::Value::try_into::<Config>(merged).context("failed to unmarshal config")?;
        Ok(config)
    }

    /// Reject settings the service cannot start with.
    pub fn validate(&self) -> Result<(), ScreenerError> {
        if self.provider.blockmate.api_key.is_empty() {
            return Err(ScreenerError::Config(
                "provider.blockmate.api_key (or BLOCKMATE_API_KEY) is required".into(),
            ));
        }
        if self.http.rate_limit == 0 {
            return Err(ScreenerError::Config("http.rate_limit must be greater than zero".into()));
        }
        if self.http.rate_threshold_secs == 0 {
            return Err(ScreenerError::Config(
                "http.rate_threshold_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
