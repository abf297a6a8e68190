//! Configuration: `.env` loading plus typed settings for the store, the
//! registry client and the binaries.
//!
//! Call `Config::from_env()` once at startup. Every setting has a default, so
//! an empty environment yields a working local setup.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Once;
use std::time::Duration;

static INIT: Once = Once::new();

pub const DEFAULT_DB_PATH: &str = "data/companies.db";
pub const DEFAULT_REGISTRY_URL: &str = "https://cvrapi.dk/api";
pub const DEFAULT_COUNTRY: &str = "dk";
pub const DEFAULT_USER_AGENT: &str = "Company Manager";
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:3000";

/// Load .env exactly once. Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        let _ = dotenv::dotenv();
    });
}

/// Optional env var (None if unset or blank).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

// ============================================================================
// REGISTRY CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
    pub base_url: String,
    pub country: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub fallback_enabled: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            base_url: DEFAULT_REGISTRY_URL.to_string(),
            country: DEFAULT_COUNTRY.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            fallback_enabled: true,
        }
    }
}

// ============================================================================
// APPLICATION CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_path: PathBuf,
    pub registry: RegistryConfig,
    /// Enrich new records from the registry right after insert
    pub sync_on_create: bool,
    pub server_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            registry: RegistryConfig::default(),
            sync_on_create: true,
            server_addr: DEFAULT_SERVER_ADDR.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        init_env();
        Config::from_lookup(env_opt)
    }

    /// Builds a config from any key -> value source (the process env in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let timeout_secs: u64 = parse_or(&lookup, "REGISTRY_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(anyhow!("REGISTRY_TIMEOUT_SECS must be greater than zero"));
        }

        Ok(Config {
            database_path: lookup("COMPANY_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            registry: RegistryConfig {
                base_url: lookup("REGISTRY_BASE_URL").unwrap_or(defaults.registry.base_url),
                country: lookup("REGISTRY_COUNTRY").unwrap_or(defaults.registry.country),
                user_agent: lookup("REGISTRY_USER_AGENT").unwrap_or(defaults.registry.user_agent),
                timeout: Duration::from_secs(timeout_secs),
                fallback_enabled: flag_or(&lookup, "REGISTRY_FALLBACK", true)?,
            },
            sync_on_create: flag_or(&lookup, "SYNC_ON_CREATE", true)?,
            server_addr: lookup("SERVER_ADDR").unwrap_or(defaults.server_addr),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    <T as FromStr>::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

/// Accepts 1/true/on/yes and 0/false/off/no (case-insensitive)
fn flag_or<F>(lookup: &F, key: &str, default: bool) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "on" | "yes" => Ok(true),
            "0" | "false" | "off" | "no" => Ok(false),
            _ => Err(anyhow!("invalid boolean for {}: {:?}", key, raw)),
        },
        None => Ok(default),
    }
}
