//! # Server Configuration
//!
//! Resolved once at startup, in order:
//!
//! 1. Built-in defaults
//! 2. Optional TOML file (`--config ringfact.toml`)
//! 3. Environment overrides (`RINGFACT_*`)
//!
//! The resolved [`ServerConfig`] is injected into the application state;
//! handlers never read the environment.
//!
//! ## Environment Variables
//!
//! - `RINGFACT_RATE_LIMIT_READ`: read requests per minute per client (0 disables)
//! - `RINGFACT_RATE_LIMIT_WRITE`: write requests per minute per client (0 disables)
//! - `RINGFACT_CORS_ORIGINS`: comma-separated origins, or `*`
//! - `RINGFACT_API_KEY`: if set, requires Bearer token authentication
//! - `RINGFACT_GATEWAY_TIMEOUT_MS`: outbound gateway timeout
//! - `RINGFACT_GATEWAY_MAX_BYTES`: maximum bytes read from a gateway response
//! - `RINGFACT_GATEWAYS`: `name=upload_url|read_url[|token],...`
//! - `RINGFACT_DEFAULT_GATEWAY`: name of the default gateway

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default read quota (requests per minute per client).
pub const DEFAULT_RATE_LIMIT_READ: u32 = 120;

/// Default write quota (requests per minute per client).
pub const DEFAULT_RATE_LIMIT_WRITE: u32 = 30;

/// Default outbound gateway timeout.
pub const DEFAULT_GATEWAY_TIMEOUT_MS: u64 = 10_000;

/// Default cap on bytes read from one gateway response (1 MB).
pub const DEFAULT_GATEWAY_MAX_BYTES: usize = 1024 * 1024;

/// Errors while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {reason}")]
    Io { path: String, reason: String },

    #[error("invalid config file: {0}")]
    Parse(String),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// GATEWAYS
// =============================================================================

/// One remote blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub name: String,
    /// Bytes are POSTed here; the response names the assigned identifier.
    pub upload_url: String,
    /// Objects are read from `{read_url}/{identifier}`.
    pub read_url: String,
    /// Optional bearer token sent on upload.
    #[serde(default)]
    pub token: Option<String>,
}

impl GatewayConfig {
    fn local() -> Self {
        Self {
            name: "local".to_string(),
            upload_url: "http://127.0.0.1:5080/upload".to_string(),
            read_url: "http://127.0.0.1:5080/ipfs".to_string(),
            token: None,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty()
            || !self
                .name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(ConfigError::invalid(
                "gateways",
                format!("gateway name '{}' must be [A-Za-z0-9_-]+", self.name),
            ));
        }
        for url in [&self.upload_url, &self.read_url] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::invalid(
                    "gateways",
                    format!("gateway '{}': '{}' is not an http(s) URL", self.name, url),
                ));
            }
        }
        Ok(())
    }
}

/// Parse `name=upload_url|read_url[|token],...`.
pub fn parse_gateway_list(raw: &str) -> Result<Vec<GatewayConfig>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, urls) = entry.split_once('=').ok_or_else(|| {
                ConfigError::invalid("RINGFACT_GATEWAYS", format!("'{}' lacks '='", entry))
            })?;
            let mut parts = urls.split('|');
            let (Some(upload_url), Some(read_url)) = (parts.next(), parts.next()) else {
                return Err(ConfigError::invalid(
                    "RINGFACT_GATEWAYS",
                    format!("'{}' needs upload_url|read_url", entry),
                ));
            };
            let token = parts.next().map(str::to_string).filter(|t| !t.is_empty());
            Ok(GatewayConfig {
                name: name.trim().to_string(),
                upload_url: upload_url.trim().to_string(),
                read_url: read_url.trim().to_string(),
                token,
            })
        })
        .collect()
}

// =============================================================================
// SERVER CONFIG
// =============================================================================

/// Fully resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub rate_limit_read: u32,
    pub rate_limit_write: u32,
    /// `None` means localhost only.
    pub cors_origins: Option<String>,
    pub api_key: Option<String>,
    pub gateway_timeout_ms: u64,
    pub gateway_max_bytes: usize,
    pub gateways: Vec<GatewayConfig>,
    pub default_gateway: String,
    /// redb file for observer records; in-memory when `None`.
    pub observers_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            rate_limit_read: DEFAULT_RATE_LIMIT_READ,
            rate_limit_write: DEFAULT_RATE_LIMIT_WRITE,
            cors_origins: None,
            api_key: None,
            gateway_timeout_ms: DEFAULT_GATEWAY_TIMEOUT_MS,
            gateway_max_bytes: DEFAULT_GATEWAY_MAX_BYTES,
            gateways: vec![GatewayConfig::local()],
            default_gateway: "local".to_string(),
            observers_path: None,
        }
    }
}

/// TOML file shape. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    rate_limit_read: Option<u32>,
    rate_limit_write: Option<u32>,
    cors_origins: Option<String>,
    api_key: Option<String>,
    gateway_timeout_ms: Option<u64>,
    gateway_max_bytes: Option<usize>,
    default_gateway: Option<String>,
    observers_path: Option<PathBuf>,
    gateways: Option<Vec<GatewayConfig>>,
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::invalid(key, format!("'{}' is not a number", raw)))
}

impl ServerConfig {
    /// Resolve defaults, then `file`, then the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = file {
            let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            config.apply_toml(&text)?;
        }
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from a TOML document.
    pub fn apply_toml(&mut self, text: &str) -> Result<(), ConfigError> {
        let file: FileConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if let Some(v) = file.rate_limit_read {
            self.rate_limit_read = v;
        }
        if let Some(v) = file.rate_limit_write {
            self.rate_limit_write = v;
        }
        if file.cors_origins.is_some() {
            self.cors_origins = file.cors_origins;
        }
        if file.api_key.is_some() {
            self.api_key = file.api_key.filter(|k| !k.is_empty());
        }
        if let Some(v) = file.gateway_timeout_ms {
            self.gateway_timeout_ms = v;
        }
        if let Some(v) = file.gateway_max_bytes {
            self.gateway_max_bytes = v;
        }
        if let Some(gateways) = file.gateways {
            self.replace_gateways(gateways);
        }
        if let Some(v) = file.default_gateway {
            self.default_gateway = v;
        }
        if file.observers_path.is_some() {
            self.observers_path = file.observers_path;
        }
        Ok(())
    }

    /// Overlay values from an environment lookup.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(v) = var("RINGFACT_RATE_LIMIT_READ") {
            self.rate_limit_read = parse_number("RINGFACT_RATE_LIMIT_READ", &v)?;
        }
        if let Some(v) = var("RINGFACT_RATE_LIMIT_WRITE") {
            self.rate_limit_write = parse_number("RINGFACT_RATE_LIMIT_WRITE", &v)?;
        }
        if let Some(v) = var("RINGFACT_CORS_ORIGINS") {
            self.cors_origins = Some(v);
        }
        if let Some(v) = var("RINGFACT_API_KEY") {
            self.api_key = Some(v).filter(|k| !k.is_empty());
        }
        if let Some(v) = var("RINGFACT_GATEWAY_TIMEOUT_MS") {
            self.gateway_timeout_ms = parse_number("RINGFACT_GATEWAY_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = var("RINGFACT_GATEWAY_MAX_BYTES") {
            self.gateway_max_bytes = parse_number("RINGFACT_GATEWAY_MAX_BYTES", &v)?;
        }
        if let Some(v) = var("RINGFACT_GATEWAYS") {
            self.replace_gateways(parse_gateway_list(&v)?);
        }
        if let Some(v) = var("RINGFACT_DEFAULT_GATEWAY") {
            self.default_gateway = v;
        }
        Ok(())
    }

    /// A new gateway list also moves the default to its first entry,
    /// unless the default is named again afterwards.
    fn replace_gateways(&mut self, gateways: Vec<GatewayConfig>) {
        let keeps_default = gateways.iter().any(|g| g.name == self.default_gateway);
        match gateways.first() {
            Some(first) if !keeps_default => self.default_gateway = first.name.clone(),
            _ => {}
        }
        self.gateways = gateways;
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateways.is_empty() {
            return Err(ConfigError::invalid("gateways", "at least one gateway is required"));
        }
        for (i, gateway) in self.gateways.iter().enumerate() {
            gateway.validate()?;
            if self.gateways[..i].iter().any(|g| g.name == gateway.name) {
                return Err(ConfigError::invalid(
                    "gateways",
                    format!("duplicate gateway name '{}'", gateway.name),
                ));
            }
        }
        if !self.gateways.iter().any(|g| g.name == self.default_gateway) {
            return Err(ConfigError::invalid(
                "default_gateway",
                format!("'{}' is not a configured gateway", self.default_gateway),
            ));
        }
        if self.gateway_timeout_ms == 0 {
            return Err(ConfigError::invalid("gateway_timeout_ms", "must be positive"));
        }
        if self.gateway_max_bytes == 0 {
            return Err(ConfigError::invalid("gateway_max_bytes", "must be positive"));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
