//! # Gateway Registry
//!
//! Remote content-addressed blob stores, reached over plain HTTP:
//!
//! - upload: `POST {upload_url}` with the envelope bytes; the JSON response
//!   names the identifier the gateway assigned
//! - read: `GET {read_url}/{identifier}` returning raw or dag-pb wrapped bytes
//!
//! Every call has an explicit timeout and a cap on bytes read. Nothing is
//! retried; a failure is reported to the caller as it happened.

use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinSet;

use crate::config::{GatewayConfig, ServerConfig};

/// Timeout of one reachability probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Longest identifier accepted in a read path.
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

// =============================================================================
// ERRORS
// =============================================================================

/// Outbound gateway failures.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unknown gateway '{0}'")]
    UnknownGateway(String),

    #[error("gateway '{gateway}' is unreachable: {detail}")]
    Unreachable { gateway: String, detail: String },

    #[error("gateway '{gateway}' timed out after {timeout_ms} ms")]
    Timeout { gateway: String, timeout_ms: u64 },

    #[error("gateway '{gateway}' returned HTTP {status}")]
    Status { gateway: String, status: u16 },

    #[error("gateway '{gateway}' response exceeds {limit} bytes")]
    TooLarge { gateway: String, limit: usize },

    #[error("gateway '{gateway}' returned a malformed response: {detail}")]
    Malformed { gateway: String, detail: String },

    #[error("HTTP client initialization failed: {0}")]
    Client(String),
}

/// Whether a string can be used as a read identifier.
///
/// CIDs in every common base are ASCII alphanumeric.
#[must_use]
pub fn is_valid_identifier(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_IDENTIFIER_LENGTH && id.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Find the identifier in an upload response.
///
/// Accepts `cid`, `Hash`, `IpfsHash`, an IPLD link `{"/": ...}`, or any of
/// these nested one level under `value` or `data`.
#[must_use]
pub fn extract_identifier(response: &Value) -> Option<String> {
    fn direct(v: &Value) -> Option<String> {
        ["cid", "Hash", "IpfsHash"].iter().find_map(|key| match v.get(*key)? {
            Value::String(s) => Some(s.clone()),
            Value::Object(link) => link.get("/")?.as_str().map(str::to_string),
            _ => None,
        })
    }
    direct(response)
        .or_else(|| response.get("value").and_then(direct))
        .or_else(|| response.get("data").and_then(direct))
        .filter(|id| is_valid_identifier(id))
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Reachability report for one gateway.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    pub name: String,
    pub upload_url: String,
    pub read_url: String,
    pub default: bool,
    pub authenticated: bool,
    pub reachable: bool,
    pub latency_ms: Option<u64>,
    pub status: Option<u16>,
    pub error: Option<String>,
}

/// The configured gateways plus one shared HTTP client.
#[derive(Debug, Clone)]
pub struct GatewayRegistry {
    http: reqwest::Client,
    gateways: Vec<GatewayConfig>,
    default: String,
    timeout: Duration,
    max_bytes: usize,
}

impl GatewayRegistry {
    pub fn from_config(config: &ServerConfig) -> Result<Self, GatewayError> {
        let timeout = Duration::from_millis(config.gateway_timeout_ms);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Client(e.to_string()))?;
        Ok(Self {
            http,
            gateways: config.gateways.clone(),
            default: config.default_gateway.clone(),
            timeout,
            max_bytes: config.gateway_max_bytes,
        })
    }

    #[must_use]
    pub fn gateways(&self) -> &[GatewayConfig] {
        &self.gateways
    }

    #[must_use]
    pub fn default_name(&self) -> &str {
        &self.default
    }

    /// The named gateway, or the default when `name` is `None`.
    pub fn select(&self, name: Option<&str>) -> Result<&GatewayConfig, GatewayError> {
        let wanted = name.unwrap_or(&self.default);
        self.gateways
            .iter()
            .find(|g| g.name == wanted)
            .ok_or_else(|| GatewayError::UnknownGateway(wanted.to_string()))
    }

    fn transport_error(&self, gateway: &GatewayConfig, error: &reqwest::Error) -> GatewayError {
        if error.is_timeout() {
            GatewayError::Timeout {
                gateway: gateway.name.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            GatewayError::Unreachable {
                gateway: gateway.name.clone(),
                detail: error.to_string(),
            }
        }
    }

    /// Read a response body, aborting once it exceeds the byte cap.
    async fn read_capped(
        &self,
        gateway: &GatewayConfig,
        mut response: reqwest::Response,
    ) -> Result<Vec<u8>, GatewayError> {
        let too_large = || GatewayError::TooLarge {
            gateway: gateway.name.clone(),
            limit: self.max_bytes,
        };
        if response
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(too_large());
        }
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.transport_error(gateway, &e))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }

    /// Upload envelope bytes; returns the gateway-assigned identifier.
    pub async fn upload(
        &self,
        gateway: &GatewayConfig,
        bytes: Vec<u8>,
    ) -> Result<String, GatewayError> {
        let mut request = self
            .http
            .post(&gateway.upload_url)
            .header(CONTENT_TYPE, "application/json")
            .body(bytes);
        if let Some(token) = &gateway.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(gateway, &e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                gateway: gateway.name.clone(),
                status: status.as_u16(),
            });
        }
        let body = self.read_capped(gateway, response).await?;
        let json: Value = serde_json::from_slice(&body).map_err(|e| GatewayError::Malformed {
            gateway: gateway.name.clone(),
            detail: format!("upload response is not JSON: {}", e),
        })?;
        extract_identifier(&json).ok_or_else(|| GatewayError::Malformed {
            gateway: gateway.name.clone(),
            detail: "upload response names no identifier".to_string(),
        })
    }

    /// Fetch the bytes stored under `identifier`.
    pub async fn fetch(
        &self,
        gateway: &GatewayConfig,
        identifier: &str,
    ) -> Result<Vec<u8>, GatewayError> {
        let url = format!("{}/{}", gateway.read_url.trim_end_matches('/'), identifier);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(gateway, &e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                gateway: gateway.name.clone(),
                status: status.as_u16(),
            });
        }
        self.read_capped(gateway, response).await
    }

    /// Probe every gateway concurrently. Any HTTP answer counts as reachable.
    pub async fn probe_all(&self) -> Vec<GatewayStatus> {
        let mut statuses: Vec<GatewayStatus> = self
            .gateways
            .iter()
            .map(|g| GatewayStatus {
                name: g.name.clone(),
                upload_url: g.upload_url.clone(),
                read_url: g.read_url.clone(),
                default: g.name == self.default,
                authenticated: g.token.is_some(),
                reachable: false,
                latency_ms: None,
                status: None,
                error: Some("probe did not complete".to_string()),
            })
            .collect();

        let mut probes = JoinSet::new();
        for (index, gateway) in self.gateways.iter().enumerate() {
            let http = self.http.clone();
            let url = gateway.read_url.clone();
            probes.spawn(async move {
                let started = Instant::now();
                let outcome = http.get(&url).timeout(PROBE_TIMEOUT).send().await;
                let latency = started.elapsed().as_millis() as u64;
                (index, latency, outcome.map(|r| r.status().as_u16()))
            });
        }

        while let Some(joined) = probes.join_next().await {
            let Ok((index, latency, outcome)) = joined else {
                continue;
            };
            if let Some(status) = statuses.get_mut(index) {
                status.latency_ms = Some(latency);
                match outcome {
                    Ok(code) => {
                        status.reachable = true;
                        status.status = Some(code);
                        status.error = None;
                    }
                    Err(e) if e.is_timeout() => {
                        status.error = Some(format!("timed out after {} ms", PROBE_TIMEOUT.as_millis()));
                    }
                    Err(e) => status.error = Some(e.to_string()),
                }
            }
        }
        statuses
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identifier_shapes() {
        assert!(is_valid_identifier("bafkreigh2akiscaildc"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("../etc/passwd"));
        assert!(!is_valid_identifier(&"a".repeat(MAX_IDENTIFIER_LENGTH + 1)));
    }

    #[test]
    fn upload_response_shapes() {
        assert_eq!(extract_identifier(&json!({"cid": "bafy1"})).as_deref(), Some("bafy1"));
        assert_eq!(extract_identifier(&json!({"IpfsHash": "Qm1"})).as_deref(), Some("Qm1"));
        assert_eq!(extract_identifier(&json!({"Hash": "Qm2"})).as_deref(), Some("Qm2"));
        assert_eq!(
            extract_identifier(&json!({"value": {"cid": "bafy2"}})).as_deref(),
            Some("bafy2")
        );
        assert_eq!(
            extract_identifier(&json!({"data": {"cid": {"/": "bafy3"}}})).as_deref(),
            Some("bafy3")
        );
        assert!(extract_identifier(&json!({"ok": true})).is_none());
        assert!(extract_identifier(&json!({"cid": "not valid"})).is_none());
    }

    #[test]
    fn selection() {
        let registry = GatewayRegistry::from_config(&ServerConfig::default()).expect("registry");
        assert_eq!(registry.select(None).expect("default").name, "local");
        assert_eq!(registry.select(Some("local")).expect("named").name, "local");
        assert!(matches!(
            registry.select(Some("nope")),
            Err(GatewayError::UnknownGateway(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_gateway_is_reported() {
        let config = ServerConfig {
            gateways: vec![GatewayConfig {
                name: "dead".into(),
                upload_url: "http://127.0.0.1:9/upload".into(),
                read_url: "http://127.0.0.1:9/ipfs".into(),
                token: None,
            }],
            default_gateway: "dead".into(),
            gateway_timeout_ms: 500,
            ..ServerConfig::default()
        };
        let registry = GatewayRegistry::from_config(&config).expect("registry");
        let gateway = registry.select(None).expect("gateway");
        let err = registry.fetch(gateway, "bafy").await.expect_err("must fail");
        assert!(matches!(
            err,
            GatewayError::Unreachable { .. } | GatewayError::Timeout { .. }
        ));

        let statuses = registry.probe_all().await;
        assert_eq!(statuses.len(), 1);
        assert!(!statuses[0].reachable);
        assert!(statuses[0].error.is_some());
    }
}
