//! # ringfact HTTP Client
//!
//! Wrapper around the ringfact REST API for use by the MCP server.
//!
//! 4xx responses carry the server's JSON error envelope and are returned as
//! ordinary values; only transport failures, auth, rate limiting and 5xx
//! surface as [`ClientError`].

use serde_json::{Value, json};

/// Errors from the HTTP client layer.
#[derive(Debug)]
pub enum ClientError {
    /// The configured base URL cannot be parsed.
    InvalidUrl(String),
    /// Cannot reach the ringfact server.
    ConnectionFailed(String),
    /// 401 Unauthorized - invalid or missing API key.
    Unauthorized,
    /// 429 Too Many Requests.
    RateLimited(Option<u64>),
    /// Server returned a 5xx error.
    ServerError(u16, String),
    /// Failed to parse response body.
    ParseError(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUrl(url) => write!(f, "Invalid ringfact URL: {url}"),
            Self::ConnectionFailed(url) => write!(f, "Cannot connect to ringfact at {url}"),
            Self::Unauthorized => write!(f, "Unauthorized: invalid or missing API key"),
            Self::RateLimited(Some(secs)) => {
                write!(f, "Rate limited: retry after {secs} seconds")
            }
            Self::RateLimited(None) => write!(f, "Rate limited: too many requests"),
            Self::ServerError(status, msg) => write!(f, "Server error ({status}): {msg}"),
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}

/// HTTP client that wraps calls to the ringfact REST API.
#[derive(Clone)]
pub struct RingfactClient {
    http: reqwest::Client,
    base_url: reqwest::Url,
    api_key: Option<String>,
}

impl RingfactClient {
    /// Create a new client pointing at the given ringfact server URL.
    pub fn new(base_url: String, api_key: Option<String>) -> Result<Self, ClientError> {
        let base_url =
            reqwest::Url::parse(&base_url).map_err(|_| ClientError::InvalidUrl(base_url.clone()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
        })
    }

    /// URL for a path built from segments; each segment is percent-encoded.
    fn url(&self, segments: &[&str]) -> reqwest::Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Build a request with optional Bearer auth.
    fn request(&self, method: reqwest::Method, segments: &[&str]) -> reqwest::RequestBuilder {
        let mut req = self.http.request(method, self.url(segments));
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    /// Handle HTTP response: check status codes and parse JSON.
    async fn handle_response(&self, resp: reqwest::Response) -> Result<Value, ClientError> {
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ClientError::RateLimited(retry_after));
        }
        if status.is_server_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::ServerError(status.as_u16(), body));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| ClientError::ParseError(e.to_string()))
    }

    /// Send a request and handle connection errors.
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Value, ClientError> {
        let resp = req
            .send()
            .await
            .map_err(|e| ClientError::ConnectionFailed(format!("{}: {e}", self.base_url)))?;
        self.handle_response(resp).await
    }

    /// GET /kernel/op
    pub async fn compute(
        &self,
        op: &str,
        x: u64,
        y: Option<u64>,
        n: Option<u32>,
    ) -> Result<Value, ClientError> {
        let mut query = vec![("op", op.to_string()), ("x", x.to_string())];
        if let Some(y) = y {
            query.push(("y", y.to_string()));
        }
        if let Some(n) = n {
            query.push(("n", n.to_string()));
        }
        let req = self
            .request(reqwest::Method::GET, &["kernel", "op"])
            .query(&query);
        self.send(req).await
    }

    /// POST /derive
    pub async fn derive(&self, term: &str, n: Option<u32>) -> Result<Value, ClientError> {
        let body = json!({ "term": term, "n": n });
        let req = self.request(reqwest::Method::POST, &["derive"]).json(&body);
        self.send(req).await
    }

    /// GET /certify
    pub async fn certify(&self, derivation_id: &str, n: Option<u32>) -> Result<Value, ClientError> {
        let mut query = vec![("derivation_id", derivation_id.to_string())];
        if let Some(n) = n {
            query.push(("n", n.to_string()));
        }
        let req = self
            .request(reqwest::Method::GET, &["certify"])
            .query(&query);
        self.send(req).await
    }

    /// POST /graph/query
    pub async fn query(&self, query: &str) -> Result<Value, ClientError> {
        let req = self
            .request(reqwest::Method::POST, &["graph", "query"])
            .json(&json!({ "query": query }));
        self.send(req).await
    }

    /// GET /conformance
    pub async fn conformance(&self, n: Option<u32>) -> Result<Value, ClientError> {
        let mut req = self.request(reqwest::Method::GET, &["conformance"]);
        if let Some(n) = n {
            req = req.query(&[("n", n.to_string())]);
        }
        self.send(req).await
    }

    /// POST /store/write
    pub async fn store_write(
        &self,
        payload: &Value,
        gateway: Option<&str>,
    ) -> Result<Value, ClientError> {
        let mut req = self
            .request(reqwest::Method::POST, &["store", "write"])
            .json(&json!({ "payload": payload }));
        if let Some(gateway) = gateway {
            req = req.query(&[("gateway", gateway)]);
        }
        self.send(req).await
    }

    /// GET /store/read/{id}
    pub async fn store_read(
        &self,
        identifier: &str,
        gateway: Option<&str>,
        strict: bool,
    ) -> Result<Value, ClientError> {
        let mut query = vec![("strict", strict.to_string())];
        if let Some(gateway) = gateway {
            query.push(("gateway", gateway.to_string()));
        }
        let req = self
            .request(reqwest::Method::GET, &["store", "read", identifier])
            .query(&query);
        self.send(req).await
    }

    /// POST /observers
    pub async fn register_observer(&self, body: &Value) -> Result<Value, ClientError> {
        let req = self.request(reqwest::Method::POST, &["observers"]).json(body);
        self.send(req).await
    }

    /// POST /observers/{id}/outputs
    pub async fn record_output(&self, agent_id: &str, body: &Value) -> Result<Value, ClientError> {
        let req = self
            .request(reqwest::Method::POST, &["observers", agent_id, "outputs"])
            .json(body);
        self.send(req).await
    }

    /// GET /observers/{id}
    pub async fn observer_profile(&self, agent_id: &str) -> Result<Value, ClientError> {
        let req = self.request(reqwest::Method::GET, &["observers", agent_id]);
        self.send(req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_are_encoded() {
        let client = RingfactClient::new("http://localhost:8080/".into(), None).expect("client");
        let url = client.url(&["observers", "a/b c"]);
        assert_eq!(url.as_str(), "http://localhost:8080/observers/a%2Fb%20c");
    }

    #[test]
    fn base_path_is_kept() {
        let client =
            RingfactClient::new("http://example.org/api".into(), None).expect("client");
        assert_eq!(
            client.url(&["derive"]).as_str(),
            "http://example.org/api/derive"
        );
    }

    #[test]
    fn rejects_non_base_urls() {
        assert!(RingfactClient::new("mailto:x@y".into(), None).is_err());
        assert!(RingfactClient::new("not a url".into(), None).is_err());
    }
}
