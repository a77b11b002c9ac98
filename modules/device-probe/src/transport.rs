//! HTTP(S) access to the device management endpoints.

use anyhow::{Context, Result};
use async_trait::async_trait;
use healthfetch_core::{EndpointSpec, FetchError, Target};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use std::error::Error as StdError;
use std::time::Duration;
use url::Url;

/// One request against one endpoint of one target.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, endpoint: &EndpointSpec, target: &Target, timeout: Duration) -> Result<Value, FetchError>;
}

pub const DEFAULT_USERNAME: &str = "admin";
pub const DEFAULT_PASSWORD: &str = "admin";

/// Static credentials sent with every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { username: String, password: String },
    Bearer(String),
}

impl Default for Credentials {
    fn default() -> Self {
        Credentials::Basic { username: DEFAULT_USERNAME.into(), password: DEFAULT_PASSWORD.into() }
    }
}

#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub credentials: Credentials,
    /// Management interfaces usually present self-signed certificates.
    pub verify_tls: bool,
    pub user_agent: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        HttpOptions {
            credentials: Credentials::default(),
            verify_tls: false,
            user_agent: format!("healthfetch/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    credentials: Credentials,
}

impl HttpTransport {
    pub fn new(opts: &HttpOptions) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!opts.verify_tls)
            .user_agent(opts.user_agent.clone())
            .gzip(true)
            .build()
            .context("building HTTP client")?;
        Ok(HttpTransport { client, credentials: opts.credentials.clone() })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, endpoint: &EndpointSpec, target: &Target, timeout: Duration) -> Result<Value, FetchError> {
        let url = Url::parse(&endpoint.url(target))
            .map_err(|e| FetchError::Connection(format!("invalid url for {}: {}", target, e)))?;
        let req = self
            .client
            .get(url)
            .timeout(timeout)
            .header(CONTENT_TYPE, endpoint.content_type)
            .header(ACCEPT, endpoint.content_type);
        let req = match &self.credentials {
            Credentials::Basic { username, password } => req.basic_auth(username, Some(password)),
            Credentials::Bearer(token) => req.bearer_auth(token),
        };
        let resp = req.send().await.map_err(classify)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }
        let bytes = resp.bytes().await.map_err(classify)?;
        decode_payload(&bytes)
    }
}

/// Parse a response body as JSON. An empty body is a decode failure.
pub fn decode_payload(body: &[u8]) -> Result<Value, FetchError> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(FetchError::Decode("empty body".into()));
    }
    serde_json::from_slice(body).map_err(|e| FetchError::Decode(e.to_string()))
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        return FetchError::Timeout;
    }
    let detail = error_chain(&e);
    if is_tls_failure(&detail) {
        FetchError::Tls(detail)
    } else if e.is_decode() {
        FetchError::Decode(detail)
    } else {
        FetchError::Connection(detail)
    }
}

fn error_chain(e: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![e.to_string()];
    let mut cur = e.source();
    while let Some(s) = cur {
        let msg = s.to_string();
        if !parts.contains(&msg) { parts.push(msg); }
        cur = s.source();
    }
    parts.join(": ")
}

fn is_tls_failure(detail: &str) -> bool {
    let l = detail.to_lowercase();
    ["tls", "certificate", "handshake", "invalidcontenttype", "received fatal alert"]
        .iter()
        .any(|needle| l.contains(needle))
}
