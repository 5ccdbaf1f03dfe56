use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{redirect, Method};
use thiserror::Error;

use crate::prober::HeaderRule;
use crate::runner::RunnerError;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 6;

const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:95.0) Gecko/20100101 Firefox/95.0";

/// One HTTP attempt: a method, a fully resolved URL and at most one extra header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeRequest {
    pub method: Method,
    pub url: String,
    pub header: Option<HeaderRule>,
}

impl ProbeRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            header: None,
        }
    }

    pub fn with_header(mut self, header: HeaderRule) -> Self {
        self.header = Some(header);
        self
    }
}

/// Result of one HTTP attempt. `Unreachable` covers every transport failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    Response { status: u16, length: usize },
    Unreachable,
}

impl ProbeOutcome {
    /// HTTP status, 0 when the host could not be reached.
    pub fn status(&self) -> u16 {
        match self {
            Self::Response { status, .. } => *status,
            Self::Unreachable => 0,
        }
    }

    /// Response body length in bytes, 0 when the host could not be reached.
    pub fn length(&self) -> usize {
        match self {
            Self::Response { length, .. } => *length,
            Self::Unreachable => 0,
        }
    }

    pub fn is_forbidden(&self) -> bool {
        self.status() == 403
    }
}

/// Faults raised while building a request. Never used for network failures.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid probe URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("invalid header rule '{name}'")]
    InvalidHeader { name: String },

    #[error("failed to build {method} request for {url}: {source}")]
    RequestBuild {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// The single point of HTTP I/O used by the prober.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self, request: &ProbeRequest) -> Result<ProbeOutcome, ProbeError>;
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub timeout_seconds: u64,
    pub proxy: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            proxy: None,
        }
    }
}

/// reqwest-backed executor: no redirects, no certificate checks, bounded timeout.
///
/// The request URL goes through `reqwest::Url` parsing, which folds `%2e` dot
/// segments (`/%2e/` is sent as `/`), so the wire path can differ from
/// `ProbeRequest::url`.
#[derive(Clone, Debug)]
pub struct HttpExecutor {
    client: reqwest::Client,
}

impl HttpExecutor {
    pub fn new(config: &ClientConfig) -> Result<Self, RunnerError> {
        Ok(Self {
            client: build_client(config)?,
        })
    }

    fn build_request(&self, request: &ProbeRequest) -> Result<reqwest::Request, ProbeError> {
        let url = reqwest::Url::parse(&request.url).map_err(|e| ProbeError::InvalidUrl {
            url: request.url.clone(),
            message: e.to_string(),
        })?;
        let mut builder = self.client.request(request.method.clone(), url);
        if let Some(rule) = request.header.as_ref() {
            let invalid = || ProbeError::InvalidHeader {
                name: rule.name.clone(),
            };
            let name = HeaderName::from_str(&rule.name).map_err(|_| invalid())?;
            let value = HeaderValue::from_str(&rule.value).map_err(|_| invalid())?;
            builder = builder.header(name, value);
        }
        builder.build().map_err(|e| ProbeError::RequestBuild {
            method: request.method.clone(),
            url: request.url.clone(),
            source: e,
        })
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(&self, request: &ProbeRequest) -> Result<ProbeOutcome, ProbeError> {
        let req = self.build_request(request)?;

        let resp = match self.client.execute(req).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::debug!(method = %request.method, url = %request.url, error = %e, "request failed");
                return Ok(ProbeOutcome::Unreachable);
            }
        };
        let status = resp.status().as_u16();
        match resp.bytes().await {
            Ok(body) => Ok(ProbeOutcome::Response {
                status,
                length: body.len(),
            }),
            Err(e) => {
                tracing::debug!(method = %request.method, url = %request.url, error = %e, "failed to read body");
                Ok(ProbeOutcome::Unreachable)
            }
        }
    }
}

pub fn build_client(config: &ClientConfig) -> Result<reqwest::Client, RunnerError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static(USER_AGENT),
    );

    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .redirect(redirect::Policy::none())
        .timeout(Duration::from_secs(config.timeout_seconds))
        .danger_accept_invalid_hostnames(true)
        .danger_accept_invalid_certs(true);

    // Only an explicit proxy is honored; environment proxies are ignored.
    match config.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
        Some(proxy) => {
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| RunnerError::ProxySetup {
                proxy: proxy.to_string(),
                source: e,
            })?;
            builder = builder.proxy(proxy);
        }
        None => builder = builder.no_proxy(),
    }

    builder
        .build()
        .map_err(|e| RunnerError::HttpClientBuild { source: e })
}
