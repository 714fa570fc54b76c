//! HTTP fetch of endpoint payloads with bounded retries

use crate::config::{EndpointSpec, PipelineDefaults};
use crate::error::{Error, FetchError, Result};
use crate::retry::retry_sequential;
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;

/// Default number of attempts per fetch
pub const DEFAULT_RETRIES: u32 = 3;

/// Default per-attempt timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const STANDARD_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

/// Parameters of one fetch
#[derive(Clone, Debug)]
pub struct FetchRequest {
    /// Request URL
    pub url: String,
    /// HTTP verb
    pub method: String,
    /// Query string parameters
    pub params: Vec<(String, String)>,
    /// Maximum number of attempts (at least 1)
    pub retries: u32,
    /// Per-attempt timeout
    pub timeout: Duration,
}

impl FetchRequest {
    /// GET `url` with default retries and timeout
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            params: Vec::new(),
            retries: DEFAULT_RETRIES,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Build the request for a configured endpoint
    pub fn for_endpoint(endpoint: &EndpointSpec, defaults: &PipelineDefaults) -> Self {
        Self {
            url: endpoint.url.clone(),
            method: endpoint.method.clone(),
            params: endpoint
                .params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            retries: defaults.fetch_retries,
            timeout: defaults.fetch_timeout(),
        }
    }

    fn validated_method(&self) -> std::result::Result<Method, FetchError> {
        if self.url.trim().is_empty() {
            return Err(FetchError::InvalidRequest("url must not be empty".into()));
        }
        if self.retries == 0 {
            return Err(FetchError::InvalidRequest(
                "retries must be at least 1".into(),
            ));
        }

        let verb = self.method.trim().to_ascii_uppercase();
        if !STANDARD_METHODS.contains(&verb.as_str()) {
            return Err(FetchError::InvalidRequest(format!(
                "unsupported HTTP method '{}'",
                self.method
            )));
        }
        Method::from_bytes(verb.as_bytes())
            .map_err(|e| FetchError::InvalidRequest(format!("invalid HTTP method: {e}")))
    }
}

/// Fetches JSON payloads over HTTP
#[derive(Clone, Debug)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    /// Create a fetcher with its own HTTP client
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("api-pipeline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "Failed to create HTTP client: {}",
                    e
                )))
            })?;
        Ok(Self { client })
    }

    /// Create a fetcher around an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Fetch `request.url` and decode the body as JSON
    ///
    /// Non-2xx responses, transport errors and non-JSON bodies all count as
    /// failed attempts. After `request.retries` failures the last error is
    /// returned.
    pub async fn fetch(&self, request: &FetchRequest) -> std::result::Result<Value, FetchError> {
        let method = request.validated_method()?;
        let label = format!("API fetch for {}", request.url);
        let method = &method;

        retry_sequential(request.retries, &label, move |_| {
            self.attempt(method.clone(), request)
        })
        .await
    }

    async fn attempt(
        &self,
        method: Method,
        request: &FetchRequest,
    ) -> std::result::Result<Value, FetchError> {
        let response = self
            .client
            .request(method, &request.url)
            .query(&request.params)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: request.url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: request.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Request {
                url: request.url.clone(),
                source,
            })?;

        serde_json::from_slice(&body).map_err(|e| FetchError::InvalidJson {
            url: request.url.clone(),
            reason: e.to_string(),
        })
    }
}
