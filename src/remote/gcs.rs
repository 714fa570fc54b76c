//! Google Cloud Storage backend over the JSON API

use super::ObjectStore;
use crate::config::StorageConfig;
use crate::error::{Error, Result, StorageError};
use crate::types::UploadOutcome;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;

/// Environment variable holding a ready-made OAuth access token
pub const TOKEN_ENV_VAR: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Default service account token endpoint on GCE, Cloud Run and Cloud Functions
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before they expire
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Timeout applied to every storage request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// How requests are authenticated
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    /// No Authorization header (emulators)
    Anonymous,
    /// Fixed bearer token
    Static(String),
    /// Token fetched from the metadata server at this URL
    MetadataServer(String),
}

impl Credentials {
    /// Pick credentials from config, then the token variable, then the metadata server
    pub fn resolve(config: &StorageConfig) -> Self {
        Self::resolve_with(config, std::env::var(TOKEN_ENV_VAR).ok())
    }

    fn resolve_with(config: &StorageConfig, env_token: Option<String>) -> Self {
        if config.anonymous {
            return Credentials::Anonymous;
        }
        if let Some(token) = config.access_token.clone().filter(|t| !t.is_empty()) {
            return Credentials::Static(token);
        }
        if let Some(token) = env_token.filter(|t| !t.is_empty()) {
            return Credentials::Static(token);
        }
        Credentials::MetadataServer(METADATA_TOKEN_URL.to_string())
    }
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Cloud Storage client for the [`super::Uploader`]
pub struct GcsStore {
    client: reqwest::Client,
    base_url: String,
    project: Option<String>,
    location: Option<String>,
    credentials: Credentials,
    token: Mutex<Option<CachedToken>>,
}

impl GcsStore {
    /// Build a store from configuration
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        Self::new(config, Credentials::resolve(config))
    }

    /// Build a store with explicit credentials
    pub fn new(config: &StorageConfig, credentials: Credentials) -> Result<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| {
            Error::config(
                format!("invalid storage base_url '{}': {}", config.base_url, e),
                "storage.base_url",
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                Error::Io(std::io::Error::other(format!(
                    "Failed to create HTTP client: {}",
                    e
                )))
            })?;

        Ok(Self {
            client,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            project: config.project.clone(),
            location: config.location.clone(),
            credentials,
            token: Mutex::new(None),
        })
    }

    fn bucket_url(&self, bucket: &str) -> String {
        format!(
            "{}/storage/v1/b/{}",
            self.base_url,
            urlencoding::encode(bucket)
        )
    }

    fn object_url(&self, bucket: &str, object: &str) -> String {
        format!(
            "{}/o/{}",
            self.bucket_url(bucket),
            urlencoding::encode(object)
        )
    }

    async fn authorize(
        &self,
        request: reqwest::RequestBuilder,
    ) -> std::result::Result<reqwest::RequestBuilder, StorageError> {
        Ok(match self.access_token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn access_token(&self) -> std::result::Result<Option<String>, StorageError> {
        let url = match &self.credentials {
            Credentials::Anonymous => return Ok(None),
            Credentials::Static(token) => return Ok(Some(token.clone())),
            Credentials::MetadataServer(url) => url,
        };

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| Instant::now() < t.refresh_at) {
            return Ok(Some(token.value.clone()));
        }

        let response = self
            .client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| StorageError::Auth(format!("metadata server unreachable: {e}")))?;
        if !response.status().is_success() {
            return Err(StorageError::Auth(format!(
                "metadata server returned HTTP {}",
                response.status()
            )));
        }
        let token: MetadataToken = response
            .json()
            .await
            .map_err(|e| StorageError::Auth(format!("invalid metadata token response: {e}")))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        tracing::debug!(
            expires_in = token.expires_in,
            "refreshed storage access token"
        );
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(Some(token.access_token))
    }

    /// GET a metadata resource and map 200/404 to existence
    async fn exists(&self, url: String, what: &str) -> std::result::Result<bool, StorageError> {
        let response = self
            .authorize(self.client.get(&url))
            .await?
            .send()
            .await
            .map_err(|e| StorageError::Transport(format!("lookup of {what} failed: {e}")))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(StorageError::Transport(format!(
                "lookup of {what} returned {}",
                describe_failure(response).await
            ))),
        }
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn bucket_exists(&self, bucket: &str) -> std::result::Result<bool, StorageError> {
        self.exists(self.bucket_url(bucket), &format!("bucket '{bucket}'"))
            .await
    }

    async fn create_bucket(&self, bucket: &str) -> std::result::Result<(), StorageError> {
        let project = self.project.as_deref().ok_or_else(|| {
            StorageError::Transport("storage.project must be set to create buckets".to_string())
        })?;

        let mut body = serde_json::json!({ "name": bucket });
        if let Some(location) = &self.location {
            body["location"] = serde_json::Value::String(location.clone());
        }

        let request = self
            .client
            .post(format!("{}/storage/v1/b", self.base_url))
            .query(&[("project", project)])
            .json(&body);
        let response = self
            .authorize(request)
            .await?
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(StorageError::Transport(describe_failure(response).await))
        }
    }

    async fn object_exists(
        &self,
        bucket: &str,
        object: &str,
    ) -> std::result::Result<bool, StorageError> {
        self.exists(
            self.object_url(bucket, object),
            &format!("gs://{bucket}/{object}"),
        )
        .await
    }

    async fn put_object(
        &self,
        bucket: &str,
        object: &str,
        data: Vec<u8>,
    ) -> std::result::Result<UploadOutcome, StorageError> {
        // ifGenerationMatch=0 makes the write conditional on the object being absent
        let request = self
            .client
            .post(format!(
                "{}/upload/storage/v1/b/{}/o",
                self.base_url,
                urlencoding::encode(bucket)
            ))
            .query(&[
                ("uploadType", "media"),
                ("name", object),
                ("ifGenerationMatch", "0"),
            ])
            .header(reqwest::header::CONTENT_TYPE, content_type(object))
            .body(data);

        let response = self
            .authorize(request)
            .await?
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(UploadOutcome::Uploaded),
            StatusCode::PRECONDITION_FAILED => Ok(UploadOutcome::SkippedAlreadyExists),
            _ => Err(StorageError::Upload {
                bucket: bucket.to_string(),
                object: object.to_string(),
                reason: describe_failure(response).await,
            }),
        }
    }
}

/// `HTTP {status}: {body}` for an unsuccessful response
async fn describe_failure(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    format!("HTTP {status}: {body}")
}

fn content_type(object: &str) -> &'static str {
    match object.rsplit_once('.').map(|(_, ext)| ext) {
        Some("json") => "application/json",
        Some("csv") => "text/csv; charset=utf-8",
        Some("txt") => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
