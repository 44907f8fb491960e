//! Client for the hosted progress API, used by the remote probe.

pub mod probe;

use async_trait::async_trait;
use cryptotrace_engine::remote::{SAVE_PROGRESS_PATH, completion_path, progress_path};
use cryptotrace_engine::{
    CompletionStatus, ProgressEnvelope, ProgressRecord, SaveProgressRequest, SaveResponse,
    SyncBucket, SyncConfig, assemble_from_buckets,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

pub use probe::run_probe;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum RemoteApiError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The three progress endpoints the probe exercises.
#[async_trait]
pub trait ProgressApi: Send + Sync {
    async fn load_bucket(
        &self,
        email: &str,
        bucket: &SyncBucket,
    ) -> Result<Option<Value>, RemoteApiError>;

    async fn save(&self, request: &SaveProgressRequest) -> Result<SaveResponse, RemoteApiError>;

    async fn completion(&self, email: &str) -> Result<CompletionStatus, RemoteApiError>;
}

/// Load and reassemble a full record. Unlike the browser shell, any bucket
/// failure fails the load so the probe reports it.
///
/// # Errors
/// Returns the first bucket error.
pub async fn load_record(
    api: &dyn ProgressApi,
    email: &str,
) -> Result<ProgressRecord, RemoteApiError> {
    let mut payloads = Vec::with_capacity(SyncBucket::RECORD.len());
    for bucket in &SyncBucket::RECORD {
        payloads.push(api.load_bucket(email, bucket).await?);
    }
    Ok(assemble_from_buckets(
        payloads[0].as_ref(),
        payloads[1].as_ref(),
        payloads[2].as_ref(),
    ))
}

pub struct HttpProgressApi {
    client: reqwest::Client,
    config: SyncConfig,
}

impl HttpProgressApi {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: SyncConfig) -> Result<Self, RemoteApiError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, config })
    }

    async fn read_json<T: DeserializeOwned>(
        url: String,
        response: reqwest::Response,
    ) -> Result<T, RemoteApiError> {
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteApiError::Status {
                url,
                status: status.as_u16(),
            });
        }
        let text = response.text().await?;
        log::debug!("{url} -> {text}");
        Ok(serde_json::from_str(&text)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteApiError> {
        let url = self.config.url(path);
        let response = self.client.get(&url).send().await?;
        Self::read_json(url, response).await
    }
}

#[async_trait]
impl ProgressApi for HttpProgressApi {
    async fn load_bucket(
        &self,
        email: &str,
        bucket: &SyncBucket,
    ) -> Result<Option<Value>, RemoteApiError> {
        let envelope: ProgressEnvelope = self.get_json(&progress_path(email, bucket)).await?;
        Ok(envelope.progress)
    }

    async fn save(&self, request: &SaveProgressRequest) -> Result<SaveResponse, RemoteApiError> {
        let url = self.config.url(SAVE_PROGRESS_PATH);
        let response = self.client.post(&url).json(request).send().await?;
        Self::read_json(url, response).await
    }

    async fn completion(&self, email: &str) -> Result<CompletionStatus, RemoteApiError> {
        self.get_json(&completion_path(email)).await
    }
}
