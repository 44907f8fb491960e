//! `fetch`-backed client for the remote progress API.
//!
//! Pushes are detached with `spawn_local`: the engine hands over a request
//! and moves on, and any failure ends up in the console log. Loads are
//! plain async functions the host awaits before reconciling.

use cryptotrace_engine::remote::{
    CERTIFICATE_PATH, SAVE_PROGRESS_PATH, completion_path, progress_path,
};
use cryptotrace_engine::{
    CertificateRequest, CompletionStatus, Identity, ProgressEnvelope, ProgressRecord,
    ProgressRemote, SaveProgressRequest, SaveResponse, SyncBucket, SyncConfig,
    assemble_from_buckets,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use wasm_bindgen_futures::spawn_local;

use crate::dom;

#[derive(Debug, thiserror::Error)]
pub enum WebRemoteError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Server rejected {0}")]
    Rejected(String),
}

#[allow(clippy::future_not_send)]
async fn send_json<T>(method: &str, url: &str, body: Option<String>) -> Result<T, WebRemoteError>
where
    T: DeserializeOwned,
{
    let response = dom::fetch_json(method, url, body.as_deref())
        .await
        .map_err(|err| WebRemoteError::Request(dom::js_error_message(&err)))?;
    if !response.ok() {
        return Err(WebRemoteError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }
    let text = dom::response_text(&response)
        .await
        .map_err(|err| WebRemoteError::Request(dom::js_error_message(&err)))?;
    Ok(serde_json::from_str(&text)?)
}

#[allow(clippy::future_not_send)]
async fn post<B: Serialize>(url: &str, body: &B, what: &str) -> Result<(), WebRemoteError> {
    let body = serde_json::to_string(body)?;
    let response: SaveResponse = send_json("POST", url, Some(body)).await?;
    if response.success {
        Ok(())
    } else {
        Err(WebRemoteError::Rejected(what.to_string()))
    }
}

/// Remote collaborator talking to the progress API with `fetch`.
#[derive(Debug, Clone)]
pub struct FetchRemote {
    config: SyncConfig,
}

impl FetchRemote {
    #[must_use]
    pub const fn new(config: SyncConfig) -> Self {
        Self { config }
    }
}

impl ProgressRemote for FetchRemote {
    fn save(&self, request: SaveProgressRequest) {
        let url = self.config.url(SAVE_PROGRESS_PATH);
        spawn_local(async move {
            let what = format!("save of {}", request.module_id);
            match post(&url, &request, &what).await {
                Ok(()) => log::debug!("synced {}", request.module_id),
                Err(err) => log::warn!("progress sync failed: {err}"),
            }
        });
    }

    fn request_certificate(&self, request: CertificateRequest) {
        let url = self.config.url(CERTIFICATE_PATH);
        spawn_local(async move {
            match post(&url, &request, "certificate request").await {
                Ok(()) => log::info!("certificate requested for {}", request.email),
                Err(err) => log::warn!("certificate request failed: {err}"),
            }
        });
    }
}

#[allow(clippy::future_not_send)]
async fn fetch_bucket(
    config: &SyncConfig,
    identity: &Identity,
    bucket: &SyncBucket,
) -> Result<Option<serde_json::Value>, WebRemoteError> {
    let url = config.url(&progress_path(identity.email(), bucket));
    let envelope: ProgressEnvelope = send_json("GET", &url, None).await?;
    Ok(envelope.progress)
}

/// Load the learner's server-side record from its three buckets. A bucket
/// that fails to load is treated as empty; the call only fails when none
/// of them could be read.
///
/// # Errors
/// Returns the last transport error if every bucket request failed.
#[allow(clippy::future_not_send)]
pub async fn fetch_remote_record(
    config: &SyncConfig,
    identity: &Identity,
) -> Result<ProgressRecord, WebRemoteError> {
    let mut payloads = Vec::with_capacity(SyncBucket::RECORD.len());
    let mut last_error = None;
    for bucket in &SyncBucket::RECORD {
        match fetch_bucket(config, identity, bucket).await {
            Ok(payload) => payloads.push(payload),
            Err(err) => {
                log::warn!("failed to load {} progress: {err}", bucket.module_id());
                payloads.push(None);
                last_error = Some(err);
            }
        }
    }
    if let Some(err) = last_error
        && payloads.iter().all(Option::is_none)
    {
        return Err(err);
    }
    Ok(assemble_from_buckets(
        payloads[0].as_ref(),
        payloads[1].as_ref(),
        payloads[2].as_ref(),
    ))
}

/// Ask the server whether the learner's course is marked complete.
///
/// # Errors
/// Returns an error if the request fails or the body is malformed.
#[allow(clippy::future_not_send)]
pub async fn fetch_completion(
    config: &SyncConfig,
    identity: &Identity,
) -> Result<CompletionStatus, WebRemoteError> {
    let url = config.url(&completion_path(identity.email()));
    send_json("GET", &url, None).await
}
