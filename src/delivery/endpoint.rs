use crate::error::DeliveryError;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Remote transcription endpoint consumed by the uploader.
///
/// One call is one delivery attempt. Implementations must treat any
/// transport problem or non-2xx status as a `DeliveryError` so the uploader
/// can retry; a successful call returns the transcribed text (possibly
/// empty).
#[async_trait::async_trait]
pub trait TranscriptionEndpoint: Send + Sync {
    async fn deliver(
        &self,
        payload: &[u8],
        captured_at: DateTime<Utc>,
    ) -> Result<String, DeliveryError>;
}

/// Success response from the transcription endpoint.
///
/// `text` is preferred; `transcript` is accepted as an alias.
#[derive(Debug, Default, Deserialize)]
struct TranscribeResponse {
    text: Option<String>,
    transcript: Option<String>,
}

/// HTTP implementation of the delivery contract.
///
/// POSTs the chunk bytes as a multipart `file` part and expects JSON
/// `{ "text": string }` back. Every request carries a bounded timeout so a
/// hung server cannot stall the queue indefinitely.
pub struct HttpEndpoint {
    client: reqwest::Client,
    url: String,
}

impl HttpEndpoint {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait::async_trait]
impl TranscriptionEndpoint for HttpEndpoint {
    async fn deliver(
        &self,
        payload: &[u8],
        captured_at: DateTime<Utc>,
    ) -> Result<String, DeliveryError> {
        debug!("Uploading chunk: {} bytes", payload.len());

        let part = reqwest::multipart::Part::bytes(payload.to_vec())
            .file_name(format!("chunk-{}.webm", captured_at.timestamp_millis()))
            .mime_str("application/octet-stream")
            .map_err(|e| DeliveryError::Network(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // An unparseable success body degrades to empty text rather than a
        // retry; the server accepted the chunk.
        let parsed: TranscribeResponse = response.json().await.unwrap_or_default();
        Ok(parsed.text.or(parsed.transcript).unwrap_or_default())
    }
}
