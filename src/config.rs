use crate::capture::SessionConfig;
use crate::delivery::BackoffPolicy;
use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub capture: CaptureConfig,
    pub delivery: DeliveryConfig,
    pub transcript: TranscriptConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// WAV recording the file-backed source slices into chunks
    pub input_path: String,
    /// Optional second recording mixed in as the secondary input
    #[serde(default)]
    pub secondary_input_path: Option<String>,
    pub chunk_duration_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    pub endpoint_url: String,
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: u32,
    pub backoff_cap_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptConfig {
    pub marker_interval_secs: u64,
}

fn default_backoff_multiplier() -> u32 {
    2
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Runtime session configuration derived from the loaded file.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            endpoint_url: self.delivery.endpoint_url.clone(),
            chunk_duration: Duration::from_secs(self.capture.chunk_duration_secs),
            marker_interval: Duration::from_secs(self.transcript.marker_interval_secs),
            request_timeout: Duration::from_secs(self.delivery.request_timeout_secs),
            max_attempts: self.delivery.max_attempts,
            backoff: BackoffPolicy {
                base: Duration::from_millis(self.delivery.backoff_base_ms),
                multiplier: self.delivery.backoff_multiplier,
                cap: Duration::from_millis(self.delivery.backoff_cap_ms),
            },
        }
    }
}
