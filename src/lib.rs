pub mod capture;
pub mod config;
pub mod delivery;
pub mod error;
pub mod http;
pub mod transcript;

pub use capture::{
    AudioChunk, CaptureSession, ChunkSource, SessionConfig, SessionState, SessionStats,
    WavFileSource,
};
pub use config::Config;
pub use delivery::{
    BackoffPolicy, ChunkItem, ChunkQueue, ConnectivityGate, HttpEndpoint, TranscriptionEndpoint,
    Uploader, UploaderConfig,
};
pub use error::{CaptureError, DeliveryError};
pub use http::{create_router, AppState};
pub use transcript::{TranscriptAssembler, TranscriptEvent, TranscriptExport};
