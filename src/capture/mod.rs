pub mod session;
pub mod source;
pub mod stats;

pub use session::{CaptureSession, SessionConfig, SessionState};
pub use source::{AudioChunk, ChunkSource, WavFileSource};
pub use stats::SessionStats;
