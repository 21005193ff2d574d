pub mod backoff;
pub mod connectivity;
pub mod endpoint;
pub mod queue;
pub mod uploader;

pub use backoff::BackoffPolicy;
pub use connectivity::ConnectivityGate;
pub use endpoint::{HttpEndpoint, TranscriptionEndpoint};
pub use queue::{ChunkItem, ChunkQueue};
pub use uploader::{Uploader, UploaderConfig};
