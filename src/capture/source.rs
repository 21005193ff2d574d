use crate::error::CaptureError;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// A bounded-duration segment of captured audio as an opaque byte payload.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub payload: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

/// A recorder that slices a continuous audio stream into fixed-duration
/// segments.
///
/// Acquisition of the actual audio is outside the pipeline; implementations
/// own the underlying resource and must release it in `stop`. Segments of
/// zero length are discarded before they reach the queue.
#[async_trait::async_trait]
pub trait ChunkSource: Send + Sync {
    /// Acquire the audio resource and start producing chunks.
    ///
    /// Returns a channel receiver that will receive sliced segments.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>, CaptureError>;

    /// Release the audio resource. Safe to call in any state.
    async fn stop(&mut self) -> Result<()>;

    /// Check if the source is currently producing chunks
    fn is_capturing(&self) -> bool;

    /// Get source name for logging
    fn name(&self) -> &str;
}

/// Chunk source backed by a WAV recording.
///
/// Slices the file into fixed-duration standalone WAV payloads, optionally
/// paced in real time to behave like a live stream. Used for demos, batch
/// transcription, and exercising the pipeline end to end.
pub struct WavFileSource {
    path: PathBuf,
    chunk_duration: Duration,
    paced: bool,
    capturing: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl WavFileSource {
    pub fn new(path: impl Into<PathBuf>, chunk_duration: Duration) -> Self {
        Self {
            path: path.into(),
            chunk_duration,
            paced: true,
            capturing: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    /// Emit chunks as fast as the consumer takes them instead of pacing by
    /// chunk duration.
    pub fn with_pacing(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }
}

#[async_trait::async_trait]
impl ChunkSource for WavFileSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioChunk>, CaptureError> {
        let reader = hound::WavReader::open(&self.path).map_err(|e| CaptureError::SourceStart {
            source_name: self.name().to_string(),
            message: e.to_string(),
        })?;
        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CaptureError::SourceStart {
                source_name: self.name().to_string(),
                message: e.to_string(),
            })?;

        if samples.is_empty() {
            return Err(CaptureError::NoAudioTrack);
        }

        info!(
            "WAV source loaded: {} ({} samples, {}Hz, {} channels)",
            self.path.display(),
            samples.len(),
            spec.sample_rate,
            spec.channels
        );

        let samples_per_chunk = ((spec.sample_rate as f64 * self.chunk_duration.as_secs_f64())
            as usize
            * spec.channels as usize)
            .max(spec.channels as usize);

        let (tx, rx) = mpsc::channel(16);
        let capturing = Arc::clone(&self.capturing);
        capturing.store(true, Ordering::SeqCst);
        let paced = self.paced;
        let chunk_duration = self.chunk_duration;

        let task = tokio::spawn(async move {
            for slice in samples.chunks(samples_per_chunk) {
                if !capturing.load(Ordering::SeqCst) {
                    break;
                }

                let payload = match encode_wav_chunk(spec, slice) {
                    Ok(payload) => payload,
                    Err(e) => {
                        error!("Failed to encode chunk: {}", e);
                        break;
                    }
                };

                let chunk = AudioChunk {
                    payload,
                    captured_at: Utc::now(),
                };
                if tx.send(chunk).await.is_err() {
                    break; // receiver gone
                }

                if paced {
                    tokio::time::sleep(chunk_duration).await;
                }
            }

            capturing.store(false, Ordering::SeqCst);
            debug!("WAV source drained");
        });
        self.task = Some(task);

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}

/// Encode a sample slice as a standalone WAV payload.
fn encode_wav_chunk(spec: hound::WavSpec, samples: &[i16]) -> Result<Vec<u8>> {
    use anyhow::Context;

    let mut payload = Vec::new();
    {
        let cursor = std::io::Cursor::new(&mut payload);
        let mut writer =
            hound::WavWriter::new(cursor, spec).context("Failed to create WAV writer")?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .context("Failed to write sample")?;
        }
        writer.finalize().context("Failed to finalize WAV chunk")?;
    }
    Ok(payload)
}
