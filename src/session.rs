//! Ownership of the single shared OCR engine
//!
//! The engine is a stateful, slow-to-load resource. An [`EngineSession`] owns
//! it behind an async FIFO mutex so submissions queue instead of interleaving,
//! initializes it lazily exactly once, and tears it down only after in-flight
//! work has finished.

use crate::engine::{OcrEngine, Progress, Recognition};
use crate::error::OcrError;
use crate::layout::{self, NO_TEXT_FOUND};
use crate::preprocessing::{self, Pipeline, PreprocessingReport};
use crate::upload::ImageFile;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex};

/// Shown when recognition throws
pub const RECOGNITION_FAILED: &str =
    "Sorry! Something went wrong. Please try uploading the image again.";
/// Persistent status after a failed initialization
pub const INIT_FAILED_STATUS: &str =
    "Failed to initialize OCR engine. Restart the server to retry.";

/// Engine lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Ready,
    Failed(String),
    Released,
}

impl EngineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
            Self::Failed(_) => "failed",
            Self::Released => "released",
        }
    }
}

/// How a conversion ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Text,
    NoText,
    Failed,
}

/// Result of converting one uploaded image
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub text: String,
    pub outcome: Outcome,
    pub processing_time_ms: u64,
    pub preprocessing: PreprocessingReport,
}

/// Snapshot of the session for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub engine: &'static str,
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub busy: bool,
    pub progress: Progress,
}

/// Marks a submission as in flight until dropped
struct BusyGuard(Arc<AtomicUsize>);

impl BusyGuard {
    fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Resets the published progress to idle when dropped
struct IdleOnDrop(Arc<watch::Sender<Progress>>);

impl Drop for IdleOnDrop {
    fn drop(&mut self) {
        self.0.send_replace(Progress::idle());
    }
}

pub struct EngineSession {
    engine_name: &'static str,
    engine_description: &'static str,
    engine: Arc<Mutex<Box<dyn OcrEngine>>>,
    state: Arc<watch::Sender<EngineState>>,
    progress: Arc<watch::Sender<Progress>>,
    in_flight: Arc<AtomicUsize>,
    pipeline: Pipeline,
}

impl EngineSession {
    pub fn new(engine: Box<dyn OcrEngine>, pipeline: Pipeline) -> Self {
        let (state, _) = watch::channel(EngineState::Uninitialized);
        let (progress, _) = watch::channel(Progress::idle());

        Self {
            engine_name: engine.name(),
            engine_description: engine.description(),
            engine: Arc::new(Mutex::new(engine)),
            state: Arc::new(state),
            progress: Arc::new(progress),
            in_flight: Arc::new(AtomicUsize::new(0)),
            pipeline,
        }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine_name
    }

    pub fn engine_description(&self) -> &'static str {
        self.engine_description
    }

    pub fn pipeline(&self) -> Pipeline {
        self.pipeline
    }

    pub fn state(&self) -> EngineState {
        self.state.borrow().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Progress updates as they are published
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        let state = self.state();
        let error = match &state {
            EngineState::Failed(message) => Some(message.clone()),
            _ => None,
        };

        SessionStatus {
            engine: self.engine_name,
            state: state.as_str(),
            error,
            busy: self.is_busy(),
            progress: self.progress.borrow().clone(),
        }
    }

    /// Supported languages, once the engine is free to answer
    pub async fn supported_languages(&self) -> Vec<String> {
        self.engine.lock().await.supported_languages()
    }

    /// Initialize the engine if nobody has yet.
    ///
    /// Concurrent callers queue on the engine lock; only the first runs the
    /// engine's initialization. A failure sticks: later calls get the same error.
    pub async fn ensure_initialized(&self) -> Result<(), OcrError> {
        let mut engine = Arc::clone(&self.engine).lock_owned().await;

        match self.state() {
            EngineState::Ready => return Ok(()),
            EngineState::Failed(message) => return Err(OcrError::InitializationError(message)),
            EngineState::Released => return Err(OcrError::EngineReleased),
            EngineState::Uninitialized => {}
        }

        tracing::info!("Initializing {} engine", self.engine_name);
        self.progress
            .send_replace(Progress::new("Loading OCR engine...", 0.0));

        // Outcome is recorded before the engine lock is released, even if the
        // caller has been dropped
        let engine_name = self.engine_name;
        let state = Arc::clone(&self.state);
        let progress = Arc::clone(&self.progress);
        tokio::task::spawn_blocking(move || {
            let report = |p: Progress| {
                progress.send_replace(p);
            };
            let result = panic::catch_unwind(AssertUnwindSafe(|| engine.initialize(&report)))
                .unwrap_or_else(|_| {
                    Err(OcrError::Internal(
                        "engine panicked during initialization".to_string(),
                    ))
                });
            record_initialization(engine_name, &state, &progress, result)
        })
        .await
        .map_err(|e| OcrError::Internal(format!("Initialization task failed: {}", e)))?
    }

    /// Run the engine on an already prepared image
    pub async fn recognize(&self, image: ImageFile) -> Result<Recognition, OcrError> {
        self.ensure_initialized().await?;

        let mut engine = Arc::clone(&self.engine).lock_owned().await;
        // Released while we waited for the lock
        if self.state() != EngineState::Ready {
            return Err(OcrError::EngineReleased);
        }

        let progress = Arc::clone(&self.progress);
        tokio::task::spawn_blocking(move || {
            let report = |p: Progress| {
                progress.send_replace(p);
            };
            engine.recognize(&image, &report)
        })
        .await
        .map_err(|e| OcrError::Internal(format!("Recognition task failed: {}", e)))?
    }

    /// Convert one upload to text.
    ///
    /// Recognition failures become a [`Outcome::Failed`] conversion carrying
    /// [`RECOGNITION_FAILED`]; only an unusable engine is returned as `Err`.
    /// The busy flag and progress line are cleared on every path, including
    /// cancellation.
    pub async fn convert(
        &self,
        file: ImageFile,
        pipeline: Option<Pipeline>,
    ) -> Result<Conversion, OcrError> {
        let _busy = BusyGuard::acquire(&self.in_flight);
        let start = Instant::now();

        self.ensure_initialized().await?;
        let _idle = IdleOnDrop(Arc::clone(&self.progress));
        self.progress
            .send_replace(Progress::new("Processing your image...", 0.0));

        let pipeline = pipeline.unwrap_or(self.pipeline);
        let prepared =
            tokio::task::spawn_blocking(move || preprocessing::preprocess(&file, &pipeline))
                .await
                .map_err(|e| OcrError::Internal(format!("Preprocessing task failed: {}", e)));

        let result = match prepared {
            Ok((image, report)) => match self.recognize(image).await {
                Ok(recognition) => Ok((recognition, report)),
                Err(e) => Err((e, report)),
            },
            Err(e) => Err((e, PreprocessingReport::skipped(pipeline.preset()))),
        };

        let processing_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok((recognition, preprocessing)) => {
                let text = assemble_text(&recognition);
                let outcome = if text == NO_TEXT_FOUND {
                    Outcome::NoText
                } else {
                    Outcome::Text
                };

                tracing::info!(
                    "OCR completed in {}ms, {} blocks, text length: {}",
                    processing_time_ms,
                    recognition.blocks.len(),
                    text.len()
                );

                Ok(Conversion {
                    text,
                    outcome,
                    processing_time_ms,
                    preprocessing,
                })
            }
            Err((e @ OcrError::EngineReleased, _)) => Err(e),
            Err((e, preprocessing)) => {
                tracing::error!("Error processing image: {}", e);
                Ok(Conversion {
                    text: RECOGNITION_FAILED.to_string(),
                    outcome: Outcome::Failed,
                    processing_time_ms,
                    preprocessing,
                })
            }
        }
    }

    /// Release engine resources.
    ///
    /// Waits for queued and in-flight work to finish first. Safe to call
    /// before initialization and more than once.
    pub async fn release(&self) {
        let mut engine = self.engine.lock().await;
        if self.state() == EngineState::Released {
            return;
        }

        engine.release();
        self.state.send_replace(EngineState::Released);
        self.progress.send_replace(Progress::idle());
        tracing::info!("{} engine released", self.engine_name);
    }
}

/// Publish the result of an initialization attempt
fn record_initialization(
    engine_name: &str,
    state: &watch::Sender<EngineState>,
    progress: &watch::Sender<Progress>,
    result: Result<(), OcrError>,
) -> Result<(), OcrError> {
    match result {
        Ok(()) => {
            tracing::info!("{} engine ready", engine_name);
            state.send_replace(EngineState::Ready);
            progress.send_replace(Progress::new("Ready!", 1.0));
            Ok(())
        }
        Err(e) => {
            let message = match e {
                OcrError::InitializationError(message) => message,
                other => other.to_string(),
            };
            tracing::error!("Engine initialization failed: {}", message);
            state.send_replace(EngineState::Failed(message.clone()));
            progress.send_replace(Progress::new(INIT_FAILED_STATUS, 0.0));
            Err(OcrError::InitializationError(message))
        }
    }
}

/// Reading-order text from blocks, falling back to the engine's raw text
fn assemble_text(recognition: &Recognition) -> String {
    if !recognition.blocks.is_empty() {
        return layout::reconstruct(&recognition.blocks);
    }

    let raw = recognition.text.trim();
    if raw.is_empty() {
        NO_TEXT_FOUND.to_string()
    } else {
        raw.to_string()
    }
}
