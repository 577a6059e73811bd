use crate::error::OcrError;
use crate::layout::TextBlock;
use crate::upload::ImageFile;
use serde::Serialize;

/// Engine configuration passed through untouched from the server config
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub language: String,
    /// Tesseract-style page segmentation mode (3 = fully automatic)
    pub page_seg_mode: u32,
    pub preserve_interword_spaces: bool,
    /// Tesseract training data directory; downloaded into the cache when unset
    #[cfg_attr(not(feature = "engine-leptess"), allow(dead_code))]
    pub tessdata_path: Option<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            page_seg_mode: 3,
            preserve_interword_spaces: true,
            tessdata_path: None,
        }
    }
}

/// Incremental progress reported while an engine works
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub status: String,
    /// Fraction complete, 0.0..=1.0
    pub progress: f32,
}

impl Progress {
    pub fn new(status: impl Into<String>, progress: f32) -> Self {
        Self {
            status: status.into(),
            progress: progress.clamp(0.0, 1.0),
        }
    }

    pub fn idle() -> Self {
        Self::new("", 0.0)
    }
}

/// Raw engine output
#[derive(Debug, Clone, Default)]
pub struct Recognition {
    pub text: String,
    pub blocks: Vec<TextBlock>,
}

/// Trait that all OCR engines must implement.
///
/// Methods block; callers run them on the blocking thread pool and never call
/// two of them at once on the same engine.
pub trait OcrEngine: Send {
    /// Returns the engine identifier (e.g., "ocrs", "leptess")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the engine
    fn description(&self) -> &'static str;

    /// Load models or training data. May download files and take seconds.
    fn initialize(&mut self, report: &dyn Fn(Progress)) -> Result<(), OcrError>;

    /// Recognize text in an encoded image
    fn recognize(
        &mut self,
        image: &ImageFile,
        report: &dyn Fn(Progress),
    ) -> Result<Recognition, OcrError>;

    /// Drop loaded resources. Must be safe whether or not `initialize` ran.
    fn release(&mut self);

    /// Get supported languages
    fn supported_languages(&self) -> Vec<String>;
}
