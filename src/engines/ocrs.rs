//! OCRS engine implementation
//!
//! Pure Rust OCR engine using the ocrs library. No system dependencies required.
//! Downloads neural network models automatically on first initialization.

use crate::engine::{EngineOptions, OcrEngine, Progress, Recognition};
use crate::error::OcrError;
use crate::layout::{BoundingBox, TextBlock};
use crate::upload::ImageFile;
use ocrs::{DecodeMethod, ImageSource, OcrEngine as OcrsOcrEngine, OcrEngineParams, TextItem};
use rten::Model;

/// Default model URLs from the ocrs project
const DETECTION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten";
const RECOGNITION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten";

/// OCR Engine wrapping the ocrs library
pub struct OcrsEngine {
    options: EngineOptions,
    engine: Option<OcrsOcrEngine>,
}

impl OcrsEngine {
    pub fn new(options: &EngineOptions) -> Self {
        Self {
            options: options.clone(),
            engine: None,
        }
    }
}

impl OcrEngine for OcrsEngine {
    fn name(&self) -> &'static str {
        "ocrs"
    }

    fn description(&self) -> &'static str {
        "Pure Rust OCR engine - fast, no system dependencies required"
    }

    fn initialize(&mut self, report: &dyn Fn(Progress)) -> Result<(), OcrError> {
        if self.engine.is_some() {
            return Ok(());
        }

        tracing::info!("Initializing ocrs OCR engine...");
        if !self.supported_languages().contains(&self.options.language) {
            return Err(OcrError::InitializationError(format!(
                "ocrs does not support language '{}' (supported: {})",
                self.options.language,
                self.supported_languages().join(", ")
            )));
        }
        if self.options.page_seg_mode != 3 {
            tracing::debug!(
                "ocrs has no page segmentation modes; ignoring mode {}",
                self.options.page_seg_mode
            );
        }

        let cache_dir = super::cache_dir();
        let detection_model_path = cache_dir.join("text-detection.rten");
        let recognition_model_path = cache_dir.join("text-recognition.rten");

        report(Progress::new("Downloading detection model...", 0.1));
        super::ensure_downloaded(DETECTION_MODEL_URL, &detection_model_path)?;
        report(Progress::new("Downloading recognition model...", 0.4));
        super::ensure_downloaded(RECOGNITION_MODEL_URL, &recognition_model_path)?;

        report(Progress::new("Initializing...", 0.7));
        let detection_model = Model::load_file(&detection_model_path).map_err(|e| {
            OcrError::InitializationError(format!("Failed to load detection model: {}", e))
        })?;
        let recognition_model = Model::load_file(&recognition_model_path).map_err(|e| {
            OcrError::InitializationError(format!("Failed to load recognition model: {}", e))
        })?;

        let engine = OcrsOcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            decode_method: DecodeMethod::Greedy,
            ..Default::default()
        })
        .map_err(|e| {
            OcrError::InitializationError(format!("Failed to create OCR engine: {}", e))
        })?;

        self.engine = Some(engine);
        tracing::info!("ocrs engine initialized successfully");
        Ok(())
    }

    fn recognize(
        &mut self,
        image: &ImageFile,
        report: &dyn Fn(Progress),
    ) -> Result<Recognition, OcrError> {
        let engine = self.engine.as_ref().ok_or_else(|| {
            OcrError::ProcessingError("ocrs engine is not initialized".to_string())
        })?;

        let img = image::load_from_memory(&image.bytes)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to load image: {}", e)))?;

        // Convert to RGB8 (HWC format, which is what ImageSource::from_bytes expects)
        let rgb_img = img.into_rgb8();
        let dimensions = rgb_img.dimensions();

        let img_source = ImageSource::from_bytes(rgb_img.as_raw(), dimensions).map_err(|e| {
            OcrError::ProcessingError(format!("Failed to create image source: {}", e))
        })?;

        report(Progress::new("Preparing image...", 0.1));
        let ocr_input = engine
            .prepare_input(img_source)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to prepare input: {}", e)))?;

        report(Progress::new("Detecting text...", 0.3));
        let word_rects = engine
            .detect_words(&ocr_input)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to detect words: {}", e)))?;

        report(Progress::new("Grouping lines...", 0.5));
        let line_rects = engine.find_text_lines(&ocr_input, &word_rects);

        report(Progress::new("Recognizing text...", 0.7));
        let line_texts = engine
            .recognize_text(&ocr_input, &line_rects)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to recognize text: {}", e)))?;

        let blocks: Vec<TextBlock> = line_texts
            .iter()
            .filter_map(|line| line.as_ref())
            .map(|line| {
                let rect = line.bounding_rect();
                let text = line
                    .words()
                    .map(|word| word.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                TextBlock::new(
                    text,
                    BoundingBox::new(
                        rect.left() as f32,
                        rect.top() as f32,
                        rect.right() as f32,
                        rect.bottom() as f32,
                    ),
                )
            })
            .collect();

        let text = blocks
            .iter()
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        report(Progress::new("Recognizing text...", 1.0));
        tracing::debug!("ocrs recognized {} lines", blocks.len());

        Ok(Recognition { text, blocks })
    }

    fn release(&mut self) {
        if self.engine.take().is_some() {
            tracing::info!("ocrs engine released");
        }
    }

    fn supported_languages(&self) -> Vec<String> {
        // ocrs currently only supports English/Latin alphabet
        vec!["eng".to_string()]
    }
}
