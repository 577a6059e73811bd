//! Leptess/Tesseract engine implementation
//!
//! Tesseract-based OCR engine. Better for noisy/messy images like phone photos.
//! Uses tesseract-static crate for static linking (no system dependencies).
//! Downloads tessdata (training data) automatically on first initialization.

use crate::engine::{EngineOptions, OcrEngine, Progress, Recognition};
use crate::error::OcrError;
use crate::layout::{BoundingBox, TextBlock};
use crate::upload::ImageFile;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tesseract_static::tesseract::Tesseract;

/// TSV row level for a single word
const TSV_WORD_LEVEL: u32 = 5;

/// Tesseract OCR Engine
pub struct LeptessEngine {
    options: EngineOptions,
    /// Set once training data is available and verified
    tessdata_path: Option<String>,
}

impl LeptessEngine {
    pub fn new(options: &EngineOptions) -> Self {
        Self {
            options: options.clone(),
            tessdata_path: None,
        }
    }

    /// Create a Tesseract instance configured with the pass-through options
    fn configured(&self, tessdata_path: &str) -> Result<Tesseract, OcrError> {
        let tess = Tesseract::new(Some(tessdata_path), Some(&self.options.language))
            .map_err(|e| OcrError::ProcessingError(format!("Failed to create Tesseract: {}", e)))?;

        let tess = tess
            .set_variable(
                "tessedit_pageseg_mode",
                &self.options.page_seg_mode.to_string(),
            )
            .map_err(|e| OcrError::ProcessingError(format!("Failed to set PSM: {}", e)))?;

        let preserve = if self.options.preserve_interword_spaces {
            "1"
        } else {
            "0"
        };
        tess.set_variable("preserve_interword_spaces", preserve)
            .map_err(|e| {
                OcrError::ProcessingError(format!("Failed to set whitespace preservation: {}", e))
            })
    }
}

impl OcrEngine for LeptessEngine {
    fn name(&self) -> &'static str {
        "leptess"
    }

    fn description(&self) -> &'static str {
        "Tesseract OCR engine - better for noisy/messy images like phone photos"
    }

    fn initialize(&mut self, report: &dyn Fn(Progress)) -> Result<(), OcrError> {
        if self.tessdata_path.is_some() {
            return Ok(());
        }

        report(Progress::new("Loading language data...", 0.2));
        let tessdata_path = match &self.options.tessdata_path {
            Some(path) => path.clone(),
            None => ensure_tessdata_available(&self.options.language)?,
        };

        // Validate that tessdata is accessible by doing a test initialization
        report(Progress::new("Initializing...", 0.7));
        let test_tess = Tesseract::new(Some(&tessdata_path), Some(&self.options.language))
            .map_err(|e| {
                OcrError::InitializationError(format!("Failed to initialize Tesseract: {}", e))
            })?;
        drop(test_tess);

        tracing::info!(
            "Leptess engine initialized (tessdata: {}, language: {}, psm: {})",
            tessdata_path,
            self.options.language,
            self.options.page_seg_mode
        );

        self.tessdata_path = Some(tessdata_path);
        Ok(())
    }

    fn recognize(
        &mut self,
        image: &ImageFile,
        report: &dyn Fn(Progress),
    ) -> Result<Recognition, OcrError> {
        let tessdata_path = self.tessdata_path.as_deref().ok_or_else(|| {
            OcrError::ProcessingError("leptess engine is not initialized".to_string())
        })?;

        let img = image::load_from_memory(&image.bytes)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to load image: {}", e)))?;
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        // Convert to BMP in memory (BMP is always supported by leptonica)
        let mut bmp_data = Vec::new();
        rgb_img
            .write_to(&mut std::io::Cursor::new(&mut bmp_data), image::ImageFormat::Bmp)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to convert to BMP: {}", e)))?;

        tracing::debug!(
            "Processing image: {}x{}, BMP size: {} bytes",
            width,
            height,
            bmp_data.len()
        );

        report(Progress::new("Recognizing text...", 0.3));
        let mut tess = self
            .configured(tessdata_path)?
            .set_image_from_mem(&bmp_data)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to set image: {}", e)))?
            .recognize()
            .map_err(|e| OcrError::ProcessingError(format!("Failed to recognize text: {}", e)))?;

        let text = tess
            .get_text()
            .map_err(|e| OcrError::ProcessingError(format!("Failed to get text: {}", e)))?;

        report(Progress::new("Locating text blocks...", 0.8));
        let tsv = tess
            .get_tsv_text(0)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to get layout: {}", e)))?;
        let blocks = parse_tsv_lines(&tsv);

        report(Progress::new("Recognizing text...", 1.0));

        Ok(Recognition { text, blocks })
    }

    fn release(&mut self) {
        if self.tessdata_path.take().is_some() {
            tracing::info!("leptess engine released");
        }
    }

    fn supported_languages(&self) -> Vec<String> {
        // Tesseract supports many languages - return common ones
        vec![
            "eng".to_string(),     // English
            "deu".to_string(),     // German
            "fra".to_string(),     // French
            "spa".to_string(),     // Spanish
            "ita".to_string(),     // Italian
            "por".to_string(),     // Portuguese
            "jpn".to_string(),     // Japanese
            "chi_sim".to_string(), // Chinese Simplified
            "kor".to_string(),     // Korean
            "rus".to_string(),     // Russian
        ]
    }
}

/// Group word rows of Tesseract TSV output into one block per text line.
///
/// Columns: level, page, block, par, line, word, left, top, width, height, conf, text.
/// Word boxes are unioned per (block, paragraph, line) and their texts joined by a space.
fn parse_tsv_lines(tsv: &str) -> Vec<TextBlock> {
    let mut lines: BTreeMap<(u32, u32, u32), TextBlock> = BTreeMap::new();

    for row in tsv.lines() {
        let columns: Vec<&str> = row.split('\t').collect();
        if columns.len() < 12 {
            continue;
        }

        let number = |i: usize| columns[i].trim().parse::<u32>().ok();
        let (Some(level), Some(block), Some(par), Some(line)) =
            (number(0), number(2), number(3), number(4))
        else {
            // header row
            continue;
        };
        if level != TSV_WORD_LEVEL {
            continue;
        }

        let word = columns[11].trim();
        let (Some(left), Some(top), Some(width), Some(height)) =
            (number(6), number(7), number(8), number(9))
        else {
            continue;
        };
        if word.is_empty() {
            continue;
        }

        let bbox = BoundingBox::new(
            left as f32,
            top as f32,
            (left + width) as f32,
            (top + height) as f32,
        );

        lines
            .entry((block, par, line))
            .and_modify(|existing| {
                existing.text.push(' ');
                existing.text.push_str(word);
                existing.bbox = existing.bbox.union(&bbox);
            })
            .or_insert_with(|| TextBlock::new(word, bbox));
    }

    lines.into_values().collect()
}

// ============================================================================
// Tessdata download helpers
// ============================================================================

/// Ensure tessdata is available, downloading if needed
fn ensure_tessdata_available(language: &str) -> Result<String, OcrError> {
    let tessdata_dir: PathBuf = super::cache_dir().join("tessdata");
    let traineddata_path = tessdata_dir.join(format!("{}.traineddata", language));

    super::ensure_downloaded(&tessdata_url(language), &traineddata_path)?;

    // Tesseract expects the directory, not the file
    tessdata_dir
        .to_str()
        .map(|s| s.to_string())
        .ok_or_else(|| OcrError::InitializationError("Invalid tessdata path".to_string()))
}

/// Get tessdata download URL for a language
fn tessdata_url(language: &str) -> String {
    // Use tessdata_fast for smaller, faster downloads
    format!(
        "https://github.com/tesseract-ocr/tessdata_fast/raw/main/{}.traineddata",
        language
    )
}
