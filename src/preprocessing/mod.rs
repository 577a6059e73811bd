//! Image preprocessing module for OCR enhancement
//!
//! Turns an uploaded image into a scaled, strictly black-and-white PNG that
//! recognizes more reliably than the raw capture.

pub mod pipeline;
pub mod steps;

pub use pipeline::{Pipeline, Preset, StepTiming};

use crate::error::OcrError;
use crate::upload::ImageFile;
use image::{DynamicImage, ImageFormat};
use serde::Serialize;
use std::io::Cursor;

/// What preprocessing did to an upload
#[derive(Debug, Clone, Serialize)]
pub struct PreprocessingReport {
    /// Preset requested
    pub preset: String,
    /// False when the original upload was passed on unchanged
    pub applied: bool,
    /// Total preprocessing time in milliseconds
    pub total_time_ms: u64,
    /// Individual step timings
    pub steps: Vec<StepTiming>,
}

impl PreprocessingReport {
    pub fn skipped(preset: Preset) -> Self {
        Self {
            preset: preset.as_str().to_string(),
            applied: false,
            total_time_ms: 0,
            steps: vec![],
        }
    }
}

/// Prepare an upload for recognition.
///
/// Never fails: if the image cannot be decoded, processed or re-encoded, the
/// original upload is returned untouched and the report says so.
pub fn preprocess(file: &ImageFile, pipeline: &Pipeline) -> (ImageFile, PreprocessingReport) {
    if pipeline.preset() == Preset::None {
        return (file.clone(), PreprocessingReport::skipped(Preset::None));
    }

    match try_preprocess(file, pipeline) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!("Preprocessing failed, using original image: {}", e);
            (file.clone(), PreprocessingReport::skipped(pipeline.preset()))
        }
    }
}

fn try_preprocess(
    file: &ImageFile,
    pipeline: &Pipeline,
) -> Result<(ImageFile, PreprocessingReport), OcrError> {
    let decoded = image::load_from_memory(&file.bytes)
        .map_err(|e| OcrError::PreprocessingError(format!("Failed to decode image: {}", e)))?;

    let result = pipeline.process(&decoded)?;
    let (width, height) = result.image.dimensions();

    let mut png = Vec::new();
    DynamicImage::ImageRgba8(result.image)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| OcrError::PreprocessingError(format!("Failed to encode image: {}", e)))?;

    tracing::debug!(
        "Preprocessed {}x{} -> {}x{} in {}ms ({} preset)",
        decoded.width(),
        decoded.height(),
        width,
        height,
        result.total_time_ms,
        result.preset.as_str()
    );

    Ok((
        ImageFile::new(png, "image/png"),
        PreprocessingReport {
            preset: result.preset.as_str().to_string(),
            applied: true,
            total_time_ms: result.total_time_ms,
            steps: result.steps,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_upload(width: u32, height: u32) -> ImageFile {
        let img = RgbaImage::from_fn(width, height, |x, _| {
            if x % 2 == 0 {
                Rgba([30, 30, 30, 255])
            } else {
                Rgba([220, 220, 220, 255])
            }
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        ImageFile::new(bytes, "image/png")
    }

    #[test]
    fn test_preprocess_produces_scaled_binary_png() {
        let upload = png_upload(20, 10);
        let (processed, report) = preprocess(&upload, &Pipeline::new(Preset::Default));

        assert!(report.applied);
        assert_eq!(report.preset, "default");
        assert_eq!(processed.content_type, "image/png");

        let decoded = image::load_from_memory(&processed.bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (40, 20));
        assert!(decoded
            .pixels()
            .all(|p| (p.0[0] == 0 || p.0[0] == 255) && p.0[0] == p.0[1] && p.0[1] == p.0[2]));
    }

    #[test]
    fn test_undecodable_upload_falls_back_to_original() {
        let upload = ImageFile::new(b"definitely not an image".to_vec(), "image/png");
        let (processed, report) = preprocess(&upload, &Pipeline::new(Preset::Default));

        assert_eq!(processed, upload);
        assert!(!report.applied);
        assert!(report.steps.is_empty());
    }

    #[test]
    fn test_none_preset_skips_decoding() {
        let upload = png_upload(4, 4);
        let (processed, report) = preprocess(&upload, &Pipeline::new(Preset::None));

        assert_eq!(processed, upload);
        assert!(!report.applied);
        assert_eq!(report.preset, "none");
    }
}
