use crate::error::OcrError;
use image::{imageops::FilterType, RgbaImage};

/// Images with a longer side above this are left at their original size
const LARGE_DIMENSION: u32 = 2000;
/// Images with a longer side above this (and up to LARGE_DIMENSION) get a moderate boost
const MEDIUM_DIMENSION: u32 = 1000;

/// Scale factor for an image whose longer side is `max_dimension`.
///
/// Small glyphs recognize much better after upscaling; large images are never
/// downscaled.
pub fn scale_factor(max_dimension: u32) -> f64 {
    if max_dimension > LARGE_DIMENSION {
        1.0
    } else if max_dimension > MEDIUM_DIMENSION {
        1.5
    } else {
        2.0
    }
}

/// Target dimensions after scaling, truncated to whole pixels
pub fn target_dimensions(width: u32, height: u32) -> (u32, u32) {
    let factor = scale_factor(width.max(height));
    (
        (width as f64 * factor) as u32,
        (height as f64 * factor) as u32,
    )
}

/// Upscale small and medium images for OCR
pub fn apply(image: RgbaImage) -> Result<RgbaImage, OcrError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(OcrError::PreprocessingError(format!(
            "Image dimensions must be non-zero (got {}x{})",
            width, height
        )));
    }

    let (new_width, new_height) = target_dimensions(width, height);
    if (new_width, new_height) == (width, height) {
        return Ok(image);
    }

    Ok(image::imageops::resize(
        &image,
        new_width,
        new_height,
        FilterType::Triangle,
    ))
}
