use crate::error::OcrError;
use image::{Rgba, RgbaImage};

/// Perceptual luma weights
const RED_WEIGHT: f64 = 0.299;
const GREEN_WEIGHT: f64 = 0.587;
const BLUE_WEIGHT: f64 = 0.114;

/// Unrounded per-pixel luminance with the alpha channel carried alongside.
///
/// Values stay in `f64` between steps so thresholds see the exact luma
/// rather than a value already rounded to `u8`.
#[derive(Debug, Clone, PartialEq)]
pub struct LuminanceMap {
    width: u32,
    height: u32,
    values: Vec<f64>,
    alpha: Vec<u8>,
}

impl LuminanceMap {
    /// Build a fully opaque map from raw luminance values
    #[cfg(test)]
    pub fn from_values(width: u32, height: u32, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), (width * height) as usize);
        let alpha = vec![255; values.len()];
        Self {
            width,
            height,
            values,
            alpha,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Replace every luminance value, keeping dimensions and alpha
    pub fn map_values<F>(mut self, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        for value in &mut self.values {
            *value = f(*value);
        }
        self
    }

    /// Write the map back as RGBA: each value goes to R, G and B, alpha is restored
    pub fn into_rgba(self) -> RgbaImage {
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let index = (y * self.width + x) as usize;
            let channel = self.values[index].clamp(0.0, 255.0) as u8;
            Rgba([channel, channel, channel, self.alpha[index]])
        })
    }
}

/// Luminance of a single pixel
pub fn luma(pixel: &Rgba<u8>) -> f64 {
    let [r, g, b, _] = pixel.0;
    RED_WEIGHT * r as f64 + GREEN_WEIGHT * g as f64 + BLUE_WEIGHT * b as f64
}

/// Convert an RGBA image into its luminance map
pub fn apply(image: RgbaImage) -> Result<LuminanceMap, OcrError> {
    let (width, height) = image.dimensions();
    let mut values = Vec::with_capacity((width * height) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);

    for pixel in image.pixels() {
        values.push(luma(pixel));
        alpha.push(pixel.0[3]);
    }

    Ok(LuminanceMap {
        width,
        height,
        values,
        alpha,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luma_uses_perceptual_weights() {
        assert!((luma(&Rgba([255, 0, 0, 255])) - 76.245).abs() < 1e-9);
        assert!((luma(&Rgba([0, 255, 0, 255])) - 149.685).abs() < 1e-9);
        assert!((luma(&Rgba([0, 0, 255, 255])) - 29.07).abs() < 1e-9);
        assert!((luma(&Rgba([255, 255, 255, 0])) - 255.0).abs() < 1e-9);
    }

    #[test]
    fn test_map_keeps_dimensions_and_alpha() {
        let mut img = RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 200]));
        img.put_pixel(3, 2, Rgba([10, 20, 30, 7]));

        let map = apply(img).unwrap();
        assert_eq!((map.width(), map.height()), (4, 3));
        assert_eq!(map.values().len(), 12);

        let rgba = map.into_rgba();
        assert_eq!(rgba.get_pixel(0, 0).0[3], 200);
        assert_eq!(rgba.get_pixel(3, 2).0[3], 7);
    }

    #[test]
    fn test_into_rgba_writes_gray() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([255, 0, 0, 255]));
        let rgba = apply(img).unwrap().into_rgba();
        let [r, g, b, _] = rgba.get_pixel(1, 1).0;
        assert_eq!((r, g, b), (76, 76, 76));
    }
}
