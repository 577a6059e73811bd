use crate::error::OcrError;
use image::{DynamicImage, RgbaImage};
use serde::Serialize;
use std::time::Instant;

use super::steps;

/// Preprocessing preset names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preset {
    /// Skip all preprocessing
    None,
    /// Black/white conversion without scaling
    /// Steps: luminance, contrast, binarize
    Minimal,
    /// Default OCR preparation
    /// Steps: scale, luminance, contrast, binarize
    #[default]
    Default,
    /// Default plus speckle removal for noisy photos
    /// Steps: scale, denoise, luminance, contrast, binarize
    Aggressive,
}

impl Preset {
    /// Parse from query parameter string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(Self::None),
            "minimal" => Some(Self::Minimal),
            "default" => Some(Self::Default),
            "aggressive" => Some(Self::Aggressive),
            _ => None,
        }
    }

    /// Get the preset name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Minimal => "minimal",
            Self::Default => "default",
            Self::Aggressive => "aggressive",
        }
    }
}

/// Timing information for a single preprocessing step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// Result of preprocessing including timing stats
#[derive(Debug, Clone)]
pub struct PreprocessingResult {
    /// Preprocessed image
    pub image: RgbaImage,
    /// Total preprocessing time in milliseconds
    pub total_time_ms: u64,
    /// Preset used
    pub preset: Preset,
    /// Individual step timings
    pub steps: Vec<StepTiming>,
}

/// Preprocessing pipeline that applies steps based on preset
#[derive(Debug, Clone, Copy)]
pub struct Pipeline {
    preset: Preset,
}

impl Pipeline {
    pub fn new(preset: Preset) -> Self {
        Self { preset }
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    /// Process an image according to the configured preset.
    ///
    /// The input is borrowed and never modified; the result is a new buffer.
    pub fn process(&self, image: &DynamicImage) -> Result<PreprocessingResult, OcrError> {
        let start = Instant::now();
        let mut steps_timing = Vec::new();

        let mut img = image.to_rgba8();

        if self.preset == Preset::None {
            return Ok(PreprocessingResult {
                image: img,
                total_time_ms: 0,
                preset: self.preset,
                steps: vec![],
            });
        }

        // Minimal keeps the original resolution
        if self.preset != Preset::Minimal {
            img = self.run_step("scale", img, &mut steps_timing, steps::scale::apply)?;
        }

        if self.preset == Preset::Aggressive {
            img = self.run_step("denoise", img, &mut steps_timing, steps::denoise::apply)?;
        }

        let map = self.run_step(
            "luminance",
            img,
            &mut steps_timing,
            steps::luminance::apply,
        )?;
        let map = self.run_step("contrast", map, &mut steps_timing, steps::contrast::apply)?;
        let map = self.run_step("binarize", map, &mut steps_timing, steps::binarize::apply)?;
        tracing::debug!(
            "Binarized {}x{} image, {} dark pixels",
            map.width(),
            map.height(),
            map.values().iter().filter(|v| **v == 0.0).count()
        );

        Ok(PreprocessingResult {
            image: map.into_rgba(),
            total_time_ms: start.elapsed().as_millis() as u64,
            preset: self.preset,
            steps: steps_timing,
        })
    }

    fn run_step<T, U, F>(
        &self,
        name: &str,
        input: T,
        timings: &mut Vec<StepTiming>,
        step_fn: F,
    ) -> Result<U, OcrError>
    where
        F: FnOnce(T) -> Result<U, OcrError>,
    {
        let step_start = Instant::now();
        let result = step_fn(input)?;
        tracing::debug!("Preprocessing step '{}' finished", name);
        timings.push(StepTiming {
            name: name.to_string(),
            time_ms: step_start.elapsed().as_millis() as u64,
        });
        Ok(result)
    }
}
