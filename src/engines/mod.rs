//! OCR engine implementations
//!
//! This module contains implementations of the OcrEngine trait for different
//! OCR backends. Engines are conditionally compiled based on feature flags.

#[cfg(feature = "engine-ocrs")]
pub mod ocrs;

#[cfg(feature = "engine-leptess")]
pub mod leptess;

use crate::engine::{EngineOptions, OcrEngine};
use crate::error::OcrError;
use std::path::{Path, PathBuf};

/// Names of the engines compiled into this binary, in preference order
pub fn available() -> Vec<&'static str> {
    let mut names = Vec::new();

    #[cfg(feature = "engine-ocrs")]
    names.push("ocrs");

    #[cfg(feature = "engine-leptess")]
    names.push("leptess");

    names
}

/// Build an engine by name, or the first available one when no name is given.
///
/// Construction is cheap; models are only loaded by `OcrEngine::initialize`.
pub fn create(name: Option<&str>, options: &EngineOptions) -> Result<Box<dyn OcrEngine>, OcrError> {
    let names = available();
    let selected = match name {
        Some(requested) => names
            .iter()
            .copied()
            .find(|n| *n == requested)
            .ok_or_else(|| {
                OcrError::InitializationError(format!(
                    "Unknown OCR engine '{}'. Available: {}",
                    requested,
                    names.join(", ")
                ))
            })?,
        None => names.first().copied().ok_or_else(|| {
            OcrError::InitializationError(
                "No OCR engines available. Build with --features engine-ocrs or --features engine-leptess".to_string(),
            )
        })?,
    };

    tracing::info!("Using {} engine", selected);
    build(selected, options)
}

fn build(name: &str, options: &EngineOptions) -> Result<Box<dyn OcrEngine>, OcrError> {
    match name {
        #[cfg(feature = "engine-ocrs")]
        "ocrs" => Ok(Box::new(ocrs::OcrsEngine::new(options))),
        #[cfg(feature = "engine-leptess")]
        "leptess" => Ok(Box::new(leptess::LeptessEngine::new(options))),
        _ => {
            let _ = options;
            Err(OcrError::InitializationError(format!(
                "OCR engine '{}' is not compiled in",
                name
            )))
        }
    }
}

/// Cache directory for downloaded models and training data
#[cfg_attr(not(any(feature = "engine-ocrs", feature = "engine-leptess")), allow(dead_code))]
fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("image-to-text")
}

/// Download `url` to `path` unless the file is already cached
#[cfg_attr(not(any(feature = "engine-ocrs", feature = "engine-leptess")), allow(dead_code))]
fn ensure_downloaded(url: &str, path: &Path) -> Result<(), OcrError> {
    if path.exists() {
        tracing::info!("Using cached file {:?}", path);
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            OcrError::InitializationError(format!("Failed to create cache directory: {}", e))
        })?;
    }

    tracing::info!("Downloading {} (this may take a moment)...", url);

    let response = ureq::get(url)
        .call()
        .map_err(|e| OcrError::InitializationError(format!("Failed to download {}: {}", url, e)))?;

    let buffer = response.into_body().read_to_vec().map_err(|e| {
        OcrError::InitializationError(format!("Failed to read response body: {}", e))
    })?;

    // Only a complete download ever lands at `path`
    let partial = path.with_extension("part");
    std::fs::write(&partial, &buffer)
        .and_then(|_| std::fs::rename(&partial, path))
        .map_err(|e| OcrError::InitializationError(format!("Failed to write {:?}: {}", path, e)))?;

    tracing::info!("Downloaded {:?}", path);
    Ok(())
}
