//! Individual preprocessing steps

pub mod binarize;
pub mod contrast;
pub mod denoise;
pub mod luminance;
pub mod scale;

pub use luminance::LuminanceMap;
