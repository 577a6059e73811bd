use super::LuminanceMap;
use crate::error::OcrError;

/// Values strictly above this become white
const THRESHOLD: f64 = 128.0;

/// Map a luminance value to pure black or white
pub fn threshold(value: f64) -> f64 {
    if value > THRESHOLD {
        255.0
    } else {
        0.0
    }
}

pub fn apply(map: LuminanceMap) -> Result<LuminanceMap, OcrError> {
    Ok(map.map_values(threshold))
}
