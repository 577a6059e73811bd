use super::LuminanceMap;
use crate::error::OcrError;

/// Midpoint separating dark from light pixels
const MIDPOINT: f64 = 128.0;
/// Dark pixels are pushed darker by this factor
const DARK_ATTENUATION: f64 = 0.8;
/// Light pixels are pushed lighter by this factor (capped at white)
const LIGHT_BOOST: f64 = 1.2;

/// Stretch contrast around the midpoint
pub fn enhance(value: f64) -> f64 {
    if value < MIDPOINT {
        value * DARK_ATTENUATION
    } else {
        (value * LIGHT_BOOST).min(255.0)
    }
}

pub fn apply(map: LuminanceMap) -> Result<LuminanceMap, OcrError> {
    Ok(map.map_values(enhance))
}
