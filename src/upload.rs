//! Upload validation for incoming image files

use crate::error::OcrError;

/// Default upload limit (5MB)
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// An uploaded image, still in its encoded form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl ImageFile {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
        }
    }

    /// Accept an upload only if it is an image no larger than `max_bytes`.
    ///
    /// The type is checked before the size so a huge non-image reports the
    /// type problem first.
    pub fn validate(
        content_type: Option<&str>,
        bytes: Vec<u8>,
        max_bytes: usize,
    ) -> Result<Self, OcrError> {
        let mime = content_type.unwrap_or("application/octet-stream");
        if !mime.starts_with("image/") {
            tracing::warn!("Rejected upload with content type: {}", mime);
            return Err(OcrError::UnsupportedFormat(mime.to_string()));
        }

        if bytes.len() > max_bytes {
            tracing::warn!(
                "Rejected upload of {} bytes (max: {} bytes)",
                bytes.len(),
                max_bytes
            );
            return Err(OcrError::ImageTooLarge { max: max_bytes });
        }

        Ok(Self::new(bytes, mime))
    }
}
