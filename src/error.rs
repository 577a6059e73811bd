use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Failed to initialize OCR engine: {0}")]
    InitializationError(String),

    #[error("OCR engine has been released")]
    EngineReleased,

    #[error("Failed to process image: {0}")]
    ProcessingError(String),

    #[error("Preprocessing failed: {0}")]
    PreprocessingError(String),

    #[error("{0}")]
    RecognitionFailed(String),

    #[error("Please upload an image file")]
    UnsupportedFormat(String),

    #[error("File size should be less than {}", format_limit(.max))]
    ImageTooLarge { max: usize },

    #[error("Missing image in request")]
    MissingFile,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Human-readable upload limit, rounded up to whole MB (or KB below 1MB)
fn format_limit(bytes: &usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;

    if *bytes >= MB {
        format!("{}MB", bytes.div_ceil(MB))
    } else {
        format!("{}KB", bytes.div_ceil(KB).max(1))
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for OcrError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            OcrError::InitializationError(_) => (StatusCode::SERVICE_UNAVAILABLE, "INIT_ERROR"),
            OcrError::EngineReleased => (StatusCode::SERVICE_UNAVAILABLE, "ENGINE_RELEASED"),
            OcrError::ProcessingError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PROCESSING_ERROR"),
            OcrError::PreprocessingError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PREPROCESSING_ERROR")
            }
            OcrError::RecognitionFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "RECOGNITION_FAILED")
            }
            OcrError::UnsupportedFormat(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_FORMAT")
            }
            OcrError::ImageTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "IMAGE_TOO_LARGE"),
            OcrError::MissingFile => (StatusCode::BAD_REQUEST, "MISSING_FILE"),
            OcrError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            OcrError::Configuration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            OcrError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_limit_message_in_megabytes() {
        let err = OcrError::ImageTooLarge {
            max: 5 * 1024 * 1024,
        };
        assert_eq!(err.to_string(), "File size should be less than 5MB");

        let err = OcrError::ImageTooLarge {
            max: 5 * 1024 * 1024 + 1,
        };
        assert_eq!(err.to_string(), "File size should be less than 6MB");
    }

    #[test]
    fn test_small_size_limit_message_in_kilobytes() {
        let err = OcrError::ImageTooLarge { max: 1024 };
        assert_eq!(err.to_string(), "File size should be less than 1KB");

        let err = OcrError::ImageTooLarge { max: 1500 };
        assert_eq!(err.to_string(), "File size should be less than 2KB");

        let err = OcrError::ImageTooLarge { max: 0 };
        assert_eq!(err.to_string(), "File size should be less than 1KB");
    }

    #[test]
    fn test_error_status_codes() {
        let response = OcrError::ImageTooLarge { max: 1024 }.into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let response = OcrError::EngineReleased.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
