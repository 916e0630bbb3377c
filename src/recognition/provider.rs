// RecognitionProvider trait - backend-agnostic image classification interface

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// The single error shape for everything that can go wrong between receiving
/// an image and getting raw classifier text back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecognitionError {
    /// HTTP-style status: 400 for bad input, 500 for upstream failure,
    /// 503 when no classifier is configured.
    pub status: u16,
    pub message: String,
}

impl RecognitionError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(503, message)
    }
}

impl fmt::Display for RecognitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (status {})", self.message, self.status)
    }
}

impl std::error::Error for RecognitionError {}

/// Vision classifier that names the payment brands visible in an image.
///
/// Providers return the model's raw text; turning it into brand names is the
/// normalizer's job.
#[async_trait]
pub trait RecognitionProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn classify(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, RecognitionError>;
}
