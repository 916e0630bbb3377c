// NoOpProvider - fallback provider when no classifier is configured

use async_trait::async_trait;

use super::provider::{RecognitionError, RecognitionProvider};

/// Provider that always fails with status 503.
///
/// Used when no API key is configured, so the rest of the app keeps working
/// and captures report a readable reason instead of a crash.
pub struct NoOpProvider {
    reason: String,
}

impl NoOpProvider {
    pub fn new(reason: String) -> Self {
        Self { reason }
    }
}

#[async_trait]
impl RecognitionProvider for NoOpProvider {
    fn name(&self) -> &str {
        "noop"
    }

    async fn classify(
        &self,
        _image: &[u8],
        _mime_type: &str,
        _prompt: &str,
    ) -> Result<String, RecognitionError> {
        Err(RecognitionError::unavailable(self.reason.clone()))
    }
}
