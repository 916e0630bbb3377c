// Recognition module - payment brand detection from captured images

pub mod gateway;
pub mod gemini_provider;
pub mod noop_provider;
pub mod normalize;
pub mod provider;

pub use gateway::{build_prompt, parse_data_url, RecognitionGateway, RecognitionOutcome};
pub use gemini_provider::GeminiProvider;
pub use noop_provider::NoOpProvider;
pub use normalize::{normalize, ResponseNormalizer};
pub use provider::{RecognitionError, RecognitionProvider};

use log::{info, warn};
use std::sync::Arc;

use crate::settings::RecognitionSettings;

/// Create a RecognitionProvider with graceful fallback to NoOpProvider
///
/// Without an API key every capture fails with status 503 and the rest of
/// the app (selection, manual launch) keeps working.
pub fn create_provider(settings: &RecognitionSettings) -> Arc<dyn RecognitionProvider> {
    match settings.api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => {
            info!("Recognition: using Gemini model {}", settings.model);
            Arc::new(GeminiProvider::new(
                key.to_string(),
                settings.model.clone(),
                settings.endpoint.clone(),
            ))
        }
        _ => {
            warn!("Recognition: no API key configured, using NoOpProvider (image recognition disabled)");
            Arc::new(NoOpProvider::new(
                "Image recognition is not configured (set GEMINI_API_KEY)".to_string(),
            ))
        }
    }
}

/// Gateway wired to the configured provider, brand list, and prompt.
pub fn create_gateway(settings: &RecognitionSettings) -> RecognitionGateway {
    let prompt = settings
        .prompt
        .clone()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| build_prompt(&settings.known_brands));

    RecognitionGateway::new(
        create_provider(settings),
        ResponseNormalizer::new(settings.known_brands.iter().cloned()),
        prompt,
    )
}
