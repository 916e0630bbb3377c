// GeminiProvider - brand recognition via the Gemini generateContent API

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, error, info};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::provider::{RecognitionError, RecognitionProvider};

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Vision classifier backed by Google's Gemini REST API.
pub struct GeminiProvider {
    api_key: String,
    model: String,
    endpoint: String,
    client: Client,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String, endpoint: String) -> Self {
        info!(
            "Recognition/Gemini: Initialized model {} with API key ({}...)",
            model,
            api_key.chars().take(4).collect::<String>()
        );
        Self {
            api_key,
            model,
            endpoint,
            client: Client::new(),
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

// ── Gemini API request/response shapes ──

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            top_k: 32,
            top_p: 1.0,
            max_output_tokens: 4096,
        }
    }
}

#[derive(Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

fn build_request(image: &[u8], mime_type: &str, prompt: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![
                Part {
                    inline_data: Some(InlineData {
                        mime_type: mime_type.to_string(),
                        data: STANDARD.encode(image),
                    }),
                    text: None,
                },
                Part {
                    inline_data: None,
                    text: Some(prompt.to_string()),
                },
            ],
        }],
        generation_config: GenerationConfig::default(),
        safety_settings: SAFETY_CATEGORIES
            .iter()
            .map(|&category| SafetySetting {
                category,
                threshold: "BLOCK_MEDIUM_AND_ABOVE",
            })
            .collect(),
    }
}

/// Concatenated text parts of the first candidate.
fn response_text(response: GenerateContentResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let text: String = content
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect();
    Some(text)
}

#[async_trait]
impl RecognitionProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn classify(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, RecognitionError> {
        debug!(
            "Recognition/Gemini: classify {} bytes of {}",
            image.len(),
            mime_type
        );

        let request = build_request(image, mime_type, prompt);
        let response = self.client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Recognition/Gemini: request failed: {}", e);
                RecognitionError::upstream(format!("Failed to reach recognition service: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Recognition/Gemini: API error {}: {}", status, body);
            return Err(RecognitionError::upstream(format!(
                "Recognition service returned {}",
                status
            )));
        }

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            RecognitionError::upstream(format!("Failed to parse recognition response: {}", e))
        })?;

        let text = response_text(parsed).ok_or_else(|| {
            RecognitionError::upstream("Recognition service returned no candidates")
        })?;
        debug!("Recognition/Gemini: raw response {:?}", text);
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let request = build_request(b"\x89PNG", "image/png", "name the logos");
        let value = serde_json::to_value(&request).unwrap();

        let parts = &value["contents"][0]["parts"];
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inlineData"]["data"], "iVBORw==");
        assert!(parts[0].get("text").is_none());
        assert_eq!(parts[1]["text"], "name the logos");

        assert_eq!(value["generationConfig"]["topK"], 32);
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 4096);
        assert_eq!(value["safetySettings"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_response_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "[\"PayPay\"," }, { "text": "\"d払い\"]" }] }
            }]
        }))
        .unwrap();
        assert_eq!(response_text(response).unwrap(), "[\"PayPay\",\"d払い\"]");
    }

    #[test]
    fn test_response_without_candidates() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({ "promptFeedback": { "blockReason": "SAFETY" } })).unwrap();
        assert!(response_text(response).is_none());
    }

    #[test]
    fn test_url_tolerates_trailing_slash() {
        let provider = GeminiProvider::new(
            "key-1234".to_string(),
            DEFAULT_MODEL.to_string(),
            format!("{}/", DEFAULT_ENDPOINT),
        );
        assert_eq!(
            provider.url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash-latest:generateContent"
        );
    }
}
