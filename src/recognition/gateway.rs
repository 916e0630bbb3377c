// RecognitionGateway - capture sequencing, input validation, and normalization

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{info, warn};
use regex::Regex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex};

use super::normalize::ResponseNormalizer;
use super::provider::{RecognitionError, RecognitionProvider};

static DATA_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^data:(image/(?:png|jpeg|jpg|webp));base64,(.*)$").expect("data url pattern is valid")
});

pub const SUPPORTED_MIME_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/jpg", "image/webp"];

/// Result of one capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecognitionOutcome {
    /// Capture number; later captures have larger numbers.
    pub sequence: u64,
    pub requested_at: String,
    /// Provider reply before normalization. Empty when classification failed.
    pub raw_response: String,
    pub services: Vec<String>,
    /// Set iff classification failed.
    pub error: Option<String>,
}

/// Split a `data:image/...;base64,...` URL into its MIME type and decoded bytes.
pub fn parse_data_url(data_url: &str) -> Result<(String, Vec<u8>), RecognitionError> {
    let captures = DATA_URL
        .captures(data_url.trim())
        .ok_or_else(|| RecognitionError::bad_request("Invalid image data format"))?;

    let mime_type = captures[1].to_string();
    let payload: String = captures[2].split_whitespace().collect();
    let image = STANDARD
        .decode(payload)
        .map_err(|e| RecognitionError::bad_request(format!("Invalid image data format: {}", e)))?;

    Ok((mime_type, image))
}

/// The prompt sent with every capture, listing the brands worth naming.
pub fn build_prompt(brands: &[String]) -> String {
    format!(
        "この画像に写っているQRコード決済サービスのロゴを特定し、その正式名称のリストだけをJSON配列形式で返してください。\n\
         例: [\"PayPay\", \"楽天ペイ\", \"d払い\"]\n\
         ロゴが見つからない場合や、QRコード決済サービス以外のロゴの場合は、空の配列 [] を返してください。\n\
         余計な説明や前置きは不要です。JSON配列のみを返してください。\n\
         認識可能なサービス例: {}",
        brands.join(", ")
    )
}

/// Sends captures to the classifier and turns replies into brand names.
///
/// Every accepted call to `recognize` takes the next sequence number. A reply that
/// arrives after a newer capture has started is dropped, so callers only ever
/// act on the latest capture.
pub struct RecognitionGateway {
    provider: Arc<dyn RecognitionProvider>,
    normalizer: ResponseNormalizer,
    prompt: String,
    sequence: AtomicU64,
    latest: Mutex<Option<RecognitionOutcome>>,
}

impl RecognitionGateway {
    pub fn new(
        provider: Arc<dyn RecognitionProvider>,
        normalizer: ResponseNormalizer,
        prompt: String,
    ) -> Self {
        Self {
            provider,
            normalizer,
            prompt,
            sequence: AtomicU64::new(0),
            latest: Mutex::new(None),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Classify one image.
    ///
    /// Returns `Ok(None)` when a newer capture started while this one was in
    /// flight, whether the stale reply succeeded or failed.
    pub async fn recognize(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<Option<RecognitionOutcome>, RecognitionError> {
        if !SUPPORTED_MIME_TYPES.contains(&mime_type) {
            return Err(RecognitionError::bad_request(format!(
                "Unsupported image type '{}'",
                mime_type
            )));
        }
        if image.is_empty() {
            return Err(RecognitionError::bad_request("Missing image data"));
        }

        // Only accepted requests take a sequence number.
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let requested_at = chrono::Utc::now().to_rfc3339();

        let result = self.provider.classify(image, mime_type, &self.prompt).await;

        if self.sequence.load(Ordering::SeqCst) != sequence {
            info!("Recognition: capture {} superseded, ignoring its result", sequence);
            return Ok(None);
        }

        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Recognition: capture {} failed: {}", sequence, e);
                self.record(RecognitionOutcome {
                    sequence,
                    requested_at,
                    raw_response: String::new(),
                    services: Vec::new(),
                    error: Some(e.message.clone()),
                });
                return Err(e);
            }
        };

        let outcome = RecognitionOutcome {
            sequence,
            requested_at,
            services: self.normalizer.normalize(&raw),
            raw_response: raw,
            error: None,
        };
        info!(
            "Recognition: capture {} found {:?}",
            sequence, outcome.services
        );

        self.record(outcome.clone());
        Ok(Some(outcome))
    }

    fn record(&self, outcome: RecognitionOutcome) {
        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(outcome);
        }
    }

    /// `recognize` for a `data:` URL.
    pub async fn recognize_data_url(
        &self,
        data_url: &str,
    ) -> Result<Option<RecognitionOutcome>, RecognitionError> {
        let (mime_type, image) = parse_data_url(data_url)?;
        self.recognize(&image, &mime_type).await
    }

    /// True while no capture newer than `sequence` has started.
    pub fn is_current(&self, sequence: u64) -> bool {
        self.sequence.load(Ordering::SeqCst) == sequence
    }

    /// Most recent capture that was not superseded, failed ones included.
    pub fn latest(&self) -> Option<RecognitionOutcome> {
        self.latest.lock().ok().and_then(|l| l.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin::KNOWN_PAYMENT_BRANDS;
    use crate::recognition::NoOpProvider;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Replies with canned text after a per-call delay taken from the first image byte (ms x10).
    struct ScriptedProvider {
        reply: String,
    }

    #[async_trait]
    impl RecognitionProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn classify(
            &self,
            image: &[u8],
            _mime_type: &str,
            prompt: &str,
        ) -> Result<String, RecognitionError> {
            assert!(prompt.contains("PayPay"));
            tokio::time::sleep(Duration::from_millis(image[0] as u64 * 10)).await;
            Ok(self.reply.clone())
        }
    }

    fn gateway(provider: Arc<dyn RecognitionProvider>) -> RecognitionGateway {
        let brands: Vec<String> = KNOWN_PAYMENT_BRANDS.iter().map(|b| b.to_string()).collect();
        RecognitionGateway::new(
            provider,
            ResponseNormalizer::new(brands.clone()),
            build_prompt(&brands),
        )
    }

    #[test]
    fn test_parse_data_url() {
        let (mime, bytes) = parse_data_url("data:image/png;base64,iVBORw==").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"\x89PNG");
    }

    #[test]
    fn test_parse_data_url_rejects_other_types() {
        let err = parse_data_url("data:image/gif;base64,R0lG").unwrap_err();
        assert_eq!(err.status, 400);
        assert_eq!(parse_data_url("not a url").unwrap_err().status, 400);
        assert_eq!(parse_data_url("data:image/webp;base64,!!!").unwrap_err().status, 400);
    }

    #[tokio::test]
    async fn test_recognize_normalizes_reply() {
        let gw = gateway(Arc::new(ScriptedProvider {
            reply: "```json\n[\"PayPay\",\"PayPay\",\"au PAY\"]\n```".to_string(),
        }));
        let outcome = gw.recognize(&[0], "image/jpeg").await.unwrap().unwrap();
        assert_eq!(outcome.services, vec!["PayPay", "au PAY"]);
        assert_eq!(outcome.sequence, 1);
        assert!(outcome.raw_response.starts_with("```json"));
        assert!(outcome.error.is_none());
        assert!(chrono::DateTime::parse_from_rfc3339(&outcome.requested_at).is_ok());
        assert_eq!(gw.latest(), Some(outcome));
    }

    #[tokio::test]
    async fn test_stale_capture_is_ignored() {
        let gw = Arc::new(gateway(Arc::new(ScriptedProvider {
            reply: "[\"d払い\"]".to_string(),
        })));

        let slow = {
            let gw = gw.clone();
            tokio::spawn(async move { gw.recognize(&[20], "image/png").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let fast = gw.recognize(&[0], "image/png").await.unwrap();

        assert_eq!(fast.as_ref().map(|o| o.sequence), Some(2));
        assert_eq!(slow.await.unwrap().unwrap(), None);
        assert_eq!(gw.latest().map(|o| o.sequence), Some(2));
    }

    #[test]
    fn test_parse_data_url_accepts_wrapped_base64() {
        let (mime, bytes) = parse_data_url("data:image/png;base64,iVBO\r\nRw==\n").unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"\x89PNG");
    }

    #[tokio::test]
    async fn test_rejected_request_does_not_supersede_capture_in_flight() {
        let gw = Arc::new(gateway(Arc::new(ScriptedProvider {
            reply: "[\"PayPay\"]".to_string(),
        })));

        let valid = {
            let gw = gw.clone();
            tokio::spawn(async move { gw.recognize(&[10], "image/png").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let bad = gw.recognize(&[1], "image/gif").await;
        assert_eq!(bad.unwrap_err().status, 400);

        let outcome = valid.await.unwrap().unwrap().unwrap();
        assert_eq!(outcome.sequence, 1);
        assert_eq!(outcome.services, vec!["PayPay"]);
        assert_eq!(gw.latest(), Some(outcome));
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected_before_the_provider() {
        let gw = gateway(Arc::new(NoOpProvider::new("unused".to_string())));
        assert_eq!(gw.recognize(&[1, 2], "image/gif").await.unwrap_err().status, 400);
        assert_eq!(gw.recognize(&[], "image/png").await.unwrap_err().status, 400);
    }

    #[tokio::test]
    async fn test_provider_error_is_returned() {
        let gw = gateway(Arc::new(NoOpProvider::new("GEMINI_API_KEY is not set".to_string())));
        let err = gw.recognize_data_url("data:image/png;base64,iVBORw==").await.unwrap_err();
        assert_eq!(err.status, 503);
        assert_eq!(err.message, "GEMINI_API_KEY is not set");

        let failed = gw.latest().unwrap();
        assert_eq!(failed.error.as_deref(), Some("GEMINI_API_KEY is not set"));
        assert!(failed.services.is_empty());
    }
}
