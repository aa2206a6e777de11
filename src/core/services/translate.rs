use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{NetworkError, Result};

/// Machine translation, used only to expand search queries.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TranslateResponse {
    translated_text: Option<String>,
}

/// A LibreTranslate-compatible endpoint.
pub struct HttpTranslator {
    client: Client,
    base_url: String,
}

impl HttpTranslator {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        if text.is_empty() {
            return Ok(String::new());
        }

        let url = format!("{}/translate", self.base_url);
        debug!("Translating '{}' {} -> {}", text, source, target);

        let response: TranslateResponse = self
            .client
            .post(&url)
            .json(&TranslateRequest {
                q: text,
                source,
                target,
                format: "text",
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response.translated_text.ok_or_else(|| {
            NetworkError::InvalidResponse {
                reason: "translation response has no translatedText".to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let body = serde_json::to_value(TranslateRequest {
            q: "hello",
            source: "en",
            target: "ja",
            format: "text",
        })
        .unwrap();
        assert_eq!(body["q"], "hello");
        assert_eq!(body["format"], "text");
    }

    #[test]
    fn test_response_field_name() {
        let parsed: TranslateResponse = serde_json::from_str(r#"{"translatedText":"こんにちは"}"#).unwrap();
        assert_eq!(parsed.translated_text.as_deref(), Some("こんにちは"));
    }

    #[test]
    fn test_base_url_is_normalized() {
        let translator = HttpTranslator::new(Client::new(), "http://localhost:5000/");
        assert_eq!(translator.base_url, "http://localhost:5000");
    }

    #[tokio::test]
    async fn test_empty_text_skips_request() {
        let translator = HttpTranslator::new(Client::new(), "http://127.0.0.1:1");
        assert_eq!(translator.translate("", "en", "ja").await.unwrap(), "");
    }
}
