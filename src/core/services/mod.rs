//! External service integrations
//!
//! - `qq`, `kugou`, `netease`: legacy per-platform lyric providers
//! - `unified`: Meting-style clients that normalize every platform into one lyric JSON shape
//! - `translate`: machine translation used for query expansion
//! - `enrich`: LLM enrichment of parsed lyrics

pub mod enrich;
pub mod kugou;
pub mod netease;
pub mod qq;
pub mod translate;
pub mod unified;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;

use crate::core::lyrics::{SearchCandidate, SongQuery};
use crate::error::{DecryptionError, NetworkError, Result};

pub use enrich::Enricher;
pub use kugou::KugouProvider;
pub use netease::NeteaseProvider;
pub use qq::QqMusicProvider;
pub use translate::{HttpTranslator, Translator};
pub use unified::{UnifiedClientRegistry, UnifiedProvider};

/// Provider names whose payloads carry word-level timing.
const SYLLABLE_PROVIDERS: &[&str] = &["qq music", "kugou", "qq", "kugou music"];

/// Raw lyric bytes as returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Plain(Vec<u8>),
    WithTranslation { content: Vec<u8>, translation: Vec<u8> },
}

impl FetchResult {
    pub fn content(&self) -> &[u8] {
        match self {
            FetchResult::Plain(content) => content,
            FetchResult::WithTranslation { content, .. } => content,
        }
    }

    pub fn translation(&self) -> Option<&[u8]> {
        match self {
            FetchResult::Plain(_) => None,
            FetchResult::WithTranslation { translation, .. } if !translation.is_empty() => {
                Some(translation)
            }
            FetchResult::WithTranslation { .. } => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content().is_empty()
    }
}

/// How a provider's lyric bytes are sealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadCipher {
    Qrc,
    Krc,
    Text,
}

impl PayloadCipher {
    pub fn for_provider_name(name: &str) -> Self {
        let key = name.to_lowercase();
        if key.contains("qq") {
            PayloadCipher::Qrc
        } else if key.contains("kugou") {
            PayloadCipher::Krc
        } else {
            PayloadCipher::Text
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
}

/// A POST request after any platform signing has been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedRequest {
    pub url: String,
    pub body: RequestBody,
}

impl SignedRequest {
    pub fn into_request(self, client: &Client) -> RequestBuilder {
        let builder = client.post(&self.url);
        match self.body {
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Form(fields) => builder.form(&fields),
        }
    }
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    fn is_syllable_capable(&self) -> bool {
        SYLLABLE_PROVIDERS.contains(&self.name().to_lowercase().as_str())
    }

    fn payload_cipher(&self) -> PayloadCipher {
        PayloadCipher::for_provider_name(self.name())
    }

    async fn search(&self, query: &SongQuery) -> Result<Vec<SearchCandidate>>;

    async fn fetch_raw(&self, song_id: &str) -> Result<FetchResult>;

    /// Signs a request body for `url`. The default sends it as plain JSON.
    fn sign_request(&self, url: &str, body: &Value) -> std::result::Result<SignedRequest, DecryptionError> {
        Ok(SignedRequest {
            url: url.to_string(),
            body: RequestBody::Json(body.clone()),
        })
    }
}

/// `error_for_status` that reports throttling as `NetworkError::RateLimit`.
pub(crate) trait ResponseExt: Sized {
    fn check_status(self) -> Result<Self>;
}

impl ResponseExt for Response {
    fn check_status(self) -> Result<Self> {
        if self.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(NetworkError::RateLimit.into());
        }
        Ok(self.error_for_status()?)
    }
}

/// Renders a JSON scalar (number or string id) as text.
pub(crate) fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Joins the `name` fields of a JSON array of objects.
pub(crate) fn join_names(value: Option<&Value>, separator: &str) -> String {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("name").and_then(Value::as_str))
                .filter(|name| !name.is_empty())
                .collect::<Vec<_>>()
                .join(separator)
        })
        .unwrap_or_default()
}
