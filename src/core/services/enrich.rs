//! LLM enrichment: translation, romanization and explicit-content flags.

use std::collections::HashMap;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::core::lyrics::{AiConfig, EnrichmentStatus, LyricsResult};
use crate::error::EnrichmentError;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const MAX_ENRICH_CHARS: usize = 2000;
const LANGUAGE_SAMPLE_CHARS: usize = 200;

/// Resolved endpoint credentials for one enrichment call.
#[derive(Debug, Clone, PartialEq)]
struct Credentials {
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct PromptLine<'a> {
    st: f64,
    txt: &'a str,
}

/// One line's worth of model output.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LineEnrichment {
    #[serde(default)]
    pub trans: Option<String>,
    #[serde(default)]
    pub romaji: Option<String>,
    #[serde(default)]
    pub explicit: Option<bool>,
}

/// Guesses the lyric language from its script.
pub fn detect_language(sample: &str) -> &'static str {
    let has = |lo: char, hi: char| sample.chars().any(|c| (lo..=hi).contains(&c));
    if has('\u{3040}', '\u{30ff}') {
        "ja"
    } else if has('\u{ac00}', '\u{d7af}') {
        "ko"
    } else if has('\u{4e00}', '\u{9fff}') {
        "zh"
    } else {
        "en"
    }
}

pub fn system_prompt(target_lang: &str, include_romaji: bool, style: Option<&str>) -> String {
    let romaji = if include_romaji { "Romanized pronunciation" } else { "null" };
    let style = match style {
        Some(style) => format!(" User Style Requirement: {}", style),
        None => " Keep the translation neutral, accurate, and concise.".to_string(),
    };
    format!(
        "You are a lyrics metadata engine. Output a JSON object keyed by the 'st' (start time) of the line. \
         For each line, provide: 'trans' (translation to {}), 'romaji' ({}), \
         and 'explicit' (boolean, true if contains profanity/sexual/violent content). \
         Output strictly valid JSON.{}",
        target_lang, romaji, style
    )
}

fn time_key(seconds: f64) -> i64 {
    (seconds * 1000.0).round() as i64
}

/// Reads the model's JSON object into a map keyed by start time in milliseconds.
pub fn parse_enrichment_map(content: &str) -> Result<HashMap<i64, LineEnrichment>, EnrichmentError> {
    let value: Value = serde_json::from_str(content).map_err(|e| EnrichmentError::InvalidResponse {
        reason: e.to_string(),
    })?;
    let Value::Object(entries) = value else {
        return Err(EnrichmentError::InvalidResponse {
            reason: "expected a JSON object".to_string(),
        });
    };

    Ok(entries
        .into_iter()
        .filter_map(|(key, entry)| {
            let start: f64 = key.trim().parse().ok()?;
            let info: LineEnrichment = serde_json::from_value(entry).ok()?;
            Some((time_key(start), info))
        })
        .collect())
}

/// Applies model output to the lines. Returns how many lines had an entry.
pub fn merge_enrichment(
    lyrics: &mut LyricsResult,
    enrichment: &HashMap<i64, LineEnrichment>,
    style: Option<&str>,
) -> usize {
    let mut updated = 0;
    for line in &mut lyrics.lines {
        let Some(info) = enrichment.get(&time_key(line.start_s)) else {
            continue;
        };

        if let Some(trans) = info.trans.as_ref().filter(|t| !t.is_empty()) {
            let missing = line.translation.as_deref().map_or(true, str::is_empty);
            if missing || style.is_some() {
                line.translation = Some(trans.clone());
            }
        }

        if let Some(romaji) = info.romaji.as_ref().filter(|r| !r.is_empty()) {
            if line.romanization.as_deref().map_or(true, str::is_empty) {
                line.romanization = Some(romaji.clone());
            }
        }

        if info.explicit == Some(true) {
            line.explicit = true;
        }
        updated += 1;
    }
    updated
}

/// Client for an OpenAI-compatible chat-completions endpoint.
pub struct Enricher {
    client: Client,
    api_key: Option<String>,
    base_url: Option<String>,
    model: String,
    target_lang: String,
}

impl Enricher {
    pub fn new(
        client: Client,
        api_key: Option<String>,
        base_url: Option<String>,
        model: Option<String>,
        target_lang: &str,
    ) -> Self {
        let api_key = api_key.filter(|k| !k.is_empty());
        if api_key.is_none() {
            warn!("ENRICH_KEY not set, server-side enrichment disabled");
        }
        Self {
            client,
            api_key,
            base_url: base_url.filter(|u| !u.is_empty()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            target_lang: target_lang.to_string(),
        }
    }

    pub fn target_lang(&self) -> &str {
        &self.target_lang
    }

    /// Request credentials win over the configured ones.
    fn credentials(&self, ai_config: Option<&AiConfig>) -> Option<Credentials> {
        if let Some(config) = ai_config {
            if let Some(key) = config.api_key.as_ref().filter(|k| !k.is_empty()) {
                info!("Using request-provided enrichment credentials");
                return Some(Credentials {
                    api_key: key.clone(),
                    base_url: config.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                    model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                });
            }
        }

        self.api_key.as_ref().map(|key| Credentials {
            api_key: key.clone(),
            base_url: self.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: self.model.clone(),
        })
    }

    /// Fills translation, romanization and explicit flags. Never fails: the
    /// outcome is reported through `enrichment_status`.
    pub async fn enrich(
        &self,
        mut lyrics: LyricsResult,
        target_lang: &str,
        style: Option<&str>,
        ai_config: Option<&AiConfig>,
    ) -> LyricsResult {
        let Some(credentials) = self.credentials(ai_config) else {
            warn!("No enrichment credentials available, skipping");
            lyrics.enrichment_status = EnrichmentStatus::SkippedNoKey;
            return lyrics;
        };

        let all_text: String = lyrics.lines.iter().map(|l| l.text.as_str()).collect();
        let sample: String = all_text.chars().take(LANGUAGE_SAMPLE_CHARS).collect();
        let lang = detect_language(&sample);
        info!("Detected lyric language: {}", lang);

        let total_chars = all_text.chars().count();
        if total_chars > MAX_ENRICH_CHARS {
            warn!("Lyrics too long for enrichment ({} chars), skipping", total_chars);
            lyrics.enrichment_status = EnrichmentStatus::SkippedLength;
            return lyrics;
        }
        if lyrics.lines.is_empty() {
            return lyrics;
        }

        let needs_romaji = matches!(lang, "ja" | "ko");
        info!("Enriching {} lines", lyrics.lines.len());

        let enrichment = match self
            .call_model(&credentials, &lyrics, target_lang, needs_romaji, style)
            .await
        {
            Ok(map) if !map.is_empty() => map,
            Ok(_) => {
                warn!("Enrichment model returned no entries");
                lyrics.enrichment_status = EnrichmentStatus::FailedApi;
                return lyrics;
            }
            Err(e) => {
                error!("Enrichment call failed: {}", e);
                lyrics.enrichment_status = EnrichmentStatus::FailedApi;
                return lyrics;
            }
        };

        let updated = merge_enrichment(&mut lyrics, &enrichment, style);
        lyrics.enrichment_status = EnrichmentStatus::Success;
        info!("Enriched {} lines", updated);
        lyrics
    }

    async fn call_model(
        &self,
        credentials: &Credentials,
        lyrics: &LyricsResult,
        target_lang: &str,
        include_romaji: bool,
        style: Option<&str>,
    ) -> Result<HashMap<i64, LineEnrichment>, EnrichmentError> {
        let lines: Vec<PromptLine<'_>> = lyrics
            .lines
            .iter()
            .map(|l| PromptLine {
                st: l.start_s,
                txt: &l.text,
            })
            .collect();
        let user_content = serde_json::to_string(&lines).map_err(|e| EnrichmentError::InvalidResponse {
            reason: e.to_string(),
        })?;

        let body = json!({
            "model": credentials.model,
            "messages": [
                {"role": "system", "content": system_prompt(target_lang, include_romaji, style)},
                {"role": "user", "content": user_content},
            ],
            "response_format": {"type": "json_object"},
        });

        let url = format!("{}/chat/completions", credentials.base_url.trim_end_matches('/'));
        let response: Value = self
            .client
            .post(&url)
            .bearer_auth(&credentials.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = response
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        parse_enrichment_map(content)
    }
}
