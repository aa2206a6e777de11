use async_trait::async_trait;
use data_encoding::BASE64;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{value_to_string, FetchResult, Provider, ResponseExt};
use crate::core::lyrics::{SearchCandidate, SongQuery};
use crate::error::{DecryptionError, LyricSyncError, Result};

const SEARCH_URL: &str = "http://mobilecdn.kugou.com/api/v3/search/song";
const LYRIC_SEARCH_URL: &str = "https://lyrics.kugou.com/search";
const LYRIC_DOWNLOAD_URL: &str = "http://lyrics.kugou.com/download";
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// The parts of a composite `hash|duration_ms|title` song id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KugouSongId {
    pub hash: String,
    pub duration_ms: String,
    pub title: String,
}

impl KugouSongId {
    pub fn compose(hash: &str, duration_s: u64, title: &str) -> String {
        format!("{}|{}|{}", hash, duration_s * 1000, title.replace('|', ""))
    }

    /// Accepts three parts, or two when the title was never recorded.
    pub fn parse(id: &str) -> Result<Self> {
        let parts: Vec<&str> = id.split('|').collect();
        match parts.as_slice() {
            [hash, duration, title] => Ok(Self {
                hash: hash.to_string(),
                duration_ms: duration.to_string(),
                title: title.to_string(),
            }),
            [hash, duration] => Ok(Self {
                hash: hash.to_string(),
                duration_ms: duration.to_string(),
                title: String::new(),
            }),
            _ => Err(LyricSyncError::Validation(format!("invalid Kugou song id: {}", id))),
        }
    }
}

/// Kugou PC client endpoints. Lyrics arrive as KRC ciphertext.
pub struct KugouProvider {
    client: Client,
}

impl KugouProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn parse_search(data: &Value) -> Vec<SearchCandidate> {
        let Some(items) = data.pointer("/data/info").and_then(Value::as_array) else {
            return Vec::new();
        };

        items
            .iter()
            .filter_map(|item| {
                let hash = item.get("hash").and_then(Value::as_str).filter(|s| !s.is_empty())?;
                let title = item.get("songname").and_then(Value::as_str).filter(|s| !s.is_empty())?;
                let duration = item.get("duration").and_then(Value::as_u64).unwrap_or(0);
                Some(SearchCandidate {
                    provider_name: "Kugou".to_string(),
                    provider_song_id: KugouSongId::compose(hash, duration, title),
                    title: title.to_string(),
                    artist: item
                        .get("singername")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    album: item
                        .get("album_name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    raw_match_score: 0.0,
                })
            })
            .collect()
    }

    async fn get_json(&self, url: &str, params: &[(&str, &str)]) -> Result<Value> {
        Ok(self
            .client
            .get(url)
            .header("User-Agent", BROWSER_UA)
            .query(params)
            .send()
            .await?
            .check_status()?
            .json()
            .await?)
    }
}

#[async_trait]
impl Provider for KugouProvider {
    fn name(&self) -> &str {
        "Kugou"
    }

    async fn search(&self, query: &SongQuery) -> Result<Vec<SearchCandidate>> {
        let keyword = format!("{} - {}", query.artist, query.title);
        debug!("Searching Kugou for '{}'", keyword);

        let data = self
            .get_json(
                SEARCH_URL,
                &[
                    ("format", "json"),
                    ("keyword", &keyword),
                    ("page", "1"),
                    ("pagesize", "20"),
                    ("showtype", "1"),
                ],
            )
            .await?;

        Ok(Self::parse_search(&data))
    }

    async fn fetch_raw(&self, song_id: &str) -> Result<FetchResult> {
        let id = KugouSongId::parse(song_id)?;
        info!("Fetching Kugou lyric candidates for hash {}", id.hash);

        let search = self
            .get_json(
                LYRIC_SEARCH_URL,
                &[
                    ("ver", "1"),
                    ("man", "yes"),
                    ("client", "pc"),
                    ("keyword", &id.title),
                    ("hash", &id.hash),
                    ("duration", &id.duration_ms),
                ],
            )
            .await?;

        let Some(candidate) = search.pointer("/candidates/0") else {
            warn!("No lyric candidates on Kugou for hash {}", id.hash);
            return Ok(FetchResult::Plain(Vec::new()));
        };
        let candidate_id = candidate.get("id").and_then(value_to_string);
        let access_key = candidate.get("accesskey").and_then(value_to_string);
        let (Some(candidate_id), Some(access_key)) = (candidate_id, access_key) else {
            warn!("Kugou candidate is missing id or accesskey");
            return Ok(FetchResult::Plain(Vec::new()));
        };

        let download = self
            .get_json(
                LYRIC_DOWNLOAD_URL,
                &[
                    ("ver", "1"),
                    ("client", "pc"),
                    ("id", &candidate_id),
                    ("accesskey", &access_key),
                    ("fmt", "krc"),
                    ("charset", "utf8"),
                ],
            )
            .await?;

        let Some(content) = download.get("content").and_then(Value::as_str).filter(|s| !s.is_empty()) else {
            warn!("Kugou download response has no content");
            return Ok(FetchResult::Plain(Vec::new()));
        };

        let bytes = BASE64
            .decode(content.as_bytes())
            .map_err(|e| DecryptionError::InvalidBase64(e.to_string()))?;
        Ok(FetchResult::Plain(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compose_strips_separator_from_title() {
        assert_eq!(
            KugouSongId::compose("ABC123", 219, "Love | War"),
            "ABC123|219000|Love  War"
        );
    }

    #[test]
    fn test_parse_three_and_two_part_ids() {
        let full = KugouSongId::parse("ABC|219000|Shake It Off").unwrap();
        assert_eq!(full.hash, "ABC");
        assert_eq!(full.duration_ms, "219000");
        assert_eq!(full.title, "Shake It Off");

        let short = KugouSongId::parse("ABC|219000").unwrap();
        assert_eq!(short.title, "");
    }

    #[test]
    fn test_parse_rejects_malformed_ids() {
        assert!(matches!(
            KugouSongId::parse("ABC"),
            Err(LyricSyncError::Validation(_))
        ));
        assert!(KugouSongId::parse("a|b|c|d").is_err());
    }

    #[test]
    fn test_parse_search_response() {
        let data = json!({"data": {"info": [
            {"hash": "H1", "songname": "Shake It Off", "singername": "Taylor Swift",
             "album_name": "1989", "duration": 219},
            {"hash": "", "songname": "missing hash"}
        ]}});
        let results = KugouProvider::parse_search(&data);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].provider_song_id, "H1|219000|Shake It Off");
        assert_eq!(results[0].artist, "Taylor Swift");
    }
}
