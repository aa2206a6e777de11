use async_trait::async_trait;
use data_encoding::HEXUPPER_PERMISSIVE;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{join_names, value_to_string, FetchResult, Provider, ResponseExt};
use crate::core::lyrics::{SearchCandidate, SongQuery};
use crate::error::{DecryptionError, Result};

const SEARCH_URL: &str = "https://u.y.qq.com/cgi-bin/musicu.fcg";
const LYRIC_URL: &str = "https://c.y.qq.com/qqmusic/fcgi-bin/lyric_download.fcg";
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";
const CLIENT_UA: &str = "QQMusic/197449790";

static CONTENT_CDATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<content(?:\s[^>]*)?><!\[CDATA\[(.*?)\]\]>").expect("content cdata regex")
});
static CONTENT_PLAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<content(?:\s[^>]*)?>(.*?)</content>").expect("content regex")
});
static LYRIC_CDATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<lyric(?:\s[^>]*)?><!\[CDATA\[(.*?)\]\]>").expect("lyric cdata regex")
});
static TRANS_CDATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<contentts(?:\s[^>]*)?><!\[CDATA\[(.*?)\]\]>").expect("contentts cdata regex")
});
static TRANS_PLAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<contentts(?:\s[^>]*)?>(.*?)</contentts>").expect("contentts regex")
});

/// Hex strings pulled out of a `lyric_download.fcg` answer.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct QrcPayload {
    pub content: String,
    pub translation: String,
}

fn first_capture(regex: &Regex, text: &str) -> Option<String> {
    regex
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn plain_capture(regex: &Regex, text: &str) -> Option<String> {
    first_capture(regex, text).filter(|s| !s.starts_with("<![CDATA["))
}

/// Finds the encrypted lyric and translation hex in the XML-ish response body.
pub fn extract_qrc_payload(body: &str) -> QrcPayload {
    let body = body.replace("<!--", "").replace("-->", "");

    let content = first_capture(&CONTENT_CDATA, &body)
        .or_else(|| plain_capture(&CONTENT_PLAIN, &body))
        .or_else(|| first_capture(&LYRIC_CDATA, &body))
        .unwrap_or_default();

    let translation = first_capture(&TRANS_CDATA, &body)
        .or_else(|| plain_capture(&TRANS_PLAIN, &body))
        .unwrap_or_default();

    QrcPayload { content, translation }
}

fn decode_hex(hex: &str) -> std::result::Result<Vec<u8>, DecryptionError> {
    HEXUPPER_PERMISSIVE
        .decode(hex.as_bytes())
        .map_err(|e| DecryptionError::InvalidHex(e.to_string()))
}

/// QQ Music desktop client endpoints. Lyrics arrive as QRC ciphertext.
pub struct QqMusicProvider {
    client: Client,
}

impl QqMusicProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn parse_search(data: &Value) -> Vec<SearchCandidate> {
        let songs = data
            .pointer("/req_1/data/body/song/list")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        songs
            .iter()
            .filter_map(|song| {
                let id = song.get("id").and_then(value_to_string)?;
                let title = song.get("name").and_then(Value::as_str).filter(|s| !s.is_empty())?;
                Some(SearchCandidate {
                    provider_name: "QQ Music".to_string(),
                    provider_song_id: id,
                    title: title.to_string(),
                    artist: join_names(song.get("singer"), ", "),
                    album: song
                        .pointer("/album/name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    raw_match_score: 0.0,
                })
            })
            .collect()
    }
}

#[async_trait]
impl Provider for QqMusicProvider {
    fn name(&self) -> &str {
        "QQ Music"
    }

    async fn search(&self, query: &SongQuery) -> Result<Vec<SearchCandidate>> {
        let keyword = format!("{} - {}", query.artist, query.title);
        let payload = json!({
            "req_1": {
                "method": "DoSearchForQQMusicDesktop",
                "module": "music.search.SearchCgiService",
                "param": {
                    "num_per_page": 20,
                    "page_num": 1,
                    "query": keyword,
                    "search_type": 0
                }
            }
        });

        debug!("Searching QQ Music for '{}'", keyword);
        let request = self
            .sign_request(SEARCH_URL, &payload)?
            .into_request(&self.client)
            .header("Referer", "https://c.y.qq.com/")
            .header("User-Agent", BROWSER_UA);

        let data: Value = request.send().await?.check_status()?.json().await?;
        let results = Self::parse_search(&data);
        debug!("QQ Music returned {} result(s)", results.len());
        Ok(results)
    }

    async fn fetch_raw(&self, song_id: &str) -> Result<FetchResult> {
        info!("Fetching QRC lyrics from QQ Music for id {}", song_id);
        let params = [
            ("version", "15"),
            ("miniversion", "82"),
            ("lrctype", "4"),
            ("musicid", song_id),
        ];

        let body = self
            .client
            .post(LYRIC_URL)
            .header("Referer", "https://y.qq.com/")
            .header("User-Agent", CLIENT_UA)
            .form(&params)
            .send()
            .await?
            .check_status()?
            .text()
            .await?;

        let payload = extract_qrc_payload(&body);
        if payload.content.is_empty() {
            let preview: String = body.chars().take(200).collect();
            warn!("No QRC content in QQ Music response: {}", preview);
            return Ok(FetchResult::Plain(Vec::new()));
        }

        debug!("QRC hex length {}", payload.content.len());
        let content = decode_hex(&payload.content)?;
        let translation = if payload.translation.is_empty() {
            Vec::new()
        } else {
            match decode_hex(&payload.translation) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Ignoring malformed QQ Music translation: {}", e);
                    Vec::new()
                }
            }
        };

        Ok(FetchResult::WithTranslation { content, translation })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_cdata_content_and_translation() {
        let body = r#"<?xml version="1.0" encoding="utf-8"?>
<!--<QrcInfos>
<lyric_1 LyricType="1">
<content><![CDATA[ 0A1B2C ]]></content>
<contentts><![CDATA[FFEE]]></contentts>
</lyric_1>
</QrcInfos>-->"#;
        let payload = extract_qrc_payload(body);
        assert_eq!(payload.content, "0A1B2C");
        assert_eq!(payload.translation, "FFEE");
    }

    #[test]
    fn test_contentts_is_not_mistaken_for_content() {
        let body = "<contentts><![CDATA[AAAA]]></contentts><content>BBBB</content>";
        let payload = extract_qrc_payload(body);
        assert_eq!(payload.content, "BBBB");
        assert_eq!(payload.translation, "AAAA");
    }

    #[test]
    fn test_falls_back_to_lyric_element() {
        let body = r#"<lyric type="qrc"><![CDATA[C0FFEE]]></lyric>"#;
        assert_eq!(extract_qrc_payload(body).content, "C0FFEE");
        assert_eq!(extract_qrc_payload("<html>nothing</html>"), QrcPayload::default());
    }

    #[test]
    fn test_decode_hex_accepts_lowercase() {
        assert_eq!(decode_hex("c0ffee").unwrap(), vec![0xC0, 0xFF, 0xEE]);
        assert!(matches!(decode_hex("xyz"), Err(DecryptionError::InvalidHex(_))));
    }

    #[test]
    fn test_parse_search_response() {
        let data = json!({"req_1": {"data": {"body": {"song": {"list": [
            {"id": 97773, "mid": "x", "name": "Shake It Off",
             "singer": [{"name": "Taylor Swift"}], "album": {"name": "1989"}},
            {"id": 0, "name": ""}
        ]}}}}});
        let results = QqMusicProvider::parse_search(&data);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].provider_song_id, "97773");
        assert_eq!(results[0].artist, "Taylor Swift");
        assert_eq!(results[0].album, "1989");
    }
}
