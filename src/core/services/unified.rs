//! Meting-style clients. Every platform's lyric answer is normalized into the
//! Netease JSON shape `{"code":200,"lrc":{"lyric":..},"tlyric":{"lyric":..}}`
//! so one parser handles them all.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use data_encoding::{BASE64, HEXUPPER};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::{Captures, Regex};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{join_names, value_to_string, FetchResult, PayloadCipher, Provider, ResponseExt};
use crate::core::crypto::netease::eapi_encrypt;
use crate::core::lyrics::{SearchCandidate, SongQuery};
use crate::error::{DecryptionError, LyricSyncError, NetworkError, Result};

const NETEASE_SEARCH_URL: &str = "http://music.163.com/api/cloudsearch/pc";
const NETEASE_LYRIC_URL: &str = "http://music.163.com/api/song/lyric";
const TENCENT_SEARCH_URL: &str = "https://c.y.qq.com/soso/fcgi-bin/client_search_cp";
const TENCENT_LYRIC_URL: &str = "https://c.y.qq.com/lyric/fcgi-bin/fcg_query_lyric_new.fcg";
const KUGOU_SEARCH_URL: &str = "http://mobilecdn.kugou.com/api/v3/search/song";
const KUGOU_LYRIC_SEARCH_URL: &str = "http://krcs.kugou.com/search";
const KUGOU_LYRIC_DOWNLOAD_URL: &str = "http://lyrics.kugou.com/download";

static HTML_ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]+|#\d+|[a-zA-Z]+);").expect("html entity regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnifiedServer {
    Netease,
    Tencent,
    Kugou,
}

impl UnifiedServer {
    pub const ALL: [UnifiedServer; 3] = [UnifiedServer::Netease, UnifiedServer::Tencent, UnifiedServer::Kugou];

    pub fn key(&self) -> &'static str {
        match self {
            UnifiedServer::Netease => "netease",
            UnifiedServer::Tencent => "tencent",
            UnifiedServer::Kugou => "kugou",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_lowercase().as_str() {
            "netease" => Some(UnifiedServer::Netease),
            "tencent" | "qq" => Some(UnifiedServer::Tencent),
            "kugou" => Some(UnifiedServer::Kugou),
            _ => None,
        }
    }

    fn default_headers(&self) -> Vec<(&'static str, String)> {
        match self {
            UnifiedServer::Netease => {
                let device_id = HEXUPPER.encode(&rand::thread_rng().gen::<[u8; 16]>());
                let request_id = format!(
                    "{}_{:04}",
                    chrono::Utc::now().timestamp_millis(),
                    rand::thread_rng().gen_range(0..1000)
                );
                vec![
                    ("Referer", "music.163.com".to_string()),
                    (
                        "Cookie",
                        format!(
                            "osver=android; appver=8.7.01; os=android; deviceId={}; channel=netease; requestId={}; __remember_me=true",
                            device_id, request_id
                        ),
                    ),
                    ("User-Agent", "Mozilla/5.0 (Linux; Android 11; M2007J3SC Build/RKQ1.200826.002; wv) AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 Chrome/77.0.3865.120 MQQBrowser/6.2 TBS/045714 Mobile Safari/537.36 NeteaseMusic/8.7.01".to_string()),
                    ("Accept", "*/*".to_string()),
                    ("Accept-Language", "zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7".to_string()),
                ]
            }
            UnifiedServer::Tencent => vec![
                ("Referer", "http://y.qq.com".to_string()),
                ("Cookie", "pgv_pvi=22038528; pgv_si=s3156287488; pgv_pvid=5535248600; yplayer_open=1; ts_last=y.qq.com/portal/player.html; ts_uid=4847550686; yq_index=0; qqmusic_fromtag=66; player_exist=1".to_string()),
                ("User-Agent", "QQ%E9%9F%B3%E4%B9%90/54409 CFNetwork/901.1 Darwin/17.6.0 (x86_64)".to_string()),
                ("Accept", "*/*".to_string()),
                ("Accept-Language", "zh-CN,zh;q=0.8,gl;q=0.6,zh-TW;q=0.4".to_string()),
            ],
            UnifiedServer::Kugou => vec![
                ("User-Agent", "IPhone-8990-searchSong".to_string()),
                ("UNI-UserAgent", "iOS11.4-Phone8990-1009-0-WiFi".to_string()),
            ],
        }
    }
}

impl fmt::Display for UnifiedServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One lazily built HTTP client per platform, shared by every request to it.
pub struct UnifiedClientRegistry {
    clients: Mutex<HashMap<UnifiedServer, Arc<Client>>>,
    timeout: Duration,
}

impl UnifiedClientRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub async fn client(&self, server: UnifiedServer) -> Result<Arc<Client>> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(&server) {
            return Ok(Arc::clone(client));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in server.default_headers() {
            let value = HeaderValue::from_str(&value).map_err(|e| {
                LyricSyncError::Validation(format!("invalid {} header: {}", name, e))
            })?;
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                LyricSyncError::Validation(format!("invalid header name {}: {}", name, e))
            })?;
            headers.insert(name, value);
        }

        let client = Arc::new(
            Client::builder()
                .timeout(self.timeout)
                .cookie_store(true)
                .default_headers(headers)
                .build()?,
        );
        debug!("Created HTTP client for {}", server);
        clients.insert(server, Arc::clone(&client));
        Ok(client)
    }

    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }
}

/// Decodes named and numeric HTML entities.
pub fn decode_html_entities(text: &str) -> String {
    HTML_ENTITY
        .replace_all(text, |caps: &Captures| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some('\u{a0}'),
                    _ => None,
                }
            };
            decoded.map_or_else(|| caps[0].to_string(), String::from)
        })
        .into_owned()
}

/// Removes a `MusicJsonCallback(...)` wrapper if present.
pub fn strip_jsonp(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("MusicJsonCallback") {
        return trimmed;
    }
    match (trimmed.find('('), trimmed.rfind(')')) {
        (Some(start), Some(end)) if start < end => &trimmed[start + 1..end],
        _ => trimmed,
    }
}

fn decode_base64_text(encoded: &str) -> std::result::Result<String, DecryptionError> {
    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64
        .decode(cleaned.as_bytes())
        .map_err(|e| DecryptionError::InvalidBase64(e.to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Builds the normalized lyric JSON. Empty lyrics yield an empty payload.
pub fn normalize_lyric(lyric: &str, translation: &str) -> Vec<u8> {
    if lyric.trim().is_empty() {
        return Vec::new();
    }
    json!({
        "code": 200,
        "lrc": { "lyric": lyric },
        "tlyric": { "lyric": translation },
    })
    .to_string()
    .into_bytes()
}

/// Decodes a Tencent `fcg_query_lyric_new` answer into normalized JSON.
pub fn decode_tencent_lyric(body: &str) -> Vec<u8> {
    let Ok(data) = serde_json::from_str::<Value>(strip_jsonp(body)) else {
        warn!("Tencent lyric response is not JSON");
        return Vec::new();
    };

    let field = |key: &str| -> String {
        match data.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()) {
            Some(encoded) => match decode_base64_text(encoded) {
                Ok(text) => decode_html_entities(&text),
                Err(e) => {
                    warn!("Failed to decode Tencent {}: {}", key, e);
                    String::new()
                }
            },
            None => String::new(),
        }
    };

    normalize_lyric(&field("lyric"), &field("trans"))
}

/// Parses a Meting search answer for `server` into candidates named `provider_name`.
pub fn parse_search(server: UnifiedServer, provider_name: &str, data: &Value) -> Vec<SearchCandidate> {
    let pointer = match server {
        UnifiedServer::Netease => "/result/songs",
        UnifiedServer::Tencent => "/data/song/list",
        UnifiedServer::Kugou => "/data/info",
    };
    let Some(items) = data.pointer(pointer).and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let (id, title, artist, album) = match server {
                UnifiedServer::Netease => (
                    item.get("id").and_then(value_to_string)?,
                    item.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                    join_names(item.get("ar"), ", "),
                    item.pointer("/al/name").and_then(Value::as_str).unwrap_or_default().to_string(),
                ),
                UnifiedServer::Tencent => {
                    let song = item.get("musicData").unwrap_or(item);
                    (
                        song.get("mid").and_then(value_to_string)?,
                        song.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                        join_names(song.get("singer"), ", "),
                        song.pointer("/album/title")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .trim()
                            .to_string(),
                    )
                }
                UnifiedServer::Kugou => {
                    let filename = item
                        .get("filename")
                        .or_else(|| item.get("fileName"))
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    let (artist, title) = match filename.split_once(" - ") {
                        Some((artists, title)) => (artists.split('、').collect::<Vec<_>>().join(", "), title.to_string()),
                        None => (String::new(), filename.to_string()),
                    };
                    (
                        item.get("hash").and_then(value_to_string)?,
                        title,
                        artist,
                        item.get("album_name").and_then(Value::as_str).unwrap_or_default().to_string(),
                    )
                }
            };

            Some(SearchCandidate {
                provider_name: provider_name.to_string(),
                provider_song_id: id,
                title,
                artist,
                album,
                raw_match_score: 0.0,
            })
        })
        .collect()
}

/// A provider backed by one Meting-style platform client.
pub struct UnifiedProvider {
    server: UnifiedServer,
    name: String,
    registry: Arc<UnifiedClientRegistry>,
}

impl UnifiedProvider {
    pub fn new(server: UnifiedServer, registry: Arc<UnifiedClientRegistry>) -> Self {
        Self {
            server,
            name: format!("unified:{}", server.key()),
            registry,
        }
    }

    /// Every supported platform, sharing one registry.
    pub fn all(registry: Arc<UnifiedClientRegistry>) -> Vec<Self> {
        UnifiedServer::ALL
            .iter()
            .map(|server| Self::new(*server, Arc::clone(&registry)))
            .collect()
    }

    async fn get_text(&self, url: &str, params: &[(&str, String)]) -> Result<String> {
        let client = self.registry.client(self.server).await?;
        Ok(client
            .get(url)
            .query(params)
            .send()
            .await?
            .check_status()?
            .text()
            .await?)
    }

    async fn post_eapi(&self, url: &str, body: &Value) -> Result<String> {
        let signed = eapi_encrypt(url, body)?;
        let client = self.registry.client(self.server).await?;
        Ok(client
            .post(&signed.url)
            .form(&[("params", signed.params)])
            .send()
            .await?
            .check_status()?
            .text()
            .await?)
    }

    fn parse_json(&self, text: &str) -> Result<Value> {
        serde_json::from_str(text).map_err(|e| {
            LyricSyncError::Network(NetworkError::InvalidResponse {
                reason: format!("{} returned invalid JSON: {}", self.name, e),
            })
        })
    }

    async fn kugou_lyric(&self, hash: &str) -> Result<Vec<u8>> {
        let search = self
            .get_text(
                KUGOU_LYRIC_SEARCH_URL,
                &[
                    ("keyword", "%20-%20".to_string()),
                    ("ver", "1".to_string()),
                    ("hash", hash.to_string()),
                    ("client", "mobi".to_string()),
                    ("man", "yes".to_string()),
                ],
            )
            .await?;
        let search = self.parse_json(&search)?;

        let Some(candidate) = search.pointer("/candidates/0") else {
            return Ok(Vec::new());
        };
        let (Some(id), Some(access_key)) = (
            candidate.get("id").and_then(value_to_string),
            candidate.get("accesskey").and_then(value_to_string),
        ) else {
            return Ok(Vec::new());
        };

        let download = self
            .get_text(
                KUGOU_LYRIC_DOWNLOAD_URL,
                &[
                    ("charset", "utf8".to_string()),
                    ("accesskey", access_key),
                    ("id", id),
                    ("client", "mobi".to_string()),
                    ("fmt", "lrc".to_string()),
                    ("ver", "1".to_string()),
                ],
            )
            .await?;
        let download = self.parse_json(&download)?;

        let lyric = match download.get("content").and_then(Value::as_str).filter(|s| !s.is_empty()) {
            Some(content) => decode_base64_text(content)?,
            None => String::new(),
        };
        Ok(normalize_lyric(&lyric, ""))
    }
}

#[async_trait]
impl Provider for UnifiedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_syllable_capable(&self) -> bool {
        false
    }

    fn payload_cipher(&self) -> PayloadCipher {
        PayloadCipher::Text
    }

    async fn search(&self, query: &SongQuery) -> Result<Vec<SearchCandidate>> {
        let keyword = format!("{} {}", query.title, query.artist);
        debug!("Searching {} for '{}'", self.name, keyword);

        let text = match self.server {
            UnifiedServer::Netease => {
                let body = json!({
                    "s": keyword,
                    "type": 1,
                    "limit": 30,
                    "total": "true",
                    "offset": 0,
                });
                self.post_eapi(NETEASE_SEARCH_URL, &body).await?
            }
            UnifiedServer::Tencent => {
                self.get_text(
                    TENCENT_SEARCH_URL,
                    &[
                        ("format", "json".to_string()),
                        ("p", "1".to_string()),
                        ("n", "30".to_string()),
                        ("w", keyword.clone()),
                        ("aggr", "1".to_string()),
                        ("lossless", "1".to_string()),
                        ("cr", "1".to_string()),
                        ("new_json", "1".to_string()),
                    ],
                )
                .await?
            }
            UnifiedServer::Kugou => {
                self.get_text(
                    KUGOU_SEARCH_URL,
                    &[
                        ("api_ver", "1".to_string()),
                        ("area_code", "1".to_string()),
                        ("correct", "1".to_string()),
                        ("pagesize", "30".to_string()),
                        ("plat", "2".to_string()),
                        ("tag", "1".to_string()),
                        ("sver", "5".to_string()),
                        ("showtype", "10".to_string()),
                        ("page", "1".to_string()),
                        ("keyword", keyword.clone()),
                        ("version", "8990".to_string()),
                    ],
                )
                .await?
            }
        };

        let data = self.parse_json(&text)?;
        Ok(parse_search(self.server, &self.name, &data))
    }

    async fn fetch_raw(&self, song_id: &str) -> Result<FetchResult> {
        info!("Fetching lyrics from {} for id {}", self.name, song_id);

        let payload = match self.server {
            UnifiedServer::Netease => {
                let body = json!({
                    "id": song_id,
                    "os": "linux",
                    "lv": -1,
                    "kv": -1,
                    "tv": -1,
                });
                let text = self.post_eapi(NETEASE_LYRIC_URL, &body).await?;
                let data = self.parse_json(&text)?;
                let lyric = data.pointer("/lrc/lyric").and_then(Value::as_str).unwrap_or_default();
                let translation = data.pointer("/tlyric/lyric").and_then(Value::as_str).unwrap_or_default();
                normalize_lyric(lyric, translation)
            }
            UnifiedServer::Tencent => {
                let text = self
                    .get_text(
                        TENCENT_LYRIC_URL,
                        &[("songmid", song_id.to_string()), ("g_tk", "5381".to_string())],
                    )
                    .await?;
                decode_tencent_lyric(&text)
            }
            UnifiedServer::Kugou => self.kugou_lyric(song_id).await?,
        };

        if payload.is_empty() {
            warn!("{} returned no lyrics for id {}", self.name, song_id);
        }
        Ok(FetchResult::Plain(payload))
    }
}
