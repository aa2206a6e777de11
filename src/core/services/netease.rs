use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{join_names, value_to_string, FetchResult, Provider, RequestBody, ResponseExt, SignedRequest};
use crate::core::crypto::netease::weapi_encrypt;
use crate::core::lyrics::{SearchCandidate, SongQuery};
use crate::error::{DecryptionError, Result};

const SEARCH_URL: &str = "http://music.163.com/api/search/get/web";
const LYRIC_URL: &str = "https://music.163.com/weapi/song/lyric?csrf_token=";
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Netease Cloud Music web endpoints. The lyric request is WEAPI-signed,
/// the answer is plain JSON handled by the Netease lyric parser.
pub struct NeteaseProvider {
    client: Client,
}

impl NeteaseProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn parse_search(data: &Value) -> Vec<SearchCandidate> {
        if data.get("code").and_then(Value::as_i64) != Some(200) {
            warn!("Netease search returned code {:?}", data.get("code"));
            return Vec::new();
        }

        let Some(songs) = data.pointer("/result/songs").and_then(Value::as_array) else {
            debug!("Netease search returned no result object");
            return Vec::new();
        };

        songs
            .iter()
            .filter_map(|song| {
                let id = song.get("id").and_then(value_to_string)?;
                Some(SearchCandidate {
                    provider_name: "Netease".to_string(),
                    provider_song_id: id,
                    title: song.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
                    artist: join_names(song.get("artists"), " / "),
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
impl Provider for NeteaseProvider {
    fn name(&self) -> &str {
        "Netease"
    }

    async fn search(&self, query: &SongQuery) -> Result<Vec<SearchCandidate>> {
        let keyword = format!("{} {}", query.title, query.artist);
        debug!("Searching Netease for '{}'", keyword);

        let data: Value = self
            .client
            .get(SEARCH_URL)
            .header("User-Agent", BROWSER_UA)
            .header("Referer", "https://music.163.com/")
            .query(&[
                ("s", keyword.as_str()),
                ("type", "1"),
                ("offset", "0"),
                ("total", "true"),
                ("limit", "20"),
            ])
            .send()
            .await?
            .check_status()?
            .json()
            .await?;

        Ok(Self::parse_search(&data))
    }

    async fn fetch_raw(&self, song_id: &str) -> Result<FetchResult> {
        info!("Fetching Netease lyrics for id {}", song_id);
        let body = json!({ "id": song_id, "lv": -1, "tv": -1 });

        let bytes = self
            .sign_request(LYRIC_URL, &body)?
            .into_request(&self.client)
            .header("User-Agent", BROWSER_UA)
            .header("Referer", "https://music.163.com/")
            .header("Origin", "https://music.163.com")
            .send()
            .await?
            .check_status()?
            .bytes()
            .await?;

        Ok(FetchResult::Plain(bytes.to_vec()))
    }

    fn sign_request(&self, url: &str, body: &Value) -> std::result::Result<SignedRequest, DecryptionError> {
        let form = weapi_encrypt(body)?;
        Ok(SignedRequest {
            url: url.to_string(),
            body: RequestBody::Form(vec![
                ("params".to_string(), form.params),
                ("encSecKey".to_string(), form.enc_sec_key),
            ]),
        })
    }
}
