//! Query expansion, candidate ranking and the fetch, decrypt, parse, clean pipeline.

use std::sync::Arc;
use std::time::Duration;

use data_encoding::{BASE64, HEXUPPER};
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::core::crypto::{krc, qrc};
use crate::core::infrastructure::cache::LyricsStore;
use crate::core::lyrics::{
    parser, uncensor, AiConfig, Cleaner, EnrichmentStatus, LyricsResult, ScoredCandidate,
    SearchCandidate, SongQuery,
};
use crate::core::matching::{
    is_ascii_query, is_instrumental, rank_candidates, score_candidate, simplify_artist,
    EARLY_EXIT_SCORE, SCORE_THRESHOLD,
};
use crate::core::services::{Enricher, FetchResult, PayloadCipher, Provider, Translator};
use crate::error::DecryptionError;

/// How many leading bytes are scanned for an LRC timestamp.
const PLAIN_PROBE_BYTES: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub search_timeout: Duration,
    pub fetch_timeout: Duration,
    pub fetch_attempts: u32,
    pub fetch_backoff: Duration,
    pub max_candidates: usize,
    pub fetch_concurrency: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            search_timeout: Duration::from_secs(15),
            fetch_timeout: Duration::from_secs(10),
            fetch_attempts: 3,
            fetch_backoff: Duration::from_millis(500),
            max_candidates: 5,
            fetch_concurrency: 3,
        }
    }
}

/// Lyric text recovered from a fetched payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPayload {
    pub text: String,
    pub translation: Option<String>,
    /// Already line-timed LRC; the structured parser is skipped.
    pub plain: bool,
}

/// Trimmed bytes starting with `[`, or an `[00:` stamp near the start.
pub fn looks_like_plain_lrc(bytes: &[u8]) -> bool {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    if bytes[start..].starts_with(b"[") {
        return true;
    }
    let probe = &bytes[..bytes.len().min(PLAIN_PROBE_BYTES)];
    probe.windows(4).any(|w| w == b"[00:")
}

fn decrypt_with(cipher: PayloadCipher, bytes: &[u8]) -> Result<String, DecryptionError> {
    match cipher {
        PayloadCipher::Qrc => qrc::decrypt(&HEXUPPER.encode(bytes)),
        PayloadCipher::Krc => krc::decrypt(&BASE64.encode(bytes)),
        PayloadCipher::Text => Ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// Turns fetched bytes into text, falling back to strict UTF-8 when decryption fails.
pub fn decode_payload(cipher: PayloadCipher, fetched: &FetchResult) -> Option<DecodedPayload> {
    let content = fetched.content();

    if looks_like_plain_lrc(content) {
        info!("Payload is plain LRC, skipping decryption");
        return Some(DecodedPayload {
            text: String::from_utf8_lossy(content).into_owned(),
            translation: None,
            plain: true,
        });
    }

    match decrypt_with(cipher, content) {
        Ok(text) => {
            let translation = match (cipher, fetched.translation()) {
                (PayloadCipher::Qrc, Some(bytes)) => match decrypt_with(cipher, bytes) {
                    Ok(text) => {
                        info!("Decrypted translation ({} chars)", text.len());
                        Some(text)
                    }
                    Err(e) => {
                        warn!("Failed to decrypt translation: {}", e);
                        None
                    }
                },
                _ => None,
            };
            Some(DecodedPayload {
                text,
                translation,
                plain: false,
            })
        }
        Err(e) => {
            warn!("Decryption failed: {}", e);
            match String::from_utf8(content.to_vec()) {
                Ok(text) => {
                    info!("Payload is valid UTF-8, retrying as LRC");
                    Some(DecodedPayload {
                        text,
                        translation: None,
                        plain: true,
                    })
                }
                Err(_) => None,
            }
        }
    }
}

/// Netease JSON first, then the structured parser, then plain LRC.
pub fn parse_payload(decoded: &DecodedPayload) -> Option<LyricsResult> {
    match parser::parse_netease(&decoded.text) {
        Ok(Some(result)) => return Some(result),
        Ok(None) => {}
        Err(e) => {
            warn!("Lyric JSON rejected: {}", e);
            return None;
        }
    }

    if !decoded.plain {
        match parser::parse(&decoded.text, decoded.translation.as_deref()) {
            Ok(result) if !result.is_empty() => return Some(result),
            Ok(_) => debug!("Structured parser produced no lines, trying LRC"),
            Err(e) => debug!("Structured parse failed ({}), trying LRC", e),
        }
    }

    let lines = parser::parse_lrc(&decoded.text);
    if lines.is_empty() {
        warn!("No lyric lines found in payload");
        return None;
    }
    Some(LyricsResult::new(lines))
}

/// Owns the enabled providers and collaborators. Holds no per-call state.
pub struct LyricsService {
    providers: Vec<Arc<dyn Provider>>,
    unified_providers: Vec<Arc<dyn Provider>>,
    store: Option<Arc<dyn LyricsStore>>,
    enricher: Option<Arc<Enricher>>,
    translator: Option<Arc<dyn Translator>>,
    cleaner: Cleaner,
    settings: PipelineSettings,
}

impl LyricsService {
    pub fn new(providers: Vec<Arc<dyn Provider>>, settings: PipelineSettings) -> Self {
        for provider in &providers {
            info!(
                "Provider enabled: {} (syllable: {})",
                provider.name(),
                provider.is_syllable_capable()
            );
        }
        Self {
            providers,
            unified_providers: Vec::new(),
            store: None,
            enricher: None,
            translator: None,
            cleaner: Cleaner::default(),
            settings,
        }
    }

    pub fn with_unified_providers(mut self, providers: Vec<Arc<dyn Provider>>) -> Self {
        self.unified_providers = providers;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn LyricsStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_enricher(mut self, enricher: Arc<Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub fn with_cleaner(mut self, cleaner: Cleaner) -> Self {
        self.cleaner = cleaner;
        self
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers
            .iter()
            .chain(self.unified_providers.iter())
            .map(|p| p.name())
            .collect()
    }

    fn find_provider(&self, name: &str) -> Option<&Arc<dyn Provider>> {
        self.providers
            .iter()
            .chain(self.unified_providers.iter())
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    async fn translate_or_keep(&self, translator: &dyn Translator, text: &str, source: &str, target: &str) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }
        match timeout(self.settings.search_timeout, translator.translate(text, source, target)).await {
            Ok(Ok(translated)) => translated,
            Ok(Err(e)) => {
                warn!("Translation failed: {}", e);
                text.to_string()
            }
            Err(_) => {
                warn!("Translation timed out");
                text.to_string()
            }
        }
    }

    /// The ordered search queries derived from one request.
    pub async fn build_strategies(&self, query: &SongQuery) -> Vec<SongQuery> {
        let mut strategies = Vec::new();
        let ascii = is_ascii_query(&query.artist, &query.title);

        if let (Some(translator), true) = (self.translator.as_deref(), ascii) {
            let artist = self.translate_or_keep(translator, &query.artist, "en", "ja").await;
            let title = self.translate_or_keep(translator, &query.title, "en", "ja").await;
            if artist != query.artist || title != query.title {
                info!("Strategy: romaji to Japanese: {} - {}", artist, title);
                strategies.push(query.derived(title, artist));
            }
        }

        strategies.push(query.clone());

        let simple_artist = simplify_artist(&query.artist);
        if !simple_artist.is_empty() && simple_artist != query.artist {
            strategies.push(query.derived(query.title.clone(), simple_artist));
        }

        if !query.title.is_empty() {
            strategies.push(query.derived(query.title.clone(), ""));
        }

        if let (Some(translator), true) = (self.translator.as_deref(), ascii) {
            let artist = self.translate_or_keep(translator, &query.artist, "auto", "zh").await;
            let title = self.translate_or_keep(translator, &query.title, "auto", "zh").await;
            if artist != query.artist || title != query.title {
                info!("Strategy: English to Chinese fallback: {} - {}", artist, title);
                strategies.push(query.derived(title, artist));
            }
        }

        strategies
    }

    /// Searches every provider concurrently. Failures and timeouts count as no results.
    async fn search_strategy(
        &self,
        providers: &[Arc<dyn Provider>],
        query: &SongQuery,
    ) -> Vec<(SearchCandidate, bool)> {
        let searches = providers.iter().map(|provider| async move {
            match timeout(self.settings.search_timeout, provider.search(query)).await {
                Ok(Ok(results)) => {
                    debug!("{} returned {} result(s)", provider.name(), results.len());
                    let syllable = provider.is_syllable_capable();
                    results.into_iter().map(|r| (r, syllable)).collect::<Vec<_>>()
                }
                Ok(Err(e)) => {
                    warn!("{} search failed: {}", provider.name(), e);
                    Vec::new()
                }
                Err(_) => {
                    warn!("{} search timed out", provider.name());
                    Vec::new()
                }
            }
        });

        join_all(searches).await.into_iter().flatten().collect()
    }

    /// Runs the strategies in order and returns the ranked survivors.
    pub async fn rank_for(&self, providers: &[Arc<dyn Provider>], query: &SongQuery) -> Vec<ScoredCandidate> {
        let mut candidates = Vec::new();

        for strategy in self.build_strategies(query).await {
            info!("Searching with: {} - {}", strategy.artist, strategy.title);
            let results = self.search_strategy(providers, &strategy).await;
            if results.is_empty() {
                continue;
            }
            info!("Found {} candidates for strategy", results.len());

            let batch: Vec<ScoredCandidate> = results
                .into_iter()
                .map(|(candidate, syllable_capable)| ScoredCandidate {
                    score: score_candidate(&strategy, &candidate),
                    candidate,
                    syllable_capable,
                })
                .filter(|c| c.score >= SCORE_THRESHOLD)
                .collect();

            let best = batch.iter().map(|c| c.score).fold(f64::MIN, f64::max);
            candidates.extend(batch);
            if best > EARLY_EXIT_SCORE {
                info!("High-confidence match ({:.1}), stopping query expansion", best);
                break;
            }
        }

        rank_candidates(candidates)
    }

    /// Best lyrics across the legacy providers.
    pub async fn match_best_lyrics(&self, query: &SongQuery) -> Option<LyricsResult> {
        self.match_with(&self.providers, query).await
    }

    /// Best lyrics across the unified-API providers.
    pub async fn match_best_lyrics_unified(&self, query: &SongQuery) -> Option<LyricsResult> {
        self.match_with(&self.unified_providers, query).await
    }

    async fn match_with(&self, providers: &[Arc<dyn Provider>], query: &SongQuery) -> Option<LyricsResult> {
        if providers.is_empty() {
            warn!("No providers enabled for this path");
            return None;
        }

        let ranked = self.rank_for(providers, query).await;
        if ranked.is_empty() {
            info!("No valid candidates found after all search strategies");
            return None;
        }

        let top: Vec<ScoredCandidate> = ranked.into_iter().take(self.settings.max_candidates).collect();
        info!(
            "Top candidates: {:?}",
            top.iter()
                .map(|c| (c.candidate.provider_name.as_str(), c.score.round(), c.syllable_capable))
                .collect::<Vec<_>>()
        );

        let style = query.style_instruction.as_deref();
        let ai_config = query.ai_config.as_ref();

        // buffered() keeps rank order while bounding in-flight fetches
        let mut fetches = stream::iter(top.iter())
            .map(|scored| async move {
                let candidate = &scored.candidate;
                let lyrics = self
                    .get_standardized_lyrics(
                        &candidate.provider_song_id,
                        &candidate.provider_name,
                        style,
                        ai_config,
                        Some(query),
                    )
                    .await;
                (candidate, lyrics)
            })
            .buffered(self.settings.fetch_concurrency.max(1));

        let mut instrumental = None;
        while let Some((candidate, lyrics)) = fetches.next().await {
            match lyrics {
                None => warn!("Candidate {} ({}) returned no lyrics", candidate.title, candidate.provider_name),
                Some(lyrics) if is_instrumental(&lyrics) => {
                    info!("Instrumental or empty result: {}", candidate.title);
                    if instrumental.is_none() {
                        instrumental = Some(lyrics);
                    }
                }
                Some(lyrics) => {
                    info!("Selected {} from {}", candidate.title, candidate.provider_name);
                    return Some(lyrics);
                }
            }
        }

        if instrumental.is_some() {
            info!("No vocal lyrics found, returning best instrumental candidate");
        }
        instrumental
    }

    /// Fetches with a per-attempt timeout and fixed backoff. `None` once attempts run out.
    pub async fn fetch_with_retry(&self, provider: &dyn Provider, song_id: &str) -> Option<FetchResult> {
        let attempts = self.settings.fetch_attempts.max(1);
        for attempt in 1..=attempts {
            match timeout(self.settings.fetch_timeout, provider.fetch_raw(song_id)).await {
                Ok(Ok(fetched)) => return Some(fetched),
                Ok(Err(e)) => warn!(
                    "{} fetch attempt {}/{} failed: {}",
                    provider.name(),
                    attempt,
                    attempts,
                    e
                ),
                Err(_) => warn!("{} fetch attempt {}/{} timed out", provider.name(), attempt, attempts),
            }
            if attempt < attempts {
                sleep(self.settings.fetch_backoff).await;
            }
        }
        error!("Giving up on {} id {} after {} attempts", provider.name(), song_id, attempts);
        None
    }

    async fn enrich(&self, lyrics: LyricsResult, style: Option<&str>, ai_config: Option<&AiConfig>) -> LyricsResult {
        match &self.enricher {
            Some(enricher) => {
                let target = enricher.target_lang().to_string();
                enricher.enrich(lyrics, &target, style, ai_config).await
            }
            None => {
                let mut lyrics = lyrics;
                lyrics.enrichment_status = EnrichmentStatus::SkippedNoKey;
                lyrics
            }
        }
    }

    /// Cache, fetch, decrypt, parse, clean and uncensor one known candidate.
    pub async fn get_standardized_lyrics(
        &self,
        song_id: &str,
        provider_name: &str,
        style: Option<&str>,
        ai_config: Option<&AiConfig>,
        metadata: Option<&SongQuery>,
    ) -> Option<LyricsResult> {
        info!("Standardized lyrics requested for {} from {}", song_id, provider_name);

        if let Some(store) = &self.store {
            if let Some(mut cached) = store.load(song_id, provider_name).await {
                info!("Cache hit for {} ({})", song_id, provider_name);
                if style.is_some() {
                    info!("Applying custom style to cached lyrics");
                    return Some(self.enrich(cached, style, ai_config).await);
                }
                if cached.source_metadata.is_none() {
                    cached.source_metadata = metadata.cloned();
                }
                return Some(cached);
            }
            debug!("Cache miss for {} ({})", song_id, provider_name);
        }

        let Some(provider) = self.find_provider(provider_name) else {
            warn!("Unknown provider: {}", provider_name);
            return None;
        };

        let fetched = self.fetch_with_retry(provider.as_ref(), song_id).await?;
        if fetched.is_empty() {
            warn!("Downloaded lyrics data is empty");
            return None;
        }
        info!("Downloaded {} bytes of lyric data", fetched.content().len());

        let decoded = decode_payload(provider.payload_cipher(), &fetched)?;
        let parsed = parse_payload(&decoded)?;

        let mut result = self.cleaner.clean(parsed);
        result = uncensor::uncensor_lyrics(result);
        result.source_metadata = metadata.cloned();
        result.enrichment_status = EnrichmentStatus::CanEnrich;

        if style.is_some() {
            return Some(self.enrich(result, style, ai_config).await);
        }

        if let Some(store) = &self.store {
            if let Err(e) = store.save(song_id, provider_name, &result).await {
                warn!("Failed to cache lyrics for {}: {}", song_id, e);
            }
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::infrastructure::cache::MemoryStore;
    use crate::core::lyrics::LyricsKind;
    use crate::error::{LyricSyncError, NetworkError, Result};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockProvider {
        name: &'static str,
        syllable: bool,
        cipher: PayloadCipher,
        hits: Vec<(String, String, String)>,
        payloads: HashMap<String, FetchResult>,
        failures_before_success: usize,
        searches: Mutex<Vec<SongQuery>>,
        fetches: AtomicUsize,
    }

    impl MockProvider {
        fn new(name: &'static str, syllable: bool) -> Self {
            Self {
                name,
                syllable,
                cipher: PayloadCipher::Text,
                hits: Vec::new(),
                payloads: HashMap::new(),
                failures_before_success: 0,
                searches: Mutex::new(Vec::new()),
                fetches: AtomicUsize::new(0),
            }
        }

        fn hit(mut self, id: &str, title: &str, artist: &str, payload: &str) -> Self {
            self.hits.push((id.to_string(), title.to_string(), artist.to_string()));
            self.payloads
                .insert(id.to_string(), FetchResult::Plain(payload.as_bytes().to_vec()));
            self
        }

        fn search_count(&self) -> usize {
            self.searches.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn is_syllable_capable(&self) -> bool {
            self.syllable
        }

        fn payload_cipher(&self) -> PayloadCipher {
            self.cipher
        }

        async fn search(&self, query: &SongQuery) -> Result<Vec<SearchCandidate>> {
            self.searches.lock().unwrap().push(query.clone());
            Ok(self
                .hits
                .iter()
                .map(|(id, title, artist)| SearchCandidate {
                    provider_name: self.name.to_string(),
                    provider_song_id: id.clone(),
                    title: title.clone(),
                    artist: artist.clone(),
                    album: String::new(),
                    raw_match_score: 0.0,
                })
                .collect())
        }

        async fn fetch_raw(&self, song_id: &str) -> Result<FetchResult> {
            let call = self.fetches.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                return Err(LyricSyncError::Network(NetworkError::Timeout));
            }
            Ok(self
                .payloads
                .get(song_id)
                .cloned()
                .unwrap_or(FetchResult::Plain(Vec::new())))
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl Provider for FailingProvider {
        fn name(&self) -> &str {
            "Broken"
        }

        async fn search(&self, _query: &SongQuery) -> Result<Vec<SearchCandidate>> {
            Err(LyricSyncError::Network(NetworkError::RateLimit))
        }

        async fn fetch_raw(&self, _song_id: &str) -> Result<FetchResult> {
            Err(LyricSyncError::Network(NetworkError::RateLimit))
        }
    }

    struct FixedTranslator;

    #[async_trait]
    impl Translator for FixedTranslator {
        async fn translate(&self, text: &str, _source: &str, target: &str) -> Result<String> {
            Ok(format!("{}:{}", target, text))
        }
    }

    #[derive(Default)]
    struct CountingTranslator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Translator for CountingTranslator {
        async fn translate(&self, text: &str, _source: &str, target: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{}:{}", target, text))
        }
    }

    fn fast_settings() -> PipelineSettings {
        PipelineSettings {
            fetch_backoff: Duration::from_millis(1),
            ..PipelineSettings::default()
        }
    }

    fn service(providers: Vec<Arc<dyn Provider>>) -> LyricsService {
        LyricsService::new(providers, fast_settings())
    }

    const VOCAL: &str = "[00:01.00]first line\n[00:02.00]second line\n[00:03.00]third line";

    #[test]
    fn test_plain_lrc_detection() {
        assert!(looks_like_plain_lrc(b"  [ti:x]\n[00:01.00]a"));
        assert!(looks_like_plain_lrc(b"junk junk [00:01.00]a"));
        assert!(!looks_like_plain_lrc(b"{\"code\":200}"));
        let late = format!("{}[00:01.00]a", "#".repeat(60));
        assert!(!looks_like_plain_lrc(late.as_bytes()));
        assert!(!looks_like_plain_lrc(b""));
    }

    #[test]
    fn test_decode_falls_back_to_utf8_after_decryption_failure() {
        let decoded = decode_payload(PayloadCipher::Krc, &FetchResult::Plain(b"abc".to_vec())).unwrap();
        assert_eq!(decoded.text, "abc");
        assert!(decoded.plain);

        assert!(decode_payload(PayloadCipher::Krc, &FetchResult::Plain(vec![0xff, 0xfe, 0x01])).is_none());
    }

    #[test]
    fn test_decode_qrc_with_translation() {
        let content = unhex(&qrc::encrypt("<Lyric_1 LyricContent=\"x\"/>").unwrap());
        let translation = unhex(&qrc::encrypt("[00:01.00]译文").unwrap());
        let decoded = decode_payload(
            PayloadCipher::Qrc,
            &FetchResult::WithTranslation { content, translation },
        )
        .unwrap();
        assert!(!decoded.plain);
        assert_eq!(decoded.text, "<Lyric_1 LyricContent=\"x\"/>");
        assert_eq!(decoded.translation.as_deref(), Some("[00:01.00]译文"));
    }

    fn unhex(hex: &str) -> Vec<u8> {
        data_encoding::HEXUPPER_PERMISSIVE.decode(hex.as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_payload_order() {
        let json = DecodedPayload {
            text: r#"{"code":200,"lrc":{"lyric":"[00:01.00]hi"},"tlyric":{"lyric":"[00:01.00]你好"}}"#.to_string(),
            translation: None,
            plain: false,
        };
        let result = parse_payload(&json).unwrap();
        assert_eq!(result.lines[0].translation.as_deref(), Some("你好"));

        let rejected = DecodedPayload {
            text: r#"{"code":200,"uncollected":true}"#.to_string(),
            translation: None,
            plain: false,
        };
        assert!(parse_payload(&rejected).is_none());

        let lrc = DecodedPayload {
            text: VOCAL.to_string(),
            translation: None,
            plain: true,
        };
        assert_eq!(parse_payload(&lrc).unwrap().lines.len(), 3);
    }

    #[tokio::test]
    async fn test_strategies_without_translator() {
        let svc = service(Vec::new());
        let strategies = svc.build_strategies(&SongQuery::new("Song", "A feat. B")).await;
        let pairs: Vec<(&str, &str)> = strategies.iter().map(|s| (s.title.as_str(), s.artist.as_str())).collect();
        assert_eq!(pairs, vec![("Song", "A feat. B"), ("Song", "A"), ("Song", "")]);
    }

    #[tokio::test]
    async fn test_strategies_with_translator() {
        let svc = service(Vec::new()).with_translator(Arc::new(FixedTranslator));
        let strategies = svc.build_strategies(&SongQuery::new("Lemon", "Kenshi")).await;
        assert_eq!(strategies.len(), 4);
        assert_eq!(strategies[0].title, "ja:Lemon");
        assert_eq!(strategies[1].title, "Lemon");
        assert_eq!(strategies[2].artist, "");
        assert_eq!(strategies[3].artist, "zh:Kenshi");

        let non_ascii = svc.build_strategies(&SongQuery::new("晴天", "周杰伦")).await;
        assert_eq!(non_ascii.len(), 2);
    }

    #[tokio::test]
    async fn test_blank_artist_is_not_translated() {
        let translator = Arc::new(CountingTranslator::default());
        let svc = service(Vec::new()).with_translator(translator.clone());
        let strategies = svc.build_strategies(&SongQuery::new("Lemon", "  ")).await;

        assert_eq!(translator.calls.load(Ordering::SeqCst), 2);
        assert!(strategies.iter().all(|s| s.artist.trim().is_empty()));
        assert_eq!(strategies[0].title, "ja:Lemon");
        assert_eq!(strategies.last().map(|s| s.title.as_str()), Some("zh:Lemon"));
    }

    #[tokio::test]
    async fn test_syllable_provider_preferred_over_higher_score() {
        let syllabic = Arc::new(
            MockProvider::new("Syllabic", true).hit("s1", "Shake It Off (Live)", "Taylor Swift", "[00:01.00]syllable version\n[00:02.00]b\n[00:03.00]c"),
        );
        let plain = Arc::new(
            MockProvider::new("Plain", false).hit("p1", "Shake It Off", "Taylor Swift", "[00:01.00]plain version\n[00:02.00]b\n[00:03.00]c"),
        );
        let svc = service(vec![plain.clone(), syllabic.clone()]);

        let query = SongQuery::new("Shake It Off", "Taylor Swift");
        let ranked = svc.rank_for(&svc.providers, &query).await;
        assert_eq!(ranked[0].candidate.provider_name, "Syllabic");
        assert!(ranked[0].score < ranked[1].score);

        let result = svc.match_best_lyrics(&query).await.unwrap();
        assert_eq!(result.lines[0].text, "syllable version");
        assert_eq!(result.source_metadata.as_ref().map(|m| m.title.as_str()), Some("Shake It Off"));
    }

    #[tokio::test]
    async fn test_early_exit_stops_expansion() {
        let exact = Arc::new(MockProvider::new("Exact", false).hit("1", "Shake It Off", "Taylor Swift", VOCAL));
        let svc = service(vec![exact.clone()]);
        svc.match_best_lyrics(&SongQuery::new("Shake It Off", "Taylor Swift")).await.unwrap();
        assert_eq!(exact.search_count(), 1);

        let weak = Arc::new(MockProvider::new("Weak", false).hit("1", "Shake It Off (Live)", "Taylor Swift", VOCAL));
        let svc = service(vec![weak.clone()]);
        svc.match_best_lyrics(&SongQuery::new("Shake It Off", "Taylor Swift")).await.unwrap();
        assert_eq!(weak.search_count(), 2);
    }

    #[tokio::test]
    async fn test_low_scores_are_discarded() {
        let unrelated = Arc::new(MockProvider::new("Other", false).hit("1", "Completely Different", "Nobody", VOCAL));
        let svc = service(vec![unrelated.clone()]);
        assert!(svc.match_best_lyrics(&SongQuery::new("Shake It Off", "Taylor Swift")).await.is_none());
        assert_eq!(unrelated.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_instrumental_fallback_and_vocal_preference() {
        let instrumental = Arc::new(
            MockProvider::new("Inst", true).hit("i1", "Song", "Artist", "[00:01.00]纯音乐，请欣赏"),
        );
        let svc = service(vec![instrumental.clone()]);
        let result = svc.match_best_lyrics(&SongQuery::new("Song", "Artist")).await.unwrap();
        assert_eq!(result.lines.len(), 1);
        assert!(is_instrumental(&result));

        let vocal = Arc::new(MockProvider::new("Vocal", false).hit("v1", "Song", "Artist", VOCAL));
        let svc = service(vec![instrumental, vocal]);
        let result = svc.match_best_lyrics(&SongQuery::new("Song", "Artist")).await.unwrap();
        assert_eq!(result.lines.len(), 3);
    }

    #[tokio::test]
    async fn test_failing_provider_does_not_abort_search() {
        let good = Arc::new(MockProvider::new("Good", false).hit("1", "Song", "Artist", VOCAL));
        let svc = service(vec![Arc::new(FailingProvider), good]);
        assert!(svc.match_best_lyrics(&SongQuery::new("Song", "Artist")).await.is_some());
    }

    #[tokio::test]
    async fn test_fetch_retry() {
        let mut flaky = MockProvider::new("Flaky", false).hit("1", "Song", "Artist", VOCAL);
        flaky.failures_before_success = 2;
        let flaky = Arc::new(flaky);
        let svc = service(vec![flaky.clone()]);
        assert!(svc.get_standardized_lyrics("1", "Flaky", None, None, None).await.is_some());
        assert_eq!(flaky.fetches.load(Ordering::SeqCst), 3);

        let mut hopeless = MockProvider::new("Hopeless", false).hit("1", "Song", "Artist", VOCAL);
        hopeless.failures_before_success = 5;
        let hopeless = Arc::new(hopeless);
        let svc = service(vec![hopeless.clone()]);
        assert!(svc.get_standardized_lyrics("1", "Hopeless", None, None, None).await.is_none());
        assert_eq!(hopeless.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_pipeline_moves_credits() {
        let payload = "[00:00.00]作词 : 方文山\n[00:00.00]作曲 : 周杰伦\n[00:10.00]窗外的麻雀\n[00:15.00]Composer: Jay Chou\n[00:20.00]在电线杆上多嘴";
        let provider = Arc::new(MockProvider::new("Plain", false).hit("1", "t", "a", payload));
        let svc = service(vec![provider]);

        let result = svc.get_standardized_lyrics("1", "plain", None, None, None).await.unwrap();
        let texts: Vec<&str> = result.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["窗外的麻雀", "在电线杆上多嘴"]);
        assert_eq!(result.credits.len(), 3);
        assert_eq!(result.enrichment_status, EnrichmentStatus::CanEnrich);
    }

    #[tokio::test]
    async fn test_pipeline_decrypts_qrc() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<QrcInfos>
<LyricInfo LyricCount="1">
<Lyric_1 LyricType="1" LyricContent="[ti:晴天]
[1000,2000]故(1000,500)事(1500,500)的(2000,500)小(2500,500)
[3000,1000]黄(3000,500)色(3500,500)
"/>
</LyricInfo>
</QrcInfos>"#;
        let bytes = unhex(&qrc::encrypt(xml).unwrap());
        let mut provider = MockProvider::new("QQ Mock", true);
        provider.cipher = PayloadCipher::Qrc;
        provider.payloads.insert("1".into(), FetchResult::Plain(bytes));
        let svc = service(vec![Arc::new(provider)]);

        let result = svc.get_standardized_lyrics("1", "QQ Mock", None, None, None).await.unwrap();
        assert_eq!(result.kind, LyricsKind::Syllable);
        assert_eq!(result.lines[0].text, "故事的小");
        assert_eq!(result.lines[0].words.len(), 4);
    }

    #[tokio::test]
    async fn test_cache_round_trip_and_style_skips_save() {
        let provider = Arc::new(MockProvider::new("Plain", false).hit("1", "t", "a", VOCAL));
        let store = Arc::new(MemoryStore::default());
        let svc = service(vec![provider.clone()]).with_store(store.clone());

        svc.get_standardized_lyrics("1", "Plain", Some("poetic"), None, None).await.unwrap();
        assert_eq!(store.len().await, 0);

        let metadata = SongQuery::new("t", "a");
        let first = svc.get_standardized_lyrics("1", "Plain", None, None, None).await.unwrap();
        assert!(first.source_metadata.is_none());
        assert_eq!(store.len().await, 1);

        let cached = svc
            .get_standardized_lyrics("1", "Plain", None, None, Some(&metadata))
            .await
            .unwrap();
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(cached.lines, first.lines);
        assert_eq!(cached.source_metadata, Some(metadata));

        let styled = svc.get_standardized_lyrics("1", "Plain", Some("casual"), None, None).await.unwrap();
        assert_eq!(styled.enrichment_status, EnrichmentStatus::SkippedNoKey);
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_provider_and_empty_payload() {
        let provider = Arc::new(MockProvider::new("Empty", false));
        let svc = service(vec![provider]);
        assert!(svc.get_standardized_lyrics("1", "Nope", None, None, None).await.is_none());
        assert!(svc.get_standardized_lyrics("1", "Empty", None, None, None).await.is_none());
    }

    #[tokio::test]
    async fn test_unified_path_uses_its_own_providers() {
        let legacy = Arc::new(MockProvider::new("Legacy", false).hit("1", "Song", "Artist", VOCAL));
        let unified = Arc::new(MockProvider::new("unified:mock", false).hit(
            "u1",
            "Song",
            "Artist",
            r#"{"code":200,"lrc":{"lyric":"[00:01.00]from unified\n[00:02.00]b\n[00:03.00]c"},"tlyric":{"lyric":""}}"#,
        ));
        let svc = service(vec![legacy.clone()]).with_unified_providers(vec![unified]);

        let result = svc.match_best_lyrics_unified(&SongQuery::new("Song", "Artist")).await.unwrap();
        assert_eq!(result.lines[0].text, "from unified");
        assert_eq!(legacy.search_count(), 0);
        assert_eq!(svc.provider_names(), vec!["Legacy", "unified:mock"]);
    }
}
