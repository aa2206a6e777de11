use serde::{Deserialize, Serialize};

/// A single timed syllable or word inside a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start_s: f64,
    pub end_s: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineRole {
    #[default]
    Main,
    Bg,
    Duet,
}

/// One lyric line. `end_s == start_s` when the source carries no duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub start_s: f64,
    pub end_s: f64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub romanization: Option<String>,
    #[serde(default)]
    pub role: LineRole,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default)]
    pub words: Vec<Word>,
}

impl Line {
    pub fn new(start_s: f64, end_s: f64, text: impl Into<String>) -> Self {
        Self {
            start_s,
            end_s,
            text: text.into(),
            translation: None,
            romanization: None,
            role: LineRole::Main,
            explicit: false,
            words: Vec::new(),
        }
    }

    pub fn with_words(mut self, words: Vec<Word>) -> Self {
        self.words = words;
        self
    }

    pub fn with_translation(mut self, translation: impl Into<String>) -> Self {
        self.translation = Some(translation.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LyricsKind {
    /// Word-level timing is present.
    #[default]
    Syllable,
    /// Line-level timing only.
    Line,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    Success,
    SkippedLength,
    SkippedNoKey,
    FailedApi,
    #[default]
    CanEnrich,
}

impl EnrichmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentStatus::Success => "success",
            EnrichmentStatus::SkippedLength => "skipped_length",
            EnrichmentStatus::SkippedNoKey => "skipped_no_key",
            EnrichmentStatus::FailedApi => "failed_api",
            EnrichmentStatus::CanEnrich => "can_enrich",
        }
    }
}

/// Per-request enrichment credentials, overriding the configured ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

/// The search key for one lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SongQuery {
    pub title: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_instruction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_config: Option<AiConfig>,
}

impl SongQuery {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            ..Default::default()
        }
    }

    /// A copy with only title and artist, used for derived search strategies.
    pub fn derived(&self, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            album: self.album.clone(),
            duration_ms: self.duration_ms,
            style_instruction: None,
            ai_config: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricsResult {
    #[serde(default)]
    pub kind: LyricsKind,
    pub lines: Vec<Line>,
    #[serde(default)]
    pub enrichment_status: EnrichmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_metadata: Option<SongQuery>,
    #[serde(default)]
    pub credits: Vec<String>,
}

impl LyricsResult {
    pub fn new(lines: Vec<Line>) -> Self {
        let kind = if lines.iter().any(|l| !l.words.is_empty()) {
            LyricsKind::Syllable
        } else {
            LyricsKind::Line
        };

        Self {
            kind,
            lines,
            enrichment_status: EnrichmentStatus::CanEnrich,
            source_metadata: None,
            credits: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Renders the lines as `[mm:ss.xx]text` LRC.
    pub fn to_lrc(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&format!("[{}]{}\n", format_timestamp(line.start_s), line.text));
        }
        out
    }
}

/// Formats seconds as `mm:ss.xx`.
pub fn format_timestamp(seconds: f64) -> String {
    let centis = (seconds.max(0.0) * 100.0).round() as u64;
    format!("{:02}:{:02}.{:02}", centis / 6000, (centis / 100) % 60, centis % 100)
}

/// A search hit from one provider. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchCandidate {
    pub provider_name: String,
    pub provider_song_id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    #[serde(default)]
    pub raw_match_score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: SearchCandidate,
    pub score: f64,
    pub syllable_capable: bool,
}
