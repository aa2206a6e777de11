//! Separates credit and metadata text from sung lines.
//!
//! Strict patterns only fire inside the head/tail window or at time zero so
//! lyric lines that merely mention a keyword in the body survive.

use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::model::{Line, LyricsResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanerSettings {
    /// Head and tail line count where strict credit patterns apply.
    #[serde(default = "default_window")]
    pub window: usize,
    /// Lines starting at or before this many seconds are checked regardless of position.
    #[serde(default = "default_zero_time_threshold")]
    pub zero_time_threshold: f64,
    /// Number of leading kept lines examined by the header pass.
    #[serde(default = "default_header_scope")]
    pub header_scope: usize,
}

fn default_window() -> usize {
    12
}

fn default_zero_time_threshold() -> f64 {
    0.5
}

fn default_header_scope() -> usize {
    5
}

impl Default for CleanerSettings {
    fn default() -> Self {
        Self {
            window: default_window(),
            zero_time_threshold: default_zero_time_threshold(),
            header_scope: default_header_scope(),
        }
    }
}

static TAG_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\[(?:ti|ar|al|au|length|by|offset|re|ve|tool|wrd|#|id|sign|kana|language|duration|encoding|total|manufacturer|qq|src|app_name|ver|la)[:：\s].*")
        .expect("tag line regex")
});

static ENCODED_BRACKET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\[[a-zA-Z_]+[:：][a-zA-Z0-9+/=_-]{20,}\]?$").expect("encoded bracket regex")
});

static BARE_TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[\d+(?:[:.,]\d+)*\]$").expect("bare timestamp regex"));

/// `Role: Name` style credits. Require an explicit separator.
const ROLE_PATTERNS: &[&str] = &[
    r"(?i)^(?:Title|Artist|Album|By|Lyricist|Composer|Arranger|Producer|Mixing|Mastering|Vocal|Guitar|Bass|Drums|Keyboard|Harmony|Backing Vocals|Recording|Studio|Label|Issued)\s*[:：]\s*.+",
    r"(?i)^(?:作词|作曲|编曲|制作|监制|混音|母带|吉他|吉它|贝斯|贝司|鼓|键盘|弦乐|和声|录音|发行|演唱|词|曲|制作人)\s*[:：]\s*.+",
    // bare space allowed for the strong Chinese keys only
    r"(?i)^(?:作词|作曲|编曲|制作|监制|词|曲|制作人)\s+.+",
    r"(?i)^Lyrics\s*(?:by|:)\s*.+",
    r"(?i)^Written\s*(?:by|:)\s*.+",
    r"(?i)^Produced\s*(?:by|:)\s*.+",
    r"(?i)^Music\s*(?:by|:)\s*.+",
    r"(?i)^Composed\s*(?:by|:)\s*.+",
    r"(?i)^Arranged\s*(?:by|:)\s*.+",
    r"(?i)^(?:Executive\s+)?Producer[:：]?\s*.+",
    r"(?i)^Mixed\s+(?:by|&)\s*.+",
    r"(?i)^Mastered\s+(?:by|at)\s*.+",
    r"(?i)^(?:Background\s+)?Vocals?\s*[:：]\s*.+",
    r"(?i)^Piano\s*[:：]\s*.+",
    r"(?i)^Strings?\s*[:：]\s*.+",
    r"(?i)^Recorded\s+(?:at|by)\s*.+",
];

const BOILERPLATE_PATTERNS: &[&str] = &[
    r"(?i)^(?:℗|©)\s*\d{4}\s*.+",
    r"(?i)^.*TME.*著作权.*$",
    r"(?i)^.*腾讯音乐.*$",
    r"(?i)^.*版权声明.*$",
    r"(?i)^.*翻译.*著作权.*$",
];

/// "Song - Artist" header lines.
const TITLE_ARTIST_PATTERNS: &[&str] = &[
    r"(?i)^.+\s+-\s*\w+$",
    r"(?i)^.+\s+(?:Explicit|Clean)\s+-\s*\w+$",
];

const METADATA_KEY_PATTERNS: &[&str] = &[
    r"(?i)^Title",
    r"(?i)^Artist",
    r"(?i)^Album",
    r"(?i)^By",
    r"(?i)^Offset",
];

/// Platform and rights-notice fragments that never appear in sung text.
const HARD_JUNK: &[&str] = &[
    "TME",
    "腾讯音乐",
    "版权",
    "著作权",
    "QQ音乐",
    "酷狗音乐",
    "网易云音乐",
    "未经许可",
    "不得翻唱",
];

static ROLE_SET: Lazy<RegexSet> =
    Lazy::new(|| RegexSet::new(ROLE_PATTERNS).expect("role patterns"));

static TITLE_ARTIST_SET: Lazy<RegexSet> =
    Lazy::new(|| RegexSet::new(TITLE_ARTIST_PATTERNS).expect("title-artist patterns"));

static STRICT_SET: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new(
        ROLE_PATTERNS
            .iter()
            .chain(BOILERPLATE_PATTERNS)
            .chain(TITLE_ARTIST_PATTERNS),
    )
    .expect("strict credit patterns")
});

static METADATA_KEY_SET: Lazy<RegexSet> =
    Lazy::new(|| RegexSet::new(METADATA_KEY_PATTERNS).expect("metadata key patterns"));

fn is_strict_credit(text: &str) -> bool {
    STRICT_SET.is_match(text)
}

fn has_hard_junk(text: &str) -> bool {
    HARD_JUNK.iter().any(|junk| text.contains(junk))
}

enum Verdict {
    Keep,
    Drop,
    Credit,
}

#[derive(Debug, Clone, Default)]
pub struct Cleaner {
    settings: CleanerSettings,
}

impl Cleaner {
    pub fn new(settings: CleanerSettings) -> Self {
        Self { settings }
    }

    fn classify(&self, index: usize, total: usize, line: &Line) -> Verdict {
        let text = line.text.trim();
        if text.is_empty() {
            return Verdict::Drop;
        }

        if TAG_LINE.is_match(text) || ENCODED_BRACKET.is_match(text) {
            return Verdict::Credit;
        }

        if BARE_TIMESTAMP.is_match(text) {
            return Verdict::Credit;
        }

        if line.start_s <= self.settings.zero_time_threshold
            && (METADATA_KEY_SET.is_match(text) || is_strict_credit(text))
        {
            return Verdict::Credit;
        }

        let tail_start = total.saturating_sub(self.settings.window);
        if (index < self.settings.window || index >= tail_start) && is_strict_credit(text) {
            return Verdict::Credit;
        }

        Verdict::Keep
    }

    fn is_header_junk(line: &Line) -> bool {
        let text = line.text.trim();
        let translation = line.translation.as_deref().map(str::trim).unwrap_or("");

        if ROLE_SET.is_match(text) {
            return true;
        }
        if TITLE_ARTIST_SET.is_match(text) && (translation.is_empty() || has_hard_junk(translation)) {
            return true;
        }
        has_hard_junk(text) || has_hard_junk(translation)
    }

    /// Index one past the last junk line among the first `header_scope` lines.
    fn header_cut(&self, lines: &[Line]) -> usize {
        lines
            .iter()
            .take(self.settings.header_scope)
            .enumerate()
            .filter(|(_, line)| Self::is_header_junk(line))
            .map(|(i, _)| i + 1)
            .last()
            .unwrap_or(0)
    }

    /// Moves credit lines into `credits` and leaves `lines` sorted by start time.
    pub fn clean(&self, mut lyrics: LyricsResult) -> LyricsResult {
        if lyrics.lines.is_empty() {
            return lyrics;
        }

        let total = lyrics.lines.len();
        let mut kept = Vec::with_capacity(total);
        let mut credits = Vec::new();

        for (index, line) in std::mem::take(&mut lyrics.lines).into_iter().enumerate() {
            match self.classify(index, total, &line) {
                Verdict::Keep => kept.push(line),
                Verdict::Drop => {}
                Verdict::Credit => {
                    debug!("Cleaner: moved to credits: {}", line.text.trim());
                    credits.push(line.text.trim().to_string());
                }
            }
        }

        kept.sort_by(|a, b| a.start_s.total_cmp(&b.start_s));

        let cut = self.header_cut(&kept);
        for line in kept.drain(..cut) {
            debug!("Cleaner: header block moved to credits: {}", line.text.trim());
            credits.push(line.text.trim().to_string());
        }

        if !credits.is_empty() {
            info!("Cleaner: {} lines kept, {} moved to credits", kept.len(), credits.len());
        }

        lyrics.lines = kept;
        lyrics.credits.extend(credits);
        lyrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lyrics(lines: &[(f64, &str)]) -> LyricsResult {
        LyricsResult::new(lines.iter().map(|(t, s)| Line::new(*t, *t, *s)).collect())
    }

    fn texts(result: &LyricsResult) -> Vec<&str> {
        result.lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_credit_block_example() {
        let input = lyrics(&[
            (0.0, "作词 : 方文山"),
            (0.0, "作曲 : 周杰伦"),
            (10.0, "窗外的麻雀"),
            (12.0, "Composer: Jay Chou"),
            (14.0, "在电线杆上多嘴"),
        ]);
        let cleaned = Cleaner::default().clean(input);

        assert_eq!(texts(&cleaned), vec!["窗外的麻雀", "在电线杆上多嘴"]);
        assert_eq!(cleaned.credits.len(), 3);
        assert_eq!(cleaned.credits[0], "作词 : 方文山");
    }

    #[test]
    fn test_tag_lines_removed_anywhere() {
        let mut lines: Vec<(f64, String)> = (0..40).map(|i| (10.0 + i as f64, format!("la la {}", i))).collect();
        lines[20].1 = "[offset:0]".to_string();
        lines[21].1 = "[hash:0123456789abcdef0123456789]".to_string();
        lines[22].1 = "[00:31.20]".to_string();
        let borrowed: Vec<(f64, &str)> = lines.iter().map(|(t, s)| (*t, s.as_str())).collect();

        let cleaned = Cleaner::default().clean(lyrics(&borrowed));
        assert_eq!(cleaned.lines.len(), 37);
        assert_eq!(cleaned.credits.len(), 3);
    }

    #[test]
    fn test_body_credit_shape_survives_outside_window() {
        let mut lines: Vec<(f64, String)> = (0..30).map(|i| (10.0 + i as f64, format!("la la {}", i))).collect();
        lines[15].1 = "Composer: Someone".to_string();
        lines[16].1 = "We run - away".to_string();
        let borrowed: Vec<(f64, &str)> = lines.iter().map(|(t, s)| (*t, s.as_str())).collect();

        let cleaned = Cleaner::default().clean(lyrics(&borrowed));
        assert_eq!(cleaned.lines.len(), 30);
        assert!(cleaned.credits.is_empty());
    }

    #[test]
    fn test_tail_window_credit_removed() {
        let mut lines: Vec<(f64, String)> = (0..30).map(|i| (10.0 + i as f64, format!("la la {}", i))).collect();
        lines[29].1 = "Mixed by Someone".to_string();
        let borrowed: Vec<(f64, &str)> = lines.iter().map(|(t, s)| (*t, s.as_str())).collect();

        let cleaned = Cleaner::default().clean(lyrics(&borrowed));
        assert_eq!(cleaned.lines.len(), 29);
        assert_eq!(cleaned.credits, vec!["Mixed by Someone".to_string()]);
    }

    #[test]
    fn test_zero_time_metadata_keys() {
        let cleaned = Cleaner::default().clean(lyrics(&[(0.2, "Title Something"), (3.0, "Title Something")]));
        assert_eq!(cleaned.lines.len(), 1);
        assert_eq!(cleaned.lines[0].start_s, 3.0);
    }

    #[test]
    fn test_blank_lines_dropped_without_credit() {
        let cleaned = Cleaner::default().clean(lyrics(&[(1.0, "   "), (2.0, "hello")]));
        assert_eq!(texts(&cleaned), vec!["hello"]);
        assert!(cleaned.credits.is_empty());
    }

    #[test]
    fn test_kept_lines_are_sorted() {
        let cleaned = Cleaner::default().clean(lyrics(&[(5.0, "b"), (2.0, "a"), (9.0, "c")]));
        assert_eq!(texts(&cleaned), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_header_pass_cuts_prefix_through_last_junk() {
        // narrow window so only the header pass can see these lines
        let cleaner = Cleaner::new(CleanerSettings {
            window: 0,
            ..Default::default()
        });
        let mut input = lyrics(&[
            (1.0, "Love Song - SZA"),
            (2.0, "a real lyric"),
            (3.0, "酷狗音乐 独家"),
            (4.0, "another lyric"),
            (5.0, "more lyric"),
            (6.0, "Composer: late"),
        ]);
        input.lines[1].translation = Some("真的歌词".to_string());

        let cleaned = cleaner.clean(input);
        assert_eq!(texts(&cleaned), vec!["another lyric", "more lyric", "Composer: late"]);
        assert_eq!(cleaned.credits.len(), 3);
    }

    #[test]
    fn test_header_title_artist_with_real_translation_kept() {
        let cleaner = Cleaner::new(CleanerSettings {
            window: 0,
            ..Default::default()
        });
        let input = LyricsResult::new(vec![
            Line::new(1.0, 1.0, "Run run - away").with_translation("快跑"),
            Line::new(2.0, 2.0, "lyric"),
        ]);

        let cleaned = cleaner.clean(input);
        assert_eq!(cleaned.lines.len(), 2);
    }

    #[test]
    fn test_header_junk_in_translation() {
        let cleaner = Cleaner::new(CleanerSettings {
            window: 0,
            ..Default::default()
        });
        let input = LyricsResult::new(vec![
            Line::new(1.0, 1.0, "hello").with_translation("QQ音乐享有本翻译作品的著作权"),
            Line::new(2.0, 2.0, "lyric"),
        ]);

        let cleaned = cleaner.clean(input);
        assert_eq!(texts(&cleaned), vec!["lyric"]);
        assert_eq!(cleaned.credits, vec!["hello".to_string()]);
    }
}
