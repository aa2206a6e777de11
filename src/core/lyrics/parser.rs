//! Timed-lyrics parser.
//!
//! Understands three dialects and folds them into [`LyricsResult`]:
//! - `[start_ms,dur_ms]text(abs_ms,dur_ms)...` with absolute word timing
//! - `[start_ms,dur_ms]<off_ms,dur_ms,flag>text...` with word timing relative to the line
//! - `[mm:ss.xx]text` line timing only
//!
//! A separate `[mm:ss.xx]` translation stream is aligned afterwards by
//! reverse best match.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use super::model::{Line, LyricsResult, Word};
use crate::error::ParsingError;

/// Translation timestamps may sit this far from their line.
pub const TRANSLATION_TOLERANCE_S: f64 = 0.5;

static METADATA_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\[(?:ti|ar|al|au|length|by|offset|re|ve|tool|wrd|#|language|duration|encoding|total|manufacturer|qq|src|app_name|ver|la):")
        .expect("metadata tag regex")
});

static ENCODED_BRACKET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[[a-zA-Z_]+:[a-zA-Z0-9+/=_-]{20,}\]?$").expect("encoded bracket regex")
});

static LRC_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d+):(\d+(?:\.\d+)?)\](.*)").expect("lrc time regex"));

static WRAPPER_ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"LyricContent="([^"]+)""#).expect("wrapper attribute regex"));

static SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\][^\[]*").expect("segment regex"));

static ABSOLUTE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\[(\d+),(\d+)\](.*)").expect("absolute line regex"));

static LRC_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\[(\d+):(\d+(?:\.\d+)?)\](.*)").expect("lrc line regex"));

static RELATIVE_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(\d+),(\d+),(\d+)>([^<]*)").expect("relative word regex"));

static ABSOLUTE_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^()]*?)\((\d+),(\d+)\)").expect("absolute word regex"));

/// Translation text keyed by start time in centiseconds.
pub type TranslationMap = BTreeMap<i64, String>;

fn is_metadata_segment(text: &str) -> bool {
    METADATA_TAG.is_match(text) || ENCODED_BRACKET.is_match(text)
}

fn seconds(minutes: &str, secs: &str) -> f64 {
    let m: f64 = minutes.parse().unwrap_or(0.0);
    let s: f64 = secs.parse().unwrap_or(0.0);
    m * 60.0 + s
}

fn millis_to_seconds(ms: &str) -> f64 {
    ms.parse::<f64>().unwrap_or(0.0) / 1000.0
}

/// Builds the `time -> translation` map from an LRC translation stream.
///
/// `//` marks an intentional gap and maps to an empty string. Other entries
/// that are empty or start with `/` are skipped.
pub fn build_translation_map(translation: &str) -> TranslationMap {
    let mut map = TranslationMap::new();

    for raw in translation.lines() {
        let line = raw.trim();
        if line.is_empty() || is_metadata_segment(line) {
            continue;
        }
        let Some(caps) = LRC_TIME.captures(line) else {
            continue;
        };

        let time = seconds(&caps[1], &caps[2]);
        let text = caps[3].trim();
        let text = if text == "//" {
            ""
        } else if text.is_empty() || text == "/" || text.starts_with("//") {
            continue;
        } else {
            text
        };

        map.insert((time * 100.0).round() as i64, text.to_string());
    }

    info!("Built translation map with {} entries", map.len());
    map
}

/// Reverse best match: every translation goes to the single closest line
/// within `tolerance`. When two translations pick the same line the later one wins.
pub fn apply_translations(lines: &mut [Line], map: &TranslationMap, tolerance: f64) {
    if lines.is_empty() {
        return;
    }

    for (key, text) in map {
        let time = *key as f64 / 100.0;
        let mut best: Option<usize> = None;
        let mut min_diff = f64::INFINITY;

        for (idx, line) in lines.iter().enumerate() {
            let diff = (line.start_s - time).abs();
            if diff <= tolerance && diff < min_diff {
                min_diff = diff;
                best = Some(idx);
            }
        }

        if let Some(idx) = best {
            lines[idx].translation = Some(text.clone());
        }
    }
}

fn markup_attribute(input: &str) -> Option<String> {
    let selector = Selector::parse("[lyriccontent]").ok()?;
    let document = Html::parse_document(input);
    let element = document.select(&selector).next()?;
    element
        .value()
        .attr("lyriccontent")
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Pulls the lyric body out of its markup wrapper, or returns the input as-is.
pub fn extract_payload(input: &str) -> String {
    if input.trim_start().starts_with('<') {
        if let Some(content) = markup_attribute(input) {
            return content;
        }
    }
    if let Some(caps) = WRAPPER_ATTRIBUTE.captures(input) {
        return caps[1].to_string();
    }
    input.to_string()
}

fn parse_segment(segment: &str) -> Result<Option<Line>, ParsingError> {
    let (start, end, content) = if let Some(caps) = ABSOLUTE_LINE.captures(segment) {
        let start = millis_to_seconds(&caps[1]);
        let duration = millis_to_seconds(&caps[2]);
        (start, start + duration, caps.get(3).map_or("", |m| m.as_str()))
    } else if let Some(caps) = LRC_LINE.captures(segment) {
        let start = seconds(&caps[1], &caps[2]);
        (start, start, caps.get(3).map_or("", |m| m.as_str()))
    } else {
        (0.0, 0.0, segment)
    };

    if !start.is_finite() || !end.is_finite() {
        return Err(ParsingError::Unexpected {
            reason: format!("timestamp out of range in segment {:?}", segment),
        });
    }

    let mut words = Vec::new();
    if RELATIVE_WORD.is_match(content) {
        for caps in RELATIVE_WORD.captures_iter(content) {
            let word_start = start + millis_to_seconds(&caps[1]);
            words.push(Word {
                text: caps[4].to_string(),
                start_s: word_start,
                end_s: word_start + millis_to_seconds(&caps[2]),
            });
        }
    } else {
        for caps in ABSOLUTE_WORD.captures_iter(content) {
            let word_start = millis_to_seconds(&caps[2]);
            words.push(Word {
                text: caps[1].to_string(),
                start_s: word_start,
                end_s: word_start + millis_to_seconds(&caps[3]),
            });
        }
    }

    if !words.is_empty() {
        let text: String = words.iter().map(|w| w.text.as_str()).collect();
        return Ok(Some(Line::new(start, end, text).with_words(words)));
    }

    let text = content.trim();
    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(Line::new(start, end, text)))
}

/// Parses a timed-lyrics payload, optionally aligning a translation stream.
///
/// Zero recognizable lines is an empty result, not an error.
pub fn parse(payload: &str, translation: Option<&str>) -> Result<LyricsResult, ParsingError> {
    debug!("Parser input length: {}", payload.len());

    let translations = translation
        .filter(|t| !t.trim().is_empty())
        .map(build_translation_map)
        .unwrap_or_default();

    let body = extract_payload(payload);
    if body.trim().is_empty() {
        warn!("Empty lyric body after unwrapping");
        return Ok(LyricsResult::empty());
    }

    let mut segments: Vec<&str> = SEGMENT.find_iter(&body).map(|m| m.as_str()).collect();
    if segments.is_empty() {
        segments = body.split('\n').collect();
    }

    let mut lines = Vec::new();
    for segment in segments {
        let segment = segment.trim();
        if segment.is_empty() || is_metadata_segment(segment) {
            continue;
        }
        if let Some(line) = parse_segment(segment)? {
            lines.push(line);
        }
    }

    if lines.is_empty() {
        warn!("No lines recognized in lyric payload");
        return Ok(LyricsResult::empty());
    }

    apply_translations(&mut lines, &translations, TRANSLATION_TOLERANCE_S);
    Ok(LyricsResult::new(lines))
}

/// Line-oriented `[mm:ss.xx]text` parse, used as the last fallback.
pub fn parse_lrc(text: &str) -> Vec<Line> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(|l| LRC_TIME.captures(l))
        .map(|caps| {
            let time = seconds(&caps[1], &caps[2]);
            Line::new(time, time, caps[3].trim())
        })
        .collect()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Parses the Netease lyric JSON shape `{code, lrc: {lyric}, tlyric: {lyric}}`.
///
/// `Ok(None)` means the text is not this shape (or produced no lines) and
/// other parsers should try. Uncollected or failed answers are rejected.
pub fn parse_netease(text: &str) -> Result<Option<LyricsResult>, ParsingError> {
    let Ok(value) = serde_json::from_str::<Value>(text) else {
        return Ok(None);
    };
    let Some(object) = value.as_object() else {
        return Ok(None);
    };

    if object.get("uncollected").map_or(false, is_truthy) {
        return Err(ParsingError::Rejected {
            reason: "lyrics not collected".to_string(),
        });
    }
    let code = object.get("code").and_then(Value::as_i64);
    if code != Some(200) {
        return Err(ParsingError::Rejected {
            reason: format!("response code {:?}", code),
        });
    }

    let Some(lrc) = object.get("lrc") else {
        return Ok(None);
    };
    let lyric = lrc.get("lyric").and_then(Value::as_str).unwrap_or("");
    if lyric.trim().is_empty() {
        return Err(ParsingError::Rejected {
            reason: "empty lrc body".to_string(),
        });
    }
    let translation = object
        .get("tlyric")
        .and_then(|t| t.get("lyric"))
        .and_then(Value::as_str)
        .unwrap_or("");

    let translations: HashMap<i64, String> = parse_lrc(translation)
        .into_iter()
        .map(|line| (millis_key(line.start_s), line.text))
        .collect();
    info!(
        "Netease lyric: {} chars, {} translation entries",
        lyric.len(),
        translations.len()
    );

    let lines: Vec<Line> = parse_lrc(lyric)
        .into_iter()
        .map(|mut line| {
            line.translation = translations.get(&millis_key(line.start_s)).cloned();
            line
        })
        .collect();

    if lines.is_empty() {
        return Ok(None);
    }
    Ok(Some(LyricsResult::new(lines)))
}

fn millis_key(seconds: f64) -> i64 {
    (seconds * 1000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lyrics::model::LyricsKind;

    const QRC_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<QrcInfos>
<QrcHeadInfo SaveTime="1626079455" Version="100"/>
<LyricInfo LyricCount="1">
<Lyric_1 LyricType="1" LyricContent="[ti:晴天]
[ar:周杰伦]
[offset:0]
[kana:1a2b3c4d5e6f7g8h9i0jklmnop]
[1000,2000]故(1000,500)事(1500,500)的(2000,500)小(2500,500)
[3000,1500]黄(3000,700)色(3700,800)
"/>
</LyricInfo>
</QrcInfos>"#;

    #[test]
    fn test_parse_absolute_word_timing() {
        let result = parse(QRC_XML, None).unwrap();
        assert_eq!(result.kind, LyricsKind::Syllable);
        assert_eq!(result.lines.len(), 2);

        let first = &result.lines[0];
        assert_eq!(first.text, "故事的小");
        assert_eq!(first.start_s, 1.0);
        assert_eq!(first.end_s, 3.0);
        assert_eq!(first.words.len(), 4);

        for line in &result.lines {
            for word in &line.words {
                assert!(word.start_s >= line.start_s && word.end_s <= line.end_s);
            }
        }
    }

    #[test]
    fn test_parse_relative_word_timing() {
        let krc = "[ar:Taylor Swift]\r\n[0,740]<0,380,0>Taylor<380,360,0> Swift\r\n[1000,500]<0,250,0>Hey<250,250,0>!\r\n";
        let result = parse(krc, None).unwrap();
        assert_eq!(result.lines.len(), 2);
        assert_eq!(result.lines[0].text, "Taylor Swift");
        assert_eq!(result.lines[1].words[1].start_s, 1.25);
        assert_eq!(result.lines[1].words[1].end_s, 1.5);
    }

    #[test]
    fn test_parse_line_only_timing() {
        let lrc = "[ti:Song]\n[00:01.50]first line\n[00:04.00]second line\n";
        let result = parse(lrc, None).unwrap();
        assert_eq!(result.kind, LyricsKind::Line);
        assert_eq!(result.lines.len(), 2);
        for line in &result.lines {
            assert!(line.words.is_empty());
            assert_eq!(line.start_s, line.end_s);
        }
        assert_eq!(result.lines[0].start_s, 1.5);
    }

    #[test]
    fn test_attribute_regex_fallback() {
        let wrapped = r#"garbage LyricContent="[1000,500]a(1000,500)" trailing"#;
        let result = parse(wrapped, None).unwrap();
        assert_eq!(result.lines.len(), 1);
        assert_eq!(result.lines[0].text, "a");
    }

    #[test]
    fn test_no_lines_is_empty_result() {
        let result = parse("[ti:only tags][ar:nobody]", None).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_translation_map_placeholders() {
        let map = build_translation_map(
            "[by:someone]\n[00:01.00]你好\n[00:02.00]//\n[00:03.00]/\n[00:04.00]//note\n[00:05.00]\n",
        );
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&100).map(String::as_str), Some("你好"));
        assert_eq!(map.get(&200).map(String::as_str), Some(""));
    }

    #[test]
    fn test_reverse_best_match_picks_closest_line() {
        let mut lines = vec![Line::new(10.0, 10.0, "a"), Line::new(10.3, 10.3, "b")];
        let mut map = TranslationMap::new();
        map.insert(1010, "near a".to_string());
        apply_translations(&mut lines, &map, TRANSLATION_TOLERANCE_S);

        assert_eq!(lines[0].translation.as_deref(), Some("near a"));
        assert_eq!(lines[1].translation, None);
    }

    #[test]
    fn test_reverse_best_match_respects_tolerance() {
        let mut lines = vec![Line::new(10.0, 10.0, "a"), Line::new(10.3, 10.3, "b")];
        let mut map = TranslationMap::new();
        map.insert(1100, "too far".to_string());
        apply_translations(&mut lines, &map, TRANSLATION_TOLERANCE_S);

        assert!(lines.iter().all(|l| l.translation.is_none()));
    }

    #[test]
    fn test_later_translation_wins_same_line() {
        let mut lines = vec![Line::new(10.0, 10.0, "a"), Line::new(20.0, 20.0, "b")];
        let mut map = TranslationMap::new();
        map.insert(990, "first".to_string());
        map.insert(1020, "second".to_string());
        apply_translations(&mut lines, &map, TRANSLATION_TOLERANCE_S);

        assert_eq!(lines[0].translation.as_deref(), Some("second"));
    }

    #[test]
    fn test_parse_with_translation_stream() {
        let lrc = "[00:10.00]hello\n[00:12.00]world\n";
        let trans = "[00:10.05]你好\n[00:12.00]世界\n";
        let result = parse(lrc, Some(trans)).unwrap();
        assert_eq!(result.lines[0].translation.as_deref(), Some("你好"));
        assert_eq!(result.lines[1].translation.as_deref(), Some("世界"));
    }

    #[test]
    fn test_parse_lrc_fallback() {
        let lines = parse_lrc("noise\n[01:02.50] spaced \n[00:00.00]\n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].start_s, 62.5);
        assert_eq!(lines[0].text, "spaced");
        assert_eq!(lines[1].text, "");
    }

    #[test]
    fn test_netease_json_exact_time_join() {
        let json = r#"{"code":200,"lrc":{"lyric":"[00:01.00]hello\n[00:02.50]world\n"},"tlyric":{"lyric":"[00:01.00]你好\n[00:02.60]世界\n"}}"#;
        let result = parse_netease(json).unwrap().unwrap();
        assert_eq!(result.lines.len(), 2);
        assert_eq!(result.lines[0].translation.as_deref(), Some("你好"));
        assert_eq!(result.lines[1].translation, None);
    }

    #[test]
    fn test_netease_rejections() {
        assert!(matches!(
            parse_netease(r#"{"uncollected":true,"code":200}"#),
            Err(ParsingError::Rejected { .. })
        ));
        assert!(matches!(
            parse_netease(r#"{"code":404}"#),
            Err(ParsingError::Rejected { .. })
        ));
        assert!(matches!(
            parse_netease(r#"{"code":200,"lrc":{"lyric":"  "}}"#),
            Err(ParsingError::Rejected { .. })
        ));
    }

    #[test]
    fn test_non_netease_text_passes_through() {
        assert_eq!(parse_netease("[00:01.00]plain").unwrap(), None);
        assert_eq!(parse_netease("[1, 2, 3]").unwrap(), None);
        assert_eq!(parse_netease(r#"{"code":200,"lrc":{"lyric":"no timestamps"}}"#).unwrap(), None);
    }
}
