//! Restores masked words (`f**k`, `sh*t`, ...) in lyric text.
//!
//! Entries are applied in order, so compound words come before their parts.
//! A mask that ends the word captures the following character as `tail`:
//! `*` is not a word character, so `\b` cannot mark the end of such a word.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{debug, info};

use super::model::LyricsResult;

const UNCENSOR_TABLE: &[(&str, &str)] = &[
    // compound words
    (r"\bmotherf\*+kin[g']?\b", "motherfuckin"),
    (r"\bmotherf\*+in[g']?\b", "motherfuckin"),
    (r"\bmotherf\*+r\b", "motherfucker"),
    (r"\bmotherf\*+er\b", "motherfucker"),
    (r"\bmotherf\*+k\b", "motherfucker"),
    (r"\bm\*therf\*+er\b", "motherfucker"),
    (r"\bbullsh\*+t\b", "bullshit"),
    (r"\bbullsh\*+(?P<tail>[^\w*]|$)", "bullshit"),
    (r"\bjacka\*+(?P<tail>[^\w*]|$)", "jackass"),
    (r"\bgoddam\*(?P<tail>[^\w*]|$)", "goddamn"),
    (r"\bgodd\*mn\b", "goddamn"),
    // f
    (r"\bf\*+k\b", "fuck"),
    (r"\bfu\*+(?P<tail>[^\w*]|$)", "fuck"),
    (r"\bf\*ck\b", "fuck"),
    (r"\bfuc\*(?P<tail>[^\w*]|$)", "fuck"),
    (r"\bf\*+king\b", "fucking"),
    (r"\bfu\*+in\b", "fuckin"),
    (r"\bfu\*+in'\b", "fuckin'"),
    (r"\bf\*+ked\b", "fucked"),
    // b
    (r"\bb\*+hes\b", "bitches"),
    (r"\bb\*+h\b", "bitch"),
    (r"\bb\*+ch\b", "bitch"),
    (r"\bbit\*+(?P<tail>[^\w*]|$)", "bitch"),
    // s
    (r"\bs\*+t\b", "shit"),
    (r"\bsh\*+(?P<tail>[^\w*]|$)", "shit"),
    (r"\bsh\*t\b", "shit"),
    (r"\bsh\*tty\b", "shitty"),
    // anatomy
    (r"\bp\*+y\b", "pussy"),
    (r"\bpus\*+(?P<tail>[^\w*]|$)", "pussy"),
    (r"\bd\*+k\b", "dick"),
    (r"\bdic\*(?P<tail>[^\w*]|$)", "dick"),
    (r"\bcoc\*(?P<tail>[^\w*]|$)", "cock"),
    (r"\bc\*ck\b", "cock"),
    (r"\bc\*+t\b", "cunt"),
    (r"\bcun\*(?P<tail>[^\w*]|$)", "cunt"),
    (r"\bti\*+s\b", "tits"),
    (r"\bt\*ts\b", "tits"),
    (r"\bbo\*+bs\b", "boobs"),
    (r"\borgas\*(?P<tail>[^\w*]|$)", "orgasm"),
    (r"\bpe\*is\b", "penis"),
    (r"\bvagi\*a\b", "vagina"),
    (r"\bho\*(?P<tail>[^\w*]|$)", "hoe"),
    // insults
    (r"\ba\*+(?P<tail>[^\w*]|$)", "ass"),
    (r"\bass\*+(?P<tail>[^\w*]|$)", "asshole"),
    (r"\ba\*\*hole\b", "asshole"),
    (r"\bba\*+ard\b", "bastard"),
    // slurs
    (r"\bn\*+a\b", "nigga"),
    (r"\bni\*\*a\b", "nigga"),
    (r"\bn\*+er\b", "nigger"),
    (r"\bni\*\*\*r\b", "nigger"),
    (r"\bwh\*+e\b", "whore"),
    (r"\bwhor\*(?P<tail>[^\w*]|$)", "whore"),
    (r"\bsl\*+(?P<tail>[^\w*]|$)", "slut"),
    (r"\bfag\*+t\b", "faggot"),
    (r"\bret\*+d\b", "retard"),
    // drugs and violence
    (r"\bwee\*(?P<tail>[^\w*]|$)", "weed"),
    (r"\bw\*\*d\b", "weed"),
    (r"\bcoc\*ine\b", "cocaine"),
    (r"\bco\*aine\b", "cocaine"),
    (r"\bco\*e\b", "coke"),
    (r"\bhe\*oin\b", "heroin"),
    (r"\bmoli\*(?P<tail>[^\w*]|$)", "molly"),
    (r"\bperc\*cet\b", "percocet"),
    (r"\bxan\*x\b", "xanax"),
    (r"\bgu\*(?P<tail>[^\w*]|$)", "gun"),
    (r"\bsh\*+t\b", "shoot"),
    (r"\bki\*l\b", "kill"),
    (r"\bmurd\*r\b", "murder"),
    (r"\bsuic\*de\b", "suicide"),
    // mild
    (r"\bd\*+n\b", "damn"),
    (r"\bdam\*(?P<tail>[^\w*]|$)", "damn"),
    (r"\bd\*mn\b", "damn"),
    (r"\bhel\*(?P<tail>[^\w*]|$)", "hell"),
    (r"\bh\*ll\b", "hell"),
    (r"\bse\*(?P<tail>[^\w*]|$)", "sex"),
    (r"\bs\*x\b", "sex"),
];

static COMPILED: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    UNCENSOR_TABLE
        .iter()
        .map(|(pattern, replacement)| {
            let regex = Regex::new(&format!("(?i){}", pattern)).expect("uncensor pattern");
            (regex, *replacement)
        })
        .collect()
});

fn match_case(original: &str, replacement: &str) -> String {
    let has_cased = original.chars().any(|c| c.is_lowercase() || c.is_uppercase());
    if has_cased && !original.chars().any(char::is_lowercase) {
        return replacement.to_uppercase();
    }

    if original.chars().next().map_or(false, char::is_uppercase) {
        let mut chars = replacement.chars();
        return match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
            None => String::new(),
        };
    }

    replacement.to_string()
}

/// Restores masked words in one string, keeping the masked word's casing.
pub fn uncensor_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut result = text.to_string();
    for (regex, replacement) in COMPILED.iter() {
        if regex.is_match(&result) {
            result = regex
                .replace_all(&result, |caps: &Captures| {
                    let tail = caps.name("tail").map_or("", |m| m.as_str());
                    let word = &caps[0][..caps[0].len() - tail.len()];
                    format!("{}{}", match_case(word, replacement), tail)
                })
                .into_owned();
        }
    }
    result
}

/// Applies [`uncensor_text`] to every line's text and translation.
pub fn uncensor_lyrics(mut lyrics: LyricsResult) -> LyricsResult {
    let mut changed = 0usize;

    for line in &mut lyrics.lines {
        let restored = uncensor_text(&line.text);
        if restored != line.text {
            debug!("Uncensored: {:?} -> {:?}", line.text, restored);
            line.text = restored;
            changed += 1;
        }

        if let Some(translation) = line.translation.as_mut() {
            let restored = uncensor_text(translation);
            if restored != *translation {
                *translation = restored;
                changed += 1;
            }
        }
    }

    if changed > 0 {
        info!("Uncensored {} line(s)", changed);
    }
    lyrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lyrics::model::Line;

    #[test]
    fn test_basic_restoration() {
        assert_eq!(uncensor_text("what the f**k is this"), "what the fuck is this");
        assert_eq!(uncensor_text("no sh*t"), "no shit");
    }

    #[test]
    fn test_case_is_preserved() {
        assert_eq!(uncensor_text("F**K"), "FUCK");
        assert_eq!(uncensor_text("F**k it"), "Fuck it");
        assert_eq!(uncensor_text("f**k"), "fuck");
    }

    #[test]
    fn test_compound_before_parts() {
        assert_eq!(uncensor_text("you motherf**er"), "you motherfucker");
        assert_eq!(uncensor_text("that's bullsh*t"), "that's bullshit");
    }

    #[test]
    fn test_trailing_mask_only_at_word_end() {
        assert_eq!(uncensor_text("oh sh** man"), "oh shit man");
        assert_eq!(uncensor_text("a**hole"), "asshole");
        assert_eq!(uncensor_text("fu**in around"), "fuckin around");
    }

    #[test]
    fn test_clean_text_untouched() {
        let text = "shake it off, 5 * 3 = 15";
        assert_eq!(uncensor_text(text), text);
    }

    #[test]
    fn test_lyrics_text_and_translation() {
        let lyrics = LyricsResult::new(vec![
            Line::new(1.0, 1.0, "d**n girl").with_translation("h*ll yeah"),
            Line::new(2.0, 2.0, "fine"),
        ]);
        let restored = uncensor_lyrics(lyrics);
        assert_eq!(restored.lines[0].text, "damn girl");
        assert_eq!(restored.lines[0].translation.as_deref(), Some("hell yeah"));
        assert_eq!(restored.lines[1].text, "fine");
    }
}
