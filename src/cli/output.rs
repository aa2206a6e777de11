use std::io;
use anyhow::Result;
use clap::ValueEnum;
use crossterm::{
    execute,
    style::{Color, ResetColor, SetForegroundColor},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::core::lyrics::{format_timestamp, LyricsKind, LyricsResult};

const BORDER: Color = Color::Rgb { r: 255, g: 165, b: 0 };
const TIME_WIDTH: usize = 8;
const TEXT_WIDTH: usize = 40;
const TRANSLATION_WIDTH: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Lrc,
}

pub fn render(lyrics: &LyricsResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(lyrics)?),
        OutputFormat::Lrc => print!("{}", lyrics.to_lrc()),
        OutputFormat::Table => output_table(lyrics),
    }
    Ok(())
}

fn colored(text: &str, color: Color) {
    let _ = execute!(io::stdout(), SetForegroundColor(color));
    print!("{}", text);
    let _ = execute!(io::stdout(), ResetColor);
}

fn rule(left: &str, mid: &str, right: &str) -> String {
    format!(
        "{}{}{}{}{}{}{}",
        left,
        "─".repeat(TIME_WIDTH + 2),
        mid,
        "─".repeat(TEXT_WIDTH + 2),
        mid,
        "─".repeat(TRANSLATION_WIDTH + 2),
        right
    )
}

fn row(time: &str, text: &str, translation: &str) {
    colored("│", BORDER);
    print!(" {} ", truncate_string(time, TIME_WIDTH));
    colored("│", BORDER);
    print!(" {} ", truncate_string(text, TEXT_WIDTH));
    colored("│", BORDER);
    print!(" {} ", truncate_string(translation, TRANSLATION_WIDTH));
    colored("│", BORDER);
    println!();
}

fn output_table(lyrics: &LyricsResult) {
    if let Some(meta) = &lyrics.source_metadata {
        colored(&format!("🎵 {} - {}\n", meta.artist, meta.title), Color::Green);
    }
    let kind = match lyrics.kind {
        LyricsKind::Syllable => "syllable",
        LyricsKind::Line => "line",
    };
    println!(
        "📄 {} lines ({}), enrichment: {}",
        lyrics.lines.len(),
        kind,
        lyrics.enrichment_status.as_str()
    );

    colored(&format!("{}\n", rule("┌", "┬", "┐")), BORDER);
    row("Time", "Lyric", "Translation");
    colored(&format!("{}\n", rule("├", "┼", "┤")), BORDER);
    for line in &lyrics.lines {
        row(
            &format_timestamp(line.start_s),
            &line.text,
            line.translation.as_deref().unwrap_or(""),
        );
    }
    colored(&format!("{}\n", rule("└", "┴", "┘")), BORDER);

    if !lyrics.credits.is_empty() {
        println!("\n🏷️  Credits:");
        for credit in &lyrics.credits {
            println!("  • {}", credit);
        }
    }
}

/// Pads or cuts `s` to exactly `max_len` display columns.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    let visual_width = s.width();
    if visual_width <= max_len {
        return format!("{}{}", s, " ".repeat(max_len - visual_width));
    }

    let ellipsis = '…'.width().unwrap_or(1);
    let mut truncated = String::new();
    let mut current_width = 0;
    for ch in s.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if current_width + ch_width + ellipsis > max_len {
            break;
        }
        truncated.push(ch);
        current_width += ch_width;
    }

    truncated.push('…');
    current_width += ellipsis;
    format!("{}{}", truncated, " ".repeat(max_len.saturating_sub(current_width)))
}
