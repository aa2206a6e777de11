use std::time::Duration;
use indicatif::{ProgressBar, ProgressStyle};

/// Spinner shown while a lyric search is in flight
pub fn create_search_spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .expect("valid spinner template"),
    );
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

pub fn searching_for(artist: &str, title: &str) -> String {
    if artist.is_empty() {
        format!("🔍 Searching: {}", title)
    } else {
        format!("🔍 Searching: {} - {}", artist, title)
    }
}
