use anyhow::Result;
use clap::Args;
use tracing::info;

use crate::cli::output::{render, OutputFormat};
use crate::core::lyrics::{AiConfig, SongQuery};
use crate::error::LyricsError;
use crate::services::Services;
use crate::utils::progress;

#[derive(Args)]
pub struct MatchArgs {
    /// Song title to search for
    #[arg(value_name = "TITLE")]
    title: String,

    /// Artist name
    #[arg(short, long, default_value = "")]
    artist: String,

    /// Album name
    #[arg(short = 'l', long)]
    album: Option<String>,

    /// Duration in milliseconds
    #[arg(short, long)]
    duration_ms: Option<u64>,

    /// Style instruction for AI translation (results are not cached)
    #[arg(short, long)]
    style: Option<String>,

    /// Skip the unified API and use the legacy providers only
    #[arg(long)]
    legacy: bool,

    /// Per-request enrichment key, overriding ENRICH_KEY
    #[arg(long)]
    ai_key: Option<String>,

    /// Per-request enrichment endpoint
    #[arg(long)]
    ai_url: Option<String>,

    /// Per-request enrichment model
    #[arg(long)]
    ai_model: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,
}

impl MatchArgs {
    fn query(&self) -> SongQuery {
        let ai_config = (self.ai_key.is_some() || self.ai_url.is_some() || self.ai_model.is_some()).then(|| AiConfig {
            api_key: self.ai_key.clone(),
            base_url: self.ai_url.clone(),
            model: self.ai_model.clone(),
        });

        SongQuery {
            album: self.album.clone(),
            duration_ms: self.duration_ms.unwrap_or(0),
            style_instruction: self.style.clone(),
            ai_config,
            ..SongQuery::new(self.title.trim(), self.artist.trim())
        }
    }
}

pub async fn execute(args: MatchArgs, services: &Services) -> Result<()> {
    let query = args.query();
    let lyrics_service = services.lyrics().await?;

    let spinner = progress::create_search_spinner(progress::searching_for(&query.artist, &query.title));

    let mut found = None;
    if !args.legacy {
        found = lyrics_service.match_best_lyrics_unified(&query).await;
        if found.is_none() {
            info!("Unified API found nothing, falling back to legacy providers");
        }
    }
    if found.is_none() {
        found = lyrics_service.match_best_lyrics(&query).await;
    }
    spinner.finish_and_clear();

    match found {
        Some(lyrics) => render(&lyrics, args.format),
        None => {
            println!("No matching lyrics found");
            Err(LyricsError::NotFound.into())
        }
    }
}
