use anyhow::Result;
use clap::Args;

use crate::cli::output::{render, OutputFormat};
use crate::error::{LyricsError, NetworkError};
use crate::services::Services;

#[derive(Args)]
pub struct FetchArgs {
    /// Provider name as shown in search results (e.g. "QQ Music", "unified:netease")
    #[arg(value_name = "PROVIDER")]
    provider: String,

    /// Provider-specific song id
    #[arg(value_name = "SONG_ID")]
    song_id: String,

    /// Style instruction for AI translation (results are not cached)
    #[arg(short, long)]
    style: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,
}

pub async fn execute(args: FetchArgs, services: &Services) -> Result<()> {
    let lyrics_service = services.lyrics().await?;

    if !lyrics_service
        .provider_names()
        .iter()
        .any(|name| name.eq_ignore_ascii_case(&args.provider))
    {
        println!("Available providers: {}", lyrics_service.provider_names().join(", "));
        return Err(NetworkError::UnknownProvider { name: args.provider }.into());
    }

    let lyrics = lyrics_service
        .get_standardized_lyrics(&args.song_id, &args.provider, args.style.as_deref(), None, None)
        .await
        .ok_or(LyricsError::NotFound)?;

    render(&lyrics, args.format)
}
