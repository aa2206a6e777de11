use anyhow::Result;
use clap::{Args, Subcommand};
use tracing::info;

use crate::services::Services;

#[derive(Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    command: CacheCommands,
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show cache statistics
    Stats,

    /// Clear all cached lyrics
    Clear,
}

pub async fn execute(args: CacheArgs, services: &Services) -> Result<()> {
    let Some(store) = services.store().await? else {
        println!("ℹ️  Lyrics cache is disabled (cache_enabled = false)");
        return Ok(());
    };

    match args.command {
        CacheCommands::Stats => {
            let stats = store.stats().await;

            println!("📊 Cache Statistics");
            println!("══════════════════");
            println!("🗄️  Backend: {}", stats.backend);
            println!("📁 Directory: {}", services.config().cache_dir.display());
            println!("🗂️  Total Entries: {}", stats.total_entries);
            println!("📈 Total Requests: {}", stats.total_requests);
            println!("✅ Cache Hits: {}", stats.cache_hits);
            println!("📊 Hit Rate: {:.1}%", stats.hit_rate_percent);
        }

        CacheCommands::Clear => {
            info!("🗑️ Clearing cache...");
            let removed = store.clear().await?;

            println!("✅ Cache cleared successfully!");
            println!("🗑️ Removed {} cached lyric records", removed);
        }
    }

    Ok(())
}
