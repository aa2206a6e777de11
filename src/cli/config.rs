use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::Config;

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration (file plus environment)
    Show,

    /// Print the configuration file path
    Path,
}

/// Keeps the first four characters of secrets.
fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}****", visible)
}

fn redacted(config: &Config) -> Config {
    let mut shown = config.clone();
    shown.enrich_key = shown.enrich_key.as_deref().map(mask_secret);
    shown
}

pub async fn execute(args: ConfigArgs, config: &Config) -> Result<()> {
    match args.command {
        ConfigCommands::Show => {
            println!("⚙️  Effective configuration");
            println!("═════════════════════════");
            println!("{}", toml::to_string_pretty(&redacted(config))?);
        }
        ConfigCommands::Path => {
            println!("{}", Config::config_path()?.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_masked() {
        let config = Config {
            enrich_key: Some("sk-abcdef123456".to_string()),
            ..Config::default()
        };
        let shown = toml::to_string_pretty(&redacted(&config)).unwrap();
        assert!(shown.contains("sk-a****"));
        assert!(!shown.contains("123456"));
    }
}
