use std::io::Read;
use std::path::Path;
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use crate::core::crypto::{krc, netease, qrc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CipherKind {
    /// QQ Music QRC (hex text)
    Qrc,
    /// Kugou KRC (base64 text with the krc1 header)
    Krc,
    /// Netease EAPI request `params` or response body (hex)
    Eapi,
}

#[derive(Args)]
pub struct CryptArgs {
    #[arg(value_enum)]
    cipher: CipherKind,

    /// Payload, a file containing it, or `-` for stdin
    #[arg(value_name = "INPUT")]
    input: String,
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read stdin")?;
        return Ok(buffer);
    }

    let path = Path::new(input);
    if path.is_file() {
        return std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()));
    }
    Ok(input.to_string())
}

pub fn decrypt(cipher: CipherKind, payload: &str) -> Result<String> {
    let payload = payload.trim();
    let text = match cipher {
        CipherKind::Qrc => qrc::decrypt(payload)?,
        CipherKind::Krc => krc::decrypt(payload)?,
        CipherKind::Eapi => netease::eapi_decrypt(payload)?,
    };
    Ok(text)
}

pub fn encrypt(cipher: CipherKind, plaintext: &str) -> Result<String> {
    let payload = match cipher {
        CipherKind::Qrc => qrc::encrypt(plaintext)?,
        CipherKind::Krc => krc::encrypt(plaintext)?,
        CipherKind::Eapi => anyhow::bail!("EAPI payloads are produced per request URL; use the match command"),
    };
    Ok(payload)
}

pub async fn execute_decrypt(args: CryptArgs) -> Result<()> {
    let payload = read_input(&args.input)?;
    println!("{}", decrypt(args.cipher, &payload)?);
    Ok(())
}

pub async fn execute_encrypt(args: CryptArgs) -> Result<()> {
    let plaintext = read_input(&args.input)?;
    println!("{}", encrypt(args.cipher, &plaintext)?);
    Ok(())
}
