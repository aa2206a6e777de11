//! Error handling for the lyricsync application
//!
//! This module provides a hierarchical error system. Cipher and parser failures
//! are typed so the orchestrator can decide per candidate whether to fall back
//! to plain text or move on to the next result.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LyricSyncError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Lyrics processing error: {0}")]
    Lyrics(#[from] LyricsError),

    #[error("Decryption error: {0}")]
    Decryption(#[from] DecryptionError),

    #[error("Parsing error: {0}")]
    Parsing(#[from] ParsingError),

    #[error("Enrichment error: {0}")]
    Enrichment(#[from] EnrichmentError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API rate limit exceeded")]
    RateLimit,

    #[error("API response invalid: {reason}")]
    InvalidResponse { reason: String },

    #[error("Unknown provider: {name}")]
    UnknownProvider { name: String },

    #[error("Timeout exceeded")]
    Timeout,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid config format: {0}")]
    InvalidFormat(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Environment variable error: {0}")]
    Environment(#[from] std::env::VarError),
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis connection failed: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("File cache error: {0}")]
    FileCache(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    Serialization(serde_json::Error),
}

#[derive(Error, Debug)]
pub enum LyricsError {
    #[error("No matching lyrics found")]
    NotFound,
}

/// Failure to recover plaintext from a platform payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptionError {
    #[error("invalid hex input: {0}")]
    InvalidHex(String),

    #[error("invalid base64 input: {0}")]
    InvalidBase64(String),

    #[error("payload too short ({len} bytes)")]
    TooShort { len: usize },

    #[error("decompression failed: {0}")]
    Decompress(String),

    #[error("decrypted payload is not valid UTF-8")]
    Utf8,

    #[error("cipher setup failed: {0}")]
    Cipher(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("unexpected lyric structure: {reason}")]
    Unexpected { reason: String },

    #[error("payload rejected by upstream: {reason}")]
    Rejected { reason: String },
}

#[derive(Error, Debug)]
pub enum EnrichmentError {
    #[error("enrichment request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("enrichment response invalid: {reason}")]
    InvalidResponse { reason: String },
}

pub type Result<T> = std::result::Result<T, LyricSyncError>;

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err)
    }
}

impl From<std::io::Error> for LyricSyncError {
    fn from(err: std::io::Error) -> Self {
        LyricSyncError::Cache(CacheError::FileCache(err))
    }
}

impl From<serde_json::Error> for LyricSyncError {
    fn from(err: serde_json::Error) -> Self {
        LyricSyncError::Cache(CacheError::Serialization(err))
    }
}

impl From<reqwest::Error> for LyricSyncError {
    fn from(err: reqwest::Error) -> Self {
        LyricSyncError::Network(NetworkError::Http(err))
    }
}

impl From<toml::de::Error> for LyricSyncError {
    fn from(err: toml::de::Error) -> Self {
        LyricSyncError::Config(ConfigError::InvalidFormat(err))
    }
}

