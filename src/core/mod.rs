//! Core functionality modules
//!
//! - `crypto`: payload ciphers used by the lyric providers
//! - `lyrics`: the normalized model, parser and text passes
//! - `services`: provider clients, translation and enrichment
//! - `infrastructure`: result caching
//! - `matching` / `orchestrator`: candidate ranking and the fetch pipeline

pub mod crypto;
pub mod infrastructure;
pub mod lyrics;
pub mod matching;
pub mod orchestrator;
pub mod services;

pub use orchestrator::{LyricsService, PipelineSettings};
