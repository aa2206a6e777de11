//! Normalized lyric model and the text passes that produce it.

pub mod cleaner;
pub mod model;
pub mod parser;
pub mod uncensor;

pub use cleaner::{Cleaner, CleanerSettings};
pub use model::{
    format_timestamp, AiConfig, EnrichmentStatus, Line, LyricsKind, LyricsResult,
    ScoredCandidate, SearchCandidate, SongQuery,
};
