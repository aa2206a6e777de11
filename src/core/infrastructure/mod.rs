//! Infrastructure and cross-cutting concerns

pub mod cache;

pub use cache::{HybridStore, LyricsStore};
