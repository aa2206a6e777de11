//! Command Line Interface module
//!
//! - `search`: `match`, the full strategy/rank/fetch pipeline
//! - `fetch`: one known candidate through the standardization pipeline
//! - `crypt`: QRC and KRC payload tools
//! - `cache`, `config`: maintenance
//! - `output`: table, JSON and LRC rendering

pub mod cache;
pub mod config;
pub mod crypt;
pub mod fetch;
pub mod output;
pub mod search;
