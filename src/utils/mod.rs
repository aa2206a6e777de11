//! Utility modules for common functionality
//!
//! - `logging`: tracing subscriber setup
//! - `progress`: spinners for long-running commands

pub mod logging;
pub mod progress;
