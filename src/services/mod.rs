//! Service layer wiring configuration into the lyric pipeline
//!
//! - `ServiceFactory`: builds the shared HTTP client, providers and collaborators
//! - `Services`: the container handed to CLI commands

pub mod container;
pub mod factory;

pub use container::Services;
pub use factory::ServiceFactory;
