//! Configuration system for the Raiders client.
//!
//! Provides runtime-configurable settings that persist to disk as RON files,
//! CLI overrides via clap, and the named gameplay constants shared by the
//! viewport projector and the client session.

mod cli;
mod config;
pub mod constants;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, NetworkConfig, RenderConfig, ViewportConfig};
pub use error::ConfigError;
