//! Gameplay constants shared by the viewport projector and the client session.
//!
//! These mirror the server's rendering conventions; the config defaults are
//! built from them.

use std::time::Duration;

/// Side length of the square world-space crop rendered around the player.
pub const VIEWPORT_SIZE: f64 = 600.0;

/// Objects farther than this from the crop center are culled.
pub const CULL_RADIUS: f64 = 550.0;

/// Health value that fills a player's health bar. Anything above it is absorption.
pub const NOMINAL_MAX_HEALTH: f64 = 20.0;

/// Outer width of a player's health bar in layout pixels.
pub const HEALTH_BAR_WIDTH: f64 = 40.0;

/// Upper bound on how long the initial connect may take.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Cap on session loop iterations per second.
pub const MAX_TICK_RATE_HZ: u32 = 60;

/// Largest frame payload accepted from the server (16 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Default server address when none is given on the command line.
pub const DEFAULT_SERVER_ADDRESS: &str = "0.0.0.0";

/// Default server port when none is given on the command line.
pub const DEFAULT_SERVER_PORT: u16 = 9999;
