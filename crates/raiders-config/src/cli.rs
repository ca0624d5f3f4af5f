//! Command-line argument parsing for the Raiders client.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Raiders client command-line arguments.
///
/// Positional values follow the `server_address port player_id` order and,
/// like the flags, override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "raiders", about = "Raiders game client")]
pub struct CliArgs {
    /// Server address.
    pub server_address: Option<String>,

    /// Server port.
    pub port: Option<u16>,

    /// Player id to register as.
    pub player_id: Option<u32>,

    /// Window width.
    #[arg(long)]
    pub window_width: Option<u32>,

    /// Window height.
    #[arg(long)]
    pub window_height: Option<u32>,

    /// Write composed frames as PNG into this directory.
    #[arg(long)]
    pub frames_dir: Option<PathBuf>,

    /// Run without opening a window.
    #[arg(long)]
    pub headless: bool,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref addr) = args.server_address {
            self.network.server_address = addr.clone();
        }
        if let Some(port) = args.port {
            self.network.server_port = port;
        }
        if let Some(id) = args.player_id {
            self.network.player_id = id;
        }
        if let Some(w) = args.window_width {
            self.render.window_width = w;
        }
        if let Some(h) = args.window_height {
            self.render.window_height = h;
        }
        if let Some(ref dir) = args.frames_dir {
            self.render.frames_dir = Some(dir.clone());
        }
        if args.headless {
            self.render.headless = true;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
