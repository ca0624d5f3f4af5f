//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::ConfigError;

const CONFIG_FILE: &str = "config.ron";

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Server connection settings.
    pub network: NetworkConfig,
    /// Viewport geometry used to lay out each snapshot.
    pub viewport: ViewportConfig,
    /// Window and frame output settings.
    pub render: RenderConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Server connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Server host name or IP address.
    pub server_address: String,
    /// Server port.
    pub server_port: u16,
    /// Identifier this client registers under.
    pub player_id: u32,
    /// Initial connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Largest accepted frame payload in bytes.
    pub max_payload_size: u32,
}

/// Viewport geometry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewportConfig {
    /// Side length of the square crop around the local player.
    pub size: f64,
    /// Radius around the crop center beyond which objects are culled.
    pub cull_radius: f64,
    /// Health that fills a health bar.
    pub max_health: f64,
    /// Outer width of a health bar.
    pub health_bar_width: f64,
}

/// Window and frame output configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// Window width in pixels.
    pub window_width: u32,
    /// Window height in pixels.
    pub window_height: u32,
    /// Cap on frames per second (0 = unlimited).
    pub max_fps: u32,
    /// Directory composed frames are written to as PNG, if any.
    pub frames_dir: Option<PathBuf>,
    /// Write every Nth composed frame when `frames_dir` is set.
    pub frame_dump_interval: u32,
    /// Run without a window: frames are only composed and optionally dumped.
    pub headless: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Also write JSON logs to the platform log directory.
    pub file_logging: bool,
}

// --- Default implementations ---

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_address: constants::DEFAULT_SERVER_ADDRESS.to_string(),
            server_port: constants::DEFAULT_SERVER_PORT,
            player_id: 0,
            connect_timeout_ms: constants::CONNECT_TIMEOUT.as_millis() as u64,
            max_payload_size: constants::MAX_PAYLOAD_SIZE,
        }
    }
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            size: constants::VIEWPORT_SIZE,
            cull_radius: constants::CULL_RADIUS,
            max_health: constants::NOMINAL_MAX_HEALTH,
            health_bar_width: constants::HEALTH_BAR_WIDTH,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            window_width: 800,
            window_height: 800,
            max_fps: constants::MAX_TICK_RATE_HZ,
            frames_dir: None,
            frame_dump_interval: 60,
            headless: false,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            file_logging: false,
        }
    }
}

impl NetworkConfig {
    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

// --- Load / Save / Validate ---

/// Largest accepted viewport side and window dimension, in pixels.
const MAX_VIEWPORT_SIZE: f64 = 4096.0;
const MAX_WINDOW_DIMENSION: u32 = 8192;

impl Config {
    /// Load config from the given directory, or create a default config file.
    ///
    /// A file that parses but holds unusable values is rejected with
    /// [`ConfigError::Invalid`].
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE);

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            config.validate()?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join(CONFIG_FILE);
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(2)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Check the values the projector and the window rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let viewport = &self.viewport;
        if !(viewport.size.is_finite() && viewport.size > 0.0 && viewport.size <= MAX_VIEWPORT_SIZE)
        {
            return Err(invalid(
                "viewport.size",
                format!("{} is not in (0, {MAX_VIEWPORT_SIZE}]", viewport.size),
            ));
        }
        positive("viewport.cull_radius", viewport.cull_radius)?;
        positive("viewport.max_health", viewport.max_health)?;
        positive("viewport.health_bar_width", viewport.health_bar_width)?;

        window_dimension("render.window_width", self.render.window_width)?;
        window_dimension("render.window_height", self.render.window_height)?;

        if self.network.max_payload_size == 0 {
            return Err(invalid("network.max_payload_size", "must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("{value} is not a positive number")))
    }
}

fn window_dimension(field: &'static str, value: u32) -> Result<(), ConfigError> {
    if (1..=MAX_WINDOW_DIMENSION).contains(&value) {
        Ok(())
    } else {
        Err(invalid(
            field,
            format!("{value} is not in 1..={MAX_WINDOW_DIMENSION}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = Config::default();
        assert_eq!(config.network.server_address, "0.0.0.0");
        assert_eq!(config.network.server_port, 9999);
        assert_eq!(config.network.player_id, 0);
        assert_eq!(config.network.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.viewport.size, 600.0);
        assert_eq!(config.viewport.cull_radius, 550.0);
        assert_eq!(config.viewport.max_health, 20.0);
        assert_eq!(config.render.max_fps, 60);
    }

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::new().depth_limit(2))
                .unwrap();
        assert!(ron_str.contains("server_port: 9999"));
        assert!(ron_str.contains("cull_radius: 550"));
    }

    #[test]
    fn test_config_roundtrip() {
        let mut config = Config::default();
        config.render.frames_dir = Some(PathBuf::from("frames"));
        let ron_str = ron::to_string(&config).unwrap();
        let deserialized: Config = ron::from_str(&ron_str).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_section_uses_default() {
        let ron_str = "(network: (server_port: 4000))";
        let config: Config = ron::from_str(ron_str).unwrap();
        assert_eq!(config.network.server_port, 4000);
        assert_eq!(config.network.server_address, "0.0.0.0");
        assert_eq!(config.viewport, ViewportConfig::default());
    }

    #[test]
    fn test_extra_field_ignored() {
        let result: Result<Config, _> = ron::from_str("(future_setting: true)");
        assert!(result.is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.network.server_address = "10.0.0.1".to_string();
        config.network.player_id = 7;
        config.render.window_width = 1024;

        config.save(dir.path()).unwrap();
        let loaded = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_load_or_create_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_create(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(dir.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn test_invalid_ron_produces_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{{not valid}}").unwrap();
        let result = Config::load_or_create(dir.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_bad_viewport_values_are_rejected() {
        for size in [0.0, -600.0, f64::NAN, f64::INFINITY, 100_000.0] {
            let mut config = Config::default();
            config.viewport.size = size;
            assert!(
                matches!(
                    config.validate(),
                    Err(ConfigError::Invalid { field: "viewport.size", .. })
                ),
                "size {size} should be rejected"
            );
        }

        let mut config = Config::default();
        config.viewport.cull_radius = f64::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "viewport.cull_radius", .. })
        ));

        let mut config = Config::default();
        config.viewport.max_health = 0.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "viewport.max_health", .. })
        ));
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let mut config = Config::default();
        config.render.window_height = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "render.window_height", .. })
        ));
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "(viewport: (size: 0.0))").unwrap();
        let result = Config::load_or_create(dir.path());
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { field: "viewport.size", .. })
        ));
    }
}
