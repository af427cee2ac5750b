use companion_core::voice::Voice;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub renderer_url: String,
    pub renderer_timeout: Duration,
    /// Sprite directory; every `*.png` in it is a pose.
    pub library_dir: PathBuf,
    pub catalog_path: PathBuf,
    pub voice_temp_dir: PathBuf,
    pub default_voice: Voice,
    pub tts_bin: PathBuf,
    pub tts_timeout: Duration,
    /// Player command line; `{file}` is replaced by the clip path.
    pub audio_player: String,
    pub max_clip_duration: Duration,
    pub playback_gap: Duration,
    pub cleanup_delay: Duration,
    pub giphy_api_key: Option<String>,
    pub giphy_base_url: String,
    pub log_level: Level,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = var_or(name, default);
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("'{raw}': {e}")))
}

fn millis_var(name: &str, default: u64) -> Result<Duration, ConfigError> {
    parse_var::<u64>(name, &default.to_string()).map(Duration::from_millis)
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let renderer_url = var_or("RENDERER_URL", companion_core::renderer::DEFAULT_RENDERER_URL);
        if !renderer_url.starts_with("http://") && !renderer_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "RENDERER_URL".to_string(),
                format!("'{renderer_url}' is not an http URL"),
            ));
        }
        let renderer_timeout = millis_var("RENDERER_TIMEOUT_MS", 2000)?;

        let library_dir = PathBuf::from(var_or("AVATAR_LIBRARY_DIR", "./avatar/library"));
        let catalog_path = std::env::var("ANIMATION_CATALOG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| library_dir.join("animations").join("animations.jsonl"));
        let voice_temp_dir = PathBuf::from(var_or("VOICE_TEMP_DIR", "./temp_voice"));

        let voice_str = var_or("DEFAULT_VOICE", Voice::default().id());
        let default_voice = voice_str.parse::<Voice>().map_err(|_| {
            ConfigError::InvalidValue(
                "DEFAULT_VOICE".to_string(),
                format!("'{voice_str}' is not a known voice"),
            )
        })?;

        let tts_bin = PathBuf::from(var_or("TTS_BIN", "edge-tts"));
        let tts_timeout = millis_var("TTS_TIMEOUT_MS", 30_000)?;

        let audio_player = var_or(
            "AUDIO_PLAYER",
            "ffplay -nodisp -autoexit -loglevel quiet {file}",
        );
        if audio_player.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "AUDIO_PLAYER".to_string(),
                "player command must not be empty".to_string(),
            ));
        }
        let max_clip_duration = Duration::from_secs(parse_var("MAX_CLIP_SECONDS", "120")?);
        let playback_gap = millis_var("PLAYBACK_GAP_MS", 500)?;
        let cleanup_delay = millis_var("CLEANUP_DELAY_MS", 1000)?;

        let giphy_api_key = std::env::var("GIPHY_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        let giphy_base_url = var_or("GIPHY_BASE_URL", companion_core::gif::DEFAULT_GIPHY_URL);

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            renderer_url,
            renderer_timeout,
            library_dir,
            catalog_path,
            voice_temp_dir,
            default_voice,
            tts_bin,
            tts_timeout,
            audio_player,
            max_clip_duration,
            playback_gap,
            cleanup_delay,
            giphy_api_key,
            giphy_base_url,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: [&str; 15] = [
        "RENDERER_URL",
        "RENDERER_TIMEOUT_MS",
        "AVATAR_LIBRARY_DIR",
        "ANIMATION_CATALOG",
        "VOICE_TEMP_DIR",
        "DEFAULT_VOICE",
        "TTS_BIN",
        "TTS_TIMEOUT_MS",
        "AUDIO_PLAYER",
        "MAX_CLIP_SECONDS",
        "PLAYBACK_GAP_MS",
        "CLEANUP_DELAY_MS",
        "GIPHY_API_KEY",
        "GIPHY_BASE_URL",
        "RUST_LOG",
    ];

    fn clear_env_vars() {
        for var in VARS {
            unsafe {
                env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_config_error_display() {
        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_env_vars();

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.renderer_url, "http://localhost:3338");
        assert_eq!(config.renderer_timeout, Duration::from_secs(2));
        assert_eq!(config.library_dir, PathBuf::from("./avatar/library"));
        assert_eq!(
            config.catalog_path,
            PathBuf::from("./avatar/library/animations/animations.jsonl")
        );
        assert_eq!(config.voice_temp_dir, PathBuf::from("./temp_voice"));
        assert_eq!(config.default_voice, Voice::Nanami);
        assert_eq!(config.tts_bin, PathBuf::from("edge-tts"));
        assert!(config.audio_player.starts_with("ffplay"));
        assert_eq!(config.playback_gap, Duration::from_millis(500));
        assert_eq!(config.cleanup_delay, Duration::from_millis(1000));
        assert_eq!(config.giphy_api_key, None);
        assert_eq!(config.giphy_base_url, "https://api.giphy.com/v1/gifs");
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    #[serial]
    fn test_config_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("RENDERER_URL", "http://127.0.0.1:9000");
            env::set_var("RENDERER_TIMEOUT_MS", "750");
            env::set_var("AVATAR_LIBRARY_DIR", "/opt/avatar");
            env::set_var("DEFAULT_VOICE", "en-us-jennyneural");
            env::set_var("PLAYBACK_GAP_MS", "0");
            env::set_var("GIPHY_API_KEY", "test-giphy-key");
            env::set_var("RUST_LOG", "debug");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.renderer_url, "http://127.0.0.1:9000");
        assert_eq!(config.renderer_timeout, Duration::from_millis(750));
        assert_eq!(
            config.catalog_path,
            PathBuf::from("/opt/avatar/animations/animations.jsonl")
        );
        assert_eq!(config.default_voice, Voice::Jenny);
        assert_eq!(config.playback_gap, Duration::ZERO);
        assert_eq!(config.giphy_api_key, Some("test-giphy-key".to_string()));
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    #[serial]
    fn test_config_catalog_override() {
        clear_env_vars();
        unsafe {
            env::set_var("ANIMATION_CATALOG", "/tmp/anims.jsonl");
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.catalog_path, PathBuf::from("/tmp/anims.jsonl"));
    }

    #[test]
    #[serial]
    fn test_config_invalid_values() {
        for (var, value) in [
            ("RENDERER_TIMEOUT_MS", "soon"),
            ("PLAYBACK_GAP_MS", "-5"),
            ("DEFAULT_VOICE", "robot"),
            ("RENDERER_URL", "localhost:3338"),
            ("AUDIO_PLAYER", "   "),
            ("RUST_LOG", "not-a-level"),
        ] {
            clear_env_vars();
            unsafe {
                env::set_var(var, value);
            }

            let ConfigError::InvalidValue(name, _) = Config::from_env().unwrap_err();
            assert_eq!(name, var);
        }
        clear_env_vars();
    }
}
