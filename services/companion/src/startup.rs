//! Builds the component graph from a loaded [`Config`].

use crate::config::Config;
use anyhow::Context;
use companion_core::animation::{AnimationCatalog, PoseLibrary};
use companion_core::coordinator::AvatarStateCoordinator;
use companion_core::gif::{GifGallery, GiphyClient};
use companion_core::playback::{CommandPlayer, PlaybackConfig, PlaybackQueue};
use companion_core::renderer::HttpRenderer;
use companion_core::service::CompanionService;
use companion_core::speaker::Speaker;
use companion_core::synthesis::EdgeTtsSynthesizer;
use std::sync::Arc;
use tracing::{info, warn};

/// Creates the sprite library and voice scratch directories.
pub fn prepare_directories(config: &Config) -> anyhow::Result<()> {
    for dir in [&config.library_dir, &config.voice_temp_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }
    Ok(())
}

pub fn load_catalog(config: &Config) -> anyhow::Result<AnimationCatalog> {
    AnimationCatalog::load(&config.catalog_path).with_context(|| {
        format!(
            "Failed to load animation catalog {}",
            config.catalog_path.display()
        )
    })
}

/// Wires every component into the tool service. Must run inside a Tokio
/// runtime because the playback queue spawns its player task.
pub fn build_service(config: &Config, catalog: AnimationCatalog) -> anyhow::Result<CompanionService> {
    let renderer = HttpRenderer::new(config.renderer_url.clone(), config.renderer_timeout)
        .context("Failed to build renderer client")?;
    let avatar = AvatarStateCoordinator::new(
        Arc::new(renderer),
        catalog,
        PoseLibrary::new(&config.library_dir),
    );

    let player = CommandPlayer::from_command_line(&config.audio_player, config.max_clip_duration)
        .context("AUDIO_PLAYER is empty")?;
    let queue = PlaybackQueue::new(
        Arc::new(player),
        PlaybackConfig {
            gap: config.playback_gap,
            cleanup_delay: config.cleanup_delay,
        },
    );
    let speaker = Speaker::new(
        Arc::new(EdgeTtsSynthesizer::new(&config.tts_bin, config.tts_timeout)),
        queue,
        &config.voice_temp_dir,
        config.default_voice,
    );

    if config.giphy_api_key.is_none() {
        warn!("GIPHY_API_KEY is not set; GIF search will be unavailable");
    }
    let gifs = GifGallery::new(Box::new(GiphyClient::new(
        config.giphy_base_url.clone(),
        config.giphy_api_key.clone(),
    )));

    info!(
        renderer = %config.renderer_url,
        voice = %config.default_voice,
        library = %config.library_dir.display(),
        "Companion components ready"
    );
    Ok(CompanionService::new(speaker, avatar, gifs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use companion_core::voice::Voice;
    use std::time::Duration;
    use tracing::Level;

    fn config(root: &std::path::Path) -> Config {
        let library_dir = root.join("avatar").join("library");
        Config {
            renderer_url: "http://127.0.0.1:1".to_string(),
            renderer_timeout: Duration::from_millis(100),
            catalog_path: library_dir.join("animations").join("animations.jsonl"),
            library_dir,
            voice_temp_dir: root.join("temp_voice"),
            default_voice: Voice::Aoi,
            tts_bin: "edge-tts".into(),
            tts_timeout: Duration::from_secs(5),
            audio_player: "ffplay -nodisp -autoexit {file}".to_string(),
            max_clip_duration: Duration::from_secs(5),
            playback_gap: Duration::from_millis(500),
            cleanup_delay: Duration::from_millis(1000),
            giphy_api_key: None,
            giphy_base_url: "https://api.giphy.com/v1/gifs".to_string(),
            log_level: Level::INFO,
        }
    }

    #[tokio::test]
    async fn test_startup_creates_directories_and_builds_service() {
        let root = tempfile::tempdir().unwrap();
        let config = config(root.path());

        prepare_directories(&config).unwrap();
        assert!(config.library_dir.is_dir());
        assert!(config.voice_temp_dir.is_dir());

        let catalog = load_catalog(&config).unwrap();
        assert!(catalog.is_empty());
        assert!(config.catalog_path.parent().unwrap().is_dir());

        let service = build_service(&config, catalog).unwrap();
        assert_eq!(service.speaker().voice().await, Voice::Aoi);
        assert!(service.avatar().state().await.visible);
    }

    #[test]
    fn test_unwritable_directory_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("file");
        std::fs::write(&blocker, b"").unwrap();

        let mut config = config(root.path());
        config.voice_temp_dir = blocker.join("voices");
        let err = prepare_directories(&config).unwrap_err();
        assert!(err.to_string().contains("Failed to create directory"));
    }
}
