//! Animation definitions, the persisted catalog and the sprite pose library.

use crate::error::{CompanionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Highest frame rate accepted for a definition.
pub const MAX_FPS: f64 = 60.0;
pub const DEFAULT_FPS: f64 = 2.0;

/// A named, ordered sequence of poses with a playback rate and loop flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationDefinition {
    pub id: String,
    pub name: String,
    pub frames: Vec<String>,
    pub fps: f64,
    #[serde(rename = "loop", default)]
    pub looping: bool,
    #[serde(default)]
    pub builtin: bool,
}

impl AnimationDefinition {
    /// A one-frame, non-looping animation showing a single sprite.
    pub fn single_pose(pose: &str) -> Self {
        Self {
            id: pose.to_string(),
            name: display_name(pose),
            frames: vec![pose.to_string()],
            fps: 1.0,
            looping: false,
            builtin: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(CompanionError::validation("Animation id must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(CompanionError::validation(
                "Animation name must not be empty",
            ));
        }
        if self.frames.is_empty() || self.frames.iter().any(|f| f.trim().is_empty()) {
            return Err(CompanionError::validation(
                "Animation must have at least one frame",
            ));
        }
        if !self.fps.is_finite() || self.fps <= 0.0 || self.fps > MAX_FPS {
            return Err(CompanionError::validation(format!(
                "fps must be greater than 0 and at most {MAX_FPS}, got {}",
                self.fps
            )));
        }
        Ok(())
    }

    /// How long each frame stays on screen.
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps)
    }
}

/// Splits a comma separated frame list, dropping blank entries.
pub fn parse_frames(frames: &str) -> Vec<String> {
    frames
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

fn display_name(pose: &str) -> String {
    let mut chars = pose.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Append-only, line-delimited JSON store of animation definitions.
#[derive(Debug)]
pub struct AnimationCatalog {
    path: PathBuf,
    animations: HashMap<String, AnimationDefinition>,
    order: Vec<String>,
}

impl AnimationCatalog {
    /// Loads every definition in `path`, creating its directory if needed.
    ///
    /// Lines that fail to parse or validate are skipped. A later line with an
    /// id seen before replaces the earlier definition.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CompanionError::Catalog {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut catalog = Self {
            path,
            animations: HashMap::new(),
            order: Vec::new(),
        };

        let content = match std::fs::read_to_string(&catalog.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %catalog.path.display(), "No animation catalog yet");
                return Ok(catalog);
            }
            Err(source) => {
                return Err(CompanionError::Catalog {
                    path: catalog.path,
                    source,
                });
            }
        };

        for (line_no, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let parsed = serde_json::from_str::<AnimationDefinition>(line)
                .map_err(CompanionError::from)
                .and_then(|a| a.validate().map(|_| a));
            match parsed {
                Ok(animation) => {
                    debug!(id = %animation.id, "Loaded animation");
                    catalog.insert(animation);
                }
                Err(e) => warn!(line = line_no + 1, error = %e, "Skipping animation line"),
            }
        }

        info!(
            path = %catalog.path.display(),
            count = catalog.len(),
            "Animation catalog loaded"
        );
        Ok(catalog)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, id: &str) -> Option<&AnimationDefinition> {
        self.animations.get(id)
    }

    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }

    /// All definitions in load and definition order.
    pub fn list(&self) -> impl Iterator<Item = &AnimationDefinition> {
        self.order.iter().filter_map(|id| self.animations.get(id))
    }

    /// Validates and persists a new custom definition.
    pub fn define(&mut self, mut animation: AnimationDefinition) -> Result<&AnimationDefinition> {
        animation.id = animation.id.trim().to_string();
        animation.builtin = false;
        animation.validate()?;
        if self.animations.contains_key(&animation.id) {
            return Err(CompanionError::validation(format!(
                "An animation with id '{}' already exists",
                animation.id
            )));
        }

        let mut line = serde_json::to_string(&animation)?;
        line.push('\n');
        let catalog_error = |source| CompanionError::Catalog {
            path: self.path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(catalog_error)?;
        file.write_all(line.as_bytes()).map_err(catalog_error)?;
        file.flush().map_err(catalog_error)?;

        info!(id = %animation.id, frames = animation.frames.len(), "Saved custom animation");
        let id = animation.id.clone();
        self.insert(animation);
        Ok(&self.animations[&id])
    }

    fn insert(&mut self, animation: AnimationDefinition) {
        if !self.animations.contains_key(&animation.id) {
            self.order.push(animation.id.clone());
        }
        self.animations.insert(animation.id.clone(), animation);
    }
}

/// The renderer's sprite set: every `*.png` in the library directory.
#[derive(Debug, Clone)]
pub struct PoseLibrary {
    dir: PathBuf,
}

impl PoseLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Sorted pose names. Re-reads the directory on every call.
    pub async fn poses(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|source| CompanionError::Catalog {
                path: self.dir.clone(),
                source,
            })?;

        let mut poses = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("png") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    poses.push(stem.to_string());
                }
            }
        }
        poses.sort();
        Ok(poses)
    }

    pub async fn contains(&self, pose: &str) -> bool {
        if pose.is_empty() || pose.contains(['/', '\\']) {
            return false;
        }
        tokio::fs::metadata(self.dir.join(format!("{pose}.png")))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave() -> AnimationDefinition {
        AnimationDefinition {
            id: "wave".into(),
            name: "Wave".into(),
            frames: vec!["idle".into(), "point_up".into(), "idle".into()],
            fps: 3.0,
            looping: false,
            builtin: false,
        }
    }

    #[test]
    fn test_validate() {
        assert!(wave().validate().is_ok());

        let mut bad = wave();
        bad.frames.clear();
        assert!(matches!(bad.validate(), Err(CompanionError::Validation(_))));

        for fps in [0.0, -1.0, f64::NAN, f64::INFINITY, 61.0] {
            let mut bad = wave();
            bad.fps = fps;
            assert!(bad.validate().is_err(), "fps {fps} should be rejected");
        }

        let mut bad = wave();
        bad.id = "  ".into();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_parse_frames() {
        assert_eq!(
            parse_frames(" idle, happy ,,love , "),
            vec!["idle", "happy", "love"]
        );
        assert!(parse_frames(" , ").is_empty());
    }

    #[test]
    fn test_single_pose() {
        let anim = AnimationDefinition::single_pose("thinking");
        assert_eq!(anim.name, "Thinking");
        assert_eq!(anim.frames, vec!["thinking"]);
        assert_eq!(anim.fps, 1.0);
        assert!(!anim.looping);
    }

    #[test]
    fn test_serialized_shape() {
        let value = serde_json::to_value(wave()).unwrap();
        assert_eq!(value["loop"], false);
        assert_eq!(value["fps"], 3.0);

        let parsed: AnimationDefinition =
            serde_json::from_str(r#"{"id":"a","name":"A","frames":["x"],"fps":2}"#).unwrap();
        assert!(!parsed.looping);
        assert!(!parsed.builtin);
    }

    #[test]
    fn test_define_round_trips_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("animations").join("animations.jsonl");

        let mut catalog = AnimationCatalog::load(&path).unwrap();
        assert!(catalog.is_empty());
        let saved = catalog.define(wave()).unwrap().clone();
        assert_eq!(catalog.get("wave"), Some(&saved));

        let reloaded = AnimationCatalog::load(&path).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.get("wave"), Some(&saved));
    }

    #[test]
    fn test_define_rejects_existing_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = AnimationCatalog::load(dir.path().join("a.jsonl")).unwrap();
        catalog.define(wave()).unwrap();
        let err = catalog.define(wave()).unwrap_err();
        assert!(matches!(err, CompanionError::Validation(_)));

        let content = std::fs::read_to_string(catalog.path()).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn test_load_skips_bad_lines_and_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("animations.jsonl");
        std::fs::write(
            &path,
            concat!(
                r#"{"id":"idle","name":"Idle","frames":["idle"],"fps":1,"loop":false,"builtin":true}"#,
                "\n\nnot json\n",
                r#"{"id":"empty","name":"Empty","frames":[],"fps":1}"#,
                "\n",
                r#"{"id":"dance","name":"Dance","frames":["happy","love"],"fps":4,"loop":true,"builtin":true}"#,
                "\n",
                r#"{"id":"idle","name":"Idle v2","frames":["idle"],"fps":1,"builtin":true}"#,
                "\n"
            ),
        )
        .unwrap();

        let catalog = AnimationCatalog::load(&path).unwrap();
        let ids: Vec<_> = catalog.list().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["idle", "dance"]);
        assert_eq!(catalog.get("idle").unwrap().name, "Idle v2");
        assert!(catalog.get("dance").unwrap().looping);
    }

    #[tokio::test]
    async fn test_pose_library_lists_png_stems() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["idle.png", "happy.png", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("animations")).unwrap();

        let library = PoseLibrary::new(dir.path());
        assert_eq!(library.poses().await.unwrap(), vec!["happy", "idle"]);
        assert!(library.contains("idle").await);
        assert!(!library.contains("notes").await);
        assert!(!library.contains("../idle").await);
    }
}
