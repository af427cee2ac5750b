//! Sequential audio playback.
//!
//! [`PlaybackQueue`] owns every enqueued [`AudioPlaybackItem`] until it has
//! been played and its files removed. A single player task drains the queue,
//! so clips never overlap and always play in the order they were enqueued.

use crate::error::{CompanionError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Placeholder replaced by the asset path in player argument templates.
pub const FILE_PLACEHOLDER: &str = "{file}";

/// A synthesized clip waiting for its turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPlaybackItem {
    pub asset: PathBuf,
    /// Extra files or directories removed once the clip has played.
    pub auxiliary: Vec<PathBuf>,
}

impl AudioPlaybackItem {
    pub fn new(asset: impl Into<PathBuf>) -> Self {
        Self {
            asset: asset.into(),
            auxiliary: Vec::new(),
        }
    }

    pub fn with_auxiliary(mut self, path: impl Into<PathBuf>) -> Self {
        self.auxiliary.push(path.into());
        self
    }
}

/// The OS level playback primitive. Resolves once the clip has finished.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn play(&self, asset: &Path) -> Result<()>;
}

/// Plays a file by running an external player program to completion.
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    program: String,
    args: Vec<String>,
    max_duration: Duration,
}

impl CommandPlayer {
    /// `args` may contain [`FILE_PLACEHOLDER`]; if none does, the asset path
    /// is appended as the last argument.
    pub fn new(program: impl Into<String>, args: Vec<String>, max_duration: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            max_duration,
        }
    }

    /// Parses a whitespace separated command line such as
    /// `ffplay -nodisp -autoexit {file}`.
    pub fn from_command_line(line: &str, max_duration: Duration) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect(), max_duration))
    }

    fn arguments(&self, asset: &Path) -> Vec<String> {
        let file = asset.to_string_lossy();
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace(FILE_PLACEHOLDER, &file))
            .collect();
        if !self.args.iter().any(|arg| arg.contains(FILE_PLACEHOLDER)) {
            args.push(file.into_owned());
        }
        args
    }
}

#[async_trait]
impl AudioPlayer for CommandPlayer {
    async fn play(&self, asset: &Path) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(self.arguments(asset))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CompanionError::Playback(format!("could not start '{}': {e}", self.program))
            })?;

        let status = tokio::time::timeout(self.max_duration, child.wait())
            .await
            .map_err(|_| {
                CompanionError::Playback(format!(
                    "'{}' still running after {:?}",
                    self.program, self.max_duration
                ))
            })?
            .map_err(|e| CompanionError::Playback(e.to_string()))?;

        if status.success() {
            Ok(())
        } else {
            Err(CompanionError::Playback(format!(
                "'{}' exited with {status}",
                self.program
            )))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackConfig {
    /// Pause between the end of one clip and the start of the next.
    pub gap: Duration,
    /// How long after a clip ends its files are removed.
    pub cleanup_delay: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            gap: Duration::from_millis(500),
            cleanup_delay: Duration::from_millis(1000),
        }
    }
}

#[derive(Default)]
struct QueueStatus {
    pending: AtomicUsize,
    playing: AtomicBool,
}

/// Strictly ordered, non-overlapping playback of audio clips.
pub struct PlaybackQueue {
    tx: mpsc::UnboundedSender<AudioPlaybackItem>,
    status: Arc<QueueStatus>,
    worker: JoinHandle<()>,
}

impl PlaybackQueue {
    /// Starts the player task. Must be called inside a Tokio runtime.
    pub fn new(player: Arc<dyn AudioPlayer>, config: PlaybackConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let status = Arc::new(QueueStatus::default());
        let worker = tokio::spawn(run_player(player, config, rx, status.clone()));
        Self { tx, status, worker }
    }

    /// Appends `item` to the tail of the queue. Never blocks.
    pub fn enqueue(&self, item: AudioPlaybackItem) {
        self.status.pending.fetch_add(1, Ordering::SeqCst);
        if let Err(mpsc::error::SendError(item)) = self.tx.send(item) {
            self.status.pending.fetch_sub(1, Ordering::SeqCst);
            error!(asset = %item.asset.display(), "Player task has stopped; dropping clip");
            spawn_cleanup(item, Duration::ZERO);
        }
    }

    /// Clips enqueued but not yet finished, including the one playing.
    pub fn pending(&self) -> usize {
        self.status.pending.load(Ordering::SeqCst)
    }

    pub fn is_playing(&self) -> bool {
        self.status.playing.load(Ordering::SeqCst)
    }
}

impl Drop for PlaybackQueue {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn run_player(
    player: Arc<dyn AudioPlayer>,
    config: PlaybackConfig,
    mut rx: mpsc::UnboundedReceiver<AudioPlaybackItem>,
    status: Arc<QueueStatus>,
) {
    while let Some(item) = rx.recv().await {
        status.playing.store(true, Ordering::SeqCst);
        info!(asset = %item.asset.display(), "Playing clip");

        if let Err(e) = player.play(&item.asset).await {
            error!(asset = %item.asset.display(), error = %e, "Audio playback error");
        }

        spawn_cleanup(item, config.cleanup_delay);
        status.playing.store(false, Ordering::SeqCst);
        status.pending.fetch_sub(1, Ordering::SeqCst);

        tokio::time::sleep(config.gap).await;
    }
    debug!("Playback queue closed");
}

fn spawn_cleanup(item: AudioPlaybackItem, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        for path in std::iter::once(&item.asset).chain(item.auxiliary.iter()) {
            if let Err(e) = remove_asset(path).await {
                debug!(error = %e, "Ignoring cleanup failure");
            }
        }
    });
}

/// Removes a file or a whole directory.
pub async fn remove_asset(path: &Path) -> Result<()> {
    let removal = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) => Err(e),
    };
    removal.map_err(|source| CompanionError::AssetCleanup {
        path: path.to_path_buf(),
        source,
    })
}
