//! The single source of truth for what the avatar shows.
//!
//! [`AvatarStateCoordinator`] is the only component that mutates
//! [`AvatarState`]. It reconciles explicit poses, running animations and
//! visibility changes, and mirrors every accepted change to the renderer.
//!
//! Setting a pose or hiding the avatar stops any running animation while the
//! state lock is held, so a timer that fires afterwards finds its run gone and
//! cannot put an old frame back on screen. Moving or revealing the avatar
//! leaves a running animation alone.

use crate::animation::{AnimationCatalog, AnimationDefinition, PoseLibrary};
use crate::error::{CompanionError, Result};
use crate::renderer::{Position, Renderer, StateUpdate};
use crate::sequencer::{AnimationSequencer, FrameSink, RunId, SequencerState};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

pub const DEFAULT_POSE: &str = "idle";
pub const DEFAULT_POSITION: Position = Position { x: 1000, y: 100 };

/// Mirror of the state last pushed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarState {
    pub visible: bool,
    pub position: Position,
    /// The explicit pose, or the frame the running animation is showing.
    pub pose: String,
    /// Id of the running animation, if any.
    pub animation: Option<String>,
}

impl Default for AvatarState {
    fn default() -> Self {
        Self {
            visible: true,
            position: DEFAULT_POSITION,
            pose: DEFAULT_POSE.to_string(),
            animation: None,
        }
    }
}

/// What to animate: a catalog id (or sprite name) or a ready definition.
#[derive(Debug, Clone)]
pub enum AnimationRequest {
    Id(String),
    Definition(AnimationDefinition),
}

impl From<&str> for AnimationRequest {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for AnimationRequest {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<AnimationDefinition> for AnimationRequest {
    fn from(definition: AnimationDefinition) -> Self {
        Self::Definition(definition)
    }
}

struct Inner {
    state: AvatarState,
    sequencer: AnimationSequencer,
}

struct Shared {
    inner: Mutex<Inner>,
    renderer: Arc<dyn Renderer>,
    catalog: RwLock<AnimationCatalog>,
    poses: PoseLibrary,
}

#[derive(Clone)]
pub struct AvatarStateCoordinator {
    shared: Arc<Shared>,
}

impl AvatarStateCoordinator {
    pub fn new(renderer: Arc<dyn Renderer>, catalog: AnimationCatalog, poses: PoseLibrary) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: AvatarState::default(),
                    sequencer: AnimationSequencer::new(),
                }),
                renderer,
                catalog: RwLock::new(catalog),
                poses,
            }),
        }
    }

    pub async fn state(&self) -> AvatarState {
        self.shared.inner.lock().await.state.clone()
    }

    pub async fn sequencer_state(&self) -> SequencerState {
        self.shared.inner.lock().await.sequencer.state()
    }

    /// Id of the running animation run, if any.
    pub async fn current_run(&self) -> Option<RunId> {
        self.shared
            .inner
            .lock()
            .await
            .sequencer
            .current()
            .map(|run| run.id)
    }

    /// Shows or hides the avatar. Hiding stops a running animation.
    pub async fn set_visible(&self, visible: bool) -> Result<()> {
        let mut inner = self.shared.inner.lock().await;
        let cancelled = !visible && Self::cancel_run(&mut inner);
        inner.state.visible = visible;
        info!(visible, "Avatar visibility changed");

        let stopped = self.relay_stop(cancelled).await;
        let updated = self
            .shared
            .renderer
            .update_state(&StateUpdate::visible(visible))
            .await;
        stopped.and(updated)
    }

    /// Moves the avatar without interrupting a running animation.
    pub async fn set_position(&self, position: Position) -> Result<()> {
        let mut inner = self.shared.inner.lock().await;
        inner.state.position = position;
        info!(x = position.x, y = position.y, "Avatar moved");
        self.shared
            .renderer
            .update_state(&StateUpdate::position(position))
            .await
    }

    /// Shows a single sprite, stopping any running animation first.
    pub async fn set_pose(&self, pose: &str) -> Result<()> {
        let pose = pose.trim();
        if !self.shared.poses.contains(pose).await {
            return Err(CompanionError::not_found("pose", pose));
        }

        let mut inner = self.shared.inner.lock().await;
        let cancelled = Self::cancel_run(&mut inner);
        inner.state.pose = pose.to_string();
        info!(pose, cancelled, "Avatar pose set");

        let stopped = self.relay_stop(cancelled).await;
        let updated = self
            .shared
            .renderer
            .update_state(&StateUpdate::pose(pose))
            .await;
        stopped.and(updated)
    }

    /// Replaces whatever is running with `request`, showing its first frame.
    pub async fn start_animation(
        &self,
        request: impl Into<AnimationRequest>,
    ) -> Result<AnimationDefinition> {
        let definition = match request.into() {
            AnimationRequest::Id(id) => self.resolve_animation(&id).await?,
            AnimationRequest::Definition(definition) => {
                definition.validate()?;
                definition
            }
        };

        let mut inner = self.shared.inner.lock().await;
        let sink: Arc<dyn FrameSink> = self.shared.clone();
        let run = inner.sequencer.start(definition.clone(), sink);
        let previous_pose =
            std::mem::replace(&mut inner.state.pose, definition.frames[0].clone());
        inner.state.animation = Some(definition.id.clone());
        info!(%run, animation = %definition.id, looping = definition.looping, "Animation started");

        if let Err(e) = self.shared.renderer.play_animation(&definition).await {
            inner.sequencer.finish(run);
            inner.state.pose = previous_pose;
            inner.state.animation = None;
            return Err(e);
        }
        Ok(definition)
    }

    /// Stops the running animation, if any. Returns whether one was running.
    pub async fn stop_animation(&self) -> Result<bool> {
        let mut inner = self.shared.inner.lock().await;
        let was_running = Self::cancel_run(&mut inner);
        info!(was_running, "Animation stop requested");
        self.shared.renderer.stop_animation().await?;
        Ok(was_running)
    }

    /// Looks `id` up in the catalog, falling back to a one-frame animation when
    /// it names a known sprite.
    pub async fn resolve_animation(&self, id: &str) -> Result<AnimationDefinition> {
        let id = id.trim();
        if let Some(definition) = self.shared.catalog.read().await.get(id) {
            return Ok(definition.clone());
        }
        if self.shared.poses.contains(id).await {
            debug!(pose = id, "Using single pose as animation");
            return Ok(AnimationDefinition::single_pose(id));
        }
        Err(CompanionError::not_found("animation or pose", id))
    }

    /// Saves a custom animation to the catalog.
    pub async fn define_animation(
        &self,
        definition: AnimationDefinition,
    ) -> Result<AnimationDefinition> {
        self.shared
            .catalog
            .write()
            .await
            .define(definition)
            .cloned()
    }

    pub async fn animations(&self) -> Vec<AnimationDefinition> {
        self.shared.catalog.read().await.list().cloned().collect()
    }

    pub async fn poses(&self) -> Result<Vec<String>> {
        self.shared.poses.poses().await
    }

    /// Relays a transient GIF to the renderer. Local state is unaffected.
    pub async fn show_gif(&self, url: &str, duration: std::time::Duration) -> Result<()> {
        self.shared.renderer.show_gif(url, duration).await
    }

    /// Tells the renderer to stop its animation when a local run was cancelled.
    /// The caller still sends its state update if this fails.
    async fn relay_stop(&self, cancelled: bool) -> Result<()> {
        if cancelled {
            self.shared.renderer.stop_animation().await
        } else {
            Ok(())
        }
    }

    fn cancel_run(inner: &mut Inner) -> bool {
        let stopped = inner.sequencer.stop();
        inner.state.animation = None;
        stopped.is_some()
    }
}

#[async_trait]
impl FrameSink for Shared {
    async fn frame(&self, run: RunId, frame_index: usize) {
        let mut inner = self.inner.lock().await;
        let Some(pose) = inner
            .sequencer
            .advance(run, frame_index)
            .map(str::to_string)
        else {
            debug!(%run, "Ignoring frame from a stopped run");
            return;
        };
        inner.state.pose = pose.clone();
        debug!(%run, frame_index, %pose, "Animation frame");

        if let Err(e) = self.renderer.update_state(&StateUpdate::pose(pose)).await {
            warn!(%run, error = %e, "Could not relay animation frame");
        }
    }

    async fn finished(&self, run: RunId) {
        let mut inner = self.inner.lock().await;
        if inner.sequencer.finish(run) {
            inner.state.animation = None;
            info!(%run, pose = %inner.state.pose, "Animation finished");
        }
    }
}
