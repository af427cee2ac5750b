//! Sprite animation sequencing.
//!
//! [`AnimationSequencer`] owns at most one [`AnimationRun`]. Each run is driven
//! by a timer task that derives the frame index from the wall-clock time
//! elapsed since the run started, so a late wake-up never shifts the rest of
//! the sequence. Frame changes are reported to a [`FrameSink`] tagged with the
//! run's [`RunId`]; once a run is stopped or superseded its id no longer
//! matches and anything it still reports is ignored.

use crate::animation::AnimationDefinition;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Identifies one animation run. Never reused within a sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Idle,
    Running { looping: bool },
}

/// Receives frame changes from running timers.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// The run advanced to `frame_index`.
    async fn frame(&self, run: RunId, frame_index: usize);
    /// A non-looping run passed its final frame.
    async fn finished(&self, run: RunId);
}

/// The live instance of a playing animation.
#[derive(Debug, Clone)]
pub struct AnimationRun {
    pub id: RunId,
    pub definition: AnimationDefinition,
    pub started_at: Instant,
    pub current_frame: usize,
}

impl AnimationRun {
    pub fn current_pose(&self) -> &str {
        &self.definition.frames[self.current_frame]
    }
}

struct ActiveRun {
    run: AnimationRun,
    cancel: CancellationToken,
}

#[derive(Default)]
pub struct AnimationSequencer {
    active: Option<ActiveRun>,
    next_id: u64,
}

impl AnimationSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SequencerState {
        match &self.active {
            Some(active) => SequencerState::Running {
                looping: active.run.definition.looping,
            },
            None => SequencerState::Idle,
        }
    }

    pub fn current(&self) -> Option<&AnimationRun> {
        self.active.as_ref().map(|a| &a.run)
    }

    pub fn is_current(&self, run: RunId) -> bool {
        self.current().is_some_and(|r| r.id == run)
    }

    /// Cancels any current run and starts `definition` at frame 0.
    ///
    /// The caller shows frame 0 itself; the timer reports every later frame
    /// to `sink`. `definition` must have been validated.
    pub fn start(&mut self, definition: AnimationDefinition, sink: Arc<dyn FrameSink>) -> RunId {
        self.stop();

        self.next_id += 1;
        let id = RunId(self.next_id);
        let cancel = CancellationToken::new();
        let started_at = Instant::now();

        let timer = FrameTimer {
            run: id,
            frame_count: definition.frames.len(),
            looping: definition.looping,
            frame_duration: definition.frame_duration(),
            started_at,
        };
        tokio::spawn(timer.drive(cancel.clone(), sink));

        debug!(run = %id, animation = %definition.id, "Animation started");
        self.active = Some(ActiveRun {
            run: AnimationRun {
                id,
                definition,
                started_at,
                current_frame: 0,
            },
            cancel,
        });
        id
    }

    /// Cancels the timer and drops the current run. Returns the stopped run,
    /// or `None` when already idle.
    pub fn stop(&mut self) -> Option<AnimationRun> {
        let active = self.active.take()?;
        active.cancel.cancel();
        debug!(run = %active.run.id, "Animation stopped");
        Some(active.run)
    }

    /// Records a frame reported by the timer of `run`. Returns the pose to
    /// show, or `None` if `run` is no longer current.
    pub fn advance(&mut self, run: RunId, frame_index: usize) -> Option<&str> {
        let active = self.active.as_mut().filter(|a| a.run.id == run)?;
        if frame_index >= active.run.definition.frames.len() {
            return None;
        }
        active.run.current_frame = frame_index;
        Some(active.run.current_pose())
    }

    /// Ends `run` after its final frame. Returns false if `run` is no longer
    /// current.
    pub fn finish(&mut self, run: RunId) -> bool {
        if self.is_current(run) {
            self.stop();
            true
        } else {
            false
        }
    }
}

impl Drop for AnimationSequencer {
    fn drop(&mut self) {
        self.stop();
    }
}

struct FrameTimer {
    run: RunId,
    frame_count: usize,
    looping: bool,
    frame_duration: Duration,
    started_at: Instant,
}

impl FrameTimer {
    /// Number of whole frame slots elapsed at `now`.
    fn step_at(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.started_at).as_nanos();
        let slot = self.frame_duration.as_nanos().max(1);
        u64::try_from(elapsed / slot).unwrap_or(u64::MAX)
    }

    fn deadline(&self, step: u64) -> Instant {
        let step = u32::try_from(step).unwrap_or(u32::MAX);
        self.started_at + self.frame_duration.saturating_mul(step)
    }

    async fn drive(self, cancel: CancellationToken, sink: Arc<dyn FrameSink>) {
        let frame_count = self.frame_count as u64;
        let mut step = 0u64;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep_until(self.deadline(step + 1)) => {}
            }

            let next = self.step_at(Instant::now()).max(step + 1);
            if !self.looping && next >= frame_count {
                // A late wake-up can jump past the end; the last frame is still shown.
                if step + 1 < frame_count && !cancel.is_cancelled() {
                    sink.frame(self.run, (frame_count - 1) as usize).await;
                }
                if !cancel.is_cancelled() {
                    sink.finished(self.run).await;
                }
                return;
            }
            step = next;
            if cancel.is_cancelled() {
                return;
            }
            sink.frame(self.run, (step % frame_count) as usize).await;
        }
    }
}
