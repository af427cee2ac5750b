//! The voice engine behind the `speak` tool.

use crate::error::{CompanionError, Result};
use crate::playback::{AudioPlaybackItem, PlaybackQueue};
use crate::synthesis::SpeechSynthesizer;
use crate::voice::{Emotion, Voice, clean_text};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// Outcome of a successful `speak` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub emotion: Emotion,
    pub voice: Voice,
}

pub struct Speaker {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    queue: PlaybackQueue,
    temp_dir: PathBuf,
    voice: RwLock<Voice>,
}

impl Speaker {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        queue: PlaybackQueue,
        temp_dir: impl Into<PathBuf>,
        voice: Voice,
    ) -> Self {
        Self {
            synthesizer,
            queue,
            temp_dir: temp_dir.into(),
            voice: RwLock::new(voice),
        }
    }

    pub async fn voice(&self) -> Voice {
        *self.voice.read().await
    }

    pub async fn set_voice(&self, voice: Voice) {
        *self.voice.write().await = voice;
        info!(voice = %voice, "Voice changed");
    }

    pub fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }

    /// Cleans `text`, synthesizes it and queues the clip.
    ///
    /// Returns once the clip is queued; playback happens in the background.
    /// Synthesis completes before enqueueing, so clips keep request order only
    /// among requests whose synthesis has already finished.
    pub async fn speak(&self, text: &str, emotion: Emotion) -> Result<Utterance> {
        let text = clean_text(text);
        if text.is_empty() {
            return Err(CompanionError::validation("Nothing to say: text is empty"));
        }

        let voice = self.voice().await;
        let prosody = voice.prosody_for(emotion);

        let utterance_dir = self.temp_dir.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&utterance_dir).await.map_err(|e| {
            CompanionError::Synthesis(format!(
                "could not create {}: {e}",
                utterance_dir.display()
            ))
        })?;

        let asset = match self
            .synthesizer
            .synthesize(&text, voice, prosody, &utterance_dir)
            .await
        {
            Ok(asset) => asset,
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_dir_all(&utterance_dir).await {
                    warn!(error = %cleanup, "Could not remove unused utterance directory");
                }
                return Err(e);
            }
        };

        self.queue
            .enqueue(AudioPlaybackItem::new(asset).with_auxiliary(&utterance_dir));
        info!(%voice, %emotion, dir = %utterance_dir.display(), "Queued utterance");

        Ok(Utterance {
            text,
            emotion,
            voice,
        })
    }
}
