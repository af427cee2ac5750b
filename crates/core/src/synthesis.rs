//! Text-to-speech boundary.
//!
//! Synthesis is treated as an opaque, possibly slow and failing step that
//! turns text into a playable file inside a caller supplied directory.

use crate::error::{CompanionError, Result};
use crate::voice::{Prosody, Voice};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// File name written inside the per-utterance directory.
pub const AUDIO_FILE_NAME: &str = "audio.mp3";

/// Defines the contract for anything that can render speech to a file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesizes `text` with the given voice and prosody into `out_dir`,
    /// returning the location of the produced audio asset.
    async fn synthesize(
        &self,
        text: &str,
        voice: Voice,
        prosody: Prosody,
        out_dir: &Path,
    ) -> Result<PathBuf>;
}

/// Drives the `edge-tts` command line tool.
#[derive(Debug, Clone)]
pub struct EdgeTtsSynthesizer {
    program: PathBuf,
    timeout: Duration,
}

impl EdgeTtsSynthesizer {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn command(&self, text: &str, voice: Voice, prosody: Prosody, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--voice")
            .arg(voice.id())
            .arg(format!("--pitch={}", prosody.pitch()))
            .arg(format!("--rate={}", prosody.rate()))
            .arg(format!("--volume={}", prosody.volume()))
            .arg("--text")
            .arg(text)
            .arg("--write-media")
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl SpeechSynthesizer for EdgeTtsSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: Voice,
        prosody: Prosody,
        out_dir: &Path,
    ) -> Result<PathBuf> {
        let output_path = out_dir.join(AUDIO_FILE_NAME);
        let child = self
            .command(text, voice, prosody, &output_path)
            .spawn()
            .map_err(|e| {
                CompanionError::unreachable(
                    "speech synthesizer",
                    format!(
                        "could not start '{}' ({e}); install edge-tts or set TTS_BIN",
                        self.program.display()
                    ),
                )
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                CompanionError::Synthesis(format!("timed out after {:?}", self.timeout))
            })?
            .map_err(|e| CompanionError::Synthesis(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CompanionError::Synthesis(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            )));
        }

        debug!(path = %output_path.display(), voice = %voice, "Synthesized utterance");
        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_arguments() {
        let synth = EdgeTtsSynthesizer::new("edge-tts", Duration::from_secs(5));
        let prosody = Voice::Jenny.prosody_for(crate::voice::Emotion::Shy);
        let cmd = synth.command("hello", Voice::Jenny, prosody, Path::new("/tmp/x/audio.mp3"));
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "--voice",
                "en-US-JennyNeural",
                "--pitch=+5Hz",
                "--rate=-5%",
                "--volume=-20%",
                "--text",
                "hello",
                "--write-media",
                "/tmp/x/audio.mp3",
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let synth = EdgeTtsSynthesizer::new(
            dir.path().join("no-such-tts-binary"),
            Duration::from_secs(5),
        );
        let err = synth
            .synthesize("hi", Voice::Nanami, Prosody::default(), dir.path())
            .await
            .unwrap_err();
        assert!(err.is_unreachable());
    }
}
