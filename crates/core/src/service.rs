//! Companion Tool Service
//!
//! Exposes the companion's media layer to a tool-calling agent over the Model
//! Context Protocol. Every tool validates its arguments, dispatches to exactly
//! one component and turns the outcome into a short human-readable message.
//! Failures come back as error-flagged text and never end the session.

use crate::animation::{AnimationDefinition, DEFAULT_FPS, parse_frames};
use crate::coordinator::{AnimationRequest, AvatarStateCoordinator, DEFAULT_POSE, DEFAULT_POSITION};
use crate::error::CompanionError;
use crate::gif::{DEFAULT_LIMIT, GifGallery, GifRating};
use crate::renderer::Position;
use crate::speaker::Speaker;
use crate::voice::{Emotion, Voice, VoiceInfo};
use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_GIF_SECONDS: f64 = 5.0;
/// Longest a GIF may replace the avatar.
pub const MAX_GIF_SECONDS: f64 = 300.0;

// --- Tool arguments ---

#[derive(Deserialize, JsonSchema, Debug)]
pub struct SpeakArgs {
    /// The text to say.
    pub text: String,
    #[schemars(description = "Emotion: neutral, happy, sad, excited, angry or shy (default neutral)")]
    pub emotion: Option<String>,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct SetVoiceArgs {
    #[schemars(description = "Voice id from list_voices, e.g. 'ja-JP-NanamiNeural'")]
    pub voice_id: String,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct ShowAvatarArgs {
    #[schemars(description = "Animation id or pose name to start with (default 'idle')")]
    pub animation: Option<String>,
    /// Horizontal screen position in pixels (default 1000).
    pub x: Option<f64>,
    /// Vertical screen position in pixels (default 100).
    pub y: Option<f64>,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct MoveAvatarArgs {
    /// Horizontal screen position in pixels.
    pub x: f64,
    /// Vertical screen position in pixels.
    pub y: f64,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct SetPoseArgs {
    #[schemars(description = "Pose name from list_poses")]
    pub pose: String,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct PlayAnimationArgs {
    #[schemars(description = "Animation id from list_animations, or a pose name")]
    pub id: String,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct CreateAnimationArgs {
    /// Unique id for the new animation.
    pub id: String,
    /// Display name.
    pub name: String,
    #[schemars(description = "Comma separated pose names, e.g. 'idle,happy,love'")]
    pub frames: String,
    #[schemars(description = "Frames per second, up to 60 (default 2)")]
    pub fps: Option<f64>,
    #[serde(rename = "loop")]
    #[schemars(description = "Repeat until stopped (default false)")]
    pub looping: Option<bool>,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct SearchGifsArgs {
    /// What to search for.
    pub query: String,
    #[schemars(description = "Number of results, 1 to 10 (default 5)")]
    pub limit: Option<u32>,
    #[schemars(description = "Content rating filter: g, pg, pg-13 or r (default g)")]
    pub rating: Option<String>,
}

#[derive(Deserialize, JsonSchema, Debug)]
pub struct ShowGifArgs {
    #[schemars(description = "Number of the GIF in the last search results (1-based)")]
    pub gif_number: Option<usize>,
    #[schemars(description = "Direct GIF URL, used when gif_number is not given")]
    pub url: Option<String>,
    #[schemars(description = "Seconds to show the GIF (default 5)")]
    pub duration: Option<f64>,
}

#[derive(Serialize)]
struct VoiceList {
    current: &'static str,
    voices: Vec<VoiceInfo>,
}

// --- Service ---

pub struct CompanionService {
    speaker: Speaker,
    avatar: AvatarStateCoordinator,
    gifs: GifGallery,
    tool_router: ToolRouter<Self>,
}

#[tool_handler]
impl ServerHandler for CompanionService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Desktop companion: speak aloud, show and animate the avatar, and display GIFs."
                    .to_string(),
            ),
            ..Default::default()
        }
    }
}

#[tool_router]
impl CompanionService {
    pub fn new(speaker: Speaker, avatar: AvatarStateCoordinator, gifs: GifGallery) -> Self {
        Self {
            speaker,
            avatar,
            gifs,
            tool_router: Self::tool_router(),
        }
    }

    pub fn avatar(&self) -> &AvatarStateCoordinator {
        &self.avatar
    }

    pub fn speaker(&self) -> &Speaker {
        &self.speaker
    }

    #[tool(description = "Say something out loud with the current voice and an emotion.")]
    pub async fn speak(&self, args: Parameters<SpeakArgs>) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'speak'");
        let emotion = match args.0.emotion.as_deref() {
            Some(emotion) => emotion
                .parse::<Emotion>()
                .map_err(|e| failure("speak", e))?,
            None => Emotion::default(),
        };
        let utterance = self
            .speaker
            .speak(&args.0.text, emotion)
            .await
            .map_err(|e| failure("speak", e))?;
        Ok(format!(
            "Speaking: \"{}\" with {} emotion using {}",
            utterance.text, utterance.emotion, utterance.voice
        ))
    }

    #[tool(description = "List the available voices and the one currently in use.")]
    pub async fn list_voices(&self) -> Result<String, String> {
        info!("Executing tool 'list_voices'");
        let list = VoiceList {
            current: self.speaker.voice().await.id(),
            voices: Voice::ALL.into_iter().map(VoiceInfo::from).collect(),
        };
        serde_json::to_string_pretty(&list).map_err(|e| format!("Failed to list voices: {e}"))
    }

    #[tool(description = "Change the voice used by speak.")]
    pub async fn set_voice(&self, args: Parameters<SetVoiceArgs>) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'set_voice'");
        let voice: Voice = args.0.voice_id.parse().map_err(|e| failure("set_voice", e))?;
        self.speaker.set_voice(voice).await;
        let profile = voice.profile();
        Ok(format!(
            "Voice changed to: {} ({}) - {} voice\n{} style with {:+}Hz pitch adjustment",
            voice,
            profile.name,
            voice.accent(),
            profile.style,
            profile.pitch_hz
        ))
    }

    #[tool(description = "Show the avatar at a screen position, starting an animation or pose.")]
    pub async fn show_avatar(&self, args: Parameters<ShowAvatarArgs>) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'show_avatar'");
        let fail = |e| failure("show_avatar", e);
        let position = Position {
            x: pixel("x", args.0.x.unwrap_or(f64::from(DEFAULT_POSITION.x))).map_err(fail)?,
            y: pixel("y", args.0.y.unwrap_or(f64::from(DEFAULT_POSITION.y))).map_err(fail)?,
        };
        let id = args.0.animation.as_deref().unwrap_or(DEFAULT_POSE);
        let definition = self.avatar.resolve_animation(id).await.map_err(fail)?;

        self.avatar.set_position(position).await.map_err(fail)?;
        self.avatar.set_visible(true).await.map_err(fail)?;
        let definition = self
            .avatar
            .start_animation(AnimationRequest::Definition(definition))
            .await
            .map_err(fail)?;
        Ok(format!(
            "Avatar shown at position ({}, {}) playing animation: {}",
            position.x, position.y, definition.name
        ))
    }

    #[tool(description = "Hide the avatar window.")]
    pub async fn hide_avatar(&self) -> Result<String, String> {
        info!("Executing tool 'hide_avatar'");
        self.avatar
            .set_visible(false)
            .await
            .map_err(|e| failure("hide_avatar", e))?;
        Ok("Avatar hidden".to_string())
    }

    #[tool(description = "Move the avatar to a screen position without interrupting its animation.")]
    pub async fn move_avatar(&self, args: Parameters<MoveAvatarArgs>) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'move_avatar'");
        let fail = |e| failure("move_avatar", e);
        let position = Position {
            x: pixel("x", args.0.x).map_err(fail)?,
            y: pixel("y", args.0.y).map_err(fail)?,
        };
        self.avatar.set_position(position).await.map_err(fail)?;
        self.avatar.set_visible(true).await.map_err(fail)?;
        Ok(format!("Avatar moved to position ({}, {})", position.x, position.y))
    }

    #[tool(description = "Show a single pose. Stops any running animation.")]
    pub async fn set_avatar_pose(&self, args: Parameters<SetPoseArgs>) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'set_avatar_pose'");
        self.avatar
            .set_pose(&args.0.pose)
            .await
            .map_err(|e| failure("set_avatar_pose", e))?;
        Ok(format!("Avatar pose set to: {}", args.0.pose.trim()))
    }

    #[tool(description = "Play an animation by id. A pose name plays that single pose.")]
    pub async fn play_animation(&self, args: Parameters<PlayAnimationArgs>) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'play_animation'");
        let definition = self
            .avatar
            .start_animation(args.0.id.as_str())
            .await
            .map_err(|e| failure("play_animation", e))?;
        Ok(format!(
            "Playing animation: {}{}",
            definition.name,
            if definition.looping { " (looping)" } else { "" }
        ))
    }

    #[tool(description = "Stop the running animation, keeping the current frame on screen.")]
    pub async fn stop_animation(&self) -> Result<String, String> {
        info!("Executing tool 'stop_animation'");
        let was_running = self
            .avatar
            .stop_animation()
            .await
            .map_err(|e| failure("stop_animation", e))?;
        Ok(if was_running {
            "Animation stopped".to_string()
        } else {
            "No animation was running".to_string()
        })
    }

    #[tool(description = "Create and save a custom animation from a list of poses.")]
    pub async fn create_animation(
        &self,
        args: Parameters<CreateAnimationArgs>,
    ) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'create_animation'");
        let args = args.0;
        let definition = AnimationDefinition {
            id: args.id,
            name: args.name.trim().to_string(),
            frames: parse_frames(&args.frames),
            fps: args.fps.unwrap_or(DEFAULT_FPS),
            looping: args.looping.unwrap_or(false),
            builtin: false,
        };
        let saved = self
            .avatar
            .define_animation(definition)
            .await
            .map_err(|e| failure("create_animation", e))?;
        Ok(format!(
            "Created animation: \"{}\" ({} frames at {} FPS)\nID: {}",
            saved.name,
            saved.frames.len(),
            saved.fps,
            saved.id
        ))
    }

    #[tool(description = "List all saved animations: single poses, built-in sequences and custom ones.")]
    pub async fn list_animations(&self) -> Result<String, String> {
        info!("Executing tool 'list_animations'");
        Ok(format_animations(&self.avatar.animations().await))
    }

    #[tool(description = "List the sprite poses the avatar can show.")]
    pub async fn list_poses(&self) -> Result<String, String> {
        info!("Executing tool 'list_poses'");
        let poses = self
            .avatar
            .poses()
            .await
            .map_err(|e| failure("list_poses", e))?;
        let mut output = String::from("Available Sprite Poses:\n\n");
        for pose in &poses {
            let _ = writeln!(output, "  - {pose}");
        }
        let _ = write!(output, "\nTotal: {} poses", poses.len());
        Ok(output)
    }

    #[tool(description = "Search Giphy for GIFs. Results are numbered for show_gif.")]
    pub async fn search_gifs(&self, args: Parameters<SearchGifsArgs>) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'search_gifs'");
        let fail = |e| failure("search_gifs", e);
        let rating = match args.0.rating.as_deref() {
            Some(rating) => rating.parse::<GifRating>().map_err(fail)?,
            None => GifRating::default(),
        };
        let query = args.0.query.trim();
        let results = self
            .gifs
            .search(query, args.0.limit.unwrap_or(DEFAULT_LIMIT), rating)
            .await
            .map_err(fail)?;

        if results.is_empty() {
            return Ok(format!("No GIFs found for \"{query}\""));
        }
        let mut output = format!(
            "Found {} GIFs for \"{query}\"! Use show_gif with the number to display one:\n",
            results.len()
        );
        for (i, gif) in results.iter().enumerate() {
            let _ = write!(
                output,
                "\n{}. **{}**\n   Preview: {}\n   Full: {}\n   Size: {}x{}\n",
                i + 1,
                gif.title,
                gif.preview_url,
                gif.url,
                gif.width,
                gif.height
            );
        }
        output.push_str("\nTip: Use show_gif(gif_number=1) to display the first result.");
        Ok(output)
    }

    #[tool(description = "Temporarily replace the avatar with a GIF, by search result number or URL.")]
    pub async fn show_gif(&self, args: Parameters<ShowGifArgs>) -> Result<String, String> {
        info!(args = ?args.0, "Executing tool 'show_gif'");
        let fail = |e| failure("show_gif", e);
        let seconds = args.0.duration.unwrap_or(DEFAULT_GIF_SECONDS);
        if !seconds.is_finite() || seconds <= 0.0 || seconds > MAX_GIF_SECONDS {
            return Err(fail(CompanionError::validation(format!(
                "duration must be between 0 and {MAX_GIF_SECONDS} seconds, got {seconds}"
            ))));
        }

        let url = match (args.0.gif_number, args.0.url.as_deref().map(str::trim)) {
            (Some(number), _) => self.gifs.resolve(number).await.map_err(fail)?.url,
            (None, Some(url)) if !url.is_empty() => url.to_string(),
            _ => {
                return Err(fail(CompanionError::validation(
                    "Please provide either a gif_number from search results or a direct URL.",
                )));
            }
        };

        self.avatar
            .show_gif(&url, Duration::from_secs_f64(seconds))
            .await
            .map_err(|e| format!("{}\n\nGIF URL: {url}", fail(e)))?;
        Ok(format!(
            "Displaying GIF for {seconds} seconds! The GIF replaces the avatar temporarily."
        ))
    }
}

/// Logs a failed tool call and renders the error for the agent.
fn failure(tool: &str, err: CompanionError) -> String {
    warn!(tool, error = %err, "Tool call failed");
    match err {
        CompanionError::Validation(message) => message,
        other => other.to_string(),
    }
}

/// Rounds a coordinate to whole pixels.
fn pixel(axis: &str, value: f64) -> Result<i32, CompanionError> {
    let rounded = value.round();
    if !rounded.is_finite() || rounded < f64::from(i32::MIN) || rounded > f64::from(i32::MAX) {
        return Err(CompanionError::validation(format!(
            "{axis} must be a finite screen coordinate, got {value}"
        )));
    }
    Ok(rounded as i32)
}

fn format_animations(animations: &[AnimationDefinition]) -> String {
    let describe = |a: &AnimationDefinition| {
        format!(
            "  - {} - {} ({} frames, {} FPS{})\n",
            a.id,
            a.name,
            a.frames.len(),
            a.fps,
            if a.looping { ", loops" } else { "" }
        )
    };

    let mut output = String::from("Available Animations:\n");
    let poses: Vec<_> = animations
        .iter()
        .filter(|a| a.builtin && a.frames.len() == 1)
        .collect();
    if !poses.is_empty() {
        output.push_str("\nSingle Poses:\n");
        for a in poses {
            let _ = writeln!(output, "  - {} - {}", a.id, a.name);
        }
    }

    let sequences: Vec<_> = animations
        .iter()
        .filter(|a| a.builtin && a.frames.len() > 1)
        .collect();
    if !sequences.is_empty() {
        output.push_str("\nBuilt-in Sequences:\n");
        sequences.into_iter().for_each(|a| output.push_str(&describe(a)));
    }

    let custom: Vec<_> = animations.iter().filter(|a| !a.builtin).collect();
    if !custom.is_empty() {
        output.push_str("\nCustom Animations:\n");
        custom.into_iter().for_each(|a| output.push_str(&describe(a)));
    }

    if animations.is_empty() {
        output.push_str("\n(none yet, use create_animation to add one)\n");
    }
    output
}
