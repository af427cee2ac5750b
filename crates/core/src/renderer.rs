//! Client for the avatar-rendering process.
//!
//! The renderer is a separate long-lived process listening on local HTTP. All
//! calls are fire-and-forget: a failure is reported once and never retried.

use crate::animation::AnimationDefinition;
use crate::error::{CompanionError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_RENDERER_URL: &str = "http://localhost:3338";

const RENDERER: &str = "avatar renderer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

/// Partial state update; `None` fields are left unchanged by the renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pose: Option<String>,
}

impl StateUpdate {
    pub fn visible(visible: bool) -> Self {
        Self {
            visible: Some(visible),
            ..Default::default()
        }
    }

    pub fn position(position: Position) -> Self {
        Self {
            position: Some(position),
            ..Default::default()
        }
    }

    pub fn pose(pose: impl Into<String>) -> Self {
        Self {
            pose: Some(pose.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize)]
struct PlayAnimationRequest<'a> {
    id: &'a str,
    name: &'a str,
    frames: &'a [String],
    fps: f64,
    #[serde(rename = "loop")]
    looping: bool,
}

#[derive(Debug, Serialize)]
struct ShowGifRequest<'a> {
    url: &'a str,
    duration: f64,
}

#[async_trait]
pub trait Renderer: Send + Sync {
    /// `POST /state`
    async fn update_state(&self, update: &StateUpdate) -> Result<()>;
    /// `POST /play_animation`
    async fn play_animation(&self, animation: &AnimationDefinition) -> Result<()>;
    /// `DELETE /animate`
    async fn stop_animation(&self) -> Result<()>;
    /// `POST /show_gif`, a transient GIF shown in place of the avatar.
    async fn show_gif(&self, url: &str, duration: Duration) -> Result<()>;
}

pub struct HttpRenderer {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRenderer {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CompanionError::unreachable(RENDERER, e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<()> {
        let response = request.send().await.map_err(|e| {
            CompanionError::unreachable(
                RENDERER,
                format!("{what} failed ({e}); make sure the avatar display is running"),
            )
        })?;
        response.error_for_status().map_err(|e| {
            CompanionError::unreachable(RENDERER, format!("{what} was rejected ({e})"))
        })?;
        debug!(request = what, "Renderer accepted request");
        Ok(())
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn update_state(&self, update: &StateUpdate) -> Result<()> {
        self.send(self.client.post(self.url("/state")).json(update), "state update")
            .await
    }

    async fn play_animation(&self, animation: &AnimationDefinition) -> Result<()> {
        let body = PlayAnimationRequest {
            id: &animation.id,
            name: &animation.name,
            frames: &animation.frames,
            fps: animation.fps,
            looping: animation.looping,
        };
        self.send(
            self.client.post(self.url("/play_animation")).json(&body),
            "play_animation",
        )
        .await
    }

    async fn stop_animation(&self) -> Result<()> {
        self.send(self.client.delete(self.url("/animate")), "stop animation")
            .await
    }

    async fn show_gif(&self, url: &str, duration: Duration) -> Result<()> {
        let body = ShowGifRequest {
            url,
            duration: duration.as_secs_f64(),
        };
        self.send(self.client.post(self.url("/show_gif")).json(&body), "show_gif")
            .await
    }
}
