//! Media layer of the desktop companion.
//!
//! Speech is synthesized by [`synthesis`] and played one clip at a time by the
//! [`playback`] queue. The avatar's pose, animation, visibility and position
//! are owned by the [`coordinator`], which drives the [`sequencer`] and relays
//! every change to the external [`renderer`]. [`service`] exposes all of it as
//! MCP tools.

pub mod animation;
pub mod coordinator;
pub mod error;
pub mod gif;
pub mod playback;
pub mod renderer;
pub mod sequencer;
pub mod service;
pub mod speaker;
pub mod synthesis;
pub mod voice;

pub use error::{CompanionError, Result};
