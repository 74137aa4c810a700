//! Playback scheduling for the carousel engine.
//!
//! [`Playback`] is the state machine that walks a carousel through its cycles.
//! It never touches the GPU or the event loop directly: work is scheduled
//! through an injected [`Host`] and rendering is delegated to a [`Stage`].

mod host;
mod manual;
mod playback;

pub use host::{FrameHandle, Host, TimerHandle, TimerKind};
pub use manual::ManualHost;
pub use playback::{
    Cue, Playback, PlaybackError, PlaybackSettings, PlaybackState, Readiness, Stage, Status, Step,
};
