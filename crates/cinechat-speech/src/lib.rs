//! Cinechat Speech crate - narrates character replies through a local voice engine.
//!
//! The [`SpeechPlayback`] adapter owns a strict playback state machine
//! (Idle -> Speaking <-> Paused -> Idle) and is the only authority on what is
//! currently audible. User commands and engine notifications reach it as
//! [`SpeechEvent`]s over a single channel; observers read [`PlaybackStatus`]
//! through a `watch` receiver.

pub mod adapter;
pub mod engine;
pub mod error;
pub mod process;
pub mod state;
pub mod voice;

pub use adapter::{spawn_playback, PlaybackService, SpeechEvent, SpeechHandle, SpeechPlayback};
pub use engine::{EngineNotifier, NullEngine, SpeechEngine};
pub use error::SpeechError;
pub use process::{ProcessEngine, SynthProgram};
pub use state::{PlaybackState, PlaybackStatus};
pub use voice::{select_voice, Utterance, Voice};
