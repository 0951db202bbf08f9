//! Playback state machine.
//!
//! Valid transitions for a single utterance:
//! - Idle -> Speaking (speak with a selected voice)
//! - Speaking -> Paused (pause)
//! - Paused -> Speaking (resume)
//! - Speaking -> Idle (finished, failed, stopped, or preempted)
//! - Paused -> Idle (failed or stopped)

use std::fmt;

use serde::Serialize;

use cinechat_core::types::{UtteranceId, VoiceGender};

use crate::voice::Voice;

/// Operational state of the speech output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum PlaybackState {
    /// Nothing is audible.
    #[default]
    Idle,
    /// An utterance is playing.
    Speaking,
    /// The active utterance is paused.
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "Idle"),
            PlaybackState::Speaking => write!(f, "Speaking"),
            PlaybackState::Paused => write!(f, "Paused"),
        }
    }
}

impl PlaybackState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &PlaybackState) -> bool {
        matches!(
            (self, target),
            (PlaybackState::Idle, PlaybackState::Speaking)
                | (PlaybackState::Speaking, PlaybackState::Paused)
                | (PlaybackState::Paused, PlaybackState::Speaking)
                | (PlaybackState::Speaking, PlaybackState::Idle)
                | (PlaybackState::Paused, PlaybackState::Idle)
        )
    }

    /// True while an utterance exists, paused or not.
    pub fn is_active(&self) -> bool {
        !matches!(self, PlaybackState::Idle)
    }
}

/// Snapshot of the adapter published to observers after every event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub enabled: bool,
    pub gender: VoiceGender,
    /// Display name of the selected voice, if any.
    pub voice: Option<String>,
    /// Number of voices in the loaded catalog.
    pub catalog_size: usize,
    /// The loaded catalog, in engine order.
    pub voices: Vec<Voice>,
    pub utterance: Option<UtteranceId>,
}

// =============================================================================
// Tests
// =============================================================================
