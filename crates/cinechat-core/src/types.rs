use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CinechatError;

// =============================================================================
// Enums
// =============================================================================

/// Preferred gender of the narrating voice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceGender {
    #[default]
    Male,
    Female,
}

impl VoiceGender {
    /// The other gender. Used when excluding voices in the selection fallback.
    pub fn opposite(&self) -> Self {
        match self {
            VoiceGender::Male => VoiceGender::Female,
            VoiceGender::Female => VoiceGender::Male,
        }
    }
}

impl fmt::Display for VoiceGender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceGender::Male => write!(f, "male"),
            VoiceGender::Female => write!(f, "female"),
        }
    }
}

impl FromStr for VoiceGender {
    type Err = CinechatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(VoiceGender::Male),
            "female" | "f" => Ok(VoiceGender::Female),
            other => Err(CinechatError::InvalidInput(format!(
                "unknown voice gender '{}', expected male or female",
                other
            ))),
        }
    }
}

// =============================================================================
// Newtype Wrappers - Identity
// =============================================================================

/// Unique identifier for a single speech utterance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UtteranceId(pub Uuid);

impl UtteranceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UtteranceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Newtype Wrappers - Temporal
// =============================================================================

/// Unix timestamp in seconds since epoch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or_default()
    }
}

// =============================================================================
// Conversation
// =============================================================================

/// Upper bound of the personality and creativity sliders.
pub const FINE_TUNE_MAX: u8 = 100;

/// Starting slider position for both settings.
pub const FINE_TUNE_DEFAULT: u8 = 50;

/// Persona tuning sent verbatim with every chat request.
///
/// Both values live in `0..=FINE_TUNE_MAX`; out-of-range input is clamped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FineTuneSettings {
    personality: u8,
    creativity: u8,
}

impl FineTuneSettings {
    pub fn new(personality: u8, creativity: u8) -> Self {
        Self {
            personality: personality.min(FINE_TUNE_MAX),
            creativity: creativity.min(FINE_TUNE_MAX),
        }
    }

    pub fn personality(&self) -> u8 {
        self.personality
    }

    pub fn creativity(&self) -> u8 {
        self.creativity
    }

    pub fn set_personality(&mut self, value: u8) {
        self.personality = value.min(FINE_TUNE_MAX);
    }

    pub fn set_creativity(&mut self, value: u8) {
        self.creativity = value.min(FINE_TUNE_MAX);
    }
}

impl Default for FineTuneSettings {
    fn default() -> Self {
        Self::new(FINE_TUNE_DEFAULT, FINE_TUNE_DEFAULT)
    }
}

/// One entry of the chat transcript.
///
/// Turns are immutable once created: fields are only readable through
/// accessors. `character` is the persona name the turn belongs to, for both
/// user and character turns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    text: String,
    is_user: bool,
    character: String,
}

impl ChatTurn {
    /// A turn typed by the user, addressed to `character`.
    pub fn user(text: impl Into<String>, character: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: true,
            character: character.into(),
        }
    }

    /// A turn spoken by `character` (a reply or the fallback message).
    pub fn character(text: impl Into<String>, character: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: false,
            character: character.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_user(&self) -> bool {
        self.is_user
    }

    pub fn character_name(&self) -> &str {
        &self.character
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_gender_default_is_male() {
        assert_eq!(VoiceGender::default(), VoiceGender::Male);
    }

    #[test]
    fn test_voice_gender_opposite() {
        assert_eq!(VoiceGender::Male.opposite(), VoiceGender::Female);
        assert_eq!(VoiceGender::Female.opposite(), VoiceGender::Male);
    }

    #[test]
    fn test_voice_gender_parse() {
        assert_eq!("male".parse::<VoiceGender>().unwrap(), VoiceGender::Male);
        assert_eq!("Female".parse::<VoiceGender>().unwrap(), VoiceGender::Female);
        assert_eq!(" f ".parse::<VoiceGender>().unwrap(), VoiceGender::Female);
        assert!("robot".parse::<VoiceGender>().is_err());
    }

    #[test]
    fn test_voice_gender_serialization() {
        let json = serde_json::to_string(&VoiceGender::Female).unwrap();
        assert_eq!(json, "\"female\"");
        let back: VoiceGender = serde_json::from_str("\"male\"").unwrap();
        assert_eq!(back, VoiceGender::Male);
    }

    #[test]
    fn test_fine_tune_defaults() {
        let s = FineTuneSettings::default();
        assert_eq!(s.personality(), 50);
        assert_eq!(s.creativity(), 50);
    }

    #[test]
    fn test_fine_tune_clamps() {
        let mut s = FineTuneSettings::new(250, 101);
        assert_eq!(s.personality(), 100);
        assert_eq!(s.creativity(), 100);

        s.set_personality(0);
        s.set_creativity(200);
        assert_eq!(s.personality(), 0);
        assert_eq!(s.creativity(), 100);
    }

    #[test]
    fn test_chat_turn_constructors() {
        let user = ChatTurn::user("Hello", "Yoda");
        assert!(user.is_user());
        assert_eq!(user.text(), "Hello");
        assert_eq!(user.character_name(), "Yoda");

        let reply = ChatTurn::character("Hmm, young one.", "Yoda");
        assert!(!reply.is_user());
        assert_eq!(reply.character_name(), "Yoda");
    }

    #[test]
    fn test_utterance_ids_are_unique() {
        assert_ne!(UtteranceId::new(), UtteranceId::new());
    }

    #[test]
    fn test_timestamp_to_datetime_roundtrip() {
        let now = Utc::now();
        let ts = Timestamp::from_datetime(now);
        assert_eq!(ts.to_datetime().timestamp(), now.timestamp());
    }
}
