//! Voice catalog entries, voice selection, and utterance parameters.

use serde::{Deserialize, Serialize};

use cinechat_core::types::{UtteranceId, VoiceGender};

/// Name fragments that mark a voice as female.
pub const FEMALE_TOKENS: [&str; 3] = ["female", "woman", "girl"];

/// Name fragments that mark a voice as male.
pub const MALE_TOKENS: [&str; 3] = ["male", "man", "boy"];

/// Fixed playback rate (1.0 = engine default speed).
pub const PLAYBACK_RATE: f32 = 1.0;

/// Fixed playback volume (1.0 = full).
pub const PLAYBACK_VOLUME: f32 = 1.0;

/// A voice offered by the speech engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Engine-specific identifier passed back when speaking.
    pub id: String,
    /// Display name. Voice selection matches against this.
    pub name: String,
    /// Language or locale tag, informational only.
    pub language: String,
}

impl Voice {
    pub fn new(id: impl Into<String>, name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            language: language.into(),
        }
    }
}

/// Tokens whose presence in a voice name indicates `gender`.
pub fn gender_tokens(gender: VoiceGender) -> &'static [&'static str] {
    match gender {
        VoiceGender::Female => &FEMALE_TOKENS,
        VoiceGender::Male => &MALE_TOKENS,
    }
}

fn name_has_any(name: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|t| name.contains(t))
}

/// Pick the voice to narrate with for `gender`.
///
/// Plain substring matching on the lowercased display name, in three steps:
/// 1. the first voice whose name contains one of the gender's tokens;
/// 2. otherwise the first voice whose name contains none of the opposite
///    gender's tokens;
/// 3. otherwise the first voice in the catalog.
///
/// Returns `None` only for an empty catalog. Note that "female" and "woman"
/// contain the male tokens "male" and "man", so a male request can land on a
/// voice named for a woman when it appears first.
pub fn select_voice(voices: &[Voice], gender: VoiceGender) -> Option<&Voice> {
    let wanted = gender_tokens(gender);
    let excluded = gender_tokens(gender.opposite());

    voices
        .iter()
        .find(|v| name_has_any(&v.name.to_lowercase(), wanted))
        .or_else(|| {
            voices
                .iter()
                .find(|v| !name_has_any(&v.name.to_lowercase(), excluded))
        })
        .or_else(|| voices.first())
}

/// Pitch multiplier for `gender` (1.0 = engine default).
pub fn pitch_for(gender: VoiceGender) -> f32 {
    match gender {
        VoiceGender::Female => 1.2,
        VoiceGender::Male => 0.9,
    }
}

/// A single request to speak `text`.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    pub voice: Voice,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Utterance {
    /// Build an utterance with the fixed rate and volume and the pitch for `gender`.
    pub fn new(text: impl Into<String>, voice: Voice, gender: VoiceGender) -> Self {
        Self {
            id: UtteranceId::new(),
            text: text.into(),
            voice,
            rate: PLAYBACK_RATE,
            pitch: pitch_for(gender),
            volume: PLAYBACK_VOLUME,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(names: &[&str]) -> Vec<Voice> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Voice::new(format!("v{}", i), *n, "en-US"))
            .collect()
    }

    #[test]
    fn test_select_female_by_token() {
        let voices = catalog(&["Daniel", "Google UK English Male", "Google UK English Female"]);
        let v = select_voice(&voices, VoiceGender::Female).unwrap();
        assert_eq!(v.name, "Google UK English Female");
    }

    #[test]
    fn test_select_male_by_token() {
        let voices = catalog(&["Victoria", "Google UK English Male", "Google UK English Female"]);
        let v = select_voice(&voices, VoiceGender::Male).unwrap();
        assert_eq!(v.name, "Google UK English Male");
    }

    #[test]
    fn test_token_match_is_case_insensitive() {
        let voices = catalog(&["Narrator", "BIG BOY VOICE"]);
        let v = select_voice(&voices, VoiceGender::Male).unwrap();
        assert_eq!(v.name, "BIG BOY VOICE");
    }

    #[test]
    fn test_male_tokens_match_inside_female_words() {
        let voices = catalog(&["Samantha (woman)", "Daniel (man)"]);
        let v = select_voice(&voices, VoiceGender::Male).unwrap();
        assert_eq!(v.name, "Samantha (woman)");
    }

    #[test]
    fn test_fallback_excludes_opposite_gender() {
        // No female-tagged voice: skip the male one, take the untagged one.
        let voices = catalog(&["English Male", "Alex", "Fred"]);
        let v = select_voice(&voices, VoiceGender::Female).unwrap();
        assert_eq!(v.name, "Alex");
    }

    #[test]
    fn test_fallback_to_first_voice() {
        // Every name carries a male token, so nothing survives the exclusion.
        let voices = catalog(&["Male One", "Boy Two"]);
        let v = select_voice(&voices, VoiceGender::Female).unwrap();
        assert_eq!(v.name, "Male One");
    }

    #[test]
    fn test_untagged_catalog_male_gets_first_untagged() {
        let voices = catalog(&["Alex", "Victoria"]);
        let v = select_voice(&voices, VoiceGender::Male).unwrap();
        assert_eq!(v.name, "Alex");
    }

    #[test]
    fn test_empty_catalog_selects_nothing() {
        assert!(select_voice(&[], VoiceGender::Male).is_none());
        assert!(select_voice(&[], VoiceGender::Female).is_none());
    }

    #[test]
    fn test_pitch_by_gender() {
        assert!(pitch_for(VoiceGender::Female) > 1.0);
        assert!(pitch_for(VoiceGender::Male) < 1.0);
    }

    #[test]
    fn test_utterance_parameters() {
        let voice = Voice::new("en", "English", "en");
        let u = Utterance::new("Hello there", voice.clone(), VoiceGender::Female);
        assert_eq!(u.text, "Hello there");
        assert_eq!(u.voice, voice);
        assert_eq!(u.rate, 1.0);
        assert_eq!(u.volume, 1.0);
        assert_eq!(u.pitch, 1.2);

        let other = Utterance::new("Hello there", voice, VoiceGender::Male);
        assert_ne!(u.id, other.id);
        assert_eq!(other.pitch, 0.9);
    }
}
