//! Parsing of terminal input lines and rendering of transcript turns.

use cinechat_core::types::{ChatTurn, FineTuneSettings, VoiceGender, FINE_TUNE_MAX};
use cinechat_speech::Voice;

pub const BANNER: &str = "Movie Character Chat";

pub const HELP: &str = "\
Type a message and press Enter to send it to the current character.

  /character <name>      pick who to talk to
  /personality <0-100>   how strongly the character stays in persona
  /creativity <0-100>    how inventive the replies are
  /settings              show the current character and sliders
  /voice on|off          narrate replies
  /gender male|female    narrator voice
  /voices                list the synthesizer's voices
  /voice-select <n>      narrate with voice number n from /voices
  /pause                 pause or resume narration
  /stop                  stop narration
  /history               reprint the conversation
  /save                  store sliders and voice settings in the config file
  /help                  this text
  /quit                  leave";

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Message(String),
    Character(String),
    Personality(u8),
    Creativity(u8),
    Settings,
    Voice(bool),
    Gender(VoiceGender),
    Voices,
    /// Zero-based catalog index.
    SelectVoice(usize),
    PauseOrResume,
    Stop,
    History,
    Save,
    Help,
    Quit,
    Empty,
}

/// Parse a raw input line. Lines not starting with `/` are chat messages.
pub fn parse_line(line: &str) -> Result<Command, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Command::Empty);
    }
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Ok(Command::Message(line.trim_end_matches(['\r', '\n']).to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };

    match name.to_ascii_lowercase().as_str() {
        "character" | "char" => {
            if arg.is_empty() {
                Err("usage: /character <name>".to_string())
            } else {
                Ok(Command::Character(arg.to_string()))
            }
        }
        "personality" => parse_slider(arg).map(Command::Personality),
        "creativity" => parse_slider(arg).map(Command::Creativity),
        "settings" => Ok(Command::Settings),
        "voice" => match arg.to_ascii_lowercase().as_str() {
            "on" => Ok(Command::Voice(true)),
            "off" => Ok(Command::Voice(false)),
            _ => Err("usage: /voice on|off".to_string()),
        },
        "gender" => arg
            .parse::<VoiceGender>()
            .map(Command::Gender)
            .map_err(|e| e.to_string()),
        "voices" => Ok(Command::Voices),
        "voice-select" => match arg.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(Command::SelectVoice(n - 1)),
            _ => Err("usage: /voice-select <n>, numbers as shown by /voices".to_string()),
        },
        "pause" | "resume" => Ok(Command::PauseOrResume),
        "stop" => Ok(Command::Stop),
        "history" => Ok(Command::History),
        "save" => Ok(Command::Save),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command '/{}', try /help", other)),
    }
}

fn parse_slider(arg: &str) -> Result<u8, String> {
    match arg.parse::<u16>() {
        Ok(v) if v <= FINE_TUNE_MAX as u16 => Ok(v as u8),
        _ => Err(format!("expected a number from 0 to {}", FINE_TUNE_MAX)),
    }
}

/// `You: ...` for the user, `<Character>: ...` for replies.
pub fn render_turn(turn: &ChatTurn) -> String {
    if turn.is_user() {
        format!("You: {}", turn.text())
    } else {
        format!("{}: {}", turn.character_name(), turn.text())
    }
}

/// Numbered `name (language)` lines, marking the voice in use.
pub fn render_voices(voices: &[Voice], selected: Option<&str>) -> String {
    if voices.is_empty() {
        return "  No voices loaded yet.".to_string();
    }
    voices
        .iter()
        .enumerate()
        .map(|(i, voice)| {
            let marker = if Some(voice.name.as_str()) == selected { "*" } else { " " };
            format!("{} {:>3}. {} ({})", marker, i + 1, voice.name, voice.language)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_settings(character: &str, settings: &FineTuneSettings) -> String {
    let character = if character.trim().is_empty() {
        "(none, use /character <name>)"
    } else {
        character
    };
    format!(
        "Character: {}\nPersonality: {}\nCreativity: {}",
        character,
        settings.personality(),
        settings.creativity()
    )
}
