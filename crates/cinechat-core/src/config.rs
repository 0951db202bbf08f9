use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CinechatError, Result};
use crate::types::{VoiceGender, FINE_TUNE_DEFAULT};

/// Default remote chat endpoint.
pub const DEFAULT_CHAT_ENDPOINT: &str = "https://ai-character-chatbot.vercel.app/api/chat";

/// Top-level configuration for Cinechat.
///
/// Loaded from `~/.cinechat/config.toml` by default. Every section is
/// optional and falls back to its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CinechatConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
}

impl CinechatConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CinechatConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| CinechatError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Remote chat endpoint and the initial slider positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// URL that receives `POST` chat requests.
    pub endpoint: String,
    /// Initial personality setting (0-100).
    pub personality: u8,
    /// Initial creativity setting (0-100).
    pub creativity: u8,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_CHAT_ENDPOINT.to_string(),
            personality: FINE_TUNE_DEFAULT,
            creativity: FINE_TUNE_DEFAULT,
        }
    }
}

/// Which local synthesizer narrates replies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechBackendKind {
    /// `espeak-ng`, falling back to `espeak`.
    #[default]
    Espeak,
    /// macOS `say`.
    Say,
    /// Silent engine; playback state is still tracked.
    None,
}

impl std::str::FromStr for SpeechBackendKind {
    type Err = CinechatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "espeak" | "espeak-ng" => Ok(SpeechBackendKind::Espeak),
            "say" => Ok(SpeechBackendKind::Say),
            "none" | "off" => Ok(SpeechBackendKind::None),
            other => Err(CinechatError::InvalidInput(format!(
                "unknown speech backend '{}', expected espeak, say or none",
                other
            ))),
        }
    }
}

/// Speech narration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Narrate character replies on startup.
    pub enabled: bool,
    /// Preferred voice gender.
    pub gender: VoiceGender,
    /// Synthesizer backend.
    pub backend: SpeechBackendKind,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            gender: VoiceGender::Male,
            backend: SpeechBackendKind::default(),
        }
    }
}
