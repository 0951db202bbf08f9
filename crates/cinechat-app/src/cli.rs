//! CLI argument definitions for the Cinechat terminal client.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use cinechat_core::config::{CinechatConfig, SpeechBackendKind};
use cinechat_core::types::VoiceGender;

/// Cinechat: talk to movie characters from the terminal, optionally out loud.
#[derive(Parser, Debug, Default)]
#[command(name = "cinechat", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Chat endpoint URL.
    #[arg(short = 'e', long = "endpoint")]
    pub endpoint: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Character to talk to on startup.
    #[arg(long = "character")]
    pub character: Option<String>,

    /// Narrate character replies.
    #[arg(long = "voice")]
    pub voice: bool,

    /// Preferred narrator voice (male, female).
    #[arg(short = 'g', long = "gender")]
    pub gender: Option<VoiceGender>,

    /// Speech synthesizer (espeak, say, none).
    #[arg(short = 'b', long = "backend")]
    pub backend: Option<SpeechBackendKind>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CINECHAT_CONFIG env var > ~/.cinechat/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("CINECHAT_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the chat endpoint.
    ///
    /// Priority: --endpoint flag > CINECHAT_ENDPOINT env var > config file value.
    pub fn resolve_endpoint(&self, config_endpoint: &str) -> String {
        if let Some(ref e) = self.endpoint {
            return e.clone();
        }
        if let Ok(e) = std::env::var("CINECHAT_ENDPOINT") {
            if !e.trim().is_empty() {
                return e;
            }
        }
        config_endpoint.to_string()
    }

    /// Resolve the log filter directive. `RUST_LOG` still wins at init time.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    /// Fold speech overrides into the loaded config.
    pub fn apply_speech_overrides(&self, config: &mut CinechatConfig) {
        if self.voice {
            config.speech.enabled = true;
        }
        if let Some(gender) = self.gender {
            config.speech.gender = gender;
        }
        if let Some(backend) = self.backend {
            config.speech.backend = backend;
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".cinechat").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".cinechat").join("config.toml");
    }
    PathBuf::from("config.toml")
}
