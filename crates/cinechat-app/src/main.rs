//! Cinechat binary - composition root.
//!
//! 1. Load configuration from TOML and apply CLI/env overrides
//! 2. Start speech playback on the configured synthesizer
//! 3. Build the conversation controller around the HTTP chat backend
//! 4. Render controller events and read commands from stdin until /quit

mod cli;
mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use cinechat_chat::{
    ChatBackend, ConversationController, HttpChatBackend, RejectReason, SubmitOutcome,
};
use cinechat_core::config::{CinechatConfig, SpeechBackendKind, SpeechConfig};
use cinechat_core::events::DomainEvent;
use cinechat_core::types::{FineTuneSettings, Timestamp};
use cinechat_speech::{
    spawn_playback, NullEngine, PlaybackService, ProcessEngine, SpeechEngine,
};

use cli::CliArgs;
use repl::Command;

/// Start speech playback, falling back to the silent engine when the
/// configured synthesizer is missing.
fn start_speech(config: &SpeechConfig) -> PlaybackService {
    let kind = config.backend;
    spawn_playback(
        move |notifier| -> Box<dyn SpeechEngine> {
            if kind == SpeechBackendKind::None {
                return Box::new(NullEngine::new(notifier));
            }
            match ProcessEngine::locate(kind, notifier.clone()) {
                Ok(engine) => Box::new(engine),
                Err(e) => {
                    tracing::warn!(error = %e, "Speech synthesizer unavailable, narration will be silent");
                    Box::new(NullEngine::new(notifier))
                }
            }
        },
        config.enabled,
        config.gender,
    )
}

fn clock(ts: Timestamp) -> String {
    ts.to_datetime()
        .with_timezone(&chrono::Local)
        .format("%H:%M")
        .to_string()
}

/// Print character replies and the thinking indicator as events arrive.
async fn render_events(mut events: broadcast::Receiver<DomainEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Renderer fell behind, some events were dropped");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        let at = clock(event.timestamp());
        match event {
            DomainEvent::RequestStarted { character, .. } => {
                println!("[{}] {} is thinking...", at, character);
            }
            DomainEvent::TurnAppended { turn, .. } => {
                if !turn.is_user() {
                    println!("[{}] {}", at, repl::render_turn(&turn));
                }
            }
            DomainEvent::RequestFinished {
                character,
                success,
                latency_ms,
                ..
            } => {
                tracing::debug!(%character, success, latency_ms, "Turn complete");
            }
            _ => {}
        }
    }
}

/// Long-lived pieces the command loop works on.
struct Session {
    controller: Arc<ConversationController>,
    playback: PlaybackService,
    /// Configuration as loaded, before CLI and env overrides.
    config: CinechatConfig,
    config_file: PathBuf,
}

impl Session {
    /// Write the current sliders and voice preferences back to the config file.
    fn save(&self) -> cinechat_core::Result<()> {
        let mut config = self.config.clone();
        let state = self.controller.snapshot();
        config.chat.personality = state.settings.personality();
        config.chat.creativity = state.settings.creativity();
        let status = self.playback.status.borrow().clone();
        config.speech.enabled = status.enabled;
        config.speech.gender = status.gender;
        config.save(&self.config_file)
    }
}

/// Hand a message to the controller without blocking input.
fn send_message(controller: &Arc<ConversationController>, text: String) {
    let state = controller.snapshot();
    if state.pending {
        println!(
            "  Still waiting for {} to answer, message not sent.",
            state.character
        );
        return;
    }

    let controller = Arc::clone(controller);
    tokio::spawn(async move {
        let outcome = controller
            .submit_message(&state.character, &text, state.settings)
            .await;
        match outcome {
            SubmitOutcome::Rejected(RejectReason::EmptyCharacter) => {
                println!("  Pick a character first with /character <name>.");
            }
            SubmitOutcome::Rejected(RejectReason::EmptyMessage) => {}
            SubmitOutcome::Rejected(RejectReason::Busy) => {
                println!("  Still waiting for an answer, message not sent.");
            }
            SubmitOutcome::Replied | SubmitOutcome::Failed => {}
        }
    });
}

fn log_speech_error(result: Result<(), cinechat_speech::SpeechError>) {
    if let Err(e) = result {
        tracing::warn!(error = %e, "Speech playback command failed");
    }
}

/// Apply one command. Returns `false` on /quit.
fn dispatch(command: Command, session: &Session) -> bool {
    let controller = &session.controller;
    let speech = &session.playback.handle;
    match command {
        Command::Empty => {}
        Command::Message(text) => send_message(controller, text),
        Command::Character(name) => {
            println!("  Now talking to {}.", name);
            controller.set_character(name);
        }
        Command::Personality(value) => {
            controller.set_personality(value);
            println!("  Personality set to {}.", value);
        }
        Command::Creativity(value) => {
            controller.set_creativity(value);
            println!("  Creativity set to {}.", value);
        }
        Command::Settings => {
            let state = controller.snapshot();
            println!("{}", repl::render_settings(&state.character, &state.settings));
            let status = session.playback.status.borrow().clone();
            println!(
                "Voice: {} ({}, {})\nPlayback: {}",
                if status.enabled { "on" } else { "off" },
                status.gender,
                status.voice.as_deref().unwrap_or("no voice yet"),
                status.state
            );
        }
        Command::Voice(enabled) => {
            log_speech_error(speech.set_enabled(enabled));
            println!("  Voice {}.", if enabled { "on" } else { "off" });
        }
        Command::Gender(gender) => {
            log_speech_error(speech.set_gender(gender));
            println!("  Narrator voice: {}.", gender);
        }
        Command::Voices => {
            let status = session.playback.status.borrow().clone();
            println!("{}", repl::render_voices(&status.voices, status.voice.as_deref()));
        }
        Command::SelectVoice(index) => {
            let status = session.playback.status.borrow().clone();
            match status.voices.get(index) {
                Some(voice) => {
                    log_speech_error(speech.select_voice(index));
                    println!("  Narrating with {} ({}).", voice.name, voice.language);
                }
                None => println!(
                    "  No voice number {}, /voices lists {}.",
                    index + 1,
                    status.voices.len()
                ),
            }
        }
        Command::PauseOrResume if !session.playback.status.borrow().state.is_active() => {
            println!("  Nothing is playing.");
        }
        Command::PauseOrResume => log_speech_error(speech.pause_or_resume()),
        Command::Stop => log_speech_error(speech.stop()),
        Command::History => {
            let transcript = controller.transcript();
            if transcript.is_empty() {
                println!("  No messages yet.");
            }
            for turn in &transcript {
                println!("{}", repl::render_turn(turn));
            }
        }
        Command::Save => match session.save() {
            Ok(()) => println!("  Settings saved to {}.", session.config_file.display()),
            Err(e) => {
                tracing::warn!(path = %session.config_file.display(), error = %e, "Saving config failed");
                println!("  Could not save settings: {}", e);
            }
        },
        Command::Help => println!("{}", repl::HELP),
        Command::Quit => return false,
    }
    true
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config first so its log level can seed the filter.
    let config_file = args.resolve_config_path();
    let loaded = CinechatConfig::load(&config_file);
    let file_config = loaded.as_ref().cloned().unwrap_or_default();
    let mut config = file_config.clone();

    let level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level)),
        )
        .init();

    tracing::info!("Starting Cinechat v{}", env!("CARGO_PKG_VERSION"));
    match loaded {
        Ok(_) => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Err(e) => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
    }

    args.apply_speech_overrides(&mut config);
    let endpoint = args.resolve_endpoint(&config.chat.endpoint);
    tracing::info!(%endpoint, "Chat endpoint");

    // Speech.
    let playback = start_speech(&config.speech);

    // Conversation.
    let backend: Arc<dyn ChatBackend> = Arc::new(HttpChatBackend::new(endpoint));
    let controller = Arc::new(
        ConversationController::new(backend)
            .with_settings(FineTuneSettings::new(
                config.chat.personality,
                config.chat.creativity,
            ))
            .with_speech(playback.handle.clone()),
    );
    if let Some(ref name) = args.character {
        controller.set_character(name.as_str());
    }

    let renderer = tokio::spawn(render_events(controller.subscribe()));
    let session = Session {
        controller,
        playback,
        config: file_config,
        config_file,
    };

    println!("{}", repl::BANNER);
    let initial = session.controller.snapshot();
    println!("{}", repl::render_settings(&initial.character, &initial.settings));
    println!("Type /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match repl::parse_line(&line) {
                    Ok(command) => {
                        if !dispatch(command, &session) {
                            break;
                        }
                    }
                    Err(msg) => println!("  {}", msg),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    // Shutdown.
    log_speech_error(session.playback.handle.shutdown());
    if let Err(e) = session.playback.task.await {
        tracing::warn!(error = %e, "Speech playback task ended abnormally");
    }
    renderer.abort();
    tracing::info!("Cinechat stopped");
    Ok(())
}
