//! Conversation controller: owns the transcript and drives one turn at a time.
//!
//! The controller holds the form state (character name, draft message,
//! fine-tune settings), the append-only transcript, and the pending flag.
//! Observers poll [`ConversationController::snapshot`] or subscribe to
//! [`DomainEvent`]s. At most one request is in flight; `submit` while pending
//! is rejected without touching the transcript.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::broadcast;

use cinechat_core::events::DomainEvent;
use cinechat_core::types::{ChatTurn, FineTuneSettings, Timestamp};
use cinechat_speech::SpeechHandle;

use crate::client::{ChatBackend, ChatRequest};

/// Transcript entry shown when a chat request fails for any reason.
pub const FALLBACK_MESSAGE: &str =
    "Action cut! We're experiencing technical difficulties connecting with the character.";

/// Capacity of the domain event broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Why a submission was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    EmptyCharacter,
    EmptyMessage,
    Busy,
}

/// Result of [`ConversationController::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing was appended and no request was sent.
    Rejected(RejectReason),
    /// The character replied.
    Replied,
    /// The request failed and the fallback turn was appended.
    Failed,
}

/// Everything the presentation layer needs to draw the chat.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversationState {
    pub character: String,
    pub draft: String,
    pub settings: FineTuneSettings,
    pub transcript: Vec<ChatTurn>,
    pub pending: bool,
}

/// Coordinates form state, the transcript, the chat backend, and narration.
pub struct ConversationController {
    backend: Arc<dyn ChatBackend>,
    speech: Option<SpeechHandle>,
    state: Mutex<ConversationState>,
    events: broadcast::Sender<DomainEvent>,
}

impl ConversationController {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            backend,
            speech: None,
            state: Mutex::new(ConversationState::default()),
            events,
        }
    }

    /// Forward successful replies to a speech playback adapter.
    pub fn with_speech(mut self, speech: SpeechHandle) -> Self {
        self.speech = Some(speech);
        self
    }

    /// Start from the given slider positions instead of the defaults.
    pub fn with_settings(self, settings: FineTuneSettings) -> Self {
        self.lock().settings = settings;
        self
    }

    fn lock(&self) -> MutexGuard<'_, ConversationState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: DomainEvent) {
        tracing::trace!(event = event.event_name(), "Conversation event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> ConversationState {
        self.lock().clone()
    }

    pub fn transcript(&self) -> Vec<ChatTurn> {
        self.lock().transcript.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.lock().pending
    }

    pub fn set_character(&self, name: impl Into<String>) {
        self.lock().character = name.into();
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        self.lock().draft = text.into();
    }

    pub fn set_settings(&self, settings: FineTuneSettings) {
        self.lock().settings = settings;
    }

    pub fn set_personality(&self, value: u8) {
        self.lock().settings.set_personality(value);
    }

    pub fn set_creativity(&self, value: u8) {
        self.lock().settings.set_creativity(value);
    }

    /// Fill in the form and submit it in one call.
    pub async fn submit_message(
        &self,
        character: &str,
        text: &str,
        settings: FineTuneSettings,
    ) -> SubmitOutcome {
        {
            let mut state = self.lock();
            if state.pending {
                return SubmitOutcome::Rejected(RejectReason::Busy);
            }
            state.character = character.to_string();
            state.draft = text.to_string();
            state.settings = settings;
        }
        self.submit().await
    }

    /// Send the current draft to the current character.
    ///
    /// The user turn is appended and the pending flag raised before the first
    /// await point. Whatever the backend does, exactly one character turn
    /// follows, the pending flag drops, and the draft is cleared.
    pub async fn submit(&self) -> SubmitOutcome {
        let (request, user_index, user_turn) = {
            let mut state = self.lock();
            if state.pending {
                return SubmitOutcome::Rejected(RejectReason::Busy);
            }
            if state.character.trim().is_empty() {
                return SubmitOutcome::Rejected(RejectReason::EmptyCharacter);
            }
            if state.draft.trim().is_empty() {
                return SubmitOutcome::Rejected(RejectReason::EmptyMessage);
            }

            let turn = ChatTurn::user(state.draft.clone(), state.character.clone());
            state.transcript.push(turn.clone());
            state.pending = true;
            let request = ChatRequest::new(&state.character, &state.draft, state.settings);
            (request, state.transcript.len() - 1, turn)
        };

        self.emit(DomainEvent::TurnAppended {
            index: user_index,
            turn: user_turn,
            timestamp: Timestamp::now(),
        });
        self.emit(DomainEvent::RequestStarted {
            character: request.character.clone(),
            timestamp: Timestamp::now(),
        });
        tracing::info!(
            character = %request.character,
            personality = request.personality,
            creativity = request.creativity,
            "Sending chat turn"
        );

        let started = Instant::now();
        let result = self.backend.send(&request).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let (text, outcome) = match result {
            Ok(reply) => {
                tracing::info!(character = %request.character, latency_ms, "Character replied");
                (reply, SubmitOutcome::Replied)
            }
            Err(e) => {
                tracing::warn!(character = %request.character, error = %e, latency_ms, "Chat request failed");
                (FALLBACK_MESSAGE.to_string(), SubmitOutcome::Failed)
            }
        };

        let (reply_index, reply_turn) = {
            let mut state = self.lock();
            let turn = ChatTurn::character(text.clone(), request.character.clone());
            state.transcript.push(turn.clone());
            state.pending = false;
            state.draft.clear();
            (state.transcript.len() - 1, turn)
        };

        self.emit(DomainEvent::TurnAppended {
            index: reply_index,
            turn: reply_turn,
            timestamp: Timestamp::now(),
        });

        if outcome == SubmitOutcome::Replied {
            if let Some(ref speech) = self.speech {
                if let Err(e) = speech.speak(text) {
                    tracing::warn!(error = %e, "Could not hand reply to speech playback");
                }
            }
        }

        self.emit(DomainEvent::RequestFinished {
            character: request.character,
            success: outcome == SubmitOutcome::Replied,
            latency_ms,
            timestamp: Timestamp::now(),
        });

        outcome
    }
}
