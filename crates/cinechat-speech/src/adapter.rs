//! Speech playback adapter.
//!
//! `SpeechPlayback` consumes [`SpeechEvent`]s from one inbound channel. User
//! commands (enable, gender, speak, pause/resume, stop) and engine
//! notifications (catalog loaded, utterance ended or failed) share that
//! channel, so every state change happens in one place and in arrival order.
//! At most one utterance is active; starting a new one cancels the previous.
//!
//! A voice picked by catalog index holds until the gender or the catalog
//! changes, at which point the gender heuristic chooses again.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use cinechat_core::types::{UtteranceId, VoiceGender};

use crate::engine::{EngineNotifier, SpeechEngine};
use crate::error::SpeechError;
use crate::state::{PlaybackState, PlaybackStatus};
use crate::voice::{select_voice, Utterance, Voice};

/// Everything the adapter reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    SetEnabled(bool),
    SetGender(VoiceGender),
    /// Pick a voice by its index in the current catalog.
    SelectVoice(usize),
    Speak(String),
    PauseOrResume,
    Stop,
    /// The engine's voice catalog was (re)loaded.
    VoicesChanged(Vec<Voice>),
    UtteranceEnded(UtteranceId),
    UtteranceFailed(UtteranceId, String),
    Shutdown,
}

/// Cloneable command sender for the playback adapter.
#[derive(Debug, Clone)]
pub struct SpeechHandle {
    tx: mpsc::UnboundedSender<SpeechEvent>,
}

impl SpeechHandle {
    pub fn set_enabled(&self, enabled: bool) -> Result<(), SpeechError> {
        self.send(SpeechEvent::SetEnabled(enabled))
    }

    pub fn set_gender(&self, gender: VoiceGender) -> Result<(), SpeechError> {
        self.send(SpeechEvent::SetGender(gender))
    }

    pub fn select_voice(&self, index: usize) -> Result<(), SpeechError> {
        self.send(SpeechEvent::SelectVoice(index))
    }

    pub fn speak(&self, text: impl Into<String>) -> Result<(), SpeechError> {
        self.send(SpeechEvent::Speak(text.into()))
    }

    pub fn pause_or_resume(&self) -> Result<(), SpeechError> {
        self.send(SpeechEvent::PauseOrResume)
    }

    pub fn stop(&self) -> Result<(), SpeechError> {
        self.send(SpeechEvent::Stop)
    }

    /// Stop playback and end the adapter task.
    pub fn shutdown(&self) -> Result<(), SpeechError> {
        self.send(SpeechEvent::Shutdown)
    }

    fn send(&self, event: SpeechEvent) -> Result<(), SpeechError> {
        self.tx.send(event).map_err(|_| SpeechError::ChannelClosed)
    }
}

/// The playback state machine wrapped around a [`SpeechEngine`].
pub struct SpeechPlayback<E: SpeechEngine> {
    engine: E,
    enabled: bool,
    gender: VoiceGender,
    voices: Vec<Voice>,
    selected: Option<Voice>,
    current: Option<UtteranceId>,
    state: PlaybackState,
    status_tx: watch::Sender<PlaybackStatus>,
}

impl<E: SpeechEngine> SpeechPlayback<E> {
    pub fn new(engine: E, enabled: bool, gender: VoiceGender) -> Self {
        let (status_tx, _) = watch::channel(PlaybackStatus {
            enabled,
            gender,
            ..PlaybackStatus::default()
        });
        Self {
            engine,
            enabled,
            gender,
            voices: Vec::new(),
            selected: None,
            current: None,
            state: PlaybackState::Idle,
            status_tx,
        }
    }

    /// Observe status snapshots. The receiver always holds the latest one.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackStatus> {
        self.status_tx.subscribe()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn selected_voice(&self) -> Option<&Voice> {
        self.selected.as_ref()
    }

    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.state,
            enabled: self.enabled,
            gender: self.gender,
            voice: self.selected.as_ref().map(|v| v.name.clone()),
            catalog_size: self.voices.len(),
            voices: self.voices.clone(),
            utterance: self.current,
        }
    }

    /// Apply one event. Returns `false` once the adapter should stop.
    pub fn handle(&mut self, event: SpeechEvent) -> bool {
        let keep_running = match event {
            SpeechEvent::SetEnabled(enabled) => {
                self.set_enabled(enabled);
                true
            }
            SpeechEvent::SetGender(gender) => {
                self.set_gender(gender);
                true
            }
            SpeechEvent::SelectVoice(index) => {
                self.select_by_index(index);
                true
            }
            SpeechEvent::Speak(text) => {
                self.speak(&text);
                true
            }
            SpeechEvent::PauseOrResume => {
                self.pause_or_resume();
                true
            }
            SpeechEvent::Stop => {
                self.stop();
                true
            }
            SpeechEvent::VoicesChanged(voices) => {
                self.voices_changed(voices);
                true
            }
            SpeechEvent::UtteranceEnded(id) => {
                self.utterance_finished(id, None);
                true
            }
            SpeechEvent::UtteranceFailed(id, reason) => {
                self.utterance_finished(id, Some(reason));
                true
            }
            SpeechEvent::Shutdown => {
                self.stop();
                false
            }
        };
        self.status_tx.send_replace(self.status());
        keep_running
    }

    /// Drive the adapter until `Shutdown` arrives or every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SpeechEvent>) {
        tracing::info!(enabled = self.enabled, gender = %self.gender, "Speech playback started");
        while let Some(event) = rx.recv().await {
            if !self.handle(event) {
                break;
            }
        }
        self.engine.cancel();
        tracing::info!("Speech playback stopped");
    }

    fn set_enabled(&mut self, enabled: bool) {
        if self.enabled && !enabled {
            self.stop();
        }
        self.enabled = enabled;
        tracing::debug!(enabled, "Voice output toggled");
    }

    fn set_gender(&mut self, gender: VoiceGender) {
        self.gender = gender;
        if self.current.is_some() {
            self.stop();
        }
        if self.voices.is_empty() {
            self.engine.request_voices();
        }
        self.reselect();
    }

    fn voices_changed(&mut self, voices: Vec<Voice>) {
        if voices.is_empty() {
            tracing::debug!("Engine reported an empty voice catalog, keeping the previous one");
            return;
        }
        tracing::debug!(count = voices.len(), "Voice catalog updated");
        self.voices = voices;
        self.reselect();
    }

    fn select_by_index(&mut self, index: usize) {
        match self.voices.get(index) {
            Some(voice) => {
                tracing::info!(index, voice = %voice.name, "Voice picked from catalog");
                self.selected = Some(voice.clone());
            }
            None => {
                tracing::warn!(
                    index,
                    catalog_size = self.voices.len(),
                    "Voice index out of range, keeping current voice"
                );
            }
        }
    }

    fn reselect(&mut self) {
        self.selected = select_voice(&self.voices, self.gender).cloned();
        if let Some(ref voice) = self.selected {
            tracing::info!(voice = %voice.name, gender = %self.gender, "Voice selected");
        }
    }

    fn speak(&mut self, text: &str) {
        if !self.enabled {
            return;
        }
        let voice = match (self.voices.is_empty(), self.selected.clone()) {
            (false, Some(voice)) => voice,
            _ => {
                tracing::debug!("No voice available yet, skipping narration");
                return;
            }
        };

        self.stop();

        let utterance = Utterance::new(text, voice, self.gender);
        match self.engine.speak(&utterance) {
            Ok(()) => {
                tracing::debug!(
                    utterance_id = %utterance.id,
                    voice = %utterance.voice.name,
                    chars = utterance.text.len(),
                    "Utterance started"
                );
                self.current = Some(utterance.id);
                self.transition(PlaybackState::Speaking);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Speech synthesis failed to start");
            }
        }
    }

    fn pause_or_resume(&mut self) {
        match self.state {
            PlaybackState::Speaking => match self.engine.pause() {
                Ok(()) => self.transition(PlaybackState::Paused),
                Err(e) => tracing::warn!(error = %e, "Pause failed"),
            },
            PlaybackState::Paused => match self.engine.resume() {
                Ok(()) => self.transition(PlaybackState::Speaking),
                Err(e) => tracing::warn!(error = %e, "Resume failed"),
            },
            PlaybackState::Idle => {}
        }
    }

    fn stop(&mut self) {
        self.engine.cancel();
        self.current = None;
        self.transition(PlaybackState::Idle);
    }

    fn utterance_finished(&mut self, id: UtteranceId, failure: Option<String>) {
        if let Some(ref reason) = failure {
            tracing::warn!(utterance_id = %id, reason = %reason, "Speech synthesis error");
        }
        if self.current != Some(id) {
            tracing::debug!(utterance_id = %id, "Ignoring notification for a superseded utterance");
            return;
        }
        self.current = None;
        self.transition(PlaybackState::Idle);
    }

    fn transition(&mut self, target: PlaybackState) {
        if self.state == target {
            return;
        }
        if self.state.can_transition_to(&target) {
            tracing::debug!("Playback state: {} -> {}", self.state, target);
            self.state = target;
        } else {
            tracing::warn!("Ignoring invalid playback transition {} -> {}", self.state, target);
        }
    }
}

/// A running playback adapter.
pub struct PlaybackService {
    pub handle: SpeechHandle,
    pub status: watch::Receiver<PlaybackStatus>,
    pub task: JoinHandle<()>,
}

/// Build the adapter's channel, construct the engine with its notifier, ask
/// for the voice catalog, and spawn the adapter on the current runtime.
pub fn spawn_playback<E, F>(make_engine: F, enabled: bool, gender: VoiceGender) -> PlaybackService
where
    E: SpeechEngine + 'static,
    F: FnOnce(EngineNotifier) -> E,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let mut engine = make_engine(EngineNotifier::new(tx.clone()));
    engine.request_voices();

    let playback = SpeechPlayback::new(engine, enabled, gender);
    let status = playback.subscribe();
    let task = tokio::spawn(playback.run(rx));

    PlaybackService {
        handle: SpeechHandle { tx },
        status,
        task,
    }
}
