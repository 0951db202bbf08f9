//! The speech engine seam and the notifier engines use to report back.

use tokio::sync::mpsc;

use cinechat_core::types::UtteranceId;

use crate::adapter::SpeechEvent;
use crate::error::SpeechError;
use crate::voice::{Utterance, Voice};

/// A text-to-speech engine driven by the playback adapter.
///
/// Methods return quickly. Anything that completes later (voice catalog
/// loading, utterance completion, synthesis failures) is reported through the
/// [`EngineNotifier`] handed to the engine at construction, never by return
/// value.
pub trait SpeechEngine: Send {
    /// Start (or restart) enumerating voices. The catalog arrives as a
    /// `VoicesChanged` event, possibly more than once.
    fn request_voices(&mut self);

    /// Start speaking `utterance`. Completion is reported with its id.
    fn speak(&mut self, utterance: &Utterance) -> Result<(), SpeechError>;

    /// Silence whatever is playing. Safe to call when idle.
    fn cancel(&mut self);

    fn pause(&mut self) -> Result<(), SpeechError>;

    fn resume(&mut self) -> Result<(), SpeechError>;
}

impl<E: SpeechEngine + ?Sized> SpeechEngine for Box<E> {
    fn request_voices(&mut self) {
        (**self).request_voices()
    }

    fn speak(&mut self, utterance: &Utterance) -> Result<(), SpeechError> {
        (**self).speak(utterance)
    }

    fn cancel(&mut self) {
        (**self).cancel()
    }

    fn pause(&mut self) -> Result<(), SpeechError> {
        (**self).pause()
    }

    fn resume(&mut self) -> Result<(), SpeechError> {
        (**self).resume()
    }
}

/// Sending half of the adapter's inbound channel, restricted to engine
/// notifications.
#[derive(Debug, Clone)]
pub struct EngineNotifier {
    tx: mpsc::UnboundedSender<SpeechEvent>,
}

impl EngineNotifier {
    pub(crate) fn new(tx: mpsc::UnboundedSender<SpeechEvent>) -> Self {
        Self { tx }
    }

    pub fn voices_changed(&self, voices: Vec<Voice>) {
        self.send(SpeechEvent::VoicesChanged(voices));
    }

    pub fn utterance_ended(&self, id: UtteranceId) {
        self.send(SpeechEvent::UtteranceEnded(id));
    }

    pub fn utterance_failed(&self, id: UtteranceId, reason: impl Into<String>) {
        self.send(SpeechEvent::UtteranceFailed(id, reason.into()));
    }

    fn send(&self, event: SpeechEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Speech playback gone, dropping engine notification");
        }
    }
}

/// Silent engine with a one-voice catalog.
///
/// Utterances "finish" as soon as the adapter processes the next event, so
/// playback state still cycles normally. Used when no synthesizer is
/// installed and in headless runs.
#[derive(Debug)]
pub struct NullEngine {
    notifier: EngineNotifier,
}

impl NullEngine {
    pub fn new(notifier: EngineNotifier) -> Self {
        Self { notifier }
    }
}

impl SpeechEngine for NullEngine {
    fn request_voices(&mut self) {
        self.notifier
            .voices_changed(vec![Voice::new("null", "Silent narrator", "und")]);
    }

    fn speak(&mut self, utterance: &Utterance) -> Result<(), SpeechError> {
        tracing::debug!(utterance_id = %utterance.id, chars = utterance.text.len(), "Null engine speaking");
        self.notifier.utterance_ended(utterance.id);
        Ok(())
    }

    fn cancel(&mut self) {}

    fn pause(&mut self) -> Result<(), SpeechError> {
        Ok(())
    }

    fn resume(&mut self) -> Result<(), SpeechError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cinechat_core::types::VoiceGender;

    use super::*;

    #[test]
    fn test_null_engine_reports_catalog_and_completion() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine: Box<dyn SpeechEngine> = Box::new(NullEngine::new(EngineNotifier::new(tx)));

        engine.request_voices();
        let voices = match rx.try_recv().unwrap() {
            SpeechEvent::VoicesChanged(voices) => voices,
            other => panic!("unexpected event: {:?}", other),
        };
        assert_eq!(voices.len(), 1);

        let utterance = Utterance::new("Hello there", voices[0].clone(), VoiceGender::Female);
        engine.speak(&utterance).unwrap();
        match rx.try_recv().unwrap() {
            SpeechEvent::UtteranceEnded(id) => assert_eq!(id, utterance.id),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(engine.pause().is_ok());
        assert!(engine.resume().is_ok());
    }

    #[test]
    fn test_notifier_tolerates_closed_channel() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let notifier = EngineNotifier::new(tx);
        notifier.voices_changed(Vec::new());
        notifier.utterance_ended(UtteranceId::new());
    }
}
