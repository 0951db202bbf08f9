//! Error types for speech playback.

/// Errors from the speech engine or the playback adapter.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("no speech synthesizer found: {0}")]
    Unavailable(String),
    #[error("speech engine error: {0}")]
    Engine(String),
    #[error("operation not supported on this platform: {0}")]
    Unsupported(&'static str),
    #[error("speech playback has shut down")]
    ChannelClosed,
}
