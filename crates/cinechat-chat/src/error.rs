//! Error types for the chat client.

/// Ways a chat request can fail.
///
/// The controller collapses all of them into the same fallback turn; the
/// variants only matter for logging.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("chat endpoint returned HTTP {0}")]
    Status(u16),
    #[error("malformed chat response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChatError::Decode(err.to_string())
        } else {
            ChatError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(
            ChatError::Transport("connection refused".into()).to_string(),
            "transport error: connection refused"
        );
        assert_eq!(
            ChatError::Status(500).to_string(),
            "chat endpoint returned HTTP 500"
        );
        assert_eq!(
            ChatError::Decode("missing field `response`".into()).to_string(),
            "malformed chat response: missing field `response`"
        );
    }
}
