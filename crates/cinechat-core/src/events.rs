use serde::{Deserialize, Serialize};

use crate::types::{ChatTurn, Timestamp};

/// Domain events emitted by the conversation controller.
///
/// Consumed by the presentation layer through a broadcast subscription and
/// by the log.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DomainEvent {
    /// A turn was appended to the transcript at `index`.
    TurnAppended {
        index: usize,
        turn: ChatTurn,
        timestamp: Timestamp,
    },

    /// A chat request was issued and the controller is now busy.
    RequestStarted {
        character: String,
        timestamp: Timestamp,
    },

    /// The in-flight chat request completed; the controller is idle again.
    RequestFinished {
        character: String,
        success: bool,
        latency_ms: u64,
        timestamp: Timestamp,
    },
}

impl DomainEvent {
    /// Returns the timestamp of the event.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            DomainEvent::TurnAppended { timestamp, .. }
            | DomainEvent::RequestStarted { timestamp, .. }
            | DomainEvent::RequestFinished { timestamp, .. } => *timestamp,
        }
    }

    /// Returns a human-readable event name for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            DomainEvent::TurnAppended { .. } => "turn_appended",
            DomainEvent::RequestStarted { .. } => "request_started",
            DomainEvent::RequestFinished { .. } => "request_finished",
        }
    }
}
