//! Chat side of Cinechat.
//!
//! [`HttpChatBackend`] talks to the remote persona service and
//! [`ConversationController`] keeps the transcript, enforces one request in
//! flight, and hands replies to speech playback.

pub mod client;
pub mod controller;
pub mod error;

pub use client::{ChatBackend, ChatReply, ChatRequest, HttpChatBackend};
pub use controller::{
    ConversationController, ConversationState, RejectReason, SubmitOutcome, FALLBACK_MESSAGE,
};
pub use error::ChatError;
