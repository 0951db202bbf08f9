pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::CinechatConfig;
pub use error::{CinechatError, Result};
pub use events::DomainEvent;
pub use types::*;
