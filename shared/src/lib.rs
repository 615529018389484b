//! Shared library for the chat relay
//!
//! This library contains the relay core and everything around it:
//! - Configuration snapshot loaded from the environment
//! - Webhook target resolution (URL + credential placement)
//! - The outbound relay executor and its result taxonomy
//! - Session/message storage collaborators
//! - Common types, errors and utilities

pub mod config;
pub mod error;
pub mod relay;
pub mod resolver;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::{Config, WebhookConfig};
pub use error::{AppError, Result};
pub use relay::WebhookClient;
pub use resolver::{resolve, ConfigError, WebhookTarget};
pub use store::{ConfigStore, MemoryStore, PgStore, SessionStore};
pub use types::*;
