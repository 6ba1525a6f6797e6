//! # refund_chat - Conversation layer for the refund bot
//!
//! This crate wraps a [`refund_engine::ConversationSession`] with the
//! collaborators a text conversation needs:
//! - Fact extraction from customer messages
//! - Question phrasing for the fact the engine is waiting on
//! - Customer profile loading
//! - Configuration and conversation export
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────────┐     ┌─────────────────────┐
//! │ Customer text   │────▶│ ConversationManager  │────▶│ ConversationSession │
//! └─────────────────┘     └──────────┬───────────┘     └─────────────────────┘
//!                                    │
//!         ┌──────────────────────────┼──────────────────────────┐
//!         ▼                          ▼                          ▼
//! ┌───────────────┐        ┌──────────────────┐       ┌───────────────────┐
//! │ FactExtractor │        │ QuestionGenerator│       │ ConversationStore │
//! └───────────────┘        └──────────────────┘       └───────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod manager;
pub mod persistence;
pub mod profiles;
pub mod question;
pub mod types;

pub use config::*;
pub use error::*;
pub use extract::*;
pub use manager::*;
pub use persistence::*;
pub use profiles::*;
pub use question::*;
pub use types::*;
