//! Core orchestration: configuration, the per-question retrieval pipeline,
//! and the chat session state machine.

pub mod config;
pub mod pipeline;
pub mod session;

pub use config::{AppConfig, EmbeddingSettings, ProviderSettings, RetrievalConfig};
pub use pipeline::{gather_context, GatheredContext, SkippedFile};
pub use session::{ChatEvent, ChatSession, SessionError, Submission, GREETING};
