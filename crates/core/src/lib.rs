//! TareaAssist Core Library
//!
//! Homework assistant for students, in Spanish:
//! - Rule-based intent classification and slot extraction
//! - Relative due date resolution ("mañana", "el viernes", "15 de junio")
//! - Reply composition with create/delete side effects
//! - LLM provider seam with structured actions and rule-based fallback
//! - Session settings, access gate and two-factor setup

pub mod types;

pub mod access;
pub mod assistant;
pub mod compose;
pub mod config;
pub mod dates;
pub mod engine;
pub mod error;
pub mod filters;
pub mod intent;
pub mod llm;
pub mod matcher;
pub mod slots;
pub mod text;

// Re-export commonly used types at crate root
pub use types::{Attachment, AttachmentKind, Intent, IntentKind, Priority, Task, TaskDraft};

pub use access::{AccessGate, CodeOutcome, GateStatus, TwoFactor};
pub use assistant::{Assistant, AssistantConfig};
pub use compose::{compose, ComposeContext, TaskActions};
pub use config::{default_session_path, Session, Settings};
pub use engine::{fallback_response, FallbackEngine};
pub use error::{AccessError, ConfigError};
pub use intent::{classify, IntentParser};
pub use llm::{AssistantAction, ChatProvider, ChatRequest, Provider};
pub use slots::{SlotExtractor, SubjectFallback};
