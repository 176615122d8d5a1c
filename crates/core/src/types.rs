//! Domain models shared by the engine, the assistant and the CLI
//!
//! This module contains:
//! - Tasks, priorities and attachments (owned by the caller's data layer)
//! - Task drafts produced by the slot extractor
//! - Intent kinds and payloads produced per utterance

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ============================================================================
// Tasks
// ============================================================================

/// Task priority
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    /// Spanish label used in replies
    pub fn label(&self) -> &'static str {
        match self {
            Priority::Low => "Baja",
            Priority::Medium => "Media",
            Priority::High => "Alta",
        }
    }

    /// Lenient parse used for LLM output ("alta", "HIGH", "urgente", ...)
    pub fn parse_loose(s: &str) -> Option<Priority> {
        match s.trim().to_lowercase().as_str() {
            "low" | "baja" => Some(Priority::Low),
            "medium" | "media" | "normal" => Some(Priority::Medium),
            "high" | "alta" | "urgente" => Some(Priority::High),
            _ => None,
        }
    }
}

/// Kind of file attached to a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Audio,
    Video,
    Document,
}

/// File attached to a task. The engine never creates these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub kind: AttachmentKind,
    pub url: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,
}

/// A task as stored by the external persistence layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub subject: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: NaiveDateTime,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl Task {
    /// Build a fresh, incomplete task with a new v4 id
    pub fn new(
        subject: impl Into<String>,
        title: impl Into<String>,
        due_date: NaiveDateTime,
        priority: Priority,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            subject: subject.into(),
            title: title.into(),
            description: String::new(),
            due_date,
            priority,
            completed: false,
            attachments: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Partial task assembled from an utterance.
///
/// `subject` is `None` only when the subject fallback policy asks the user
/// instead of guessing.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub subject: Option<String>,
    pub description: String,
    pub priority: Priority,
    pub due_date: NaiveDateTime,
}

impl TaskDraft {
    /// Turn the draft into a persisted-shape task, if it has a subject
    pub fn into_task(self) -> Option<Task> {
        let subject = self.subject?;
        Some(
            Task::new(subject, self.title, self.due_date, self.priority)
                .with_description(self.description),
        )
    }
}

// ============================================================================
// Intents
// ============================================================================

/// Tag of a classified utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    CreateTask,
    DeleteTask,
    QueryToday,
    QueryPending,
    QueryBySubject,
    QueryByWeek,
    Help,
    Greeting,
    Thanks,
    Unknown,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::CreateTask => "create_task",
            IntentKind::DeleteTask => "delete_task",
            IntentKind::QueryToday => "query_today",
            IntentKind::QueryPending => "query_pending",
            IntentKind::QueryBySubject => "query_by_subject",
            IntentKind::QueryByWeek => "query_by_week",
            IntentKind::Help => "help",
            IntentKind::Greeting => "greeting",
            IntentKind::Thanks => "thanks",
            IntentKind::Unknown => "unknown",
        }
    }
}

/// A classified utterance with its extracted slots.
///
/// Built fresh per utterance and consumed by the response composer.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    CreateTask(TaskDraft),
    /// Delete request; the raw utterance is the reference the matcher resolves
    DeleteTask {
        utterance: String,
    },
    QueryToday,
    QueryPending,
    /// Query for one of the known subjects (canonical name)
    QueryBySubject {
        subject: &'static str,
    },
    QueryByWeek,
    Help,
    Greeting,
    Thanks,
    Unknown,
}

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Intent::CreateTask(_) => IntentKind::CreateTask,
            Intent::DeleteTask { .. } => IntentKind::DeleteTask,
            Intent::QueryToday => IntentKind::QueryToday,
            Intent::QueryPending => IntentKind::QueryPending,
            Intent::QueryBySubject { .. } => IntentKind::QueryBySubject,
            Intent::QueryByWeek => IntentKind::QueryByWeek,
            Intent::Help => IntentKind::Help,
            Intent::Greeting => IntentKind::Greeting,
            Intent::Thanks => IntentKind::Thanks,
            Intent::Unknown => IntentKind::Unknown,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
