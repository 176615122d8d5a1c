//! Intent Classification
//!
//! Ordered rule table over Spanish trigger phrases. Rules are tried in
//! table order and the first match decides the intent, so precedence lives
//! in [`RULES`] and nowhere else.

use chrono::NaiveDateTime;
use rand::Rng;
use tracing::debug;

use crate::slots::{known_subject, SlotExtractor};
use crate::text::{has_phrase, Utterance};
use crate::types::{Intent, IntentKind};

pub const CREATE_TRIGGERS: &[&str] = &["crear tarea", "nueva tarea", "agregar tarea"];

pub const DELETE_TRIGGERS: &[&str] = &[
    "borrar tarea",
    "eliminar tarea",
    "quitar tarea",
    "borrar la tarea",
    "eliminar la tarea",
    "quitar la tarea",
];

/// One classification rule
pub struct Rule {
    pub kind: IntentKind,
    pub matches: fn(&Utterance) -> bool,
}

/// Classification precedence, highest first
pub const RULES: &[Rule] = &[
    Rule {
        kind: IntentKind::CreateTask,
        matches: |u| u.has_any(CREATE_TRIGGERS),
    },
    Rule {
        kind: IntentKind::DeleteTask,
        matches: |u| u.has_any(DELETE_TRIGGERS),
    },
    Rule {
        kind: IntentKind::QueryToday,
        matches: |u| u.has("hoy"),
    },
    Rule {
        kind: IntentKind::QueryPending,
        matches: |u| u.contains_any(&["pendiente", "por hacer"]),
    },
    Rule {
        kind: IntentKind::QueryBySubject,
        matches: |u| known_subject(u).is_some(),
    },
    Rule {
        kind: IntentKind::QueryByWeek,
        matches: |u| u.contains_any(&["semana"]),
    },
    Rule {
        kind: IntentKind::Help,
        // "cómo" only with its accent; plain "como" is too common
        matches: |u| u.contains_any(&["ayuda", "que puedes hacer"]) || has_phrase(&u.lower, "cómo"),
    },
    Rule {
        kind: IntentKind::Greeting,
        matches: |u| u.contains_any(&["hola", "que tal", "saludo"]),
    },
    Rule {
        kind: IntentKind::Thanks,
        matches: |u| u.contains_any(&["gracias"]),
    },
];

/// Classify an utterance. Pure: the same text always yields the same kind.
pub fn classify(text: &str) -> IntentKind {
    classify_utterance(&Utterance::new(text))
}

fn classify_utterance(u: &Utterance) -> IntentKind {
    RULES
        .iter()
        .find(|rule| (rule.matches)(u))
        .map(|rule| rule.kind)
        .unwrap_or(IntentKind::Unknown)
}

/// Classifies utterances and fills in their slots
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentParser {
    pub slots: SlotExtractor,
}

impl IntentParser {
    pub fn new(slots: SlotExtractor) -> Self {
        Self { slots }
    }

    pub fn parse<R: Rng + ?Sized>(&self, text: &str, now: NaiveDateTime, rng: &mut R) -> Intent {
        let u = Utterance::new(text);
        let kind = classify_utterance(&u);
        debug!(text, intent = kind.as_str(), "classified utterance");

        match kind {
            IntentKind::CreateTask => Intent::CreateTask(self.slots.draft(text, now, rng)),
            IntentKind::DeleteTask => Intent::DeleteTask {
                utterance: text.to_string(),
            },
            IntentKind::QueryToday => Intent::QueryToday,
            IntentKind::QueryPending => Intent::QueryPending,
            IntentKind::QueryBySubject => match known_subject(&u) {
                Some(subject) => Intent::QueryBySubject { subject },
                None => Intent::Unknown,
            },
            IntentKind::QueryByWeek => Intent::QueryByWeek,
            IntentKind::Help => Intent::Help,
            IntentKind::Greeting => Intent::Greeting,
            IntentKind::Thanks => Intent::Thanks,
            IntentKind::Unknown => Intent::Unknown,
        }
    }
}
