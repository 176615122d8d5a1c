//! Task Matching for delete requests

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::text::{contains_folded, fold};
use crate::types::Task;

static DELETE_SUBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:borrar|eliminar|quitar)\s+(?:la\s+)?tarea\s+(?:de|para|en)\s+([^.,;:?!]+?)(?:\s+(?:para|por|que|con)\b|[.,;:?!]|$)",
    )
        .expect("Invalid regex")
});

/// Find the task a delete request refers to. Completed tasks are never
/// candidates.
///
/// 1. First task (collection order) whose title appears in the utterance.
/// 2. Otherwise the subject phrase after "tarea de/para/en", but only if
///    exactly one task's subject contains it.
pub fn find_task_to_delete<'a>(text: &str, tasks: &'a [Task]) -> Option<&'a Task> {
    let folded = fold(text);

    let pending = || tasks.iter().filter(|t| !t.completed);

    if let Some(task) = pending().find(|t| {
        let title = fold(t.title.trim());
        !title.is_empty() && folded.contains(&title)
    }) {
        debug!(id = %task.id, title = %task.title, "matched task by title");
        return Some(task);
    }

    let phrase = subject_phrase(text)?;
    let mut candidates = pending().filter(|t| contains_folded(&t.subject, &phrase));
    match (candidates.next(), candidates.next()) {
        (Some(task), None) => {
            debug!(id = %task.id, subject = %task.subject, "matched task by subject");
            Some(task)
        }
        (Some(_), Some(_)) => {
            debug!(%phrase, "ambiguous subject match");
            None
        }
        _ => None,
    }
}

/// Subject phrase from "borrar/eliminar/quitar (la) tarea (de|para|en) <subject>"
fn subject_phrase(text: &str) -> Option<String> {
    let caps = DELETE_SUBJECT.captures(text)?;
    let phrase = caps[1]
        .trim()
        .trim_end_matches(|c: char| matches!(c, '.' | '?' | '!' | ','))
        .trim();
    (!phrase.is_empty()).then(|| phrase.to_string())
}
