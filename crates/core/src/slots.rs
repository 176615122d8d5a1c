//! Slot Extraction
//!
//! Pulls title, subject, description and priority out of a free-text task
//! request using ordered pattern rules. First matching rule wins.

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dates;
use crate::text::{capitalize_first, fold, Utterance};
use crate::types::{Priority, TaskDraft};

/// Closed list of school subjects recognized in free text
pub const SUBJECTS: [&str; 8] = [
    "Matemáticas",
    "Español",
    "Ciencias",
    "Historia",
    "Inglés",
    "Física",
    "Química",
    "Biología",
];

pub const DEFAULT_TITLE: &str = "Nueva tarea";

static QUOTED_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:tarea|llamada|titulada)\s*:?\s*["“«']([^"”»']+)["”»']"#)
        .expect("Invalid regex")
});

static TITLE_AFTER_TRIGGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\b(?:crear|nueva|agregar)\s+tarea\b:?(.*?)(?:\s+para\b|$)")
        .expect("Invalid regex")
});

static LEADING_CONNECTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:de|sobre)\s+").expect("Invalid regex"));

static EXPLICIT_SUBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:materia|asignatura|clase)\s+(?:de\s+)?["“«']([^"”»']+)["”»']"#)
        .expect("Invalid regex")
});

static DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(?:descripci[oó]n\s*:\s*|con\s+descripci[oó]n\s+de\s+)["“«']([^"”»']+)["”»']"#,
    )
    .expect("Invalid regex")
});

// Folded phrases. "poco importante" must be tested before "importante".
const PRIORITY_RULES: &[(&[&str], Priority)] = &[
    (&["poco importante", "puede esperar"], Priority::Low),
    (&["alta", "urgente", "importante"], Priority::High),
    (&["baja"], Priority::Low),
];

/// What to do when no subject can be read from the text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectFallback {
    /// Pick one of [`SUBJECTS`] at random so the subject is never empty
    #[default]
    Random,
    /// Leave the subject unset so the caller asks the user
    Ask,
}

/// Slots read from one utterance
#[derive(Debug, Clone, PartialEq)]
pub struct Slots {
    pub title: String,
    pub subject: Option<String>,
    pub description: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SlotExtractor {
    pub subject_fallback: SubjectFallback,
}

impl SlotExtractor {
    pub fn new(subject_fallback: SubjectFallback) -> Self {
        Self { subject_fallback }
    }

    pub fn extract<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> Slots {
        let u = Utterance::new(text);

        let subject = extract_subject(&u).or_else(|| match self.subject_fallback {
            SubjectFallback::Random => SUBJECTS.choose(rng).map(|s| s.to_string()),
            SubjectFallback::Ask => None,
        });

        let slots = Slots {
            title: extract_title(text),
            subject,
            description: extract_description(text),
            priority: extract_priority(&u),
        };
        debug!(?slots, "extracted slots");
        slots
    }

    /// Slots plus resolved due date
    pub fn draft<R: Rng + ?Sized>(&self, text: &str, now: NaiveDateTime, rng: &mut R) -> TaskDraft {
        let slots = self.extract(text, rng);
        TaskDraft {
            title: slots.title,
            subject: slots.subject,
            description: slots.description,
            priority: slots.priority,
            due_date: dates::resolve(text, now),
        }
    }
}

/// Quoted title after "tarea"/"llamada"/"titulada", else the text after the
/// creation trigger up to "para".
pub fn extract_title(text: &str) -> String {
    if let Some(caps) = QUOTED_TITLE.captures(text) {
        let title = caps[1].trim();
        if !title.is_empty() {
            return title.to_string();
        }
    }

    if let Some(caps) = TITLE_AFTER_TRIGGER.captures(text) {
        let rest = caps[1].trim();
        let rest = LEADING_CONNECTOR.replace(rest, "");
        let rest = strip_leading_subject(rest.trim());
        let rest = LEADING_CONNECTOR.replace(rest, "");
        let rest = rest.trim();
        let rest = rest.strip_suffix('.').unwrap_or(rest).trim();
        if !rest.is_empty() {
            return capitalize_first(rest);
        }
    }

    DEFAULT_TITLE.to_string()
}

/// Drop a subject name that opens the title ("de historia sobre ...")
fn strip_leading_subject(s: &str) -> &str {
    for subject in SUBJECTS {
        let len = subject.chars().count();
        let head: String = s.chars().take(len).collect();
        if fold(&head) != fold(subject) {
            continue;
        }
        let rest = match s.char_indices().nth(len) {
            Some((i, _)) => &s[i..],
            None => "",
        };
        if rest.chars().next().map_or(true, |c| !c.is_alphanumeric()) {
            return rest
                .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ':' | ',' | '-'))
                .trim_end();
        }
    }
    s
}

fn extract_subject(u: &Utterance) -> Option<String> {
    if let Some(caps) = EXPLICIT_SUBJECT.captures(&u.raw) {
        let value = caps[1].trim();
        if !value.is_empty() {
            return Some(capitalize_first(value));
        }
    }
    known_subject(u).map(str::to_string)
}

/// First candidate subject mentioned in the utterance, in list order
pub fn known_subject(u: &Utterance) -> Option<&'static str> {
    SUBJECTS
        .iter()
        .copied()
        .find(|s| u.folded.contains(&fold(s)))
}

pub fn extract_description(text: &str) -> String {
    DESCRIPTION
        .captures(text)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_default()
}

pub fn extract_priority(u: &Utterance) -> Priority {
    PRIORITY_RULES
        .iter()
        .find(|(phrases, _)| u.has_any(phrases))
        .map(|(_, priority)| *priority)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_title_quoted() {
        assert_eq!(extract_title(r#"crear tarea "Ensayo final" para mañana"#), "Ensayo final");
        assert_eq!(extract_title("nueva tarea titulada «Mapa conceptual»"), "Mapa conceptual");
    }

    #[test]
    fn test_title_after_trigger() {
        assert_eq!(
            extract_title("crear tarea sobre la revolución mexicana para el viernes"),
            "La revolución mexicana"
        );
        assert_eq!(extract_title("agregar tarea: resumen del capítulo 3."), "Resumen del capítulo 3");
        assert_eq!(extract_title("crear tarea:\nensayo final"), "Ensayo final");
    }

    #[test]
    fn test_title_skips_subject_name() {
        assert_eq!(extract_title("crear tarea de matemáticas para mañana"), DEFAULT_TITLE);
        assert_eq!(
            extract_title("crear tarea de historia sobre la independencia para el lunes"),
            "La independencia"
        );
        assert_eq!(extract_title("nueva tarea de Química: tabla periódica"), "Tabla periódica");
        // Subject prefix of a longer word is kept
        assert_eq!(extract_title("crear tarea historias de vida"), "Historias de vida");
    }

    #[test]
    fn test_title_default() {
        assert_eq!(extract_title("crear tarea para mañana"), DEFAULT_TITLE);
        assert_eq!(extract_title("hola"), DEFAULT_TITLE);
    }

    #[test]
    fn test_subject_from_candidates() {
        let slots = SlotExtractor::default().extract("crear tarea de fisica para hoy", &mut rng());
        assert_eq!(slots.subject.as_deref(), Some("Física"));
    }

    #[test]
    fn test_subject_explicit_pattern() {
        let slots = SlotExtractor::default()
            .extract(r#"nueva tarea de la materia "Arte" para mañana"#, &mut rng());
        assert_eq!(slots.subject.as_deref(), Some("Arte"));
    }

    #[test]
    fn test_subject_random_fallback_is_a_candidate() {
        let extractor = SlotExtractor::new(SubjectFallback::Random);
        let mut rng = rng();
        for text in ["crear tarea leer libro", "nueva tarea", "agregar tarea ensayo para mañana"] {
            let subject = extractor.extract(text, &mut rng).subject.unwrap();
            assert!(SUBJECTS.contains(&subject.as_str()), "unexpected subject {subject}");
        }
    }

    #[test]
    fn test_subject_ask_fallback_leaves_empty() {
        let extractor = SlotExtractor::new(SubjectFallback::Ask);
        assert_eq!(extractor.extract("crear tarea leer libro", &mut rng()).subject, None);
    }

    #[test]
    fn test_description() {
        assert_eq!(
            extract_description(r#"crear tarea de historia descripción: "leer capítulos 1 a 3""#),
            "leer capítulos 1 a 3"
        );
        assert_eq!(
            extract_description("crear tarea con descripción de 'usar fuentes primarias'"),
            "usar fuentes primarias"
        );
        assert_eq!(extract_description("crear tarea de historia"), "");
    }

    #[test]
    fn test_priority_rules() {
        let p = |t: &str| extract_priority(&Utterance::new(t));
        assert_eq!(p("con alta prioridad"), Priority::High);
        assert_eq!(p("es URGENTE"), Priority::High);
        assert_eq!(p("prioridad baja"), Priority::Low);
        assert_eq!(p("es poco importante"), Priority::Low);
        assert_eq!(p("puede esperar"), Priority::Low);
        assert_eq!(p("me falta hacerla"), Priority::Medium);
    }

    #[test]
    fn test_draft_roundtrip() {
        let now = chrono::NaiveDate::from_ymd_opt(2026, 5, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let draft = SlotExtractor::default().draft(
            "crear tarea de matemáticas para mañana con alta prioridad",
            now,
            &mut rng(),
        );
        assert!(draft.subject.as_deref().unwrap().contains("Mate"));
        assert_eq!(draft.priority, Priority::High);
        assert_eq!(draft.due_date.date(), now.date().succ_opt().unwrap());
        assert_eq!(draft.title, DEFAULT_TITLE);
    }
}
