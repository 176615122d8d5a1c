//! LLM provider seam
//!
//! Provider metadata, the [`ChatProvider`] trait callers implement over their
//! HTTP client, system prompt loading, context enrichment, and parsing of the
//! structured action a model appends to its reply.

use std::fmt;
use std::fs;
use std::ops::Range;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dates::format_date;
use crate::types::Task;

// ============================================================================
// Providers
// ============================================================================

/// Supported chat completion providers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAi,
    EdenAi,
    AimlApi,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::OpenAi, Provider::EdenAi, Provider::AimlApi];

    /// Identifier used in config files and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::EdenAi => "edenai",
            Provider::AimlApi => "aimlapi",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OpenAI",
            Provider::EdenAi => "Eden AI",
            Provider::AimlApi => "AIMLAPI",
        }
    }

    pub fn api_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1/chat/completions",
            Provider::EdenAi => "https://api.edenai.run/v2/text/chat",
            Provider::AimlApi => "https://api.aimlapi.com/chat/completions",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi => "gpt-4o-mini",
            Provider::EdenAi => "openai/gpt-4o-mini",
            Provider::AimlApi => "gpt-4o-mini",
        }
    }

    /// Environment variable that overrides the stored key
    pub fn env_var(&self) -> &'static str {
        match self {
            Provider::OpenAi => "TAREA_ASSIST_OPENAI_KEY",
            Provider::EdenAi => "TAREA_ASSIST_EDENAI_KEY",
            Provider::AimlApi => "TAREA_ASSIST_AIMLAPI_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "edenai" | "eden" => Ok(Provider::EdenAi),
            "aimlapi" | "aiml" => Ok(Provider::AimlApi),
            other => Err(anyhow!("Unknown provider: {}", other)),
        }
    }
}

/// One chat completion call: a system prompt plus the enriched user content
#[derive(Clone, Copy)]
pub struct ChatRequest<'a> {
    pub provider: Provider,
    pub api_key: &'a str,
    pub model: &'a str,
    pub system_prompt: &'a str,
    pub user_content: &'a str,
}

/// A chat completion backend.
///
/// Implementations own the transport; any error makes the assistant fall
/// back to the rule-based engine.
pub trait ChatProvider {
    fn complete(&self, request: &ChatRequest<'_>) -> Result<String>;
}

impl<F> ChatProvider for F
where
    F: Fn(&ChatRequest<'_>) -> Result<String>,
{
    fn complete(&self, request: &ChatRequest<'_>) -> Result<String> {
        self(request)
    }
}

// ============================================================================
// Prompts
// ============================================================================

/// Built-in system prompt, used when no prompt file is configured or readable
const FALLBACK_PROMPT: &str = r#"Eres el asistente oficial de TareaAssist, una plataforma que ayuda a estudiantes a organizar sus tareas escolares.
La fecha de hoy es {{TODAY}}.

Instrucciones:
1. Ayuda a gestionar tareas escolares: consultar, crear y eliminar.
2. Responde en español, con un tono amigable, en 3 o 4 oraciones como máximo.
3. Limítate a temas de organización académica.

Cuando crees o elimines una tarea, añade al final de tu respuesta UN objeto JSON:
{"action": "create_task", "title": "...", "subject": "...", "due_date": "YYYY-MM-DD", "priority": "low|medium|high", "description": "..."}
{"action": "delete_task", "task_id": "...", "title": "..."}
No añadas JSON en ningún otro caso.
"#;

/// Load the system prompt from `path` (if given) with {{TODAY}} substitution
pub fn load_system_prompt(path: Option<&Path>, today: NaiveDate) -> String {
    let prompt = match path {
        Some(path) => match fs::read_to_string(path) {
            Ok(content) => {
                debug!(path = %path.display(), "loaded system prompt");
                content
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read system prompt, using built-in");
                FALLBACK_PROMPT.to_string()
            }
        },
        None => FALLBACK_PROMPT.to_string(),
    };

    prompt.replace("{{TODAY}}", &today.format("%Y-%m-%d").to_string())
}

/// Number of tasks listed in the context block
const CONTEXT_TASKS: usize = 5;

/// Prefix the user's message with a summary of their current tasks
pub fn enhance_input(user_input: &str, tasks: &[Task]) -> String {
    let tasks_context = if tasks.is_empty() {
        "No hay tareas registradas actualmente.".to_string()
    } else {
        let mut lines: Vec<String> = tasks
            .iter()
            .take(CONTEXT_TASKS)
            .map(|t| {
                format!(
                    "- [{}] {} ({}, Entrega: {}, Prioridad: {}, Completada: {})",
                    t.id,
                    t.title,
                    t.subject,
                    format_date(t.due_date),
                    t.priority.as_str(),
                    if t.completed { "Sí" } else { "No" }
                )
            })
            .collect();
        if tasks.len() > CONTEXT_TASKS {
            lines.push("- ...(más tareas)".to_string());
        }
        format!("Tareas actuales ({} total):\n{}", tasks.len(), lines.join("\n"))
    };

    format!("{}\n\nConsulta del usuario: {}", tasks_context, user_input)
}

// ============================================================================
// Structured actions
// ============================================================================

/// Side effect a model asked for, appended to its reply as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AssistantAction {
    CreateTask {
        title: String,
        #[serde(default)]
        subject: Option<String>,
        /// YYYY-MM-DD
        #[serde(default)]
        due_date: Option<String>,
        #[serde(default)]
        priority: Option<String>,
        #[serde(default)]
        description: Option<String>,
    },
    DeleteTask {
        #[serde(default)]
        task_id: Option<String>,
        #[serde(default)]
        title: Option<String>,
    },
}

static EMPTY_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json)?\s*```").expect("Invalid regex"));

/// Split a model reply into user-visible text and an optional action.
///
/// Only the first balanced JSON object is considered. If it does not parse
/// as an [`AssistantAction`] the reply is returned untouched.
pub fn split_action(reply: &str) -> (String, Option<AssistantAction>) {
    let Some(range) = find_json_object(reply) else {
        return (reply.trim().to_string(), None);
    };

    match serde_json::from_str::<AssistantAction>(&reply[range.clone()]) {
        Ok(action) => {
            let mut visible = String::with_capacity(reply.len());
            visible.push_str(&reply[..range.start]);
            visible.push_str(&reply[range.end..]);
            let visible = EMPTY_FENCE.replace_all(&visible, "");
            (visible.trim().to_string(), Some(action))
        }
        Err(e) => {
            debug!(error = %e, "JSON in reply is not an assistant action");
            (reply.trim().to_string(), None)
        }
    }
}

/// Byte range of the first balanced `{...}` in `s`, skipping braces in strings
fn find_json_object(s: &str) -> Option<Range<usize>> {
    let start = s.find('{')?;

    let mut in_str = false;
    let mut escape = false;
    let mut depth = 0;

    for (i, ch) in s[start..].char_indices() {
        if in_str {
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_str = false;
            }
            continue;
        }

        match ch {
            '"' => in_str = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start..start + i + 1);
                }
            }
            _ => {}
        }
    }

    None
}

// ============================================================================
// Tests
// ============================================================================
