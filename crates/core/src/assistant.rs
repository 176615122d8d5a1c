//! Assistant orchestration
//!
//! Routes one utterance to the selected chat provider when a key is set and
//! a provider is registered, applies the action the model asks for, and
//! falls back to the rule-based engine whenever the model is unavailable.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::compose::{compose, ComposeContext, TaskActions};
use crate::config::Session;
use crate::dates;
use crate::engine::FallbackEngine;
use crate::llm::{
    enhance_input, load_system_prompt, split_action, AssistantAction, ChatProvider, ChatRequest,
    Provider,
};
use crate::matcher::find_task_to_delete;
use crate::slots::{SubjectFallback, DEFAULT_TITLE};
use crate::text::{fold, Utterance};
use crate::types::{Intent, Priority, Task, TaskDraft};

const CREATE_CLAIMS: &[&str] = &["he creado", "he agregado", "nueva tarea"];
const DELETE_CLAIMS: &[&str] = &["he eliminado", "he borrado", "tarea eliminada"];

#[derive(Debug, Clone, Default)]
pub struct AssistantConfig {
    pub provider: Provider,
    pub api_key: Option<String>,
    /// Overrides the provider's default model
    pub model: Option<String>,
    pub prompt_file: Option<PathBuf>,
    pub subject_fallback: SubjectFallback,
}

impl AssistantConfig {
    pub fn from_session(session: &Session) -> Self {
        let provider = session.selected_provider();
        Self {
            provider,
            api_key: session.api_key(provider),
            model: None,
            prompt_file: session.settings.assistant.prompt_file.clone(),
            subject_fallback: session.settings.assistant.subject_fallback,
        }
    }
}

pub struct Assistant {
    config: AssistantConfig,
    providers: HashMap<Provider, Box<dyn ChatProvider>>,
    engine: FallbackEngine,
}

impl Assistant {
    pub fn new(config: AssistantConfig) -> Self {
        let engine = FallbackEngine::new(config.subject_fallback);
        Self {
            config,
            providers: HashMap::new(),
            engine,
        }
    }

    /// Register the backend used for `provider`
    pub fn with_provider(mut self, provider: Provider, backend: impl ChatProvider + 'static) -> Self {
        self.providers.insert(provider, Box::new(backend));
        self
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn respond(
        &self,
        utterance: &str,
        tasks: &[Task],
        now: NaiveDateTime,
        actions: Option<&mut dyn TaskActions>,
    ) -> String {
        self.respond_with_rng(utterance, tasks, now, actions, &mut rand::thread_rng())
    }

    pub fn respond_with_rng<R: Rng + ?Sized>(
        &self,
        utterance: &str,
        tasks: &[Task],
        now: NaiveDateTime,
        actions: Option<&mut dyn TaskActions>,
        rng: &mut R,
    ) -> String {
        let provider = self.config.provider;
        let mut ctx = ComposeContext::new(now);

        let Some(api_key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) else {
            debug!(%provider, "no API key, using fallback engine");
            ctx.missing_key = Some(provider);
            return self.engine.respond_with_rng(utterance, tasks, &ctx, actions, rng);
        };
        let Some(backend) = self.providers.get(&provider) else {
            debug!(%provider, "no backend registered, using fallback engine");
            return self.engine.respond_with_rng(utterance, tasks, &ctx, actions, rng);
        };

        let system_prompt = load_system_prompt(self.config.prompt_file.as_deref(), now.date());
        let user_content = enhance_input(utterance, tasks);
        let request = ChatRequest {
            provider,
            api_key,
            model: self.config.model.as_deref().unwrap_or(provider.default_model()),
            system_prompt: &system_prompt,
            user_content: &user_content,
        };

        let reply = match backend.complete(&request) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(%provider, error = %e, "provider call failed, using fallback engine");
                return self.engine.respond_with_rng(utterance, tasks, &ctx, actions, rng);
            }
        };

        let (visible, action) = split_action(&reply);
        match action {
            Some(action) => self.apply_action(action, visible, utterance, tasks, &ctx, actions, rng),
            None => self.apply_prose(visible, utterance, tasks, now, actions, rng),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_action<R: Rng + ?Sized>(
        &self,
        action: AssistantAction,
        visible: String,
        utterance: &str,
        tasks: &[Task],
        ctx: &ComposeContext,
        actions: Option<&mut dyn TaskActions>,
        rng: &mut R,
    ) -> String {
        match action {
            AssistantAction::CreateTask {
                title,
                subject,
                due_date,
                priority,
                description,
            } => {
                let slots = self.engine.parser().slots.extract(utterance, rng);
                let due_date = due_date
                    .as_deref()
                    .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok())
                    .map(|d| d.and_time(ctx.now.time()))
                    .unwrap_or_else(|| dates::resolve(utterance, ctx.now));
                let title = Some(title.trim())
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| DEFAULT_TITLE.to_string());

                let draft = TaskDraft {
                    title,
                    subject: subject.filter(|s| !s.trim().is_empty()).or(slots.subject),
                    description: description.unwrap_or_default(),
                    priority: priority
                        .as_deref()
                        .and_then(Priority::parse_loose)
                        .unwrap_or(slots.priority),
                    due_date,
                };

                match (draft.subject.is_some(), actions) {
                    (true, Some(actions)) => {
                        if let Some(task) = draft.into_task() {
                            info!(id = %task.id, title = %task.title, "creating task from model action");
                            actions.create_task(task);
                        }
                        visible
                    }
                    (_, actions) => compose(&Intent::CreateTask(draft), tasks, ctx, actions),
                }
            }
            AssistantAction::DeleteTask { task_id, title } => {
                let target = task_id
                    .as_deref()
                    .and_then(|id| tasks.iter().find(|t| t.id == id))
                    .or_else(|| {
                        let title = fold(title.as_deref()?.trim());
                        if title.is_empty() {
                            return None;
                        }
                        tasks.iter().find(|t| !t.completed && fold(&t.title) == title)
                    })
                    .or_else(|| find_task_to_delete(utterance, tasks));

                match (target, actions) {
                    (Some(task), Some(actions)) => {
                        info!(id = %task.id, title = %task.title, "deleting task from model action");
                        actions.delete_task(&task.id);
                        visible
                    }
                    (_, actions) => {
                        let intent = Intent::DeleteTask {
                            utterance: utterance.to_string(),
                        };
                        compose(&intent, tasks, ctx, actions)
                    }
                }
            }
        }
    }

    /// Last resort when the model describes an action in prose only
    fn apply_prose<R: Rng + ?Sized>(
        &self,
        visible: String,
        utterance: &str,
        tasks: &[Task],
        now: NaiveDateTime,
        actions: Option<&mut dyn TaskActions>,
        rng: &mut R,
    ) -> String {
        let Some(actions) = actions else {
            return visible;
        };
        let reply = Utterance::new(&visible);
        let input = Utterance::new(utterance);

        if reply.has_any(CREATE_CLAIMS) && input.has("tarea") {
            let draft = self.engine.parser().slots.draft(utterance, now, rng);
            match draft.into_task() {
                Some(task) => {
                    info!(id = %task.id, title = %task.title, "creating task from model prose");
                    actions.create_task(task);
                }
                None => debug!("model claimed a task creation but no subject was found"),
            }
        } else if reply.has_any(DELETE_CLAIMS) && input.has_any(&["eliminar", "borrar"]) {
            match find_task_to_delete(utterance, tasks) {
                Some(task) => {
                    info!(id = %task.id, title = %task.title, "deleting task from model prose");
                    actions.delete_task(&task.id);
                }
                None => debug!("model claimed a deletion but no task matched"),
            }
        }

        visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::{DELETE_NOT_FOUND, GREETING};
    use anyhow::{anyhow, Result};
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 5, 10)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
    }

    fn config(key: Option<&str>) -> AssistantConfig {
        AssistantConfig {
            api_key: key.map(str::to_string),
            ..AssistantConfig::default()
        }
    }

    /// Replies with a fixed text and records what it was sent
    struct Canned {
        reply: String,
        seen: Rc<RefCell<Vec<String>>>,
    }

    impl ChatProvider for Canned {
        fn complete(&self, request: &ChatRequest<'_>) -> Result<String> {
            self.seen.borrow_mut().push(request.user_content.to_string());
            Ok(self.reply.clone())
        }
    }

    struct Failing;

    impl ChatProvider for Failing {
        fn complete(&self, _request: &ChatRequest<'_>) -> Result<String> {
            Err(anyhow!("connection refused"))
        }
    }

    fn canned(reply: &str) -> (Canned, Rc<RefCell<Vec<String>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        (
            Canned {
                reply: reply.to_string(),
                seen: Rc::clone(&seen),
            },
            seen,
        )
    }

    fn task(id: &str, subject: &str, title: &str) -> Task {
        Task {
            id: id.to_string(),
            ..Task::new(subject, title, now() + Duration::days(2), Priority::Medium)
        }
    }

    #[test]
    fn test_missing_key_uses_fallback_with_note() {
        let (backend, seen) = canned("no debería llamarse");
        let assistant = Assistant::new(config(None)).with_provider(Provider::OpenAi, backend);
        let reply = assistant.respond("hola", &[], now(), None);
        assert!(reply.starts_with(GREETING));
        assert!(reply.contains("OpenAI"));
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn test_unregistered_provider_uses_fallback_without_note() {
        let assistant = Assistant::new(config(Some("sk-test")));
        assert_eq!(assistant.respond("hola", &[], now(), None), GREETING);
    }

    #[test]
    fn test_provider_error_falls_back() {
        let assistant = Assistant::new(config(Some("sk-test"))).with_provider(Provider::OpenAi, Failing);
        let mut store: Vec<Task> = Vec::new();
        let reply = assistant.respond(
            "crear tarea de historia para mañana",
            &[],
            now(),
            Some(&mut store),
        );
        assert!(reply.starts_with("He creado la tarea"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_closure_backend_sees_enhanced_input() {
        let assistant = Assistant::new(config(Some("sk-test"))).with_provider(
            Provider::OpenAi,
            |request: &ChatRequest<'_>| -> Result<String> {
                assert_eq!(request.model, "gpt-4o-mini");
                assert!(request.system_prompt.contains("2026-05-10"));
                Ok(format!("eco: {}", request.user_content.lines().last().unwrap_or("")))
            },
        );
        let reply = assistant.respond("¿qué tengo?", &[], now(), None);
        assert_eq!(reply, "eco: Consulta del usuario: ¿qué tengo?");
    }

    #[test]
    fn test_structured_create_action() {
        let (backend, seen) = canned(
            "Listo, la agendé.\n{\"action\":\"create_task\",\"title\":\"Ensayo\",\"subject\":\"Historia\",\"due_date\":\"2026-05-15\",\"priority\":\"high\"}",
        );
        let assistant = Assistant::new(config(Some("sk-test"))).with_provider(Provider::OpenAi, backend);
        let mut store: Vec<Task> = Vec::new();
        let reply = assistant.respond("anota el ensayo de historia", &[], now(), Some(&mut store));

        assert_eq!(reply, "Listo, la agendé.");
        assert_eq!(store.len(), 1);
        assert_eq!(store[0].title, "Ensayo");
        assert_eq!(store[0].priority, Priority::High);
        assert_eq!(
            store[0].due_date,
            NaiveDate::from_ymd_opt(2026, 5, 15).unwrap().and_hms_opt(9, 30, 0).unwrap()
        );
        assert!(seen.borrow()[0].contains("No hay tareas registradas"));
    }

    #[test]
    fn test_structured_create_without_sink_does_not_claim() {
        let (backend, _) = canned(
            "Hecho. {\"action\":\"create_task\",\"title\":\"Ensayo\",\"subject\":\"Historia\"}",
        );
        let assistant = Assistant::new(config(Some("sk-test"))).with_provider(Provider::OpenAi, backend);
        let reply = assistant.respond("crear tarea Ensayo", &[], now(), None);
        assert!(reply.contains("no tengo acceso"));
    }

    #[test]
    fn test_structured_create_missing_subject_asks_under_ask_policy() {
        let (backend, _) = canned("Hecho. {\"action\":\"create_task\",\"title\":\"Leer\"}");
        let cfg = AssistantConfig {
            subject_fallback: SubjectFallback::Ask,
            ..config(Some("sk-test"))
        };
        let assistant = Assistant::new(cfg).with_provider(Provider::OpenAi, backend);
        let mut store: Vec<Task> = Vec::new();
        let reply = assistant.respond("nueva tarea leer", &[], now(), Some(&mut store));
        assert!(store.is_empty());
        assert!(reply.starts_with("¿De qué materia"));
    }

    #[test]
    fn test_structured_delete_by_id_and_title() {
        let tasks = vec![task("a1", "Historia", "Ensayo"), task("b2", "Física", "Laboratorio")];
        let (backend, _) = canned("Eliminada. {\"action\":\"delete_task\",\"task_id\":\"b2\"}");
        let assistant = Assistant::new(config(Some("sk-test"))).with_provider(Provider::OpenAi, backend);
        let mut store = tasks.clone();
        assert_eq!(assistant.respond("borra eso", &tasks, now(), Some(&mut store)), "Eliminada.");
        assert_eq!(store.len(), 1);
        assert_eq!(store[0].id, "a1");

        let (backend, _) = canned("Eliminada. {\"action\":\"delete_task\",\"title\":\"ensayo\"}");
        let assistant = Assistant::new(config(Some("sk-test"))).with_provider(Provider::OpenAi, backend);
        let mut store = tasks.clone();
        assistant.respond("borra eso", &tasks, now(), Some(&mut store));
        assert_eq!(store.len(), 1);
        assert_eq!(store[0].id, "b2");
    }

    #[test]
    fn test_structured_delete_unknown_task() {
        let tasks = vec![task("a1", "Historia", "Ensayo")];
        let (backend, _) = canned("Eliminada. {\"action\":\"delete_task\",\"task_id\":\"zz\"}");
        let assistant = Assistant::new(config(Some("sk-test"))).with_provider(Provider::OpenAi, backend);
        let mut store = tasks.clone();
        let reply = assistant.respond("borra eso", &tasks, now(), Some(&mut store));
        assert_eq!(reply, DELETE_NOT_FOUND);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_prose_heuristic_creates_and_deletes() {
        let (backend, _) = canned("¡Perfecto! He creado la tarea de química para mañana.");
        let assistant = Assistant::new(config(Some("sk-test"))).with_provider(Provider::OpenAi, backend);
        let mut store: Vec<Task> = Vec::new();
        let mut rng = StdRng::seed_from_u64(3);
        assistant.respond_with_rng(
            "crear tarea de química para mañana",
            &[],
            now(),
            Some(&mut store),
            &mut rng,
        );
        assert_eq!(store.len(), 1);
        assert_eq!(store[0].subject, "Química");

        let tasks = vec![task("a1", "Historia", "Ensayo")];
        let (backend, _) = canned("He eliminado la tarea.");
        let assistant = Assistant::new(config(Some("sk-test"))).with_provider(Provider::OpenAi, backend);
        let mut store = tasks.clone();
        assistant.respond("eliminar tarea Ensayo", &tasks, now(), Some(&mut store));
        assert!(store.is_empty());
    }

    #[test]
    fn test_plain_reply_has_no_side_effects() {
        let (backend, _) = canned("Tienes una tarea de historia.");
        let assistant = Assistant::new(config(Some("sk-test"))).with_provider(Provider::OpenAi, backend);
        let tasks = vec![task("a1", "Historia", "Ensayo")];
        let mut store = tasks.clone();
        let reply = assistant.respond("crear tarea de historia", &tasks, now(), Some(&mut store));
        assert_eq!(reply, "Tienes una tarea de historia.");
        assert_eq!(store.len(), 1);
    }
}
