//! Response Composition
//!
//! Renders the Spanish reply for an intent and performs at most one side
//! effect (create or delete) through [`TaskActions`] before returning.

use chrono::NaiveDateTime;
use tracing::info;

use crate::dates::format_date;
use crate::filters;
use crate::llm::Provider;
use crate::matcher::find_task_to_delete;
use crate::types::{Intent, Task, TaskDraft};

pub const NO_TASKS_TODAY: &str = "No tienes tareas para entregar hoy. ¡Buen trabajo!";
pub const NO_PENDING_TASKS: &str = "No tienes tareas pendientes. ¡Estás al día!";
pub const NO_TASKS_THIS_WEEK: &str = "No tienes tareas para la próxima semana.";
pub const NOTHING_TO_DELETE: &str = "No tienes tareas pendientes para eliminar.";
pub const DELETE_NOT_FOUND: &str = "No pude identificar qué tarea quieres eliminar. \
Por favor, menciona el título o la materia de la tarea.";

pub const HELP: &str = "Puedo ayudarte a organizar tus tareas. Pregúntame cosas como:\n\n\
- ¿Qué tareas tengo para hoy?\n\
- ¿Cuántas tareas tengo pendientes?\n\
- ¿Tengo tareas de matemáticas?\n\
- ¿Qué debo entregar la próxima semana?\n\n\
También puedo crear o eliminar tareas: \"crear tarea de historia para mañana\" \
o \"eliminar tarea de química\".";

pub const GREETING: &str =
    "¡Hola! Soy tu asistente de tareas. ¿En qué puedo ayudarte hoy?";

pub const THANKS: &str =
    "¡De nada! Estoy aquí para ayudarte con tus tareas escolares. Si necesitas algo más, solo dímelo.";

pub const UNKNOWN: &str = "No estoy seguro de cómo responder a eso. ¿Podrías reformular tu pregunta? \
Puedes preguntarme sobre tus tareas de hoy, tus tareas pendientes, las de la próxima semana \
o las de una materia específica.";

/// Side effects requested by the engine. Implemented by the owner of the
/// task collection.
pub trait TaskActions {
    fn create_task(&mut self, task: Task);
    fn delete_task(&mut self, task_id: &str);
}

impl TaskActions for Vec<Task> {
    fn create_task(&mut self, task: Task) {
        self.push(task);
    }

    fn delete_task(&mut self, task_id: &str) {
        self.retain(|t| t.id != task_id);
    }
}

/// Per-call inputs the replies depend on besides the task list
#[derive(Debug, Clone, Copy)]
pub struct ComposeContext {
    pub now: NaiveDateTime,
    /// Provider whose API key is missing, if the engine runs for that reason
    pub missing_key: Option<Provider>,
}

impl ComposeContext {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now,
            missing_key: None,
        }
    }
}

pub fn compose(
    intent: &Intent,
    tasks: &[Task],
    ctx: &ComposeContext,
    actions: Option<&mut dyn TaskActions>,
) -> String {
    match intent {
        Intent::CreateTask(draft) => compose_create(draft, actions),
        Intent::DeleteTask { utterance } => compose_delete(utterance, tasks, actions),
        Intent::QueryToday => {
            let today = filters::due_today(tasks, ctx.now);
            if today.is_empty() {
                return NO_TASKS_TODAY.to_string();
            }
            let lines = bullets(&today, |t| format!("{}: {}", t.subject, t.title));
            format!("Tienes {} tarea(s) para hoy:\n\n{}", today.len(), lines)
        }
        Intent::QueryPending => {
            let pending = filters::pending(tasks);
            if pending.is_empty() {
                return NO_PENDING_TASKS.to_string();
            }
            let lines = bullets(&pending, |t| {
                format!("{}: {} (Entrega: {})", t.subject, t.title, format_date(t.due_date))
            });
            format!("Tienes {} tarea(s) pendiente(s):\n\n{}", pending.len(), lines)
        }
        Intent::QueryBySubject { subject } => {
            let name = subject.to_lowercase();
            let found = filters::by_subject(tasks, subject);
            if found.is_empty() {
                return format!("No encuentro tareas pendientes de {name}.");
            }
            let lines = bullets(&found, |t| {
                let mut line = format!("{} (Entrega: {})", t.title, format_date(t.due_date));
                if !t.description.is_empty() {
                    line.push_str(&format!("\n  Descripción: {}", t.description));
                }
                line
            });
            format!("Encontré {} tarea(s) de {name}:\n\n{}", found.len(), lines)
        }
        Intent::QueryByWeek => {
            let week = filters::due_within_week(tasks, ctx.now);
            if week.is_empty() {
                return NO_TASKS_THIS_WEEK.to_string();
            }
            let lines = bullets(&week, |t| {
                format!("{}: {} (Entrega: {})", t.subject, t.title, format_date(t.due_date))
            });
            format!("Tienes {} tarea(s) para la próxima semana:\n\n{}", week.len(), lines)
        }
        Intent::Help => with_key_note(HELP, ctx),
        Intent::Greeting => with_key_note(GREETING, ctx),
        Intent::Thanks => THANKS.to_string(),
        Intent::Unknown => with_key_note(UNKNOWN, ctx),
    }
}

fn compose_create(draft: &TaskDraft, actions: Option<&mut dyn TaskActions>) -> String {
    let Some(subject) = draft.subject.as_deref() else {
        return format!(
            "¿De qué materia es la tarea \"{}\"? Indícala, por ejemplo: \
             \"crear tarea de historia para mañana\".",
            draft.title
        );
    };
    let due = format_date(draft.due_date);

    let Some(actions) = actions else {
        return format!(
            "Entendí que quieres crear la tarea \"{}\" de {} para el {}, \
             pero no tengo acceso para guardarla en este momento.",
            draft.title, subject, due
        );
    };

    let task = Task::new(subject, draft.title.as_str(), draft.due_date, draft.priority)
        .with_description(draft.description.as_str());
    info!(id = %task.id, title = %task.title, subject = %task.subject, "creating task");
    actions.create_task(task);

    format!(
        "He creado la tarea:\n\n- Título: {}\n- Materia: {}\n- Fecha de entrega: {}\n- Prioridad: {}",
        draft.title,
        subject,
        due,
        draft.priority.label()
    )
}

fn compose_delete(utterance: &str, tasks: &[Task], actions: Option<&mut dyn TaskActions>) -> String {
    if tasks.iter().all(|t| t.completed) {
        return NOTHING_TO_DELETE.to_string();
    }
    let Some(task) = find_task_to_delete(utterance, tasks) else {
        return DELETE_NOT_FOUND.to_string();
    };

    match actions {
        Some(actions) => {
            info!(id = %task.id, title = %task.title, "deleting task");
            actions.delete_task(&task.id);
            format!("He eliminado la tarea \"{}\" de {}.", task.title, task.subject)
        }
        None => format!(
            "Encontré la tarea \"{}\" de {}, pero no tengo acceso para eliminarla en este momento.",
            task.title, task.subject
        ),
    }
}

fn bullets(tasks: &[&Task], line: impl Fn(&Task) -> String) -> String {
    tasks
        .iter()
        .copied()
        .map(|t| format!("- {}", line(t)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn with_key_note(text: &str, ctx: &ComposeContext) -> String {
    match ctx.missing_key {
        Some(provider) => format!(
            "{text}\n\nNota: no hay una API key de {} configurada, así que funciono con \
             capacidades limitadas. Puedes configurarla en los ajustes.",
            provider.display_name()
        ),
        None => text.to_string(),
    }
}
