//! TareaAssist CLI
//!
//! A thin wrapper around tarea-assist-core that provides the command-line interface.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use tarea_assist_core::access::{AccessGate, CodeOutcome, GateStatus, TwoFactor};
use tarea_assist_core::dates::format_date;
use tarea_assist_core::{Assistant, AssistantConfig, Provider, Session, SubjectFallback, Task};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "tarea-assist")]
#[command(about = "Homework assistant: ask about, create and delete school tasks")]
struct Cli {
    /// Session settings file (default: <config dir>/tarea-assist/settings.toml)
    #[arg(long, global = true)]
    session: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask the assistant something, in Spanish
    Ask {
        /// Message, e.g. "crear tarea de historia para mañana"
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Task file (JSON array)
        #[arg(long)]
        tasks: Option<PathBuf>,

        /// Reference time, e.g. 2026-05-10 or "2026-05-10 08:00"
        #[arg(long)]
        now: Option<String>,
    },

    /// List stored tasks
    Tasks {
        #[arg(long)]
        tasks: Option<PathBuf>,
    },

    /// Inspect or change session settings
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },

    /// Access code gate
    Access {
        #[command(subcommand)]
        action: AccessCommand,
    },

    /// Two-factor authentication setup
    TwoFactor {
        #[command(subcommand)]
        action: TwoFactorCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Show,
    /// Select the chat provider
    Provider { provider: ProviderArg },
    SetKey { provider: ProviderArg, key: String },
    /// Remove a key from the provider's history
    ForgetKey { provider: ProviderArg, key: String },
    /// What to do when a new task names no subject
    Fallback { policy: FallbackArg },
    /// Set the access code checked by `access code`
    AccessCode { code: String },
    /// System prompt file used for provider calls
    Prompt { path: Option<PathBuf> },
    /// Restore defaults and delete the session file
    Reset,
}

#[derive(Subcommand, Debug)]
enum AccessCommand {
    Status,
    Code { code: String },
    /// One-time code from the authenticator app
    Otp { code: String },
}

#[derive(Subcommand, Debug)]
enum TwoFactorCommand {
    Setup {
        /// Account label shown in the authenticator app
        #[arg(long, default_value = "estudiante")]
        account: String,
    },
    Disable,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderArg {
    Openai,
    Edenai,
    Aimlapi,
}

impl From<ProviderArg> for Provider {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Openai => Provider::OpenAi,
            ProviderArg::Edenai => Provider::EdenAi,
            ProviderArg::Aimlapi => Provider::AimlApi,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FallbackArg {
    Random,
    Ask,
}

impl From<FallbackArg> for SubjectFallback {
    fn from(arg: FallbackArg) -> Self {
        match arg {
            FallbackArg::Random => SubjectFallback::Random,
            FallbackArg::Ask => SubjectFallback::Ask,
        }
    }
}

// ============================================================================
// Setup
// ============================================================================

fn init_tracing(quiet: bool, verbose: bool) -> Result<()> {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("TAREA_ASSIST_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {e}"))?;

    Ok(())
}

fn load_session(path: Option<&Path>) -> Result<Session> {
    let session = match path {
        Some(path) => Session::load(path),
        None => Session::load_default(),
    };
    session.context("Failed to load session")
}

fn parse_now(value: Option<&str>) -> Result<NaiveDateTime> {
    let Some(value) = value.map(str::trim) else {
        return Ok(Local::now().naive_local());
    };
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt);
        }
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid --now value: {value}"))?;
    Ok(date.and_time(Local::now().time()))
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

// ============================================================================
// Task file
// ============================================================================

fn default_tasks_path() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("tarea-assist").join("tasks.json"))
        .context("No data directory available on this platform")
}

fn load_tasks(path: &Path) -> Result<Vec<Task>> {
    if !path.exists() {
        debug!(path = %path.display(), "no task file, starting empty");
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read task file: {}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse task file: {}", path.display()))
}

fn save_tasks(path: &Path, tasks: &[Task]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, serde_json::to_string_pretty(tasks)?)
        .with_context(|| format!("Failed to write task file: {}", path.display()))
}

fn tasks_path(arg: Option<PathBuf>) -> Result<PathBuf> {
    match arg {
        Some(path) => Ok(path),
        None => default_tasks_path(),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn run_ask(session: &Session, text: &str, tasks: Option<PathBuf>, now: Option<&str>) -> Result<()> {
    let path = tasks_path(tasks)?;
    let now = parse_now(now)?;
    let tasks = load_tasks(&path)?;

    // No HTTP backends are wired in; replies come from the rule engine
    let assistant = Assistant::new(AssistantConfig::from_session(session));

    let mut store = tasks.clone();
    let reply = assistant.respond(text, &tasks, now, Some(&mut store));

    if store != tasks {
        save_tasks(&path, &store)?;
        debug!(path = %path.display(), count = store.len(), "saved tasks");
    }

    println!("{}", reply);
    Ok(())
}

fn run_tasks(tasks: Option<PathBuf>) -> Result<()> {
    let path = tasks_path(tasks)?;
    let tasks = load_tasks(&path)?;
    if tasks.is_empty() {
        println!("No hay tareas registradas.");
        return Ok(());
    }
    for t in &tasks {
        println!(
            "[{}] {}: {} (Entrega: {}, Prioridad: {}){}",
            t.id,
            t.subject,
            t.title,
            format_date(t.due_date),
            t.priority.label(),
            if t.completed { " ✓" } else { "" }
        );
    }
    Ok(())
}

fn run_config(session: &mut Session, action: ConfigCommand) -> Result<()> {
    match action {
        ConfigCommand::Show => {
            let selected = session.selected_provider();
            let assistant = &session.settings.assistant;
            println!("Session file: {}", session.path().display());
            println!("Provider: {} ({})", selected.display_name(), selected);
            println!("Subject fallback: {:?}", assistant.subject_fallback);
            if let Some(prompt) = &assistant.prompt_file {
                println!("Prompt file: {}", prompt.display());
            }
            for provider in Provider::ALL {
                let key = match (std::env::var(provider.env_var()).is_ok(), session.stored_key(provider)) {
                    (true, _) => format!("from {}", provider.env_var()),
                    (false, Some(key)) => mask_key(key),
                    (false, None) => "not set".to_string(),
                };
                println!(
                    "  {:<8} key: {} ({} in history)",
                    provider.as_str(),
                    key,
                    session.key_history(provider).len()
                );
            }
            let access = &session.settings.access;
            println!(
                "Access code: {}, failed attempts: {}",
                if access.code.is_some() { "set" } else { "not set" },
                access.attempts
            );
            let tf = &session.settings.two_factor;
            println!("Two-factor: enabled={} verified={}", tf.enabled, tf.verified);
            return Ok(());
        }
        ConfigCommand::Provider { provider } => {
            let provider = Provider::from(provider);
            session.set_selected_provider(provider);
            println!("Provider set to {}", provider.display_name());
        }
        ConfigCommand::SetKey { provider, key } => {
            let provider = Provider::from(provider);
            if key.trim().is_empty() {
                bail!("API key must not be empty");
            }
            session.set_api_key(provider, &key);
            println!("Saved API key for {}", provider.display_name());
        }
        ConfigCommand::ForgetKey { provider, key } => {
            let provider = Provider::from(provider);
            session.forget_key(provider, &key);
            println!("Removed key from {} history", provider.display_name());
        }
        ConfigCommand::Fallback { policy } => {
            session.settings.assistant.subject_fallback = policy.into();
            println!("Subject fallback set to {:?}", policy);
        }
        ConfigCommand::AccessCode { code } => {
            if code.trim().is_empty() {
                bail!("Access code must not be empty");
            }
            session.settings.access.code = Some(code.trim().to_string());
            println!("Access code saved");
        }
        ConfigCommand::Prompt { path } => {
            match &path {
                Some(p) => println!("Prompt file set to {}", p.display()),
                None => println!("Using built-in prompt"),
            }
            session.settings.assistant.prompt_file = path;
        }
        ConfigCommand::Reset => {
            session.reset()?;
            println!("Session reset");
            return Ok(());
        }
    }
    session.save()?;
    Ok(())
}

fn run_access(session: &mut Session, action: AccessCommand) -> Result<()> {
    let now = Utc::now();
    let settings = &mut session.settings;

    let result = match action {
        AccessCommand::Status => {
            match AccessGate::new(&mut settings.access, &settings.two_factor).status(now) {
                GateStatus::Open { attempts_left } => {
                    println!("Access open ({} attempt(s) left)", attempts_left)
                }
                GateStatus::Blocked { remaining } => println!(
                    "Access blocked for {}h {}m",
                    remaining.num_hours(),
                    remaining.num_minutes() % 60
                ),
            }
            Ok(())
        }
        AccessCommand::Code { code } => {
            match AccessGate::new(&mut settings.access, &settings.two_factor).submit_code(&code, now) {
                Ok(CodeOutcome::Granted { two_factor_required: true }) => {
                    println!("Code accepted. Enter your one-time code with `access otp <code>`.");
                    Ok(())
                }
                Ok(CodeOutcome::Granted { two_factor_required: false }) => {
                    println!("Access granted");
                    if settings.two_factor.secret.is_none() {
                        println!("Tip: protect access with `two-factor setup`.");
                    }
                    Ok(())
                }
                Ok(CodeOutcome::Denied { attempts_left }) => {
                    println!("Wrong code, {} attempt(s) left", attempts_left);
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        AccessCommand::Otp { code } => {
            let mut tf = TwoFactor::new(&mut settings.two_factor);
            if tf.is_active() {
                tf.verify(&code).map(|()| println!("Access granted"))
            } else {
                tf.confirm(&code).map(|()| println!("Two-factor enabled"))
            }
        }
    };

    // Attempt counters change even when access is refused
    session.save()?;
    Ok(result?)
}

fn run_two_factor(session: &mut Session, action: TwoFactorCommand) -> Result<()> {
    let mut tf = TwoFactor::new(&mut session.settings.two_factor);
    match action {
        TwoFactorCommand::Setup { account } => {
            let secret = tf.provision(&mut rand::thread_rng()).to_string();
            let url = tf.otpauth_url(&account)?;
            println!("Secret: {}", secret);
            println!("URL:    {}", url);
            println!("Add it to your authenticator app, then run `access otp <code>`.");
        }
        TwoFactorCommand::Disable => {
            tf.disable();
            println!("Two-factor disabled");
        }
    }
    session.save()?;
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose)?;

    let mut session = load_session(cli.session.as_deref())?;

    match cli.command {
        Command::Ask { text, tasks, now } => run_ask(&session, &text.join(" "), tasks, now.as_deref()),
        Command::Tasks { tasks } => run_tasks(tasks),
        Command::Config { action } => run_config(&mut session, action),
        Command::Access { action } => run_access(&mut session, action),
        Command::TwoFactor { action } => run_two_factor(&mut session, action),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use tarea_assist_core::Priority;

    #[test]
    fn test_parse_ask_joins_words() {
        let cli = Cli::try_parse_from([
            "tarea-assist",
            "ask",
            "crear",
            "tarea",
            "--now",
            "2026-05-10 08:00",
        ])
        .unwrap();
        match cli.command {
            Command::Ask { text, now, tasks } => {
                assert_eq!(text.join(" "), "crear tarea");
                assert_eq!(now.as_deref(), Some("2026-05-10 08:00"));
                assert!(tasks.is_none());
            }
            other => panic!("Expected Ask, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_global_flags_and_subcommands() {
        let cli = Cli::try_parse_from([
            "tarea-assist",
            "config",
            "set-key",
            "edenai",
            "k-123",
            "--session",
            "/tmp/s.toml",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.session, Some(PathBuf::from("/tmp/s.toml")));
        assert!(matches!(
            cli.command,
            Command::Config {
                action: ConfigCommand::SetKey { provider: ProviderArg::Edenai, .. }
            }
        ));

        assert!(Cli::try_parse_from(["tarea-assist", "-q", "-v", "tasks"]).is_err());
        assert!(Cli::try_parse_from(["tarea-assist", "config", "provider", "claude"]).is_err());
        assert!(Cli::try_parse_from(["tarea-assist", "two-factor", "setup"]).is_ok());
    }

    #[test]
    fn test_parse_now_formats() {
        let dt = parse_now(Some("2026-05-10 08:15")).unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(2026, 5, 10).unwrap());
        assert_eq!(dt.hour(), 8);
        assert_eq!(parse_now(Some("2026-05-10T08:15:30")).unwrap().second(), 30);
        assert_eq!(
            parse_now(Some("2026-05-10")).unwrap().date(),
            NaiveDate::from_ymd_opt(2026, 5, 10).unwrap()
        );
        assert!(parse_now(Some("mañana")).is_err());
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("short"), "****");
        assert_eq!(mask_key("sk-abcdefgh1234"), "****1234");
    }

    #[test]
    fn test_task_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("tasks.json");
        assert!(load_tasks(&path).unwrap().is_empty());

        let due = parse_now(Some("2026-05-12 09:00")).unwrap();
        let tasks = vec![Task::new("Historia", "Ensayo", due, Priority::High)];
        save_tasks(&path, &tasks).unwrap();
        assert_eq!(load_tasks(&path).unwrap(), tasks);

        fs::write(&path, "not json").unwrap();
        assert!(load_tasks(&path).is_err());
    }

    #[test]
    fn test_ask_persists_created_task() {
        let dir = tempfile::tempdir().unwrap();
        let tasks = dir.path().join("tasks.json");
        let session = Session::load(dir.path().join("settings.toml")).unwrap();

        run_ask(
            &session,
            "crear tarea de historia para mañana",
            Some(tasks.clone()),
            Some("2026-05-10 08:00"),
        )
        .unwrap();

        let saved = load_tasks(&tasks).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].subject, "Historia");
        assert_eq!(saved[0].due_date, parse_now(Some("2026-05-11 08:00")).unwrap());
    }
}
