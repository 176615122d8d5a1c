//! Session settings
//!
//! Everything the assistant needs between runs (selected provider, API keys
//! and their history, access-gate counters, two-factor state) lives in one
//! [`Session`] that callers load at start, pass around explicitly, and save
//! or reset on demand. Stored as TOML:
//!
//! ```toml
//! [assistant]
//! provider = "openai"
//! subject_fallback = "random"
//!
//! [keys]
//! openai = "sk-..."
//!
//! [access]
//! code = "..."
//! attempts = 0
//! ```

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::llm::Provider;
use crate::slots::SubjectFallback;

/// Keys remembered per provider
pub const KEY_HISTORY_LIMIT: usize = 5;

const APP_DIR: &str = "tarea-assist";
const SESSION_FILE: &str = "settings.toml";

// ============================================================================
// Settings
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantSettings {
    #[serde(default)]
    pub provider: Provider,

    #[serde(default)]
    pub subject_fallback: SubjectFallback,

    /// Optional system prompt file ({{TODAY}} is substituted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_file: Option<PathBuf>,
}

/// Access gate counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default)]
    pub attempts: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TwoFactorState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub assistant: AssistantSettings,

    /// API key per provider id
    #[serde(default)]
    pub keys: BTreeMap<String, String>,

    /// Previously used keys per provider id, most recent first
    #[serde(default)]
    pub key_history: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub access: AccessState,

    #[serde(default)]
    pub two_factor: TwoFactorState,
}

// ============================================================================
// Session
// ============================================================================

/// Settings bound to the file they were loaded from
#[derive(Debug, Clone)]
pub struct Session {
    path: PathBuf,
    pub settings: Settings,
}

/// Default session file: `<config dir>/tarea-assist/settings.toml`
pub fn default_session_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(SESSION_FILE))
        .ok_or(ConfigError::NoConfigDir)
}

impl Session {
    /// Load from `path`; a missing file yields default settings
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let settings = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?
        } else {
            debug!(path = %path.display(), "no session file, using defaults");
            Settings::default()
        };
        Ok(Self { path, settings })
    }

    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(default_session_path()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write settings to disk (temp file + rename)
    pub fn save(&self) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(&self.settings)?;
        let write_err = |source| ConfigError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }
        let tmp = self.path.with_extension("toml.tmp");
        fs::write(&tmp, content).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;

        debug!(path = %self.path.display(), "saved session");
        Ok(())
    }

    /// Restore defaults and remove the file
    pub fn reset(&mut self) -> Result<(), ConfigError> {
        self.settings = Settings::default();
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|source| ConfigError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        info!(path = %self.path.display(), "session reset");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Providers and keys
    // ------------------------------------------------------------------------

    pub fn selected_provider(&self) -> Provider {
        self.settings.assistant.provider
    }

    pub fn set_selected_provider(&mut self, provider: Provider) {
        self.settings.assistant.provider = provider;
    }

    /// Key for `provider`: environment override first, then the stored key
    pub fn api_key(&self, provider: Provider) -> Option<String> {
        env::var(provider.env_var())
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.stored_key(provider).map(str::to_string))
    }

    /// Key saved in the session file, ignoring the environment
    pub fn stored_key(&self, provider: Provider) -> Option<&str> {
        self.settings
            .keys
            .get(provider.as_str())
            .map(String::as_str)
            .filter(|k| !k.trim().is_empty())
    }

    pub fn has_api_key(&self, provider: Provider) -> bool {
        self.api_key(provider).is_some()
    }

    /// Store a key and record it in the provider's history
    pub fn set_api_key(&mut self, provider: Provider, key: &str) {
        let key = key.trim();
        self.settings
            .keys
            .insert(provider.as_str().to_string(), key.to_string());
        self.remember_key(provider, key);
    }

    pub fn key_history(&self, provider: Provider) -> &[String] {
        self.settings
            .key_history
            .get(provider.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Most recent first, no duplicates, capped at [`KEY_HISTORY_LIMIT`]
    fn remember_key(&mut self, provider: Provider, key: &str) {
        if key.is_empty() {
            return;
        }
        let history = self
            .settings
            .key_history
            .entry(provider.as_str().to_string())
            .or_default();
        if history.iter().any(|k| k == key) {
            return;
        }
        history.insert(0, key.to_string());
        history.truncate(KEY_HISTORY_LIMIT);
    }

    pub fn forget_key(&mut self, provider: Provider, key: &str) {
        if let Some(history) = self.settings.key_history.get_mut(provider.as_str()) {
            history.retain(|k| k != key);
        }
    }
}
