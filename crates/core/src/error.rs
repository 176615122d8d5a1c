//! Typed errors for the session file and the access gate

use std::io;
use std::path::PathBuf;

use chrono::TimeDelta;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read session file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write session file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid session file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize session: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("no config directory available on this platform")]
    NoConfigDir,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("access blocked for another {} minute(s)", .remaining.num_minutes().max(1))]
    Blocked { remaining: TimeDelta },

    #[error("no access code configured")]
    NoAccessCode,

    #[error("two-factor authentication is not set up")]
    TwoFactorNotSetUp,

    #[error("invalid one-time code: expected 6 digits")]
    InvalidOtpFormat,
}
