//! Access gate and two-factor setup
//!
//! The gate counts failed access-code attempts and locks for a day after
//! [`MAX_ATTEMPTS`] failures. Two-factor only provisions a secret and checks
//! the shape of submitted codes; it does not compute TOTP values.

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use tracing::{info, warn};

use crate::config::{AccessState, TwoFactorState};
use crate::error::AccessError;

pub const MAX_ATTEMPTS: u32 = 5;
pub const BLOCK_HOURS: i64 = 24;

pub const OTP_LEN: usize = 6;
pub const SECRET_LEN: usize = 16;
pub const OTP_ISSUER: &str = "TareaAssist";

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

// ============================================================================
// Access gate
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStatus {
    Open { attempts_left: u32 },
    Blocked { remaining: TimeDelta },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeOutcome {
    /// Code accepted; `two_factor_required` when an OTP must follow
    Granted { two_factor_required: bool },
    Denied { attempts_left: u32 },
}

pub struct AccessGate<'a> {
    state: &'a mut AccessState,
    two_factor: &'a TwoFactorState,
}

impl<'a> AccessGate<'a> {
    pub fn new(state: &'a mut AccessState, two_factor: &'a TwoFactorState) -> Self {
        Self { state, two_factor }
    }

    /// Current status; an expired block is cleared as a side effect
    pub fn status(&mut self, now: DateTime<Utc>) -> GateStatus {
        if let Some(until) = self.state.blocked_until {
            if until > now {
                return GateStatus::Blocked {
                    remaining: until - now,
                };
            }
            info!("access block expired");
            self.state.blocked_until = None;
            self.state.attempts = 0;
        }
        GateStatus::Open {
            attempts_left: MAX_ATTEMPTS.saturating_sub(self.state.attempts),
        }
    }

    pub fn submit_code(&mut self, code: &str, now: DateTime<Utc>) -> Result<CodeOutcome, AccessError> {
        if let GateStatus::Blocked { remaining } = self.status(now) {
            return Err(AccessError::Blocked { remaining });
        }
        let expected = self
            .state
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(AccessError::NoAccessCode)?;

        if code.trim() == expected {
            self.state.attempts = 0;
            info!("access granted");
            return Ok(CodeOutcome::Granted {
                two_factor_required: self.two_factor.enabled && self.two_factor.verified,
            });
        }

        self.state.attempts += 1;
        if self.state.attempts >= MAX_ATTEMPTS {
            self.state.blocked_until = Some(now + TimeDelta::hours(BLOCK_HOURS));
            warn!(attempts = self.state.attempts, "too many failed attempts, access blocked");
            return Err(AccessError::Blocked {
                remaining: TimeDelta::hours(BLOCK_HOURS),
            });
        }

        let attempts_left = MAX_ATTEMPTS - self.state.attempts;
        warn!(attempts_left, "wrong access code");
        Ok(CodeOutcome::Denied { attempts_left })
    }
}

// ============================================================================
// Two-factor
// ============================================================================

pub struct TwoFactor<'a> {
    state: &'a mut TwoFactorState,
}

impl<'a> TwoFactor<'a> {
    pub fn new(state: &'a mut TwoFactorState) -> Self {
        Self { state }
    }

    /// Secret for the authenticator app, generated on first use
    pub fn provision<R: Rng + ?Sized>(&mut self, rng: &mut R) -> &str {
        let secret = self.state.secret.get_or_insert_with(|| {
            (0..SECRET_LEN)
                .map(|_| BASE32_ALPHABET[rng.gen_range(0..BASE32_ALPHABET.len())] as char)
                .collect()
        });
        secret.as_str()
    }

    pub fn otpauth_url(&self, account: &str) -> Result<String, AccessError> {
        let secret = self
            .state
            .secret
            .as_deref()
            .ok_or(AccessError::TwoFactorNotSetUp)?;
        let label = urlencoding::encode(&format!("{OTP_ISSUER}:{account}")).into_owned();
        Ok(format!(
            "otpauth://totp/{label}?secret={secret}&issuer={OTP_ISSUER}"
        ))
    }

    /// First code after setup; enables two-factor
    pub fn confirm(&mut self, code: &str) -> Result<(), AccessError> {
        self.verify(code)?;
        self.state.enabled = true;
        self.state.verified = true;
        info!("two-factor enabled");
        Ok(())
    }

    pub fn verify(&self, code: &str) -> Result<(), AccessError> {
        if self.state.secret.is_none() {
            return Err(AccessError::TwoFactorNotSetUp);
        }
        let code = code.trim();
        if code.len() == OTP_LEN && code.bytes().all(|b| b.is_ascii_digit()) {
            Ok(())
        } else {
            Err(AccessError::InvalidOtpFormat)
        }
    }

    pub fn disable(&mut self) {
        *self.state = TwoFactorState::default();
        info!("two-factor disabled");
    }

    pub fn is_active(&self) -> bool {
        self.state.enabled && self.state.verified
    }
}
