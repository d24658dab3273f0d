//! One-time-code challenge shared by sign-up verification and password
//! reset.
//!
//! The `{mode, identity}` context travels with the [`OtpChallenge`] value
//! object, handed over from the step that created it. It is never
//! re-derived from ambient state; losing it ends the flow.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{AuthError, Result, VerificationReason};
use crate::provider::IdentityProvider;

/// Fixed code length: six digits, nothing else.
pub const CODE_LENGTH: usize = 6;

/// Which flow this challenge belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpMode {
    /// Email verification after sign-up.
    SignupVerify,
    /// Code check before the reset-credential step.
    PasswordReset,
}

/// The value object carried between screens.
#[derive(Debug, Clone)]
pub struct OtpChallenge {
    pub mode: OtpMode,
    pub identity: String,
    pub code: String,
    pub attempts_made: u32,
}

impl OtpChallenge {
    pub fn new(mode: OtpMode, identity: impl Into<String>) -> Self {
        Self {
            mode,
            identity: identity.into(),
            code: String::new(),
            attempts_made: 0,
        }
    }
}

/// Coordinator phase. `Failed` keeps the challenge collecting: the user may
/// retry without re-requesting a code (except after expiry, where the
/// caller should prompt to restart the request step).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpPhase {
    Collecting,
    Submitting,
    Succeeded(OtpCompletion),
    Failed(VerificationReason),
}

/// What a successful submission produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpCompletion {
    /// Account verified; route back to sign-in.
    AccountVerified,
    /// Code accepted for reset; forward `{identity, code}` to the
    /// reset-credential step. No confirm-reset call has happened yet.
    ResetCodeAccepted { identity: String, code: String },
}

/// Validates and submits a one-time code against the operation selected by
/// the challenge mode.
pub struct OtpChallengeCoordinator {
    provider: Arc<dyn IdentityProvider>,
    challenge: OtpChallenge,
    phase: OtpPhase,
}

impl OtpChallengeCoordinator {
    /// Requires the carried challenge context; a missing identity is a
    /// terminal [`AuthError::ContextLost`] for this flow.
    pub fn new(provider: Arc<dyn IdentityProvider>, challenge: OtpChallenge) -> Result<Self> {
        if challenge.identity.trim().is_empty() {
            return Err(AuthError::ContextLost);
        }
        Ok(Self {
            provider,
            challenge,
            phase: OtpPhase::Collecting,
        })
    }

    pub fn phase(&self) -> &OtpPhase {
        &self.phase
    }

    pub fn challenge(&self) -> &OtpChallenge {
        &self.challenge
    }

    /// Replace the collected code with sanitized input: non-digits are
    /// silently stripped, the rest truncated to six digits. Editing after a
    /// failure returns the coordinator to collecting.
    pub fn set_code(&mut self, input: &str) {
        if matches!(self.phase, OtpPhase::Failed(_)) {
            self.phase = OtpPhase::Collecting;
        }
        self.challenge.code = input
            .chars()
            .filter(|c| c.is_ascii_digit())
            .take(CODE_LENGTH)
            .collect();
    }

    /// Submit the collected code.
    ///
    /// `SignupVerify` confirms the account with the provider.
    /// `PasswordReset` performs no provider call: code verification is
    /// deliberately separated from credential submission so the reset
    /// screen can re-validate password rules without burning the code.
    pub async fn submit(&mut self) -> Result<&OtpPhase> {
        if self.challenge.code.is_empty() {
            return Err(AuthError::Verification {
                reason: VerificationReason::Other,
            });
        }
        if matches!(self.phase, OtpPhase::Submitting | OtpPhase::Succeeded(_)) {
            debug!("duplicate submit ignored");
            return Ok(&self.phase);
        }

        self.phase = OtpPhase::Submitting;
        self.challenge.attempts_made += 1;

        match self.challenge.mode {
            OtpMode::SignupVerify => {
                match self
                    .provider
                    .confirm_sign_up(&self.challenge.identity, &self.challenge.code)
                    .await
                {
                    Ok(()) => {
                        info!(identity = %self.challenge.identity, "account verified");
                        self.phase = OtpPhase::Succeeded(OtpCompletion::AccountVerified);
                    }
                    Err(err) => {
                        let reason = match AuthError::from(err) {
                            AuthError::Verification { reason } => reason,
                            _ => VerificationReason::Other,
                        };
                        self.phase = OtpPhase::Failed(reason);
                    }
                }
            }
            OtpMode::PasswordReset => {
                self.phase = OtpPhase::Succeeded(OtpCompletion::ResetCodeAccepted {
                    identity: self.challenge.identity.clone(),
                    code: self.challenge.code.clone(),
                });
            }
        }
        Ok(&self.phase)
    }
}
