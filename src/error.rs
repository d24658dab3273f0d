//! Error types for Authflow.
//!
//! Provider-level failures are translated into this taxonomy at each
//! component boundary; nothing below this layer reaches the presentation
//! layer as an unhandled fault.

use thiserror::Error;

use crate::provider::ProviderError;

/// Primary error type for all Authflow operations.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Wrong password or unknown identity. Recoverable: the user retries.
    #[error("Invalid email or password")]
    Credential(String),

    /// Unconfirmed account or a wrong/expired one-time code. Recoverable:
    /// the user re-enters or re-requests a code.
    #[error("Verification failed: {reason}")]
    Verification { reason: VerificationReason },

    /// State-nonce mismatch or stray redirect. Logged, never surfaced to the
    /// user; expected noise from duplicate or racing redirect deliveries.
    #[error("Correlation mismatch on redirect")]
    Correlation,

    /// Session finalization exhausted its retry budget without ever
    /// observing a valid token. Routes back to sign-in.
    #[error("Sign-in did not complete")]
    FinalizeExhausted,

    /// An OTP step was reached without its `{mode, identity}` context.
    /// Fatal to that flow; the user must restart it.
    #[error("Missing reset token, restart the flow")]
    ContextLost,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Transport(String),

    #[error("Provider error: {0}")]
    Provider(String),
}

/// Classified reasons for a failed verification step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationReason {
    /// The submitted code does not match.
    CodeMismatch,
    /// The code expired; the caller should prompt to restart the request
    /// step rather than retry the same code.
    CodeExpired,
    /// The account exists but has not been confirmed yet.
    AccountNotVerified,
    /// Generic fallback text for anything else the provider reported.
    Other,
}

impl std::fmt::Display for VerificationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::CodeMismatch => "invalid verification code",
            Self::CodeExpired => "verification code has expired",
            Self::AccountNotVerified => "account is not verified yet",
            Self::Other => "invalid or expired code",
        };
        f.write_str(text)
    }
}

impl AuthError {
    /// Whether this error should be shown to the user at all.
    ///
    /// `Correlation` is deliberately suppressed: a mismatched or stray
    /// redirect is not actionable and would only confuse.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, Self::Correlation)
    }

    /// A message suitable for direct display, distinguishing actionable
    /// cases (wrong code, expired code, wrong password) from fallback text.
    pub fn user_message(&self) -> String {
        match self {
            Self::Credential(msg) => msg.clone(),
            Self::Verification { reason } => reason.to_string(),
            Self::FinalizeExhausted => "Sign-in did not complete. Please try again.".to_string(),
            Self::ContextLost => "Missing reset token. Please restart the reset flow.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<ProviderError> for AuthError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::InvalidCredentials => {
                Self::Credential("Invalid email or password".to_string())
            }
            ProviderError::UnknownIdentity => {
                Self::Credential("No account found with this email".to_string())
            }
            ProviderError::NotVerified => Self::Verification {
                reason: VerificationReason::AccountNotVerified,
            },
            ProviderError::CodeMismatch => Self::Verification {
                reason: VerificationReason::CodeMismatch,
            },
            ProviderError::CodeExpired => Self::Verification {
                reason: VerificationReason::CodeExpired,
            },
            ProviderError::AlreadyExists => {
                Self::Credential("An account with this email already exists".to_string())
            }
            ProviderError::WeakSecret => {
                Self::Credential("Password does not meet requirements".to_string())
            }
            ProviderError::NotAuthenticated => Self::FinalizeExhausted,
            ProviderError::Network(msg) => Self::Transport(msg),
            other => Self::Provider(other.to_string()),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AuthError>;
