//! Identity-provider contract and the hosted user-pool client.
//!
//! The engine never talks to the network directly; everything goes through
//! [`IdentityProvider`], which the Cognito-style client implements and tests
//! replace with scripted fakes.

pub mod cognito;

use async_trait::async_trait;
use thiserror::Error;

pub use cognito::CognitoClient;

/// A user's unique handle plus the profile attributes the pool returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            given_name: None,
            family_name: None,
        }
    }
}

/// Opaque validity signal for the current session.
///
/// Fetched on demand; never cached by the engine. No freshness is assumed
/// beyond "valid at time of fetch".
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub has_valid_token: bool,
    pub identity: Option<Identity>,
}

/// Profile attributes submitted at sign-up.
#[derive(Debug, Clone, Default)]
pub struct SignUpAttributes {
    pub email: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

/// Federated OAuth providers offered through the hosted UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FederatedProvider {
    Google,
    Apple,
    Facebook,
}

impl FederatedProvider {
    /// Name as the hosted UI expects it in `identity_provider`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Apple => "SignInWithApple",
            Self::Facebook => "Facebook",
        }
    }
}

/// Normalized provider failures.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Account not verified")]
    NotVerified,
    #[error("Unknown identity")]
    UnknownIdentity,
    #[error("Identity already exists")]
    AlreadyExists,
    #[error("Secret does not meet requirements")]
    WeakSecret,
    #[error("Code mismatch")]
    CodeMismatch,
    #[error("Code expired")]
    CodeExpired,
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidResponse(error.to_string())
    }
}

/// Abstract contract over the managed identity provider.
///
/// Operation names mirror the engine's needs, not any SDK's. Implementations
/// must be side-effect free where the contract says so: `fetch_session` and
/// `resolve_current_identity` only read.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Fetch the current session validity signal.
    async fn fetch_session(&self) -> Result<Session, ProviderError>;

    /// Resolve the currently signed-in identity, failing with
    /// [`ProviderError::NotAuthenticated`] when there is none.
    async fn resolve_current_identity(&self) -> Result<Identity, ProviderError>;

    /// Password sign-in against the user pool.
    async fn sign_in(&self, identity: &str, secret: &str) -> Result<(), ProviderError>;

    /// Build the external authorization URL for a federated sign-in attempt,
    /// carrying `nonce` as the OAuth `state`.
    fn federated_authorize_url(
        &self,
        provider: FederatedProvider,
        nonce: &str,
    ) -> Result<String, ProviderError>;

    /// Create an account; the pool sends a verification code to the identity.
    async fn sign_up(
        &self,
        identity: &str,
        secret: &str,
        attributes: &SignUpAttributes,
    ) -> Result<(), ProviderError>;

    /// Confirm account verification with a one-time code.
    async fn confirm_sign_up(&self, identity: &str, code: &str) -> Result<(), ProviderError>;

    /// Redeem an authorization code delivered by a matched redirect,
    /// exchanging it for a session. Providers whose SDK performs the
    /// exchange internally can keep the default no-op.
    async fn complete_federated_sign_in(&self, _code: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Request a password-reset code for the identity.
    async fn request_password_reset(&self, identity: &str) -> Result<(), ProviderError>;

    /// Complete a password reset with the code and the new secret.
    async fn confirm_password_reset(
        &self,
        identity: &str,
        code: &str,
        new_secret: &str,
    ) -> Result<(), ProviderError>;

    /// Invalidate the current session.
    async fn sign_out(&self) -> Result<(), ProviderError>;
}

/// Which provider failures count as proof of connectivity during
/// diagnostic probing.
///
/// An auth-shaped rejection means the pool was reached and answered; a
/// transport error does not. Policy, not contract: callers may tighten or
/// loosen the list.
#[derive(Debug, Clone)]
pub struct ConnectivityPolicy {
    count_auth_rejections: bool,
    count_unknown_identity: bool,
}

impl Default for ConnectivityPolicy {
    fn default() -> Self {
        Self {
            count_auth_rejections: true,
            count_unknown_identity: true,
        }
    }
}

impl ConnectivityPolicy {
    /// Whether this error still demonstrates the provider is reachable.
    pub fn is_connected_signal(&self, error: &ProviderError) -> bool {
        match error {
            ProviderError::InvalidCredentials
            | ProviderError::NotVerified
            | ProviderError::NotAuthenticated => self.count_auth_rejections,
            ProviderError::UnknownIdentity => self.count_unknown_identity,
            _ => false,
        }
    }
}
