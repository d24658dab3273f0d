//! Configuration for the hosted user-pool client.
//!
//! Explicitly constructed and passed by reference. There is no global,
//! configured-once client: whoever builds the process wires one
//! [`AuthConfig`] into one provider at startup.

use crate::error::AuthError;

/// Hosted user-pool settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub user_pool_id: String,
    pub client_id: String,
    pub region: String,
    /// Federated OAuth settings; absent when only password sign-in is used.
    pub oauth: Option<OAuthConfig>,
    /// Service endpoint override, used by tests to point at a local server.
    pub endpoint_override: Option<String>,
}

/// Hosted-UI OAuth settings.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Hosted UI domain, e.g. `myapp.auth.us-east-1.amazoncognito.com`.
    pub domain: String,
    /// Must exactly match a redirect URI registered on the app client.
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    pub fn new(domain: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            redirect_uri: redirect_uri.into(),
            scopes: vec![
                "email".to_string(),
                "openid".to_string(),
                "profile".to_string(),
            ],
        }
    }
}

impl AuthConfig {
    pub fn new(
        user_pool_id: impl Into<String>,
        client_id: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            user_pool_id: user_pool_id.into(),
            client_id: client_id.into(),
            region: region.into(),
            oauth: None,
            endpoint_override: None,
        }
    }

    pub fn with_oauth(mut self, oauth: OAuthConfig) -> Self {
        self.oauth = Some(oauth);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_override = Some(endpoint.into());
        self
    }

    /// Load from environment variables (`AUTHFLOW_USER_POOL_ID`,
    /// `AUTHFLOW_CLIENT_ID`, `AUTHFLOW_REGION`, and optionally
    /// `AUTHFLOW_OAUTH_DOMAIN` + `AUTHFLOW_REDIRECT_URI`).
    pub fn from_env() -> Result<Self, AuthError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        let user_pool_id = require_env("AUTHFLOW_USER_POOL_ID")?;
        let client_id = require_env("AUTHFLOW_CLIENT_ID")?;
        let region = require_env("AUTHFLOW_REGION")?;

        let mut config = Self::new(user_pool_id, client_id, region);
        if let Ok(domain) = std::env::var("AUTHFLOW_OAUTH_DOMAIN") {
            let redirect_uri = require_env("AUTHFLOW_REDIRECT_URI")?;
            config = config.with_oauth(OAuthConfig::new(domain, redirect_uri));
        }
        Ok(config)
    }

    /// Service endpoint for the user-pool JSON API.
    pub fn endpoint(&self) -> String {
        self.endpoint_override
            .clone()
            .unwrap_or_else(|| format!("https://cognito-idp.{}.amazonaws.com/", self.region))
    }
}

fn require_env(name: &str) -> Result<String, AuthError> {
    std::env::var(name)
        .map_err(|_| AuthError::Configuration(format!("missing environment variable {name}")))
}
