//! Cognito-style user-pool client over the IdP JSON protocol.
//!
//! Thin SDK layer: each operation is one `X-Amz-Target` call, with pool
//! exception names mapped onto [`ProviderError`]. Tokens obtained from
//! password sign-in or a federated code exchange are held in memory only;
//! durable storage is the platform's business, not this client's.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::{
    FederatedProvider, Identity, IdentityProvider, ProviderError, Session, SignUpAttributes,
};
use crate::config::AuthConfig;

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const AMZ_JSON: &str = "application/x-amz-json-1.1";

/// In-memory token set for the current process.
#[derive(Debug, Clone)]
struct TokenSet {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl TokenSet {
    fn is_valid(&self) -> bool {
        self.expires_at > Utc::now()
    }
}

/// User-pool client.
///
/// # Example
/// ```no_run
/// use authflow::config::{AuthConfig, OAuthConfig};
/// use authflow::provider::cognito::CognitoClient;
///
/// let config = AuthConfig::new("us-east-1_AbCdEfGhI", "client-id", "us-east-1")
///     .with_oauth(OAuthConfig::new("myapp.auth.us-east-1.amazoncognito.com", "myapp://"));
/// let client = CognitoClient::new(&config)?;
/// # Ok::<(), authflow::provider::ProviderError>(())
/// ```
pub struct CognitoClient {
    http: reqwest::Client,
    config: AuthConfig,
    endpoint: String,
    token_endpoint_override: Option<String>,
    tokens: Mutex<Option<TokenSet>>,
    cached_identity: Mutex<Option<Identity>>,
}

impl CognitoClient {
    pub fn new(config: &AuthConfig) -> Result<Self, ProviderError> {
        if config.client_id.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "client_id must not be empty".to_string(),
            ));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint(),
            config: config.clone(),
            token_endpoint_override: None,
            tokens: Mutex::new(None),
            cached_identity: Mutex::new(None),
        })
    }

    /// Override the hosted-UI token endpoint (tests).
    pub fn with_token_endpoint(mut self, url: impl Into<String>) -> Self {
        self.token_endpoint_override = Some(url.into());
        self
    }

    async fn call(
        &self,
        operation: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", AMZ_JSON)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let payload: serde_json::Value = resp.json().await.unwrap_or(serde_json::Value::Null);
        if status.is_success() {
            return Ok(payload);
        }

        let exception: PoolException =
            serde_json::from_value(payload.clone()).unwrap_or_default();
        Err(map_exception(&exception, status.as_u16()))
    }

    fn access_token(&self) -> Option<String> {
        let guard = self.tokens.lock().ok()?;
        let tokens = guard.as_ref()?;
        if !tokens.is_valid() {
            return None;
        }
        Some(tokens.access_token.clone())
    }

    fn store_tokens(&self, access_token: String, expires_in: i64) {
        let set = TokenSet {
            access_token,
            expires_at: Utc::now() + Duration::seconds(expires_in),
        };
        if let Ok(mut guard) = self.tokens.lock() {
            *guard = Some(set);
        }
    }

    fn hosted_ui(&self) -> Result<&crate::config::OAuthConfig, ProviderError> {
        self.config.oauth.as_ref().ok_or_else(|| {
            ProviderError::Unsupported("federated sign-in requires oauth configuration".to_string())
        })
    }

    fn token_endpoint(&self) -> Result<String, ProviderError> {
        if let Some(ref url) = self.token_endpoint_override {
            return Ok(url.clone());
        }
        Ok(format!("https://{}/oauth2/token", self.hosted_ui()?.domain))
    }
}

#[async_trait]
impl IdentityProvider for CognitoClient {
    async fn fetch_session(&self) -> Result<Session, ProviderError> {
        let has_valid_token = self.access_token().is_some();
        let identity = if has_valid_token {
            self.cached_identity.lock().ok().and_then(|g| g.clone())
        } else {
            None
        };
        Ok(Session {
            has_valid_token,
            identity,
        })
    }

    async fn resolve_current_identity(&self) -> Result<Identity, ProviderError> {
        let access_token = self
            .access_token()
            .ok_or(ProviderError::NotAuthenticated)?;
        let payload = self
            .call("GetUser", json!({ "AccessToken": access_token }))
            .await?;
        let user: GetUserResponse = serde_json::from_value(payload)?;

        let mut identity = Identity::new(user.username);
        for attr in user.user_attributes {
            match attr.name.as_str() {
                "email" => identity.email = Some(attr.value),
                "given_name" => identity.given_name = Some(attr.value),
                "family_name" => identity.family_name = Some(attr.value),
                _ => {}
            }
        }
        if let Ok(mut guard) = self.cached_identity.lock() {
            *guard = Some(identity.clone());
        }
        Ok(identity)
    }

    async fn sign_in(&self, identity: &str, secret: &str) -> Result<(), ProviderError> {
        let payload = self
            .call(
                "InitiateAuth",
                json!({
                    "AuthFlow": "USER_PASSWORD_AUTH",
                    "ClientId": self.config.client_id,
                    "AuthParameters": { "USERNAME": identity, "PASSWORD": secret },
                }),
            )
            .await?;
        let result: InitiateAuthResponse = serde_json::from_value(payload)?;
        let auth = result.authentication_result.ok_or_else(|| {
            ProviderError::InvalidResponse("sign-in response missing tokens".to_string())
        })?;
        self.store_tokens(auth.access_token, auth.expires_in);
        Ok(())
    }

    fn federated_authorize_url(
        &self,
        provider: FederatedProvider,
        nonce: &str,
    ) -> Result<String, ProviderError> {
        let oauth = self.hosted_ui()?;
        let mut url = Url::parse(&format!("https://{}/oauth2/authorize", oauth.domain))
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("identity_provider", provider.as_str())
            .append_pair("redirect_uri", &oauth.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("scope", &oauth.scopes.join(" "))
            .append_pair("state", nonce)
            // Force account re-selection; a cached federated session would
            // otherwise silently reuse the previous account.
            .append_pair("prompt", "select_account")
            .append_pair("max_age", "0");
        Ok(url.into())
    }

    async fn sign_up(
        &self,
        identity: &str,
        secret: &str,
        attributes: &SignUpAttributes,
    ) -> Result<(), ProviderError> {
        let mut user_attributes = vec![json!({ "Name": "email", "Value": attributes.email })];
        if let Some(ref given) = attributes.given_name {
            user_attributes.push(json!({ "Name": "given_name", "Value": given }));
        }
        if let Some(ref family) = attributes.family_name {
            user_attributes.push(json!({ "Name": "family_name", "Value": family }));
        }
        self.call(
            "SignUp",
            json!({
                "ClientId": self.config.client_id,
                "Username": identity,
                "Password": secret,
                "UserAttributes": user_attributes,
            }),
        )
        .await?;
        Ok(())
    }

    async fn confirm_sign_up(&self, identity: &str, code: &str) -> Result<(), ProviderError> {
        self.call(
            "ConfirmSignUp",
            json!({
                "ClientId": self.config.client_id,
                "Username": identity,
                "ConfirmationCode": code,
            }),
        )
        .await?;
        Ok(())
    }

    async fn request_password_reset(&self, identity: &str) -> Result<(), ProviderError> {
        self.call(
            "ForgotPassword",
            json!({ "ClientId": self.config.client_id, "Username": identity }),
        )
        .await?;
        Ok(())
    }

    async fn confirm_password_reset(
        &self,
        identity: &str,
        code: &str,
        new_secret: &str,
    ) -> Result<(), ProviderError> {
        self.call(
            "ConfirmForgotPassword",
            json!({
                "ClientId": self.config.client_id,
                "Username": identity,
                "ConfirmationCode": code,
                "Password": new_secret,
            }),
        )
        .await?;
        Ok(())
    }

    async fn complete_federated_sign_in(&self, code: &str) -> Result<(), ProviderError> {
        let oauth = self.hosted_ui()?;
        let resp = self
            .http
            .post(self.token_endpoint()?)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", self.config.client_id.as_str()),
                ("code", code),
                ("redirect_uri", oauth.redirect_uri.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ProviderError::InvalidResponse(format!(
                "token exchange failed with status {}",
                resp.status()
            )));
        }
        let payload: HostedUiTokenResponse = resp.json().await?;
        self.store_tokens(payload.access_token, payload.expires_in);
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        if let Some(access_token) = self.access_token() {
            // Best effort: a revoked or already-expired token still means
            // the local session ends.
            let _ = self
                .call("GlobalSignOut", json!({ "AccessToken": access_token }))
                .await;
        }
        if let Ok(mut guard) = self.tokens.lock() {
            *guard = None;
        }
        if let Ok(mut guard) = self.cached_identity.lock() {
            *guard = None;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct PoolException {
    #[serde(rename = "__type")]
    kind: Option<String>,
    message: Option<String>,
}

fn map_exception(exception: &PoolException, status: u16) -> ProviderError {
    let kind = exception.kind.as_deref().unwrap_or("");
    // Exception names arrive either bare or prefixed with a namespace.
    let kind = kind.rsplit('#').next().unwrap_or(kind);
    match kind {
        "NotAuthorizedException" => ProviderError::InvalidCredentials,
        "UserNotConfirmedException" => ProviderError::NotVerified,
        "UserNotFoundException" => ProviderError::UnknownIdentity,
        "UsernameExistsException" => ProviderError::AlreadyExists,
        "InvalidPasswordException" => ProviderError::WeakSecret,
        // The pool reports some policy violations as a generic parameter
        // error; only the password-shaped ones are weak-secret rejections.
        "InvalidParameterException"
            if exception
                .message
                .as_deref()
                .is_some_and(|m| m.to_ascii_lowercase().contains("password")) =>
        {
            ProviderError::WeakSecret
        }
        "CodeMismatchException" => ProviderError::CodeMismatch,
        "ExpiredCodeException" => ProviderError::CodeExpired,
        other if !other.is_empty() => ProviderError::InvalidResponse(format!(
            "{other}: {}",
            exception.message.as_deref().unwrap_or("no message")
        )),
        _ => ProviderError::InvalidResponse(format!("request failed with status {status}")),
    }
}

#[derive(Debug, Deserialize)]
struct InitiateAuthResponse {
    #[serde(rename = "AuthenticationResult")]
    authentication_result: Option<AuthenticationResult>,
}

#[derive(Debug, Deserialize)]
struct AuthenticationResult {
    #[serde(rename = "AccessToken")]
    access_token: String,
    #[serde(rename = "ExpiresIn")]
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct GetUserResponse {
    #[serde(rename = "Username")]
    username: String,
    #[serde(rename = "UserAttributes", default)]
    user_attributes: Vec<UserAttribute>,
}

#[derive(Debug, Deserialize)]
struct UserAttribute {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Value")]
    value: String,
}

#[derive(Debug, Deserialize)]
struct HostedUiTokenResponse {
    access_token: String,
    expires_in: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OAuthConfig;

    fn test_client() -> CognitoClient {
        let config = AuthConfig::new("us-east-1_TestPool", "client-abc", "us-east-1").with_oauth(
            OAuthConfig::new("myapp.auth.us-east-1.amazoncognito.com", "myapp://"),
        );
        CognitoClient::new(&config).unwrap()
    }

    #[test]
    fn authorize_url_carries_nonce_and_account_selection() {
        let client = test_client();
        let url = client
            .federated_authorize_url(FederatedProvider::Google, "nonce-123")
            .unwrap();
        assert!(url.starts_with(
            "https://myapp.auth.us-east-1.amazoncognito.com/oauth2/authorize?"
        ));
        assert!(url.contains("identity_provider=Google"));
        assert!(url.contains("state=nonce-123"));
        assert!(url.contains("prompt=select_account"));
        assert!(url.contains("max_age=0"));
        assert!(url.contains("redirect_uri=myapp%3A%2F%2F"));
    }

    #[test]
    fn authorize_url_requires_oauth_config() {
        let config = AuthConfig::new("pool", "client", "us-east-1");
        let client = CognitoClient::new(&config).unwrap();
        let result = client.federated_authorize_url(FederatedProvider::Google, "n");
        assert!(matches!(result, Err(ProviderError::Unsupported(_))));
    }

    #[test]
    fn exception_mapping_handles_namespaced_types() {
        let exception = PoolException {
            kind: Some("com.amazonaws.cognito#CodeMismatchException".to_string()),
            message: None,
        };
        assert!(matches!(
            map_exception(&exception, 400),
            ProviderError::CodeMismatch
        ));
    }

    #[test]
    fn password_shaped_parameter_errors_map_to_weak_secret() {
        let exception = PoolException {
            kind: Some("InvalidParameterException".to_string()),
            message: Some(
                "Value at 'password' failed to satisfy constraint: Member must have length \
                 greater than or equal to 8"
                    .to_string(),
            ),
        };
        assert!(matches!(
            map_exception(&exception, 400),
            ProviderError::WeakSecret
        ));

        // Other parameter complaints stay generic.
        let exception = PoolException {
            kind: Some("InvalidParameterException".to_string()),
            message: Some("Invalid email address format.".to_string()),
        };
        assert!(matches!(
            map_exception(&exception, 400),
            ProviderError::InvalidResponse(_)
        ));
    }

    #[test]
    fn unknown_exception_falls_back_to_invalid_response() {
        let exception = PoolException {
            kind: Some("TooManyRequestsException".to_string()),
            message: Some("slow down".to_string()),
        };
        let err = map_exception(&exception, 400);
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn expired_token_set_is_not_valid() {
        let set = TokenSet {
            access_token: "tok".to_string(),
            expires_at: Utc::now() - Duration::minutes(1),
        };
        assert!(!set.is_valid());
    }
}
