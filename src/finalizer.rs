//! Session finalization: turning "we believe authorization just happened"
//! into a definitive session state.
//!
//! After a redirect the provider may not have durably persisted the
//! exchanged token yet, so redirect-triggered finalization retries the
//! session fetch over a short, fixed window. The retry budget is
//! deterministic: tests assert exact attempt and sleep counts.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::provider::{ConnectivityPolicy, Identity, IdentityProvider, ProviderError};

/// What prompted this finalize call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeTrigger {
    /// Ordinary launch-time session probe.
    Probe,
    /// A redirect matched the pending correlation nonce.
    RedirectMatch,
}

/// Definitive outcome of a finalize call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Authenticated(Option<Identity>),
    Unauthenticated,
}

/// Fixed, deterministic retry budget for redirect-triggered finalization.
#[derive(Debug, Clone)]
pub struct FinalizePolicy {
    /// Additional fetch attempts after the first, `RedirectMatch` only.
    pub extra_attempts: u32,
    /// Fixed wait before each extra attempt.
    pub backoff: Duration,
}

impl Default for FinalizePolicy {
    fn default() -> Self {
        Self {
            extra_attempts: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Converts a candidate authorization event into an authenticated or
/// unauthenticated outcome, with bounded retries and no writes.
pub struct SessionFinalizer {
    provider: Arc<dyn IdentityProvider>,
    policy: FinalizePolicy,
    connectivity: ConnectivityPolicy,
}

impl SessionFinalizer {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            policy: FinalizePolicy::default(),
            connectivity: ConnectivityPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: FinalizePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Resolve the current session state.
    ///
    /// Provider errors while probing mean "not yet authenticated", never a
    /// fault; only an exhausted budget with no valid token ever observed
    /// yields [`Outcome::Unauthenticated`].
    pub async fn finalize(&self, trigger: FinalizeTrigger) -> Outcome {
        let attempts = match trigger {
            FinalizeTrigger::Probe => 1,
            FinalizeTrigger::RedirectMatch => 1 + self.policy.extra_attempts,
        };

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(self.policy.backoff).await;
            }
            match self.provider.fetch_session().await {
                Ok(session) if session.has_valid_token => {
                    info!(?trigger, attempt = attempt + 1, "session confirmed valid");
                    return Outcome::Authenticated(session.identity);
                }
                Ok(_) => {
                    debug!(?trigger, attempt = attempt + 1, "session not yet valid");
                }
                Err(err) => {
                    self.note_probe_error(&err);
                    warn!(
                        ?trigger,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        error = %err,
                        "session fetch failed, treating as not yet authenticated"
                    );
                }
            }
        }

        // Secondary confirmation: the session endpoint can lag behind the
        // identity lookup shortly after an exchange.
        match self.provider.resolve_current_identity().await {
            Ok(identity) => {
                info!(?trigger, "identity resolved after fetch exhaustion");
                Outcome::Authenticated(Some(identity))
            }
            Err(err) => {
                self.note_probe_error(&err);
                debug!(?trigger, error = %err, "identity fallback failed");
                Outcome::Unauthenticated
            }
        }
    }

    /// Diagnostic annotation only; classification never steers control flow.
    fn note_probe_error(&self, err: &ProviderError) {
        if self.connectivity.is_connected_signal(err) {
            debug!(error = %err, "provider reachable (auth-shaped rejection)");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use crate::provider::{FederatedProvider, Session, SignUpAttributes};

    /// Provider whose `fetch_session` follows a script of validity flags.
    struct ScriptedProvider {
        script: Vec<bool>,
        fetches: AtomicU32,
        identity_resolves: AtomicU32,
        identity_ok: bool,
    }

    impl ScriptedProvider {
        fn new(script: Vec<bool>, identity_ok: bool) -> Self {
            Self {
                script,
                fetches: AtomicU32::new(0),
                identity_resolves: AtomicU32::new(0),
                identity_ok,
            }
        }

        fn fetch_count(&self) -> u32 {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl IdentityProvider for ScriptedProvider {
        async fn fetch_session(&self) -> Result<Session, ProviderError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst) as usize;
            let valid = self.script.get(n).copied().unwrap_or(false);
            Ok(Session {
                has_valid_token: valid,
                identity: valid.then(|| Identity::new("user-1")),
            })
        }

        async fn resolve_current_identity(&self) -> Result<Identity, ProviderError> {
            self.identity_resolves.fetch_add(1, Ordering::SeqCst);
            if self.identity_ok {
                Ok(Identity::new("user-1"))
            } else {
                Err(ProviderError::NotAuthenticated)
            }
        }

        async fn sign_in(&self, _: &str, _: &str) -> Result<(), ProviderError> {
            unimplemented!("not used")
        }

        fn federated_authorize_url(
            &self,
            _: FederatedProvider,
            _: &str,
        ) -> Result<String, ProviderError> {
            unimplemented!("not used")
        }

        async fn sign_up(
            &self,
            _: &str,
            _: &str,
            _: &SignUpAttributes,
        ) -> Result<(), ProviderError> {
            unimplemented!("not used")
        }

        async fn confirm_sign_up(&self, _: &str, _: &str) -> Result<(), ProviderError> {
            unimplemented!("not used")
        }

        async fn request_password_reset(&self, _: &str) -> Result<(), ProviderError> {
            unimplemented!("not used")
        }

        async fn confirm_password_reset(
            &self,
            _: &str,
            _: &str,
            _: &str,
        ) -> Result<(), ProviderError> {
            unimplemented!("not used")
        }

        async fn sign_out(&self) -> Result<(), ProviderError> {
            unimplemented!("not used")
        }
    }

    fn finalizer(provider: Arc<ScriptedProvider>) -> SessionFinalizer {
        SessionFinalizer::new(provider)
    }

    #[tokio::test]
    async fn valid_session_authenticates_immediately() {
        let provider = Arc::new(ScriptedProvider::new(vec![true], false));
        let outcome = finalizer(provider.clone())
            .finalize(FinalizeTrigger::Probe)
            .await;
        assert!(matches!(outcome, Outcome::Authenticated(Some(_))));
        assert_eq!(provider.fetch_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn redirect_match_retries_with_exact_backoff() {
        // Valid only on the second retry (third fetch overall).
        let provider = Arc::new(ScriptedProvider::new(vec![false, false, true], false));
        let fin = finalizer(provider.clone());

        let started = tokio::time::Instant::now();
        let outcome = fin.finalize(FinalizeTrigger::RedirectMatch).await;

        assert!(matches!(outcome, Outcome::Authenticated(_)));
        assert_eq!(provider.fetch_count(), 3);
        // Exactly two 500 ms backoff waits, no more.
        assert_eq!(started.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn probe_never_retries_the_fetch() {
        let provider = Arc::new(ScriptedProvider::new(vec![false, true], true));
        let outcome = finalizer(provider.clone())
            .finalize(FinalizeTrigger::Probe)
            .await;
        // One fetch, then straight to the identity fallback.
        assert_eq!(provider.fetch_count(), 1);
        assert!(matches!(outcome, Outcome::Authenticated(Some(_))));
        assert_eq!(provider.identity_resolves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_with_failed_fallback_is_unauthenticated() {
        let provider = Arc::new(ScriptedProvider::new(vec![], false));
        let outcome = finalizer(provider.clone())
            .finalize(FinalizeTrigger::RedirectMatch)
            .await;
        assert_eq!(outcome, Outcome::Unauthenticated);
        assert_eq!(provider.fetch_count(), 3);
        assert_eq!(provider.identity_resolves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn provider_errors_are_not_fatal() {
        struct FailingProvider;

        #[async_trait]
        impl IdentityProvider for FailingProvider {
            async fn fetch_session(&self) -> Result<Session, ProviderError> {
                Err(ProviderError::Network("connection reset".to_string()))
            }
            async fn resolve_current_identity(&self) -> Result<Identity, ProviderError> {
                Err(ProviderError::NotAuthenticated)
            }
            async fn sign_in(&self, _: &str, _: &str) -> Result<(), ProviderError> {
                unimplemented!()
            }
            fn federated_authorize_url(
                &self,
                _: FederatedProvider,
                _: &str,
            ) -> Result<String, ProviderError> {
                unimplemented!()
            }
            async fn sign_up(
                &self,
                _: &str,
                _: &str,
                _: &SignUpAttributes,
            ) -> Result<(), ProviderError> {
                unimplemented!()
            }
            async fn confirm_sign_up(&self, _: &str, _: &str) -> Result<(), ProviderError> {
                unimplemented!()
            }
            async fn request_password_reset(&self, _: &str) -> Result<(), ProviderError> {
                unimplemented!()
            }
            async fn confirm_password_reset(
                &self,
                _: &str,
                _: &str,
                _: &str,
            ) -> Result<(), ProviderError> {
                unimplemented!()
            }
            async fn sign_out(&self) -> Result<(), ProviderError> {
                unimplemented!()
            }
        }

        let outcome = SessionFinalizer::new(Arc::new(FailingProvider))
            .finalize(FinalizeTrigger::Probe)
            .await;
        assert_eq!(outcome, Outcome::Unauthenticated);
    }
}
