//! Top-level orchestration of the launch-time authentication race.
//!
//! Two paths can confirm a session: the ordinary launch probe and a
//! redirect-driven finalize. They race; the first terminal result commits
//! and the loser's late result is discarded. A slow probe must never
//! clobber a fast, successful redirect login, and vice versa.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::correlator::{CorrelationEvent, CorrelatorConfig, RedirectCorrelator};
use crate::deeplink::{DeepLinkSource, UrlOpener};
use crate::error::{AuthError, Result};
use crate::finalizer::{FinalizeTrigger, Outcome, SessionFinalizer};
use crate::otp::{OtpChallenge, OtpMode};
use crate::provider::{FederatedProvider, Identity, IdentityProvider, SignUpAttributes};

/// Observable controller state. `Checking` is initial; the other two are
/// terminal for a launch cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Checking,
    Authenticated(Option<Identity>),
    Unauthenticated,
}

impl AuthOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Checking)
    }
}

/// Orchestrates session probing, redirect correlation, and user intents.
pub struct AuthSessionController {
    provider: Arc<dyn IdentityProvider>,
    finalizer: Arc<SessionFinalizer>,
    correlator: Arc<RedirectCorrelator>,
    opener: Arc<dyn UrlOpener>,
    outcome_tx: watch::Sender<AuthOutcome>,
}

impl AuthSessionController {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        links: Arc<dyn DeepLinkSource>,
        opener: Arc<dyn UrlOpener>,
    ) -> Arc<Self> {
        Self::with_correlator_config(provider, links, opener, CorrelatorConfig::default())
    }

    pub fn with_correlator_config(
        provider: Arc<dyn IdentityProvider>,
        links: Arc<dyn DeepLinkSource>,
        opener: Arc<dyn UrlOpener>,
        config: CorrelatorConfig,
    ) -> Arc<Self> {
        let (correlator, events_rx) = RedirectCorrelator::new(config);
        let (outcome_tx, _) = watch::channel(AuthOutcome::Checking);
        let controller = Arc::new(Self {
            finalizer: Arc::new(SessionFinalizer::new(provider.clone())),
            provider,
            correlator: correlator.clone(),
            opener,
            outcome_tx,
        });

        tokio::spawn(correlator.run(links));
        tokio::spawn(Arc::clone(&controller).consume_correlation_events(events_rx));

        controller
    }

    /// Begin the launch-time session probe. Non-blocking; the outcome
    /// arrives on [`AuthSessionController::subscribe_outcome`].
    pub fn start(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = this.finalizer.finalize(FinalizeTrigger::Probe).await;
            this.commit(outcome, "probe");
        });
    }

    /// Observe the controller outcome.
    pub fn subscribe_outcome(&self) -> watch::Receiver<AuthOutcome> {
        self.outcome_tx.subscribe()
    }

    pub fn current_outcome(&self) -> AuthOutcome {
        self.outcome_tx.borrow().clone()
    }

    /// Password sign-in, followed by a probe finalize to confirm.
    pub async fn sign_in(self: &Arc<Self>, identity: &str, secret: &str) -> Result<()> {
        self.reset();
        self.provider.sign_in(identity, secret).await?;
        let outcome = self.finalizer.finalize(FinalizeTrigger::Probe).await;
        self.commit(outcome, "password sign-in");
        Ok(())
    }

    /// Start a federated OAuth attempt: fresh nonce, authorize URL, external
    /// view. The redirect (or its absence) resolves the attempt later.
    pub async fn start_federated_sign_in(
        self: &Arc<Self>,
        provider: FederatedProvider,
        identity_hint: Option<String>,
    ) -> Result<()> {
        self.reset();
        let nonce = self.correlator.start_attempt(identity_hint);
        let url = self
            .provider
            .federated_authorize_url(provider, &nonce)
            .map_err(AuthError::from)?;
        info!(provider = provider.as_str(), "opening external authorization view");
        self.opener
            .open(&url)
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        Ok(())
    }

    /// Create an account and hand the verification challenge forward.
    pub async fn sign_up(
        &self,
        identity: &str,
        secret: &str,
        attributes: SignUpAttributes,
    ) -> Result<OtpChallenge> {
        self.provider.sign_up(identity, secret, &attributes).await?;
        Ok(OtpChallenge::new(OtpMode::SignupVerify, identity))
    }

    /// Request a reset code and hand the reset challenge forward.
    pub async fn request_password_reset(&self, identity: &str) -> Result<OtpChallenge> {
        self.provider.request_password_reset(identity).await?;
        Ok(OtpChallenge::new(OtpMode::PasswordReset, identity))
    }

    /// Complete a password reset with the forwarded `{identity, code}` from
    /// a succeeded reset challenge plus the new secret.
    pub async fn confirm_password_reset(
        &self,
        identity: &str,
        code: &str,
        new_secret: &str,
    ) -> Result<()> {
        if identity.is_empty() || code.is_empty() {
            return Err(AuthError::ContextLost);
        }
        self.provider
            .confirm_password_reset(identity, code, new_secret)
            .await?;
        Ok(())
    }

    /// End the session and resolve the cycle as unauthenticated.
    pub async fn sign_out(self: &Arc<Self>) -> Result<()> {
        self.reset();
        if let Err(err) = self.provider.sign_out().await {
            // Local sign-out still proceeds; the server-side session will
            // age out on its own.
            warn!(error = %err, "provider sign-out failed");
        }
        self.commit(Outcome::Unauthenticated, "sign-out");
        Ok(())
    }

    async fn consume_correlation_events(
        self: Arc<Self>,
        mut events_rx: tokio::sync::mpsc::Receiver<CorrelationEvent>,
    ) {
        while let Some(event) = events_rx.recv().await {
            match event {
                CorrelationEvent::Matched(matched) => {
                    debug!(
                        nonce = %matched.nonce,
                        identity_hint = matched.identity_hint.as_deref().unwrap_or("<none>"),
                        "finalizing matched redirect"
                    );
                    if let Err(err) = self
                        .provider
                        .complete_federated_sign_in(&matched.code)
                        .await
                    {
                        // Not fatal: the session fetch below may still observe
                        // a token the provider exchanged on its own.
                        warn!(error = %err, "authorization code exchange failed");
                    }
                    let outcome = self
                        .finalizer
                        .finalize(FinalizeTrigger::RedirectMatch)
                        .await;
                    self.commit(outcome, "redirect match");
                    self.correlator.mark_consumed(&matched.nonce);
                }
                CorrelationEvent::Expired { nonce } => {
                    // No redirect will resolve this attempt (dismissed view,
                    // abandoned browser tab). The ordinary probe decides.
                    info!(%nonce, "attempt expired, resolving via session probe");
                    let outcome = self.finalizer.finalize(FinalizeTrigger::Probe).await;
                    self.commit(outcome, "attempt expiry");
                }
            }
        }
    }

    /// First writer wins. Returns whether this call committed.
    fn commit(&self, outcome: Outcome, origin: &str) -> bool {
        let next = match outcome {
            Outcome::Authenticated(identity) => AuthOutcome::Authenticated(identity),
            Outcome::Unauthenticated => AuthOutcome::Unauthenticated,
        };
        let committed = self.outcome_tx.send_if_modified(|current| {
            if current.is_terminal() {
                return false;
            }
            *current = next.clone();
            true
        });
        if committed {
            info!(origin, outcome = ?self.current_outcome(), "launch cycle resolved");
        } else {
            debug!(origin, "late result discarded, outcome already committed");
        }
        committed
    }

    /// A new explicit intent restarts the cycle from `Checking`.
    fn reset(&self) {
        self.outcome_tx.send_replace(AuthOutcome::Checking);
    }
}
