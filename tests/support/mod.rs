//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use authflow::deeplink::{AuthorizationEvent, DeepLinkSource, LinkSource, UrlOpener};
use authflow::provider::{
    FederatedProvider, Identity, IdentityProvider, ProviderError, Session, SignUpAttributes,
};

/// Scriptable provider: session validity follows `session_script` per fetch,
/// every operation counts its calls, and failures can be injected per call.
pub struct FakeProvider {
    pub session_script: Mutex<Vec<bool>>,
    pub session_delay: Mutex<Option<Duration>>,
    pub identity: Mutex<Option<Identity>>,
    pub sign_in_error: Mutex<Option<ProviderError>>,
    pub confirm_sign_up_error: Mutex<Option<ProviderError>>,
    pub fetches: AtomicU32,
    pub exchanges: AtomicU32,
    pub sign_outs: AtomicU32,
    pub reset_requests: AtomicU32,
    pub reset_confirms: AtomicU32,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self {
            session_script: Mutex::new(Vec::new()),
            session_delay: Mutex::new(None),
            identity: Mutex::new(None),
            sign_in_error: Mutex::new(None),
            confirm_sign_up_error: Mutex::new(None),
            fetches: AtomicU32::new(0),
            exchanges: AtomicU32::new(0),
            sign_outs: AtomicU32::new(0),
            reset_requests: AtomicU32::new(0),
            reset_confirms: AtomicU32::new(0),
        }
    }
}

impl FakeProvider {
    pub fn with_sessions(script: Vec<bool>) -> Arc<Self> {
        let provider = Self::default();
        *provider.session_script.lock().unwrap() = script;
        Arc::new(provider)
    }

    pub fn with_identity(self: Arc<Self>, identity: Identity) -> Arc<Self> {
        *self.identity.lock().unwrap() = Some(identity);
        self
    }

    /// Delay every `fetch_session` call, to script races.
    pub fn with_session_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        *self.session_delay.lock().unwrap() = Some(delay);
        self
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn fetch_session(&self) -> Result<Session, ProviderError> {
        // Copy out before awaiting; the guard must not live across it.
        let delay = *self.session_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let n = self.fetches.fetch_add(1, Ordering::SeqCst) as usize;
        let valid = self
            .session_script
            .lock()
            .unwrap()
            .get(n)
            .copied()
            .unwrap_or(false);
        Ok(Session {
            has_valid_token: valid,
            identity: if valid {
                self.identity.lock().unwrap().clone()
            } else {
                None
            },
        })
    }

    async fn resolve_current_identity(&self) -> Result<Identity, ProviderError> {
        self.identity
            .lock()
            .unwrap()
            .clone()
            .ok_or(ProviderError::NotAuthenticated)
    }

    async fn sign_in(&self, _identity: &str, _secret: &str) -> Result<(), ProviderError> {
        match self.sign_in_error.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn federated_authorize_url(
        &self,
        provider: FederatedProvider,
        nonce: &str,
    ) -> Result<String, ProviderError> {
        Ok(format!(
            "https://pool.example.com/oauth2/authorize?identity_provider={}&state={nonce}",
            provider.as_str()
        ))
    }

    async fn sign_up(
        &self,
        _identity: &str,
        _secret: &str,
        _attributes: &SignUpAttributes,
    ) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn confirm_sign_up(&self, _identity: &str, _code: &str) -> Result<(), ProviderError> {
        match self.confirm_sign_up_error.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn complete_federated_sign_in(&self, _code: &str) -> Result<(), ProviderError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn request_password_reset(&self, _identity: &str) -> Result<(), ProviderError> {
        self.reset_requests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn confirm_password_reset(
        &self,
        _identity: &str,
        _code: &str,
        _new_secret: &str,
    ) -> Result<(), ProviderError> {
        self.reset_confirms.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Deep-link source backed by a test-fed channel plus an optional launch URL.
pub struct FakeLinks {
    initial: Mutex<Option<String>>,
    events_rx: Mutex<Option<mpsc::Receiver<AuthorizationEvent>>>,
}

impl FakeLinks {
    /// Returns the source and a sender for pushing live deep-link events.
    pub fn new(initial: Option<&str>) -> (Arc<Self>, mpsc::Sender<AuthorizationEvent>) {
        let (tx, rx) = mpsc::channel(8);
        let links = Arc::new(Self {
            initial: Mutex::new(initial.map(str::to_string)),
            events_rx: Mutex::new(Some(rx)),
        });
        (links, tx)
    }
}

#[async_trait]
impl DeepLinkSource for FakeLinks {
    async fn initial_url(&self) -> Option<String> {
        self.initial.lock().unwrap().take()
    }

    fn subscribe(&self) -> mpsc::Receiver<AuthorizationEvent> {
        self.events_rx
            .lock()
            .unwrap()
            .take()
            .expect("subscribe called twice")
    }
}

/// Opener that records every URL instead of launching anything.
#[derive(Default)]
pub struct RecordingOpener {
    pub opened: Mutex<Vec<String>>,
}

#[async_trait]
impl UrlOpener for RecordingOpener {
    async fn open(&self, url: &str) -> std::io::Result<()> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

pub fn live_redirect(code: &str, nonce: &str) -> AuthorizationEvent {
    AuthorizationEvent::new(
        format!("myapp://?code={code}&state={nonce}"),
        LinkSource::LiveDeepLink,
    )
}
