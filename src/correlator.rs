//! Redirect correlation: bridges unreliable, possibly-duplicated URL
//! delivery into a single qualifying `(code, state)` pair per attempt.
//!
//! Initial-launch URLs and live deep-link events funnel through the same
//! path, so both share one de-duplication rule. Only the first qualifying
//! event per nonce is consumed; everything else is noise and is ignored.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::deeplink::{AuthorizationEvent, DeepLinkSource};
use crate::extract::extract_auth_params;

/// How long an attempt may stay pending before it expires unmatched.
pub const DEFAULT_PENDING_TIMEOUT: Duration = Duration::from_secs(120);

/// Lifecycle of one OAuth attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrelationStatus {
    /// Waiting for a redirect carrying this attempt's nonce.
    Pending,
    /// A qualifying redirect arrived; finalization is in flight.
    Matched,
    /// Timed out unmatched, or superseded by a newer attempt.
    Expired,
    /// Finalization reached a terminal outcome.
    Consumed,
}

#[derive(Debug, Clone)]
struct CorrelationState {
    nonce: String,
    identity_hint: Option<String>,
    started_at: DateTime<Utc>,
    status: CorrelationStatus,
}

/// A redirect that matched the pending attempt, ready to finalize.
#[derive(Debug, Clone)]
pub struct MatchedRedirect {
    pub nonce: String,
    pub code: String,
    pub identity_hint: Option<String>,
}

/// Resolution of a pending attempt, emitted on the correlation channel.
#[derive(Debug, Clone)]
pub enum CorrelationEvent {
    /// A qualifying redirect arrived.
    Matched(MatchedRedirect),
    /// The attempt timed out unmatched; no redirect will resolve it. The
    /// cycle falls back to the ordinary session probe.
    Expired { nonce: String },
}

/// Configuration for [`RedirectCorrelator`].
#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    pub pending_timeout: Duration,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            pending_timeout: DEFAULT_PENDING_TIMEOUT,
        }
    }
}

/// Correlates redirect deliveries with the OAuth attempt that started them.
///
/// At most one attempt is pending at a time; starting a new one expires any
/// prior pending attempt. Matched redirects are emitted on the channel
/// returned by [`RedirectCorrelator::new`], exactly once per nonce.
pub struct RedirectCorrelator {
    config: CorrelatorConfig,
    state: Mutex<Option<CorrelationState>>,
    events_tx: mpsc::Sender<CorrelationEvent>,
}

impl RedirectCorrelator {
    pub fn new(config: CorrelatorConfig) -> (Arc<Self>, mpsc::Receiver<CorrelationEvent>) {
        let (events_tx, events_rx) = mpsc::channel(4);
        let correlator = Arc::new(Self {
            config,
            state: Mutex::new(None),
            events_tx,
        });
        (correlator, events_rx)
    }

    /// Begin a new OAuth attempt, invalidating any previous pending one.
    ///
    /// Returns the fresh correlation nonce to embed as the OAuth `state`.
    /// A timer expires the attempt if no qualifying redirect arrives within
    /// the configured timeout.
    pub fn start_attempt(self: &Arc<Self>, identity_hint: Option<String>) -> String {
        let nonce = generate_nonce();
        {
            let mut guard = self.state.lock().expect("correlator lock poisoned");
            if let Some(prev) = guard.as_ref() {
                if prev.status == CorrelationStatus::Pending {
                    info!(nonce = %prev.nonce, "expiring superseded attempt");
                }
            }
            *guard = Some(CorrelationState {
                nonce: nonce.clone(),
                identity_hint,
                started_at: Utc::now(),
                status: CorrelationStatus::Pending,
            });
        }

        let this = Arc::clone(self);
        let timer_nonce = nonce.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.config.pending_timeout).await;
            this.expire_if_pending(&timer_nonce);
        });

        nonce
    }

    /// Feed a delivered URL through extraction and correlation.
    pub fn on_url_received(&self, event: &AuthorizationEvent) {
        let params = extract_auth_params(&event.raw_url);
        let Some(code) = params.code else {
            debug!(source = ?event.source, "url without authorization code, ignoring");
            return;
        };

        let matched = {
            let mut guard = self.state.lock().expect("correlator lock poisoned");
            let Some(state) = guard.as_mut() else {
                // Stray redirect, e.g. a reopened app with a stale link.
                // Finalizing outside an initiated flow is never worth it.
                debug!(source = ?event.source, "no pending attempt, ignoring redirect");
                return;
            };
            match state.status {
                CorrelationStatus::Pending => {}
                CorrelationStatus::Matched | CorrelationStatus::Consumed => {
                    debug!(nonce = %state.nonce, "duplicate redirect for handled nonce, ignoring");
                    return;
                }
                CorrelationStatus::Expired => {
                    debug!(nonce = %state.nonce, "redirect after expiry, ignoring");
                    return;
                }
            }
            if params.state.as_deref() != Some(state.nonce.as_str()) {
                // Potential CSRF or stale link. Never fatal, never shown.
                warn!(
                    expected = %state.nonce,
                    received = params.state.as_deref().unwrap_or("<none>"),
                    "correlation mismatch on redirect"
                );
                return;
            }
            state.status = CorrelationStatus::Matched;
            MatchedRedirect {
                nonce: state.nonce.clone(),
                code,
                identity_hint: state.identity_hint.clone(),
            }
        };

        info!(nonce = %matched.nonce, "redirect matched pending attempt");
        if self
            .events_tx
            .try_send(CorrelationEvent::Matched(matched))
            .is_err()
        {
            warn!("correlation channel full or closed, dropping match");
        }
    }

    /// Mark the attempt consumed once finalization reached a terminal
    /// outcome. Later events for this nonce stay ignored.
    pub fn mark_consumed(&self, nonce: &str) {
        let mut guard = self.state.lock().expect("correlator lock poisoned");
        if let Some(state) = guard.as_mut() {
            if state.nonce == nonce {
                state.status = CorrelationStatus::Consumed;
            }
        }
    }

    /// Current status of the attempt identified by `nonce`, if it is still
    /// the tracked one.
    pub fn status_of(&self, nonce: &str) -> Option<CorrelationStatus> {
        let guard = self.state.lock().expect("correlator lock poisoned");
        guard
            .as_ref()
            .filter(|s| s.nonce == nonce)
            .map(|s| s.status)
    }

    fn expire_if_pending(&self, nonce: &str) {
        let expired_age = {
            let mut guard = self.state.lock().expect("correlator lock poisoned");
            match guard.as_mut() {
                // A newer attempt owns the slot now; never clobber it.
                Some(state)
                    if state.nonce == nonce && state.status == CorrelationStatus::Pending =>
                {
                    state.status = CorrelationStatus::Expired;
                    Some(Utc::now() - state.started_at)
                }
                _ => None,
            }
        };
        if let Some(age) = expired_age {
            info!(%nonce, age_secs = age.num_seconds(), "pending attempt expired unmatched");
            // The attempt will never resolve via redirect; let the ordinary
            // session probe decide the cycle.
            if self
                .events_tx
                .try_send(CorrelationEvent::Expired {
                    nonce: nonce.to_string(),
                })
                .is_err()
            {
                warn!("correlation channel full or closed, dropping expiry");
            }
        }
    }

    /// Drain the launch URL and the live event stream into correlation.
    ///
    /// Runs until the deep-link source closes its channel.
    pub async fn run(self: Arc<Self>, source: Arc<dyn DeepLinkSource>) {
        let mut events = source.subscribe();
        if let Some(url) = source.initial_url().await {
            self.on_url_received(&AuthorizationEvent::new(
                url,
                crate::deeplink::LinkSource::InitialLaunch,
            ));
        }
        while let Some(event) = events.recv().await {
            self.on_url_received(&event);
        }
    }
}

/// 16 bytes of OS entropy, URL-safe base64. Unguessable by construction.
fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
