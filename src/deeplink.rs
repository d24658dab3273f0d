//! Platform collaborator boundaries: deep-link delivery and the external
//! authorization view.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// Where a redirect URL came from.
///
/// A single physical redirect can surface through both sources (a cold
/// start delivers the launch URL *and* a live event); the correlator
/// collapses them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSource {
    InitialLaunch,
    LiveDeepLink,
}

/// A URL delivered by the platform. Immutable once created.
#[derive(Debug, Clone)]
pub struct AuthorizationEvent {
    pub raw_url: String,
    pub received_at: DateTime<Utc>,
    pub source: LinkSource,
}

impl AuthorizationEvent {
    pub fn new(raw_url: impl Into<String>, source: LinkSource) -> Self {
        Self {
            raw_url: raw_url.into(),
            received_at: Utc::now(),
            source,
        }
    }
}

/// Source of redirect URLs: the launch URL plus a live event stream.
#[async_trait]
pub trait DeepLinkSource: Send + Sync {
    /// The URL the app was launched with, if any.
    async fn initial_url(&self) -> Option<String>;

    /// Subscribe to URLs delivered while the app is running.
    fn subscribe(&self) -> mpsc::Receiver<AuthorizationEvent>;
}

/// Opens the external authorization view (system browser or auth session).
///
/// Dismissal without a redirect is a legitimate outcome, not a defect: the
/// pending correlation attempt simply expires.
#[async_trait]
pub trait UrlOpener: Send + Sync {
    async fn open(&self, url: &str) -> std::io::Result<()>;
}
