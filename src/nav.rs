//! Navigation boundary: maps the controller outcome to a destination.

use tokio::sync::watch;

use crate::controller::AuthOutcome;

/// Where the presentation layer should route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Authenticated area.
    Home,
    /// Sign-in screen.
    SignIn,
}

/// Consumes the controller outcome exactly once per launch cycle.
pub struct NavigationGuard {
    outcome_rx: watch::Receiver<AuthOutcome>,
    routed: bool,
}

impl NavigationGuard {
    pub fn new(outcome_rx: watch::Receiver<AuthOutcome>) -> Self {
        Self {
            outcome_rx,
            routed: false,
        }
    }

    /// Wait for the first terminal outcome and translate it. Returns `None`
    /// on any later call for the same cycle, or if the controller went away.
    pub async fn next_destination(&mut self) -> Option<Destination> {
        if self.routed {
            return None;
        }
        let outcome = self
            .outcome_rx
            .wait_for(AuthOutcome::is_terminal)
            .await
            .ok()?
            .clone();
        self.routed = true;
        Some(match outcome {
            AuthOutcome::Authenticated(_) => Destination::Home,
            _ => Destination::SignIn,
        })
    }
}
