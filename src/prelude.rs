//! Convenience re-exports for common use.

pub use crate::config::{AuthConfig, OAuthConfig};
pub use crate::controller::{AuthOutcome, AuthSessionController};
pub use crate::correlator::{
    CorrelationEvent, CorrelatorConfig, MatchedRedirect, RedirectCorrelator,
};
pub use crate::deeplink::{AuthorizationEvent, DeepLinkSource, LinkSource, UrlOpener};
pub use crate::error::{AuthError, Result, VerificationReason};
pub use crate::finalizer::{FinalizePolicy, FinalizeTrigger, SessionFinalizer};
pub use crate::nav::{Destination, NavigationGuard};
pub use crate::otp::{OtpChallenge, OtpChallengeCoordinator, OtpCompletion, OtpMode, OtpPhase};
pub use crate::provider::{
    CognitoClient, FederatedProvider, Identity, IdentityProvider, Session, SignUpAttributes,
};
