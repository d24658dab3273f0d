//! Authflow: client-side authentication session engine.
//!
//! Reconciles three independent event sources (app launch, OAuth redirect
//! delivery, and network-confirmed session state) into a single
//! authenticated or unauthenticated outcome, and coordinates the
//! one-time-code challenge shared by sign-up verification and password
//! reset.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use authflow::config::AuthConfig;
//! use authflow::controller::AuthSessionController;
//! use authflow::provider::cognito::CognitoClient;
//!
//! # async fn example(links: Arc<dyn authflow::deeplink::DeepLinkSource>,
//! #                  opener: Arc<dyn authflow::deeplink::UrlOpener>)
//! #     -> authflow::error::Result<()> {
//! let config = AuthConfig::from_env()?;
//! let provider = Arc::new(CognitoClient::new(&config)?);
//! let controller = AuthSessionController::new(provider, links, opener);
//! controller.start();
//!
//! let mut outcomes = controller.subscribe_outcome();
//! let _ = outcomes.wait_for(|o| o.is_terminal()).await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod correlator;
pub mod deeplink;
pub mod error;
pub mod extract;
pub mod finalizer;
pub mod nav;
pub mod otp;
pub mod prelude;
pub mod provider;
