// prose-core-client/prose-push
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

//! Turns XEP-0357 push notifications on and off for a Prose session.
//!
//! The `PushNegotiator` checks that both the push app server and the registration target
//! (the account or a group chat service) support push before sending `enable`/`disable`
//! requests. Confirmed registrations are tracked in a `PushSessionStateRepository`. The
//! `PushNotificationService` ties negotiation to the session's lifecycle.

pub use config::{AppServerConfig, PushSettings};
pub use error::NegotiationError;
pub use lifecycle::{SessionEvent, SessionEventListener, SessionLifecycle};
pub use negotiator::{NegotiationOutcome, PendingPhase, PendingRequest, PushNegotiator};
pub use prose_push_xmpp::stanza::PushCommandKind as PushRequestKind;
pub use scope::PushScope;
pub use service::PushNotificationService;
pub use state::{InMemoryPushSessionStateRepository, PushSessionState, PushSessionStateRepository};

mod config;
mod error;
mod lifecycle;
mod negotiator;
mod scope;
mod service;
mod state;
