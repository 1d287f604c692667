// prose-core-client/prose-push
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use jid::{BareJid, FullJid, Jid};
use parking_lot::Mutex;
use tracing::{debug, info};

use prose_push_xmpp::mods::{Disco, Push};
use prose_push_xmpp::stanza::{Disable, Enable, PushCommand};
use prose_push_xmpp::{ns, Client, RequestError, SystemTimeProvider, TimeProvider};

use crate::{
    AppServerConfig, NegotiationError, PushRequestKind, PushScope, PushSessionStateRepository,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationOutcome {
    Enabled,
    Disabled,
    /// Either party lacks push support. Nothing was sent.
    Unsupported { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingPhase {
    Discovering,
    AwaitingResponse { id: String },
}

/// A negotiation that has started but not finished yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub kind: PushRequestKind,
    pub scope: PushScope,
    pub app_server: Jid,
    pub node: String,
    pub phase: PendingPhase,
    pub created_at: DateTime<Utc>,
}

type PendingKey = (PushRequestKind, PushScope, String, String);
type PendingTable = Arc<Mutex<BTreeMap<PendingKey, PendingRequest>>>;

/// Negotiates push registrations with the user's server.
///
/// Enabling first confirms via service discovery that the app server is a push service and
/// that the registration target (the account or a group chat service) supports XEP-0357.
/// Disabling skips discovery. The session state is only touched once the server
/// acknowledged a request.
#[derive(Clone)]
pub struct PushNegotiator {
    client: Client,
    state: Arc<dyn PushSessionStateRepository>,
    time_provider: Arc<dyn TimeProvider>,
    pending: PendingTable,
}

impl PushNegotiator {
    pub fn new(client: Client, state: Arc<dyn PushSessionStateRepository>) -> Self {
        PushNegotiator {
            client,
            state,
            time_provider: Arc::new(SystemTimeProvider::new()),
            pending: Default::default(),
        }
    }

    pub fn set_time_provider<T: TimeProvider + 'static>(mut self, time_provider: T) -> Self {
        self.time_provider = Arc::new(time_provider);
        self
    }

    pub fn state(&self) -> &Arc<dyn PushSessionStateRepository> {
        &self.state
    }

    pub fn pending_requests(&self) -> Vec<PendingRequest> {
        self.pending.lock().values().cloned().collect()
    }

    /// Runs `negotiate` for all `app_servers` concurrently. Results are in the order of
    /// `app_servers`.
    pub async fn negotiate_all(
        &self,
        app_servers: &[AppServerConfig],
        scope: &PushScope,
    ) -> Vec<Result<NegotiationOutcome, NegotiationError>> {
        join_all(
            app_servers
                .iter()
                .map(|app_server| self.negotiate(app_server, scope)),
        )
        .await
    }

    pub async fn negotiate(
        &self,
        app_server: &AppServerConfig,
        scope: &PushScope,
    ) -> Result<NegotiationOutcome, NegotiationError> {
        let Some(account) = self.client.connected_jid().map(FullJid::into_bare) else {
            return Err(NegotiationError::NotConnected);
        };

        let kind = if app_server.disable {
            PushRequestKind::Disable
        } else {
            PushRequestKind::Enable
        };

        let pending = self.reserve(kind, scope, app_server)?;
        let generation = self.state.generation();

        if kind == PushRequestKind::Enable {
            if let Some(reason) = self.unsupported_reason(app_server, scope, &account).await? {
                debug!(
                    "Not enabling push notifications for {} via {}. {}",
                    scope, app_server.jid, reason
                );
                return Ok(NegotiationOutcome::Unsupported { reason });
            }
        }

        let command = match kind {
            PushRequestKind::Enable => {
                let mut enable = Enable::new(app_server.jid.clone(), app_server.node.clone());
                if let Some(secret) = app_server.exposed_secret() {
                    enable = enable.with_secret(secret);
                }
                PushCommand::from(enable)
            }
            PushRequestKind::Disable => PushCommand::from(Disable::new(
                app_server.jid.clone(),
                Some(app_server.node.clone()),
            )),
        };

        let request = self
            .client
            .get_mod::<Push>()
            .send_command(scope.recipient()?, command);
        pending.set_phase(PendingPhase::AwaitingResponse {
            id: request.id.clone(),
        });

        request.response.await?;

        let applied = match kind {
            PushRequestKind::Enable => self.state.set_enabled_in(generation, scope),
            PushRequestKind::Disable => self.state.set_disabled_in(generation, scope),
        };
        if !applied {
            debug!(
                "Session ended while negotiating push notifications for {} via {}.",
                scope, app_server.jid
            );
            return Err(NegotiationError::Cancelled);
        }

        match kind {
            PushRequestKind::Enable => {
                info!(
                    "Enabled push notifications for {} via {}.",
                    scope, app_server.jid
                );
                Ok(NegotiationOutcome::Enabled)
            }
            PushRequestKind::Disable => {
                info!(
                    "Disabled push notifications for {} via {}.",
                    scope, app_server.jid
                );
                Ok(NegotiationOutcome::Disabled)
            }
        }
    }
}

impl PushNegotiator {
    fn reserve(
        &self,
        kind: PushRequestKind,
        scope: &PushScope,
        app_server: &AppServerConfig,
    ) -> Result<PendingGuard, NegotiationError> {
        let key = (
            kind,
            scope.clone(),
            app_server.jid.to_string(),
            app_server.node.clone(),
        );

        match self.pending.lock().entry(key.clone()) {
            Entry::Occupied(_) => {
                return Err(NegotiationError::AlreadyPending {
                    kind,
                    scope: scope.clone(),
                })
            }
            Entry::Vacant(entry) => {
                entry.insert(PendingRequest {
                    kind,
                    scope: scope.clone(),
                    app_server: app_server.jid.clone(),
                    node: app_server.node.clone(),
                    phase: PendingPhase::Discovering,
                    created_at: self.time_provider.now(),
                });
            }
        }

        Ok(PendingGuard {
            table: self.pending.clone(),
            key,
        })
    }

    /// Returns `None` if both the app server and the registration target support push.
    async fn unsupported_reason(
        &self,
        app_server: &AppServerConfig,
        scope: &PushScope,
        account: &BareJid,
    ) -> Result<Option<String>, NegotiationError> {
        let disco = self.client.get_mod::<Disco>();
        let target = scope.discovery_target(account)?;

        let (app_server_support, target_support) = futures::join!(
            disco.discover_support(app_server.jid.clone()),
            disco.discover_support(target.clone())
        );

        let app_server_support = match app_server_support {
            Ok(support) => support,
            Err(err) => return discovery_failure(&app_server.jid, err).map(Some),
        };
        let target_support = match target_support {
            Ok(support) => support,
            Err(err) => return discovery_failure(&target, err).map(Some),
        };

        if !app_server_support.has_identity("pubsub", "push")
            || !app_server_support.has_feature(ns::PUSH)
        {
            return Ok(Some(format!("{} is not a push app server.", app_server.jid)));
        }

        if !target_support.has_feature(ns::PUSH) || !scope.has_registration_identity(&target_support)
        {
            return Ok(Some(format!(
                "{} does not support push notifications.",
                target
            )));
        }

        Ok(None)
    }
}

/// Error responses and timeouts during discovery mean "unsupported". Losing the connection
/// does not.
fn discovery_failure(target: &Jid, err: RequestError) -> Result<String, NegotiationError> {
    match err {
        RequestError::Transport { .. } | RequestError::Disconnected => Err(err.into()),
        RequestError::TimedOut => {
            info!("Service discovery on {} timed out.", target);
            Ok(format!("{} did not answer the discovery request.", target))
        }
        err => Ok(format!("Service discovery on {} failed. {}", target, err)),
    }
}

/// Removes the pending request once the negotiation finishes or is dropped.
struct PendingGuard {
    table: PendingTable,
    key: PendingKey,
}

impl PendingGuard {
    fn set_phase(&self, phase: PendingPhase) {
        if let Some(request) = self.table.lock().get_mut(&self.key) {
            request.phase = phase
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.table.lock().remove(&self.key);
    }
}
