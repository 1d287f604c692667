// prose-core-client/prose-push
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::{AbortHandle, Abortable};
use jid::BareJid;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use prose_push_xmpp::Client;

use crate::{
    AppServerConfig, NegotiationError, NegotiationOutcome, PushNegotiator, PushScope,
    PushSessionState, PushSessionStateRepository, PushSettings, SessionEvent,
    SessionEventListener,
};

/// Keeps push registrations in line with the session.
///
/// Registers with all configured app servers when the session starts and, if enabled, with
/// the group chat services of joined rooms. Ending the session cancels whatever is still in
/// flight and forgets the confirmed registrations. Failures are logged, push is never
/// essential for the session.
pub struct PushNotificationService {
    negotiator: PushNegotiator,
    settings: PushSettings,
    flows: Mutex<HashMap<u64, AbortHandle>>,
    next_flow_id: AtomicU64,
}

impl PushNotificationService {
    pub fn new(
        client: Client,
        settings: PushSettings,
        state: Arc<dyn PushSessionStateRepository>,
    ) -> Self {
        Self::with_negotiator(PushNegotiator::new(client, state), settings)
    }

    pub fn with_negotiator(negotiator: PushNegotiator, settings: PushSettings) -> Self {
        PushNotificationService {
            negotiator,
            settings,
            flows: Default::default(),
            next_flow_id: AtomicU64::new(0),
        }
    }

    pub fn negotiator(&self) -> &PushNegotiator {
        &self.negotiator
    }

    pub fn settings(&self) -> &PushSettings {
        &self.settings
    }

    pub fn state(&self) -> PushSessionState {
        self.negotiator.state().get()
    }
}

impl PushNotificationService {
    async fn handle_session_started(&self) {
        self.negotiate_app_servers(PushScope::Account).await
    }

    async fn handle_room_joined(&self, room: &BareJid) {
        if !self.settings.enable_muc_push {
            return;
        }

        let scope = PushScope::for_room(room);
        if self.negotiator.state().is_enabled(&scope) {
            debug!("Push notifications for {} are enabled already.", scope);
            return;
        }

        self.negotiate_app_servers(scope).await
    }

    fn handle_session_ended(&self) {
        let flows = std::mem::take(&mut *self.flows.lock());
        if !flows.is_empty() {
            debug!("Cancelling {} push negotiation(s).", flows.len());
        }

        for handle in flows.into_values() {
            handle.abort()
        }

        self.negotiator.state().reset();
    }

    async fn negotiate_app_servers(&self, scope: PushScope) {
        let (enabling, disabling) = self.settings.partitioned_app_servers();
        if enabling.is_empty() && disabling.is_empty() {
            return;
        }

        let flow = async {
            for app_servers in [enabling, disabling] {
                let results = self.negotiator.negotiate_all(&app_servers, &scope).await;
                for (app_server, result) in app_servers.iter().zip(results) {
                    log_result(app_server, &scope, result)
                }
            }
        };

        if self.run_cancellable(flow).await.is_none() {
            debug!("Push negotiation for {} was cancelled.", scope);
        }
    }

    async fn run_cancellable<T>(&self, future: impl Future<Output = T>) -> Option<T> {
        let (handle, registration) = AbortHandle::new_pair();
        let flow_id = self.next_flow_id.fetch_add(1, Ordering::Relaxed);
        self.flows.lock().insert(flow_id, handle);

        let result = Abortable::new(future, registration).await;
        self.flows.lock().remove(&flow_id);
        result.ok()
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(? Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl SessionEventListener for PushNotificationService {
    fn name(&self) -> &'static str {
        "push"
    }

    async fn handle_event(&self, event: &SessionEvent) -> Result<()> {
        match event {
            SessionEvent::Started => self.handle_session_started().await,
            SessionEvent::RoomJoined { room } => self.handle_room_joined(room).await,
            SessionEvent::Ended => self.handle_session_ended(),
        }
        Ok(())
    }
}

fn log_result(
    app_server: &AppServerConfig,
    scope: &PushScope,
    result: Result<NegotiationOutcome, NegotiationError>,
) {
    match result {
        Ok(NegotiationOutcome::Enabled) | Ok(NegotiationOutcome::Disabled) => (),
        Ok(NegotiationOutcome::Unsupported { reason }) => debug!(
            "Push notifications for {} via {} are not supported. {}",
            scope, app_server.jid, reason
        ),
        Err(NegotiationError::TimedOut) => warn!(
            "Push negotiation for {} via {} timed out.",
            scope, app_server.jid
        ),
        Err(err @ NegotiationError::AlreadyPending { .. }) | Err(err @ NegotiationError::Cancelled) => {
            debug!("{}", err)
        }
        Err(err) => error!(
            "Failed to negotiate push notifications for {} via {}. {}",
            scope, app_server.jid, err
        ),
    }
}
