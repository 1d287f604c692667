// prose-core-client/prose-push-xmpp
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::any::TypeId;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use anyhow::Result;
use jid::FullJid;
use minidom::Element;
use secrecy::Secret;
use tracing::error;

use crate::client::builder::ClientBuilder;
use crate::client::module_context::ModuleContextInner;
use crate::client::{Event, ModuleLookup, RequestTimeouts};
use crate::connector::{ConnectionError, ConnectionEvent};
use crate::mods::AnyModule;
use crate::util::{PinnedFuture, XMPPElement};
use crate::Event as ClientEvent;

#[derive(Clone)]
pub struct Client {
    pub(super) inner: Arc<ClientInner>,
}

impl Debug for Client {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish()
    }
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub async fn connect(
        &self,
        jid: &FullJid,
        password: impl Into<String>,
    ) -> Result<(), ConnectionError> {
        self.inner
            .clone()
            .connect(jid, Secret::new(password.into()))
            .await
    }

    /// Closes the connection. Every request still waiting for its response fails with
    /// `RequestError::Disconnected` and, if a connection was open, `Event::Disconnected` is
    /// emitted.
    pub fn disconnect(&self) {
        self.inner.disconnect()
    }

    /// The JID of the current session, `None` while disconnected.
    pub fn connected_jid(&self) -> Option<FullJid> {
        self.inner.context.jid.read().clone()
    }

    pub fn get_mod<M: AnyModule + Clone>(&self) -> M {
        self.inner.get_mod()
    }

    pub fn timeouts(&self) -> RequestTimeouts {
        self.inner.context.timeouts
    }

    /// Number of requests currently waiting for a correlated response.
    pub fn pending_request_count(&self) -> usize {
        self.inner.context.pending_request_count()
    }
}

pub(super) struct ClientInner {
    pub context: Arc<ModuleContextInner>,
    pub mods: Arc<ModuleLookup>,
}

impl ClientInner {
    async fn connect(
        self: Arc<Self>,
        jid: &FullJid,
        password: Secret<String>,
    ) -> Result<(), ConnectionError> {
        self.context.close_connection();
        self.teardown();

        *self.context.jid.write() = Some(jid.clone());

        let inner = Arc::downgrade(&self);

        let connection_result = (self.context.connector_provider)()
            .connect(
                jid,
                password,
                Box::new(move |_, event| {
                    let inner = inner.clone();

                    Box::pin(async move {
                        let Some(inner) = inner.upgrade() else {
                            return;
                        };
                        inner.handle_event(event).await
                    }) as PinnedFuture<_>
                }),
            )
            .await;

        let connection = match connection_result {
            Ok(connection) => connection,
            Err(err) => {
                self.context.jid.write().take();
                return Err(err);
            }
        };

        self.context.connection.write().replace(connection);

        for (_, m) in self.mods.iter() {
            if let Err(err) = m.read().handle_connect() {
                error!("Encountered error in module {}", err);
            }
        }

        self.context
            .schedule_event(ClientEvent::Client(Event::Connected));

        Ok(())
    }

    fn disconnect(&self) {
        let was_connected = self.context.close_connection();
        self.teardown();

        if was_connected {
            self.context
                .schedule_event(ClientEvent::Client(Event::Disconnected { error: None }))
        }
    }

    fn teardown(&self) {
        self.context.jid.write().take();
        self.context.fail_pending_futures();

        for (_, m) in self.mods.iter() {
            if let Err(err) = m.read().handle_disconnect() {
                error!("Encountered error in module {}", err);
            }
        }
    }

    fn get_mod<M: AnyModule + Clone>(&self) -> M {
        let Some(module) = self
            .mods
            .get(&TypeId::of::<M>())
            .and_then(|m| m.read().as_any().downcast_ref::<M>().cloned())
        else {
            panic!("Could not find requested module.")
        };
        module
    }

    async fn handle_event(self: Arc<Self>, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Disconnected { error } => {
                // The stream is gone already, there's nothing left to close.
                self.context.connection.write().take();
                self.teardown();
                self.context
                    .schedule_event(ClientEvent::Client(Event::Disconnected { error }))
            }
            ConnectionEvent::Stanza(stanza) => self.handle_stanza(stanza),
            ConnectionEvent::TimeoutTimer => self.context.purge_expired_futures(),
        }
    }

    fn handle_stanza(&self, stanza: Element) {
        let elem = match XMPPElement::try_from_element(stanza) {
            Ok(None) => return,
            Ok(Some(elem)) => elem,
            Err(err) => {
                error!("Failed to parse stanza. {}", err);
                return;
            }
        };

        self.context.resolve_pending_futures(&elem);

        for (_, m) in self.mods.iter() {
            if let Err(err) = m.read().handle_element(&elem) {
                error!("Encountered error in module {}", err);
            }
        }
    }
}

impl TryFrom<Arc<ModuleContextInner>> for Client {
    type Error = anyhow::Error;

    fn try_from(value: Arc<ModuleContextInner>) -> std::result::Result<Self, Self::Error> {
        let mods = value.mods.upgrade().ok_or(anyhow::format_err!(
            "Used module after client was released."
        ))?;

        Ok(Client {
            inner: Arc::new(ClientInner {
                context: value,
                mods,
            }),
        })
    }
}
