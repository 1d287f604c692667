// prose-core-client/prose-push-xmpp
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::any::TypeId;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use jid::FullJid;
use parking_lot::RwLock;
use secrecy::Secret;

use crate::client::client::ClientInner;
use crate::client::module_context::ModuleContextInner;
use crate::client::{
    ConnectorProvider, EventHandler, ModuleContext, ModuleLookup, RequestTimeouts,
};
use crate::connector::{Connection, ConnectionError, ConnectionEventHandler, Connector};
use crate::deps::{IDProvider, SystemTimeProvider, TimeProvider, UUIDProvider};
use crate::mods::AnyModule;
use crate::util::{PinnedFuture, SendUnlessWasm, SyncUnlessWasm};
use crate::{Client, Event};

pub(crate) struct UndefinedConnector {}

pub struct ClientBuilder {
    connector_provider: ConnectorProvider,
    mods: ModuleLookup,
    id_provider: Box<dyn IDProvider>,
    time_provider: Box<dyn TimeProvider>,
    event_handler: EventHandler,
    timeouts: RequestTimeouts,
}

impl ClientBuilder {
    pub(super) fn new() -> Self {
        ClientBuilder {
            connector_provider: Box::new(|| Box::new(UndefinedConnector {})),
            mods: Default::default(),
            id_provider: Box::new(UUIDProvider::new()),
            time_provider: Box::new(SystemTimeProvider::new()),
            event_handler: Box::new(|_, _| Box::pin(async {}) as PinnedFuture<_>),
            timeouts: Default::default(),
        }
    }

    pub fn set_connector_provider(mut self, connector_provider: ConnectorProvider) -> Self {
        self.connector_provider = connector_provider;
        self
    }

    pub fn set_event_handler<T>(
        mut self,
        handler: impl Fn(Client, Event) -> T + SendUnlessWasm + SyncUnlessWasm + 'static,
    ) -> Self
    where
        T: Future<Output = ()> + SendUnlessWasm + 'static,
    {
        self.event_handler = Box::new(move |client, event| {
            let fut = handler(client, event);
            Box::pin(async move { fut.await }) as PinnedFuture<_>
        });
        self
    }

    pub fn add_mod<M: AnyModule + Clone + 'static>(mut self, m: M) -> Self {
        self.mods
            .insert(TypeId::of::<M>(), RwLock::new(Box::new(m)));
        self
    }

    pub fn set_id_provider<P: IDProvider + 'static>(mut self, id_provider: P) -> Self {
        self.id_provider = Box::new(id_provider);
        self
    }

    pub fn set_time_provider<T: TimeProvider + 'static>(mut self, time_provider: T) -> Self {
        self.time_provider = Box::new(time_provider);
        self
    }

    pub fn set_disco_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.disco = timeout;
        self
    }

    pub fn set_request_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.request = timeout;
        self
    }

    pub fn build(self) -> Client {
        let mods = Arc::new(self.mods);

        let context_inner = Arc::new(ModuleContextInner {
            connector_provider: self.connector_provider,
            jid: RwLock::new(None),
            connection: Default::default(),
            mods: Arc::downgrade(&mods),
            mod_futures: Default::default(),
            id_provider: self.id_provider,
            time_provider: self.time_provider,
            event_handler: self.event_handler,
            timeouts: self.timeouts,
        });

        for m in mods.values() {
            m.write().register_with(ModuleContext {
                inner: context_inner.clone(),
            });
        }

        Client {
            inner: Arc::new(ClientInner {
                mods,
                context: context_inner,
            }),
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(? Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Connector for UndefinedConnector {
    async fn connect(
        &self,
        _jid: &FullJid,
        _password: Secret<String>,
        _event_handler: ConnectionEventHandler,
    ) -> Result<Box<dyn Connection>, ConnectionError> {
        Err(ConnectionError::Generic {
            msg: "Client doesn't have a connector. Provide one before calling connect()."
                .to_string(),
        })
    }
}
