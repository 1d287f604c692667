// prose-core-client/prose-push
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use jid::BareJid;
use parking_lot::RwLock;
use tracing::error;

use prose_push_xmpp::{client, Event as XMPPEvent, SendUnlessWasm, SyncUnlessWasm};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started,
    RoomJoined { room: BareJid },
    Ended,
}

impl SessionEvent {
    pub fn from_client_event(event: &XMPPEvent) -> Option<Self> {
        match event {
            XMPPEvent::Client(client::Event::Connected) => Some(SessionEvent::Started),
            XMPPEvent::Client(client::Event::Disconnected { .. }) => Some(SessionEvent::Ended),
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(? Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait SessionEventListener: SendUnlessWasm + SyncUnlessWasm {
    fn name(&self) -> &'static str;
    async fn handle_event(&self, event: &SessionEvent) -> Result<()>;
}

/// Hands session events to every registered listener, in the order they were registered.
/// A failing listener doesn't keep the others from seeing the event.
#[derive(Default)]
pub struct SessionLifecycle {
    listeners: RwLock<Vec<Arc<dyn SessionEventListener>>>,
}

impl SessionLifecycle {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn register(&self, listener: Arc<dyn SessionEventListener>) {
        self.listeners.write().push(listener)
    }

    pub fn unregister(&self, name: &str) {
        self.listeners
            .write()
            .retain(|listener| listener.name() != name)
    }

    pub async fn dispatch(&self, event: SessionEvent) {
        let listeners = self.listeners.read().clone();

        for listener in listeners {
            if let Err(err) = listener.handle_event(&event).await {
                error!(
                    "Session listener '{}' failed to handle {:?}. {}",
                    listener.name(),
                    event,
                    err
                );
            }
        }
    }

    /// Forwards connection changes of the XMPP client as session events.
    pub async fn handle_client_event(&self, event: &XMPPEvent) {
        if let Some(event) = SessionEvent::from_client_event(event) {
            self.dispatch(event).await
        }
    }
}
