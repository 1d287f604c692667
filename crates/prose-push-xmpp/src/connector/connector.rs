// prose-core-client/prose-push-xmpp
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use anyhow::Result;
use async_trait::async_trait;
use jid::FullJid;
use minidom::Element;
use secrecy::Secret;

use crate::util::{PinnedFuture, SendUnlessWasm, SyncUnlessWasm};

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConnectionError {
    #[error("Timed out")]
    TimedOut,
    #[error("{msg:?}")]
    Generic { msg: String },
}

#[cfg(target_arch = "wasm32")]
pub type ConnectionEventHandler = Box<dyn Fn(&dyn Connection, ConnectionEvent) -> PinnedFuture<()>>;
#[cfg(not(target_arch = "wasm32"))]
pub type ConnectionEventHandler =
    Box<dyn Fn(&dyn Connection, ConnectionEvent) -> PinnedFuture<()> + Send + Sync>;

/// Establishes the stream. Stream setup, reconnects and keep-alives are the connector's
/// business, the client only consumes `ConnectionEvent`s.
#[cfg_attr(target_arch = "wasm32", async_trait(? Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait Connector: SendUnlessWasm + SyncUnlessWasm {
    async fn connect(
        &self,
        jid: &FullJid,
        password: Secret<String>,
        event_handler: ConnectionEventHandler,
    ) -> Result<Box<dyn Connection>, ConnectionError>;
}

#[derive(Debug)]
pub enum ConnectionEvent {
    Disconnected { error: Option<ConnectionError> },
    Stanza(Element),
    /// Emitted periodically by the connection. Pending requests past their deadline are
    /// failed when this fires.
    TimeoutTimer,
}

pub trait Connection: SendUnlessWasm + SyncUnlessWasm {
    fn send_stanza(&self, stanza: Element) -> Result<()>;
    fn disconnect(&self);
}
