// prose-core-client/prose-push-xmpp
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::any::TypeId;
use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::RwLock;

pub use builder::ClientBuilder;
pub use client::Client;
pub(crate) use module_context::ModuleContext;

use crate::connector::{ConnectionError, Connector};
use crate::mods::AnyModule;
use crate::util::PinnedFuture;
use crate::Event as ClientEvent;

mod builder;
mod client;
mod module_context;

#[cfg(target_arch = "wasm32")]
pub type EventHandler = Box<dyn Fn(Client, ClientEvent) -> PinnedFuture<()>>;
#[cfg(not(target_arch = "wasm32"))]
pub type EventHandler = Box<dyn Fn(Client, ClientEvent) -> PinnedFuture<()> + Send + Sync>;

pub(super) type ModuleLookup = BTreeMap<TypeId, RwLock<Box<dyn AnyModule>>>;

#[cfg(target_arch = "wasm32")]
pub type ConnectorProvider = Box<dyn Fn() -> Box<dyn Connector>>;
#[cfg(not(target_arch = "wasm32"))]
pub type ConnectorProvider = Box<dyn Fn() -> Box<dyn Connector> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connected,
    Disconnected { error: Option<ConnectionError> },
}

/// Deadlines for correlated responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTimeouts {
    /// Applies to XEP-0030 service discovery queries.
    pub disco: Duration,
    /// Applies to every other IQ.
    pub request: Duration,
}

impl Default for RequestTimeouts {
    fn default() -> Self {
        Self {
            disco: Duration::from_secs(15),
            request: Duration::from_secs(20),
        }
    }
}
