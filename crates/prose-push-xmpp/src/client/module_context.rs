// prose-core-client/prose-push-xmpp
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::future::Future;
use std::sync::{Arc, Weak};
use std::task::Waker;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use jid::FullJid;
use minidom::Element;
use parking_lot::{Mutex, RwLock};
use tracing::error;
use xmpp_parsers::iq::Iq;

use crate::client::builder::UndefinedConnector;
use crate::client::{ConnectorProvider, EventHandler, ModuleLookup, RequestTimeouts};
use crate::connector::Connection;
use crate::deps::{IDProvider, SystemTimeProvider, TimeProvider, UUIDProvider};
use crate::util::{
    spawn, ModuleFuturePoll, ModuleFutureState, PinnedFuture, RequestError, RequestFuture,
    XMPPElement,
};
use crate::{Client, Event};

#[derive(Clone)]
pub struct ModuleContext {
    pub(super) inner: Arc<ModuleContextInner>,
}

impl ModuleContext {
    pub(crate) fn send_iq(
        &self,
        iq: Iq,
    ) -> impl Future<Output = Result<Option<Element>, RequestError>> {
        self.send_iq_with_timeout(iq, self.inner.timeouts.request)
    }

    pub(crate) fn send_iq_with_timeout(
        &self,
        iq: Iq,
        timeout: Duration,
    ) -> impl Future<Output = Result<Option<Element>, RequestError>> {
        let future = RequestFuture::new_iq_request(&iq.id);
        self.send_iq_with_future(iq, future, timeout)
    }

    pub(crate) fn send_iq_with_future<T: Send + 'static, U: 'static>(
        &self,
        iq: Iq,
        future: RequestFuture<T, U>,
        timeout: Duration,
    ) -> impl Future<Output = Result<U, RequestError>> {
        // The listener must be in place before the stanza leaves, the response might
        // arrive before `send_stanza` returns.
        let state: Arc<Mutex<dyn ModuleFutureState>> = future.state.clone();
        self.inner.mod_futures.lock().push(ModFutureStateEntry {
            state: Arc::downgrade(&state),
            timestamp: self.inner.time_provider.now(),
            timeout,
        });

        if let Err(err) = self.send_stanza(iq) {
            return RequestFuture::failed(RequestError::Transport {
                msg: err.to_string(),
            });
        }

        future
    }

    pub(crate) fn send_stanza(&self, stanza: impl Into<Element>) -> Result<()> {
        self.inner.send_stanza(stanza)
    }

    pub(crate) fn generate_id(&self) -> String {
        self.inner.id_provider.new_id()
    }

    pub(crate) fn timeouts(&self) -> RequestTimeouts {
        self.inner.timeouts
    }
}

pub(super) struct ModuleContextInner {
    pub jid: RwLock<Option<FullJid>>,
    pub connector_provider: ConnectorProvider,
    pub connection: RwLock<Option<Box<dyn Connection>>>,
    pub event_handler: EventHandler,
    pub mods: Weak<ModuleLookup>,
    pub mod_futures: Mutex<Vec<ModFutureStateEntry>>,
    pub id_provider: Box<dyn IDProvider>,
    pub time_provider: Box<dyn TimeProvider>,
    pub timeouts: RequestTimeouts,
}

pub(super) struct ModFutureStateEntry {
    /// Weak so that a dropped request future deregisters itself.
    pub state: Weak<Mutex<dyn ModuleFutureState>>,
    pub timestamp: DateTime<Utc>,
    pub timeout: Duration,
}

impl ModuleContextInner {
    pub fn send_stanza(&self, stanza: impl Into<Element>) -> Result<()> {
        let connection = self.connection.read();
        let Some(conn) = connection.as_ref() else {
            anyhow::bail!("Cannot send stanza. The client is not connected.")
        };
        conn.send_stanza(stanza.into())
    }

    /// Returns `true` if there was an open connection to close.
    pub fn close_connection(&self) -> bool {
        let connection = self.connection.write().take();
        let Some(connection) = connection else {
            return false;
        };
        connection.disconnect();
        true
    }

    pub fn pending_request_count(&self) -> usize {
        self.mod_futures
            .lock()
            .iter()
            .filter(|entry| entry.state.strong_count() > 0)
            .count()
    }

    pub fn resolve_pending_futures(&self, element: &XMPPElement) {
        let mut wakers = Vec::<Waker>::new();

        self.mod_futures.lock().retain(|entry| {
            let Some(state) = entry.state.upgrade() else {
                return false;
            };
            let poll = state.lock().handle_element(element);

            match poll {
                ModuleFuturePoll::Pending => true,
                ModuleFuturePoll::Ready(waker) => {
                    wakers.extend(waker);
                    false
                }
            }
        });

        for waker in wakers {
            waker.wake()
        }
    }

    pub fn purge_expired_futures(&self) {
        let now = self.time_provider.now();
        let mut wakers = Vec::<Waker>::new();

        self.mod_futures.lock().retain(|entry| {
            let Some(state) = entry.state.upgrade() else {
                return false;
            };

            let elapsed = (now - entry.timestamp).to_std().unwrap_or_default();
            if elapsed < entry.timeout {
                return true;
            }

            wakers.extend(state.lock().fail_with_timeout());
            false
        });

        for waker in wakers {
            waker.wake()
        }
    }

    pub fn fail_pending_futures(&self) {
        let entries = std::mem::take(&mut *self.mod_futures.lock());

        let wakers = entries
            .into_iter()
            .filter_map(|entry| entry.state.upgrade())
            .filter_map(|state| {
                let waker = state.lock().fail_with_disconnect();
                waker
            })
            .collect::<Vec<_>>();

        for waker in wakers {
            waker.wake()
        }
    }

    pub fn schedule_event(self: &Arc<Self>, event: Event) {
        let client = match Client::try_from(self.clone()) {
            Ok(client) => client,
            Err(err) => {
                error!("Dropping event {:?}. {}", event, err);
                return;
            }
        };
        spawn((self.event_handler)(client, event));
    }
}

impl Default for ModuleContext {
    fn default() -> Self {
        ModuleContext {
            inner: Arc::new(ModuleContextInner {
                connector_provider: Box::new(|| Box::new(UndefinedConnector {})),
                jid: RwLock::new(None),
                connection: Default::default(),
                event_handler: Box::new(|_, _| Box::pin(async {}) as PinnedFuture<_>),
                mods: Default::default(),
                mod_futures: Default::default(),
                id_provider: Box::new(UUIDProvider::new()),
                time_provider: Box::new(SystemTimeProvider::new()),
                timeouts: Default::default(),
            }),
        }
    }
}
