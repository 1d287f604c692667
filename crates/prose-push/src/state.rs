// prose-core-client/prose-push
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::collections::BTreeSet;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use prose_push_xmpp::{SendUnlessWasm, SyncUnlessWasm};

use crate::PushScope;

/// Registrations the server has acknowledged during the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSessionState {
    pub account_enabled: bool,
    pub enabled_domains: BTreeSet<String>,
}

impl PushSessionState {
    pub fn is_enabled(&self, scope: &PushScope) -> bool {
        match scope {
            PushScope::Account => self.account_enabled,
            PushScope::GroupChat { domain } => self.enabled_domains.contains(domain),
        }
    }
}

pub trait PushSessionStateRepository: SendUnlessWasm + SyncUnlessWasm {
    fn get(&self) -> PushSessionState;
    fn is_enabled(&self, scope: &PushScope) -> bool;

    /// Marks `scope` as enabled. Group chat domains are added to the already confirmed ones.
    fn set_enabled(&self, scope: &PushScope);
    fn set_disabled(&self, scope: &PushScope);

    /// Forgets everything, called when the session ends. Starts a new generation.
    fn reset(&self);

    /// Identifies the session the state belongs to. Incremented by every `reset`.
    fn generation(&self) -> u64;

    /// Marks `scope` as enabled unless the state was reset after `generation` was read.
    /// Returns `false` if the update was dropped.
    fn set_enabled_in(&self, generation: u64, scope: &PushScope) -> bool;

    /// Marks `scope` as disabled unless the state was reset after `generation` was read.
    /// Returns `false` if the update was dropped.
    fn set_disabled_in(&self, generation: u64, scope: &PushScope) -> bool;
}

#[derive(Default)]
pub struct InMemoryPushSessionStateRepository {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    state: PushSessionState,
    generation: u64,
}

impl Inner {
    fn set_enabled(&mut self, scope: &PushScope) {
        match scope {
            PushScope::Account => self.state.account_enabled = true,
            PushScope::GroupChat { domain } => {
                self.state.enabled_domains.insert(domain.clone());
            }
        }
    }

    fn set_disabled(&mut self, scope: &PushScope) {
        match scope {
            PushScope::Account => self.state.account_enabled = false,
            PushScope::GroupChat { domain } => {
                self.state.enabled_domains.remove(domain);
            }
        }
    }
}

impl InMemoryPushSessionStateRepository {
    pub fn new() -> Self {
        Default::default()
    }

    /// Starts out with a previously persisted state.
    pub fn with_state(state: PushSessionState) -> Self {
        InMemoryPushSessionStateRepository {
            inner: RwLock::new(Inner {
                state,
                generation: 0,
            }),
        }
    }
}

impl PushSessionStateRepository for InMemoryPushSessionStateRepository {
    fn get(&self) -> PushSessionState {
        self.inner.read().state.clone()
    }

    fn is_enabled(&self, scope: &PushScope) -> bool {
        self.inner.read().state.is_enabled(scope)
    }

    fn set_enabled(&self, scope: &PushScope) {
        self.inner.write().set_enabled(scope)
    }

    fn set_disabled(&self, scope: &PushScope) {
        self.inner.write().set_disabled(scope)
    }

    fn reset(&self) {
        let mut inner = self.inner.write();
        inner.state = Default::default();
        inner.generation += 1;
    }

    fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    fn set_enabled_in(&self, generation: u64, scope: &PushScope) -> bool {
        let mut inner = self.inner.write();
        if inner.generation != generation {
            return false;
        }
        inner.set_enabled(scope);
        true
    }

    fn set_disabled_in(&self, generation: u64, scope: &PushScope) -> bool {
        let mut inner = self.inner.write();
        if inner.generation != generation {
            return false;
        }
        inner.set_disabled(scope);
        true
    }
}
