// prose-core-client/prose-push
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use jid::{BareJid, Jid};
use serde::{Deserialize, Serialize};

use prose_push_xmpp::mods::DiscoveryResult;

/// Where a push registration lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PushScope {
    /// The user's own account, registered at their server.
    Account,
    /// A group chat (MUC) service, identified by its domain.
    GroupChat { domain: String },
}

impl PushScope {
    pub fn for_room(room: &BareJid) -> Self {
        PushScope::GroupChat {
            domain: room.domain().to_string(),
        }
    }

    /// The entity whose push support needs to be confirmed before registering.
    pub fn discovery_target(&self, account: &BareJid) -> Result<Jid, jid::Error> {
        match self {
            PushScope::Account => Ok(Jid::from(account.clone())),
            PushScope::GroupChat { domain } => Jid::from_str(domain),
        }
    }

    /// The `to` of the `enable`/`disable` IQ. Requests for the account go to our own server.
    pub fn recipient(&self) -> Result<Option<Jid>, jid::Error> {
        match self {
            PushScope::Account => Ok(None),
            PushScope::GroupChat { domain } => Jid::from_str(domain).map(Some),
        }
    }

    pub(crate) fn has_registration_identity(&self, result: &DiscoveryResult) -> bool {
        match self {
            PushScope::Account => result.has_identity_category("account"),
            PushScope::GroupChat { .. } => ["account", "conference", "server"]
                .iter()
                .any(|category| result.has_identity_category(category)),
        }
    }
}

impl Display for PushScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PushScope::Account => write!(f, "account"),
            PushScope::GroupChat { domain } => write!(f, "group chat service {}", domain),
        }
    }
}
