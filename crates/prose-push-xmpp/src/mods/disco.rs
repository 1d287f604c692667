// prose-core-client/prose-push-xmpp
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::collections::BTreeSet;

use jid::Jid;
use tracing::debug;
use xmpp_parsers::disco::{DiscoInfoQuery, DiscoInfoResult};
use xmpp_parsers::iq::Iq;

use crate::client::ModuleContext;
use crate::mods::Module;
use crate::util::RequestError;

/// XEP-0030: Service Discovery
/// https://xmpp.org/extensions/xep-0030.html
#[derive(Default, Clone)]
pub struct Disco {
    ctx: ModuleContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity {
    pub category: String,
    pub type_: String,
}

/// What an entity told us it supports.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiscoveryResult {
    pub identities: BTreeSet<Identity>,
    pub features: BTreeSet<String>,
}

impl DiscoveryResult {
    pub fn has_identity(&self, category: &str, type_: &str) -> bool {
        self.identities
            .iter()
            .any(|identity| identity.category == category && identity.type_ == type_)
    }

    pub fn has_identity_category(&self, category: &str) -> bool {
        self.identities
            .iter()
            .any(|identity| identity.category == category)
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.contains(feature)
    }
}

impl From<DiscoInfoResult> for DiscoveryResult {
    fn from(value: DiscoInfoResult) -> Self {
        DiscoveryResult {
            identities: value
                .identities
                .into_iter()
                .map(|identity| Identity {
                    category: identity.category,
                    type_: identity.type_,
                })
                .collect(),
            features: value
                .features
                .into_iter()
                .map(|feature| feature.var)
                .collect(),
        }
    }
}

impl Module for Disco {
    fn register_with(&mut self, context: ModuleContext) {
        self.ctx = context
    }
}

impl Disco {
    /// Queries `target` and collects its identities and features. Error responses surface as
    /// `RequestError::XMPP`, missing responses as `RequestError::TimedOut`.
    pub async fn discover_support(
        &self,
        target: impl Into<Jid>,
    ) -> Result<DiscoveryResult, RequestError> {
        let target = target.into();
        let result = self.query_disco_info(target.clone(), None).await?;
        debug!(
            "{} reported {} identities and {} features.",
            target,
            result.identities.len(),
            result.features.len()
        );
        Ok(result.into())
    }

    pub async fn query_disco_info(
        &self,
        to: impl Into<Jid>,
        node: Option<String>,
    ) -> Result<DiscoInfoResult, RequestError> {
        let response = self
            .ctx
            .send_iq_with_timeout(
                Iq::from_get(self.ctx.generate_id(), DiscoInfoQuery { node }).with_to(to.into()),
                self.ctx.timeouts().disco,
            )
            .await?
            .ok_or(RequestError::UnexpectedResponse)?;

        Ok(DiscoInfoResult::try_from(response)?)
    }
}
