// prose-core-client/prose-push-xmpp
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use jid::Jid;
use minidom::Element;
use tracing::debug;
use xmpp_parsers::iq::{Iq, IqType};

use crate::client::ModuleContext;
use crate::mods::Module;
use crate::stanza::{Disable, Enable, PushCommand};
use crate::util::{PinnedFuture, RequestError};

/// XEP-0357: Push Notifications
/// https://xmpp.org/extensions/xep-0357.html
#[derive(Default, Clone)]
pub struct Push {
    ctx: ModuleContext,
}

/// A push command that has been handed to the connection.
pub struct PushRequest {
    /// The `id` of the IQ. Only a response carrying this id resolves `response`.
    pub id: String,
    pub response: PinnedFuture<Result<(), RequestError>>,
}

impl Module for Push {
    fn register_with(&mut self, context: ModuleContext) {
        self.ctx = context
    }
}

impl Push {
    pub async fn enable(&self, to: Option<Jid>, enable: Enable) -> Result<(), RequestError> {
        self.send_command(to, enable.into()).response.await
    }

    pub async fn disable(&self, to: Option<Jid>, disable: Disable) -> Result<(), RequestError> {
        self.send_command(to, disable.into()).response.await
    }

    /// Sends `command` right away. `to` is only needed when the registration targets
    /// something other than the account's own server (a MUC service for example).
    pub fn send_command(&self, to: Option<Jid>, command: PushCommand) -> PushRequest {
        let id = self.ctx.generate_id();
        let kind = command.kind();

        let iq = Iq {
            from: None,
            to,
            id: id.clone(),
            payload: IqType::Set(Element::from(command)),
        };

        debug!("Sending push {} request {}.", kind, id);
        let response = self.ctx.send_iq(iq);

        PushRequest {
            id,
            response: Box::pin(async move { response.await.map(|_| ()) }),
        }
    }
}
