// prose-core-client/prose-push
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use minidom::Element;

use prose_push::{
    AppServerConfig, InMemoryPushSessionStateRepository, PushNegotiator,
    PushSessionStateRepository,
};
use prose_push_xmpp::stanza::PushCommand;
use prose_push_xmpp::test::{ClientTestAdditions, ConnectedClient};
use prose_push_xmpp::{jid, ns, Client};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PushResponse {
    #[default]
    Result,
    Error,
    Silent,
}

/// Answers disco#info queries and push commands the way a server would.
///
/// Entities whose JID starts with "push" identify as push app servers, JIDs with a node as
/// accounts and everything else as group chat services.
#[derive(Debug, Clone, Default)]
pub struct ScriptedServer {
    pub push_response: PushResponse,
    /// Entities that answer but don't advertise `urn:xmpp:push:0`.
    pub without_push: Vec<String>,
    /// Entities that answer disco queries with an error.
    pub failing_discovery: Vec<String>,
}

impl ScriptedServer {
    pub fn handler(self) -> impl FnMut(&Element) -> Vec<Element> + Send + 'static {
        move |stanza| self.respond(stanza)
    }

    fn respond(&self, stanza: &Element) -> Vec<Element> {
        let id = stanza.attr("id").unwrap_or_default();

        if is_disco_query(stanza) {
            let target = stanza.attr("to").unwrap_or("prose.org");

            if self.failing_discovery.iter().any(|jid| jid == target) {
                return vec![error_response(id, target, "service-unavailable")];
            }

            let (category, type_) = if target.starts_with("push") {
                ("pubsub", "push")
            } else if target.contains('@') {
                ("account", "registered")
            } else {
                ("conference", "text")
            };

            let push_feature = if self.without_push.iter().any(|jid| jid == target) {
                String::new()
            } else {
                format!("<feature var='{}'/>", ns::PUSH)
            };

            return vec![Element::from_str(&format!(
                "<iq xmlns='jabber:client' type='result' id='{id}' from='{target}'>\
                <query xmlns='http://jabber.org/protocol/disco#info'>\
                <identity category='{category}' type='{type_}'/>\
                <feature var='http://jabber.org/protocol/disco#info'/>\
                {push_feature}\
                </query></iq>"
            ))
            .unwrap()];
        }

        if push_command(stanza).is_some() {
            return match self.push_response {
                PushResponse::Result => vec![Element::from_str(&format!(
                    "<iq xmlns='jabber:client' type='result' id='{id}'/>"
                ))
                .unwrap()],
                PushResponse::Error => vec![error_response(id, "prose.org", "not-allowed")],
                PushResponse::Silent => vec![],
            };
        }

        vec![]
    }
}

fn error_response(id: &str, from: &str, condition: &str) -> Element {
    Element::from_str(&format!(
        "<iq xmlns='jabber:client' type='error' id='{id}' from='{from}'>\
        <error type='cancel'><{condition} xmlns='urn:ietf:params:xml:ns:xmpp-stanzas'/></error>\
        </iq>"
    ))
    .unwrap()
}

pub fn is_disco_query(stanza: &Element) -> bool {
    stanza.get_child("query", ns::DISCO_INFO).is_some()
}

pub fn push_command(stanza: &Element) -> Option<PushCommand> {
    stanza
        .children()
        .find(|child| child.ns() == ns::PUSH)
        .map(|child| PushCommand::try_from(child.clone()).unwrap())
}

pub fn push_commands(stanzas: &[Element]) -> Vec<&Element> {
    stanzas
        .iter()
        .filter(|stanza| push_command(stanza).is_some())
        .collect()
}

pub fn app_server() -> AppServerConfig {
    AppServerConfig::new(jid!("push-5@client.example"), "yxs32uqsflafdk3iuqo")
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub async fn connected_negotiator(
    server: ScriptedServer,
) -> Result<(ConnectedClient, PushNegotiator)> {
    connected_negotiator_with_state(server, Arc::new(InMemoryPushSessionStateRepository::new()))
        .await
}

pub async fn connected_negotiator_with_state(
    server: ScriptedServer,
    state: Arc<dyn PushSessionStateRepository>,
) -> Result<(ConnectedClient, PushNegotiator)> {
    init_tracing();

    let connected_client = Client::connected_client().await?;
    connected_client
        .connection
        .set_stanza_handler(server.handler());

    let negotiator = PushNegotiator::new(connected_client.client.clone(), state);
    Ok((connected_client, negotiator))
}

/// Polls `condition` while other futures make progress.
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Condition was not met in time.")
}
