// prose-core-client/prose-push
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use minidom::Element;
use pretty_assertions::assert_eq;
use xmpp_parsers::iq::Iq;
use xmpp_parsers::stanza_error::DefinedCondition;

use prose_push::{
    AppServerConfig, InMemoryPushSessionStateRepository, NegotiationError, NegotiationOutcome,
    PendingPhase, PushRequestKind, PushScope, PushSessionState,
};
use prose_push_xmpp::stanza::{Disable, Enable, PushCommand};
use prose_push_xmpp::{jid, ns, ElementExt};

use crate::support::*;

mod support;

fn group_chat(domain: &str) -> PushScope {
    PushScope::GroupChat {
        domain: domain.to_string(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_enables_push_for_account() -> Result<()> {
    let (connected_client, negotiator) = connected_negotiator(ScriptedServer::default()).await?;

    let outcome = negotiator
        .negotiate(&app_server(), &PushScope::Account)
        .await?;
    assert_eq!(outcome, NegotiationOutcome::Enabled);

    let sent_stanzas = connected_client.connection.sent_stanzas();
    assert_eq!(sent_stanzas.len(), 3);

    // Both parties have been asked before the enable request went out.
    assert!(is_disco_query(&sent_stanzas[0]));
    assert_eq!(sent_stanzas[0].attr("to"), Some("push-5@client.example"));
    assert!(is_disco_query(&sent_stanzas[1]));
    assert_eq!(sent_stanzas[1].attr("to"), Some("test@prose.org"));

    let iq = Iq::try_from(sent_stanzas[2].clone())?;
    assert_eq!(iq.id, "id-3");
    assert_eq!(iq.to, None);
    assert_eq!(
        push_command(&sent_stanzas[2]),
        Some(PushCommand::Enable(Enable::new(
            jid!("push-5@client.example"),
            "yxs32uqsflafdk3iuqo"
        )))
    );

    assert!(negotiator.state().get().account_enabled);
    assert!(negotiator.pending_requests().is_empty());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_enables_push_for_group_chat_service() -> Result<()> {
    let (connected_client, negotiator) = connected_negotiator(ScriptedServer::default()).await?;

    let outcome = negotiator
        .negotiate(&app_server(), &group_chat("chat.shakespeare.lit"))
        .await?;
    assert_eq!(outcome, NegotiationOutcome::Enabled);

    let sent_stanzas = connected_client.connection.sent_stanzas();
    assert_eq!(sent_stanzas[1].attr("to"), Some("chat.shakespeare.lit"));

    let iq = Iq::try_from(sent_stanzas[2].clone())?;
    assert_eq!(iq.to, Some(jid!("chat.shakespeare.lit")));

    let state = negotiator.state().get();
    assert!(!state.account_enabled);
    assert!(state.enabled_domains.contains("chat.shakespeare.lit"));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_disables_push_without_discovery() -> Result<()> {
    let state = Arc::new(InMemoryPushSessionStateRepository::with_state(
        PushSessionState {
            account_enabled: true,
            enabled_domains: Default::default(),
        },
    ));
    let (connected_client, negotiator) =
        connected_negotiator_with_state(ScriptedServer::default(), state).await?;

    let outcome = negotiator
        .negotiate(&app_server().disabled(), &PushScope::Account)
        .await?;
    assert_eq!(outcome, NegotiationOutcome::Disabled);

    let sent_stanzas = connected_client.connection.sent_stanzas();
    assert_eq!(sent_stanzas.len(), 1);
    assert!(!is_disco_query(&sent_stanzas[0]));
    assert_eq!(
        push_command(&sent_stanzas[0]),
        Some(PushCommand::Disable(Disable::new(
            jid!("push-5@client.example"),
            Some("yxs32uqsflafdk3iuqo".to_string())
        )))
    );

    assert!(!negotiator.state().get().account_enabled);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_sends_secret_as_publish_option() -> Result<()> {
    let (connected_client, negotiator) = connected_negotiator(ScriptedServer::default()).await?;

    negotiator
        .negotiate(
            &app_server().with_secret("eruio234vzxc2kla-91"),
            &PushScope::Account,
        )
        .await?;

    let sent_stanzas = connected_client.connection.sent_stanzas();
    let form = sent_stanzas[2]
        .get_child("enable", ns::PUSH)
        .and_then(|enable| enable.get_child("x", ns::DATA_FORMS))
        .expect("Missing publish options");

    let field = |var: &str| {
        form.children()
            .find(|field| field.attr("var") == Some(var))
            .and_then(|field| field.value_text(ns::DATA_FORMS))
    };

    assert_eq!(
        field("FORM_TYPE").as_deref(),
        Some("http://jabber.org/protocol/pubsub#publish-options")
    );
    assert_eq!(field("secret").as_deref(), Some("eruio234vzxc2kla-91"));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_times_out_without_response() -> Result<()> {
    let (connected_client, negotiator) = connected_negotiator(ScriptedServer {
        push_response: PushResponse::Silent,
        ..Default::default()
    })
    .await?;

    let connection = connected_client.connection.clone();
    let time_provider = connected_client.time_provider.clone();

    let server = app_server();
    let (result, _) = futures::join!(
        negotiator.negotiate(&server, &PushScope::Account),
        async {
            wait_until(|| !push_commands(&connection.sent_stanzas()).is_empty()).await;

            let pending = negotiator.pending_requests();
            assert_eq!(pending.len(), 1);
            assert_eq!(pending[0].kind, PushRequestKind::Enable);
            assert_eq!(
                pending[0].phase,
                PendingPhase::AwaitingResponse {
                    id: "id-3".to_string()
                }
            );

            time_provider.advance_by(Duration::from_secs(21));
            connection.fire_timeout_timer().await;
        }
    );

    assert_eq!(result, Err(NegotiationError::TimedOut));
    assert_eq!(negotiator.state().get(), PushSessionState::default());
    assert!(negotiator.pending_requests().is_empty());
    assert_eq!(connected_client.client.pending_request_count(), 0);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_skips_app_server_without_push_support() -> Result<()> {
    let (connected_client, negotiator) = connected_negotiator(ScriptedServer {
        without_push: vec!["push-5@client.example".to_string()],
        ..Default::default()
    })
    .await?;

    let outcome = negotiator
        .negotiate(&app_server(), &PushScope::Account)
        .await?;

    assert!(matches!(outcome, NegotiationOutcome::Unsupported { .. }));
    assert!(push_commands(&connected_client.connection.sent_stanzas()).is_empty());
    assert!(!negotiator.state().get().account_enabled);
    assert!(negotiator.pending_requests().is_empty());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_skips_account_without_push_support() -> Result<()> {
    let (connected_client, negotiator) = connected_negotiator(ScriptedServer {
        without_push: vec!["test@prose.org".to_string()],
        ..Default::default()
    })
    .await?;

    let outcome = negotiator
        .negotiate(&app_server(), &PushScope::Account)
        .await?;

    assert!(matches!(outcome, NegotiationOutcome::Unsupported { .. }));
    assert!(push_commands(&connected_client.connection.sent_stanzas()).is_empty());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_treats_discovery_error_as_unsupported() -> Result<()> {
    let (connected_client, negotiator) = connected_negotiator(ScriptedServer {
        failing_discovery: vec!["chat.shakespeare.lit".to_string()],
        ..Default::default()
    })
    .await?;

    let outcome = negotiator
        .negotiate(&app_server(), &group_chat("chat.shakespeare.lit"))
        .await?;

    assert!(matches!(outcome, NegotiationOutcome::Unsupported { .. }));
    assert!(push_commands(&connected_client.connection.sent_stanzas()).is_empty());
    assert!(negotiator.state().get().enabled_domains.is_empty());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_rejected_enable_leaves_state_untouched() -> Result<()> {
    let (_connected_client, negotiator) = connected_negotiator(ScriptedServer {
        push_response: PushResponse::Error,
        ..Default::default()
    })
    .await?;

    let result = negotiator
        .negotiate(&app_server(), &PushScope::Account)
        .await;

    let Err(NegotiationError::Protocol { condition, .. }) = &result else {
        panic!("Expected a protocol error, got {:?}", result)
    };
    assert_eq!(condition, &Some(DefinedCondition::NotAllowed));
    assert!(!negotiator.state().get().account_enabled);
    assert!(negotiator.pending_requests().is_empty());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_group_chat_domains_accumulate() -> Result<()> {
    let (_connected_client, negotiator) = connected_negotiator(ScriptedServer::default()).await?;

    negotiator
        .negotiate(&app_server(), &group_chat("a.chat.example"))
        .await?;
    negotiator
        .negotiate(&app_server(), &group_chat("b.chat.example"))
        .await?;

    assert_eq!(
        negotiator
            .state()
            .get()
            .enabled_domains
            .into_iter()
            .collect::<Vec<_>>(),
        vec!["a.chat.example".to_string(), "b.chat.example".to_string()]
    );

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_rejects_duplicate_negotiation() -> Result<()> {
    let (connected_client, negotiator) = connected_negotiator(ScriptedServer::default()).await?;

    let config = app_server();
    let (first, second) = futures::join!(
        negotiator.negotiate(&config, &PushScope::Account),
        negotiator.negotiate(&config, &PushScope::Account)
    );

    assert_eq!(first, Ok(NegotiationOutcome::Enabled));
    assert_eq!(
        second,
        Err(NegotiationError::AlreadyPending {
            kind: PushRequestKind::Enable,
            scope: PushScope::Account
        })
    );
    assert_eq!(
        push_commands(&connected_client.connection.sent_stanzas()).len(),
        1
    );

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_negotiates_app_servers_concurrently() -> Result<()> {
    let (connected_client, negotiator) = connected_negotiator(ScriptedServer::default()).await?;

    let app_servers = vec![
        app_server(),
        AppServerConfig::new(jid!("push-6@client.example"), "4xkw9ktz3pg34fx4t3x"),
    ];

    let results = negotiator
        .negotiate_all(&app_servers, &PushScope::Account)
        .await;

    assert_eq!(
        results,
        vec![
            Ok(NegotiationOutcome::Enabled),
            Ok(NegotiationOutcome::Enabled)
        ]
    );

    let sent_stanzas = connected_client.connection.sent_stanzas();
    // All four discovery queries are sent before any response is handled.
    assert!(sent_stanzas[..4].iter().all(is_disco_query));
    assert_eq!(push_commands(&sent_stanzas).len(), 2);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_lost_connection_cancels_negotiation() -> Result<()> {
    let (connected_client, negotiator) = connected_negotiator(ScriptedServer {
        push_response: PushResponse::Silent,
        ..Default::default()
    })
    .await?;

    let connection = connected_client.connection.clone();

    let server = app_server();
    let (result, _) = futures::join!(
        negotiator.negotiate(&server, &PushScope::Account),
        async {
            wait_until(|| !push_commands(&connection.sent_stanzas()).is_empty()).await;
            connection.fire_disconnect(None).await;
        }
    );

    assert_eq!(result, Err(NegotiationError::Cancelled));
    assert!(!negotiator.state().get().account_enabled);
    assert!(negotiator.pending_requests().is_empty());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_response_after_reset_does_not_touch_state() -> Result<()> {
    let (connected_client, negotiator) = connected_negotiator(ScriptedServer {
        push_response: PushResponse::Silent,
        ..Default::default()
    })
    .await?;

    let connection = connected_client.connection.clone();

    let server = app_server();
    let (result, delivered) = futures::join!(
        negotiator.negotiate(&server, &PushScope::Account),
        async {
            wait_until(|| !push_commands(&connection.sent_stanzas()).is_empty()).await;
            // The session ends while the response is already on its way.
            negotiator.state().reset();
            connection
                .receive_stanza(Element::from_str(
                    "<iq xmlns='jabber:client' type='result' id='id-3'/>",
                )?)
                .await;
            anyhow::Ok(())
        }
    );

    delivered?;
    assert_eq!(result, Err(NegotiationError::Cancelled));
    assert_eq!(negotiator.state().get(), PushSessionState::default());
    assert!(negotiator.pending_requests().is_empty());

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn test_requires_connection() -> Result<()> {
    let (connected_client, negotiator) = connected_negotiator(ScriptedServer::default()).await?;

    connected_client.client.disconnect();

    let result = negotiator
        .negotiate(&app_server(), &PushScope::Account)
        .await;

    assert_eq!(result, Err(NegotiationError::NotConnected));
    assert!(connected_client.connection.sent_stanzas().is_empty());

    Ok(())
}
