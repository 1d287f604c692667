// prose-core-client/prose-push
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use xmpp_parsers::stanza_error::DefinedCondition;

use prose_push_xmpp::RequestError;

use crate::{PushRequestKind, PushScope};

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum NegotiationError {
    #[error("Transport error: {msg}")]
    Transport { msg: String },
    #[error("Push request timed out")]
    TimedOut,
    #[error("Push request failed: {msg}")]
    Protocol {
        msg: String,
        condition: Option<DefinedCondition>,
    },
    #[error("A push {kind} request for {scope} is in flight already")]
    AlreadyPending {
        kind: PushRequestKind,
        scope: PushScope,
    },
    #[error("Push negotiation was cancelled")]
    Cancelled,
    #[error("Cannot negotiate push notifications. The client is not connected.")]
    NotConnected,
}

impl From<RequestError> for NegotiationError {
    fn from(value: RequestError) -> Self {
        let condition = value.defined_condition();
        let description = value.to_string();

        match value {
            RequestError::TimedOut => NegotiationError::TimedOut,
            RequestError::Disconnected => NegotiationError::Cancelled,
            RequestError::Transport { msg } => NegotiationError::Transport { msg },
            RequestError::XMPP { .. }
            | RequestError::UnexpectedResponse
            | RequestError::JidError(_)
            | RequestError::Generic { .. }
            | RequestError::ParseError(_) => NegotiationError::Protocol {
                msg: description,
                condition,
            },
        }
    }
}

impl From<jid::Error> for NegotiationError {
    fn from(value: jid::Error) -> Self {
        NegotiationError::Protocol {
            msg: value.to_string(),
            condition: None,
        }
    }
}
