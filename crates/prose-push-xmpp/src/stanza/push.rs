// prose-core-client/prose-push-xmpp
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

//! XEP-0357: Push Notifications
//! https://xmpp.org/extensions/xep-0357.html#enabling

use std::fmt::{Debug, Formatter};
use std::str::FromStr;

use jid::Jid;
use minidom::Element;

use crate::util::{ElementExt, ParseError};
use crate::ns;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub enum PushCommandKind {
    Enable,
    Disable,
}

/// Payload of the IQ `set` that turns push delivery on or off at the user's server.
#[derive(Debug, Clone, PartialEq)]
pub enum PushCommand {
    Enable(Enable),
    Disable(Disable),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enable {
    /// The XMPP Push Service (app server) notifications are sent to.
    pub jid: Jid,
    pub node: String,
    pub publish_options: Option<PublishOptions>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Disable {
    pub jid: Jid,
    /// Without a node all registrations for `jid` are removed.
    pub node: Option<String>,
}

/// The `jabber:x:data` form forwarded by the server as publish options.
#[derive(Clone, PartialEq, Default)]
pub struct PublishOptions {
    pub secret: Option<String>,
}

impl PushCommand {
    pub fn kind(&self) -> PushCommandKind {
        match self {
            PushCommand::Enable(_) => PushCommandKind::Enable,
            PushCommand::Disable(_) => PushCommandKind::Disable,
        }
    }
}

impl Enable {
    pub fn new(jid: impl Into<Jid>, node: impl Into<String>) -> Self {
        Self {
            jid: jid.into(),
            node: node.into(),
            publish_options: None,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.publish_options = Some(PublishOptions {
            secret: Some(secret.into()),
        });
        self
    }
}

impl Disable {
    pub fn new(jid: impl Into<Jid>, node: Option<String>) -> Self {
        Self {
            jid: jid.into(),
            node,
        }
    }
}

impl Debug for PublishOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishOptions")
            .field("secret", &self.secret.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl From<Enable> for PushCommand {
    fn from(value: Enable) -> Self {
        PushCommand::Enable(value)
    }
}

impl From<Disable> for PushCommand {
    fn from(value: Disable) -> Self {
        PushCommand::Disable(value)
    }
}

impl From<PushCommand> for Element {
    fn from(value: PushCommand) -> Self {
        match value {
            PushCommand::Enable(enable) => enable.into(),
            PushCommand::Disable(disable) => disable.into(),
        }
    }
}

impl From<Enable> for Element {
    fn from(value: Enable) -> Self {
        Element::builder(PushCommandKind::Enable.to_string(), ns::PUSH)
            .attr("jid", value.jid.to_string())
            .attr("node", value.node)
            .append_all(value.publish_options.map(Element::from))
            .build()
    }
}

impl From<Disable> for Element {
    fn from(value: Disable) -> Self {
        Element::builder(PushCommandKind::Disable.to_string(), ns::PUSH)
            .attr("jid", value.jid.to_string())
            .attr("node", value.node)
            .build()
    }
}

impl From<PublishOptions> for Element {
    fn from(value: PublishOptions) -> Self {
        Element::builder("x", ns::DATA_FORMS)
            .attr("type", "submit")
            .append(form_field("FORM_TYPE", ns::PUBSUB_PUBLISH_OPTIONS))
            .append_all(value.secret.map(|secret| form_field("secret", secret)))
            .build()
    }
}

impl TryFrom<Element> for PushCommand {
    type Error = ParseError;

    fn try_from(value: Element) -> Result<Self, Self::Error> {
        let kind = PushCommandKind::from_str(value.name()).map_err(|_| ParseError::Generic {
            msg: format!("Unexpected push command {}.", value.name()),
        })?;

        Ok(match kind {
            PushCommandKind::Enable => PushCommand::Enable(Enable::try_from(value)?),
            PushCommandKind::Disable => PushCommand::Disable(Disable::try_from(value)?),
        })
    }
}

impl TryFrom<Element> for Enable {
    type Error = ParseError;

    fn try_from(value: Element) -> Result<Self, Self::Error> {
        value.expect_is("enable", ns::PUSH)?;

        Ok(Enable {
            jid: parse_jid(value.attr_req("jid")?)?,
            node: value.attr_req("node")?.to_string(),
            publish_options: value
                .get_child("x", ns::DATA_FORMS)
                .cloned()
                .map(PublishOptions::try_from)
                .transpose()?,
        })
    }
}

impl TryFrom<Element> for Disable {
    type Error = ParseError;

    fn try_from(value: Element) -> Result<Self, Self::Error> {
        value.expect_is("disable", ns::PUSH)?;

        Ok(Disable {
            jid: parse_jid(value.attr_req("jid")?)?,
            node: value.attr("node").map(ToString::to_string),
        })
    }
}

impl TryFrom<Element> for PublishOptions {
    type Error = ParseError;

    fn try_from(value: Element) -> Result<Self, Self::Error> {
        value.expect_is("x", ns::DATA_FORMS)?;

        let field_value = |var: &str| {
            value
                .children()
                .filter(|child| child.is("field", ns::DATA_FORMS))
                .find(|field| field.attr("var") == Some(var))
                .and_then(|field| field.value_text(ns::DATA_FORMS))
        };

        if field_value("FORM_TYPE").as_deref() != Some(ns::PUBSUB_PUBLISH_OPTIONS) {
            return Err(ParseError::Generic {
                msg: "Publish options are missing the publish-options FORM_TYPE.".to_string(),
            });
        }

        Ok(PublishOptions {
            secret: field_value("secret"),
        })
    }
}

fn form_field(var: &str, value: impl Into<String>) -> Element {
    Element::builder("field", ns::DATA_FORMS)
        .attr("var", var)
        .append(Element::builder("value", ns::DATA_FORMS).append(value.into()))
        .build()
}

fn parse_jid(value: &str) -> Result<Jid, ParseError> {
    Jid::from_str(value).map_err(|err| ParseError::Generic {
        msg: format!("Invalid jid '{}'. {}", value, err),
    })
}
