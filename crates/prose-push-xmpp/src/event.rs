// prose-core-client/prose-push-xmpp
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use crate::client;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Client(client::Event),
}
