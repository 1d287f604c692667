// prose-core-client/prose-push-xmpp
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

pub use push::{Disable, Enable, PublishOptions, PushCommand, PushCommandKind};

pub mod ns;
pub mod push;
