// prose-core-client/prose-push-xmpp
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::task::Waker;

use crate::util::XMPPElement;

pub(crate) enum ModuleFuturePoll {
    Pending,
    Ready(Option<Waker>),
}

/// The listener side of a pending request, owned weakly by the client's pending table.
pub(crate) trait ModuleFutureState: Send {
    fn handle_element(&mut self, element: &XMPPElement) -> ModuleFuturePoll;
    fn fail_with_timeout(&mut self) -> Option<Waker>;
    fn fail_with_disconnect(&mut self) -> Option<Waker>;
}
