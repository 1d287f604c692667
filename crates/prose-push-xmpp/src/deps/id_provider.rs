// prose-core-client/prose-push-xmpp
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::sync::Arc;

use uuid::Uuid;

use crate::util::{SendUnlessWasm, SyncUnlessWasm};

/// Generates the opaque `id` attribute that correlates an IQ with its response.
pub trait IDProvider: SendUnlessWasm + SyncUnlessWasm {
    fn new_id(&self) -> String;
}

#[derive(Default)]
pub struct UUIDProvider {}

impl UUIDProvider {
    pub fn new() -> Self {
        UUIDProvider {}
    }
}

impl IDProvider for UUIDProvider {
    fn new_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

impl<T: IDProvider + ?Sized> IDProvider for Arc<T> {
    fn new_id(&self) -> String {
        (**self).new_id()
    }
}
