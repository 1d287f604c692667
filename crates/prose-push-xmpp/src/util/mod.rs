// prose-core-client/prose-push-xmpp
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use std::future::Future;
use std::pin::Pin;

pub use element_ext::ElementExt;
pub(crate) use module_future_state::{ModuleFuturePoll, ModuleFutureState};
pub use request_error::{ParseError, RequestError};
pub(crate) use request_future::{ElementReducerPoll, RequestFuture};
pub use xmpp_element::XMPPElement;

mod element_ext;
mod module_future_state;
mod request_error;
mod request_future;
mod xmpp_element;

#[cfg(not(target_arch = "wasm32"))]
pub trait SendUnlessWasm: Send {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + ?Sized> SendUnlessWasm for T {}

#[cfg(target_arch = "wasm32")]
pub trait SendUnlessWasm {}
#[cfg(target_arch = "wasm32")]
impl<T: ?Sized> SendUnlessWasm for T {}

#[cfg(not(target_arch = "wasm32"))]
pub trait SyncUnlessWasm: Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Sync + ?Sized> SyncUnlessWasm for T {}

#[cfg(target_arch = "wasm32")]
pub trait SyncUnlessWasm {}
#[cfg(target_arch = "wasm32")]
impl<T: ?Sized> SyncUnlessWasm for T {}

#[cfg(target_arch = "wasm32")]
pub type PinnedFuture<T> = Pin<Box<dyn Future<Output = T>>>;
#[cfg(not(target_arch = "wasm32"))]
pub type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

pub fn spawn<T>(future: T)
where
    T: Future<Output = ()> + SendUnlessWasm + 'static,
{
    #[cfg(target_arch = "wasm32")]
    wasm_bindgen_futures::spawn_local(future);
    #[cfg(not(target_arch = "wasm32"))]
    tokio::spawn(future);
}
