// prose-core-client/prose-push
//
// Copyright: 2024, Marc Bauer <mb@nesium.com>
// License: Mozilla Public License v2.0 (MPL v2.0)

use jid::Jid;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

/// A push app server (XEP-0357 "App Server") notifications should be routed to.
#[derive(Debug, Clone, Deserialize)]
pub struct AppServerConfig {
    pub jid: Jid,
    /// The PubSub node on the app server that identifies this device.
    pub node: String,
    /// Remove the registration instead of creating it.
    #[serde(default)]
    pub disable: bool,
    /// Forwarded to the app server as publish option. Never logged.
    #[serde(default)]
    pub secret: Option<Secret<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushSettings {
    #[serde(default)]
    pub app_servers: Vec<AppServerConfig>,
    /// Whether to register with the MUC services of joined rooms as well.
    #[serde(default)]
    pub enable_muc_push: bool,
}

impl AppServerConfig {
    pub fn new(jid: impl Into<Jid>, node: impl Into<String>) -> Self {
        AppServerConfig {
            jid: jid.into(),
            node: node.into(),
            disable: false,
            secret: None,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(Secret::new(secret.into()));
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disable = true;
        self
    }

    pub(crate) fn exposed_secret(&self) -> Option<String> {
        self.secret
            .as_ref()
            .map(|secret| secret.expose_secret().clone())
    }
}

impl PushSettings {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// App servers we should register with, followed by the ones we should unregister from.
    pub fn partitioned_app_servers(&self) -> (Vec<AppServerConfig>, Vec<AppServerConfig>) {
        self.app_servers
            .iter()
            .cloned()
            .partition(|app_server| !app_server.disable)
    }
}
