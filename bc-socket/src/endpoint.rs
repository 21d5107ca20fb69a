//! Push channel address derivation.
//!
//! The channel address is derived from the backend's own base address so the
//! transport scheme always matches it: `http` becomes `ws`, `https` becomes
//! `wss`. The credential travels as the `token` query parameter.

/// Swap a leading `https:`/`http:` scheme for `wss:`/`ws:`.
///
/// One trailing slash is stripped first. Other schemes pass through untouched.
pub fn transport_origin(base_address: &str) -> String {
    let base = base_address.strip_suffix('/').unwrap_or(base_address);
    if let Some(rest) = base.strip_prefix("https:") {
        format!("wss:{rest}")
    } else if let Some(rest) = base.strip_prefix("http:") {
        format!("ws:{rest}")
    } else {
        base.to_string()
    }
}

/// Build the full channel URL for a credential.
///
/// `derive_channel_url("https://api.example.com/", "ws/notifications", "abc")`
/// yields `wss://api.example.com/ws/notifications/?token=abc`.
pub fn derive_channel_url(base_address: &str, channel_path: &str, credential: &str) -> String {
    let origin = transport_origin(base_address);
    let path = channel_path.trim_matches('/');
    let token = urlencoding::encode(credential);
    if path.is_empty() {
        format!("{origin}/?token={token}")
    } else {
        format!("{origin}/{path}/?token={token}")
    }
}

/// The backend address and channel path a client connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEndpoint {
    base_address: String,
    path: String,
}

impl ChannelEndpoint {
    pub fn new(base_address: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            base_address: base_address.into(),
            path: path.into(),
        }
    }

    /// Endpoint from the server and channel sections of the app config.
    pub fn from_config(config: &bc_core::AppConfig) -> Self {
        Self::new(config.server.address.clone(), config.channel.path.clone())
    }

    pub fn base_address(&self) -> &str {
        &self.base_address
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Channel URL carrying `credential`.
    pub fn url_for(&self, credential: &str) -> String {
        derive_channel_url(&self.base_address, &self.path, credential)
    }
}
