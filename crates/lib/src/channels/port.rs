//! Channel port: the interface to a tenant's messaging transport.

use async_trait::async_trait;
use tokio::sync::mpsc;

/// An inbound chat message on a tenant's channel.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    /// Sender identity within the channel (e.g. a phone number or chat id).
    pub user_id: String,
    pub text: String,
    /// True when the message came from a group conversation; the assistant ignores those.
    pub is_group: bool,
    /// True when the message was sent by the tenant's own account.
    pub is_self: bool,
}

/// Event emitted by a tenant's channel connection.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// Login QR payload (e.g. base64 image data) for a not-yet-authenticated tenant.
    LoginQr(String),
    /// Login completed; carries the tenant's own channel identity.
    Authenticated(String),
    /// A message arrived on the channel.
    Inbound(ChannelMessage),
    /// Unrecoverable transport failure; the connection is gone.
    Fatal(String),
}

/// Interface to the messaging transport, one connection per tenant.
///
/// `open` must be called at most once per live session; the session registry
/// is responsible for never opening a duplicate connection for a tenant.
#[async_trait]
pub trait ChannelPort: Send + Sync {
    /// Open a connection for the tenant and return its event stream.
    /// When persisted login artifacts exist the stream skips `LoginQr` and
    /// emits `Authenticated` directly.
    async fn open(&self, tenant_id: &str) -> Result<mpsc::Receiver<ChannelEvent>, String>;

    /// Send a text message to a user on the tenant's channel.
    async fn send(&self, tenant_id: &str, user_id: &str, text: &str) -> Result<(), String>;

    /// True when login artifacts persist for the tenant (re-auth without QR).
    async fn has_persisted_login(&self, tenant_id: &str) -> bool;

    /// Tear down all tenant-scoped channel state, including persisted artifacts.
    async fn destroy(&self, tenant_id: &str) -> Result<(), String>;
}
