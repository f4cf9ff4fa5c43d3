//! In-process channel implementation.
//!
//! Stands in for the real transport engine: events are scripted by the caller
//! (tests, or the CLI's demo wiring) and outbound sends are recorded. Also
//! counts `open()` calls per tenant so the registry's no-duplicate-connection
//! guarantee is observable. When built with an artifact store, persisted
//! login survives a restart the way the real transport's token files do.

use crate::channels::artifacts::LoginArtifacts;
use crate::channels::port::{ChannelEvent, ChannelPort};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{mpsc, RwLock};

const EVENT_BUFFER: usize = 32;

#[derive(Default)]
struct TenantState {
    open_count: u32,
    persisted_login: bool,
    qr_payload: Option<String>,
    tx: Option<mpsc::Sender<ChannelEvent>>,
    sent: Vec<(String, String)>,
}

/// In-memory channel: scripted events in, recorded sends out.
#[derive(Default)]
pub struct MemoryChannel {
    inner: RwLock<HashMap<String, TenantState>>,
    artifacts: Option<LoginArtifacts>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel whose persisted-login signal is backed by on-disk artifact
    /// directories, so tenant logins survive a restart.
    pub fn with_artifacts(artifacts: LoginArtifacts) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            artifacts: Some(artifacts),
        }
    }

    /// Mark the tenant as having persisted login artifacts. `open()` will then
    /// emit `Authenticated` directly instead of a QR.
    pub async fn set_persisted_login(&self, tenant_id: &str, persisted: bool) {
        {
            let mut g = self.inner.write().await;
            g.entry(tenant_id.to_string()).or_default().persisted_login = persisted;
        }
        if persisted {
            if let Some(artifacts) = &self.artifacts {
                if let Err(e) = artifacts.ensure(tenant_id).await {
                    log::warn!("[{}] persisting login artifacts failed: {}", tenant_id, e);
                }
            }
        }
    }

    /// Override the QR payload emitted on the next `open()` for the tenant.
    pub async fn set_qr_payload(&self, tenant_id: &str, payload: impl Into<String>) {
        let mut g = self.inner.write().await;
        g.entry(tenant_id.to_string()).or_default().qr_payload = Some(payload.into());
    }

    /// Inject an event into the tenant's open connection.
    /// Returns an error when no connection is open or the stream was dropped.
    pub async fn emit(&self, tenant_id: &str, event: ChannelEvent) -> Result<(), String> {
        let tx = {
            let g = self.inner.read().await;
            g.get(tenant_id).and_then(|s| s.tx.clone())
        };
        let tx = tx.ok_or_else(|| format!("no open connection for tenant {}", tenant_id))?;
        tx.send(event)
            .await
            .map_err(|_| format!("event stream for tenant {} closed", tenant_id))
    }

    /// How many times `open()` was called for the tenant.
    pub async fn open_count(&self, tenant_id: &str) -> u32 {
        let g = self.inner.read().await;
        g.get(tenant_id).map(|s| s.open_count).unwrap_or(0)
    }

    /// Outbound messages recorded for the tenant, in send order.
    pub async fn sent_messages(&self, tenant_id: &str) -> Vec<(String, String)> {
        let g = self.inner.read().await;
        g.get(tenant_id).map(|s| s.sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChannelPort for MemoryChannel {
    async fn open(&self, tenant_id: &str) -> Result<mpsc::Receiver<ChannelEvent>, String> {
        let persisted = self.has_persisted_login(tenant_id).await;
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let first_event = {
            let mut g = self.inner.write().await;
            let state = g.entry(tenant_id.to_string()).or_default();
            state.open_count += 1;
            state.tx = Some(tx.clone());
            if persisted {
                ChannelEvent::Authenticated(format!("{}:self", tenant_id))
            } else {
                let qr = state
                    .qr_payload
                    .clone()
                    .unwrap_or_else(|| format!("qr:{}", tenant_id));
                ChannelEvent::LoginQr(qr)
            }
        };
        tx.send(first_event)
            .await
            .map_err(|_| "event stream closed before first event".to_string())?;
        Ok(rx)
    }

    async fn send(&self, tenant_id: &str, user_id: &str, text: &str) -> Result<(), String> {
        let mut g = self.inner.write().await;
        g.entry(tenant_id.to_string())
            .or_default()
            .sent
            .push((user_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn has_persisted_login(&self, tenant_id: &str) -> bool {
        let flagged = {
            let g = self.inner.read().await;
            g.get(tenant_id).map(|s| s.persisted_login).unwrap_or(false)
        };
        flagged
            || self
                .artifacts
                .as_ref()
                .map(|a| a.exists(tenant_id))
                .unwrap_or(false)
    }

    async fn destroy(&self, tenant_id: &str) -> Result<(), String> {
        {
            let mut g = self.inner.write().await;
            if let Some(state) = g.get_mut(tenant_id) {
                state.persisted_login = false;
                state.tx = None;
            }
        }
        if let Some(artifacts) = &self.artifacts {
            artifacts.remove(tenant_id).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_emits_qr_then_counts() {
        let channel = MemoryChannel::new();
        let mut rx = channel.open("la-esquina").await.expect("open");
        match rx.recv().await {
            Some(ChannelEvent::LoginQr(qr)) => assert_eq!(qr, "qr:la-esquina"),
            other => panic!("expected LoginQr, got {:?}", other),
        }
        assert_eq!(channel.open_count("la-esquina").await, 1);
        assert_eq!(channel.open_count("otro").await, 0);
    }

    #[tokio::test]
    async fn persisted_login_skips_qr() {
        let channel = MemoryChannel::new();
        channel.set_persisted_login("la-esquina", true).await;
        assert!(channel.has_persisted_login("la-esquina").await);
        let mut rx = channel.open("la-esquina").await.expect("open");
        match rx.recv().await {
            Some(ChannelEvent::Authenticated(id)) => assert_eq!(id, "la-esquina:self"),
            other => panic!("expected Authenticated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn destroy_clears_persisted_login() {
        let channel = MemoryChannel::new();
        channel.set_persisted_login("la-esquina", true).await;
        channel.destroy("la-esquina").await.expect("destroy");
        assert!(!channel.has_persisted_login("la-esquina").await);
    }

    #[tokio::test]
    async fn artifact_backed_login_survives_a_new_channel() {
        let root = std::env::temp_dir().join(format!("mozo-channel-{}", std::process::id()));
        let channel = MemoryChannel::with_artifacts(LoginArtifacts::new(&root));
        channel.set_persisted_login("la-esquina", true).await;

        // a fresh channel over the same root sees the login without any flag
        let restarted = MemoryChannel::with_artifacts(LoginArtifacts::new(&root));
        assert!(restarted.has_persisted_login("la-esquina").await);

        restarted.destroy("la-esquina").await.expect("destroy");
        assert!(!restarted.has_persisted_login("la-esquina").await);

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
