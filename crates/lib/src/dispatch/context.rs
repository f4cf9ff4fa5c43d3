//! Conversational context: what was just offered to a user, so their next
//! reply can resolve it (e.g. "want the per-waiter breakdown?").

use crate::data::OccupiedTable;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// What the pending offer is about, with the data needed to answer it.
#[derive(Debug, Clone)]
pub enum ContextKind {
    /// Per-staff subtotals behind a billing total already shown to the user.
    BillingDetail {
        total: i64,
        by_staff: Vec<(String, i64)>,
    },
    /// The occupied-table records behind a count already shown to the user.
    TableDetail { tables: Vec<OccupiedTable> },
}

#[derive(Debug, Clone)]
pub struct ConversationContext {
    pub kind: ContextKind,
    created_at: Instant,
}

impl ConversationContext {
    pub fn new(kind: ContextKind) -> Self {
        Self {
            kind,
            created_at: Instant::now(),
        }
    }
}

/// In-memory store: (tenant_id, user_id) -> context, at most one per pair.
///
/// Contexts older than the TTL are treated as absent and evicted lazily on
/// the next access for that pair.
pub struct ContextStore {
    inner: Arc<RwLock<HashMap<(String, String), ConversationContext>>>,
    ttl: Duration,
}

impl ContextStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Install a context for the pair, replacing any existing one.
    pub async fn set(&self, tenant_id: &str, user_id: &str, context: ConversationContext) {
        let key = (tenant_id.to_string(), user_id.to_string());
        self.inner.write().await.insert(key, context);
    }

    /// Remove and return the pair's context, if present and not expired.
    /// An expired context is evicted and reported as absent.
    pub async fn take(&self, tenant_id: &str, user_id: &str) -> Option<ConversationContext> {
        let key = (tenant_id.to_string(), user_id.to_string());
        let mut g = self.inner.write().await;
        let context = g.remove(&key)?;
        if context.created_at.elapsed() >= self.ttl {
            return None;
        }
        Some(context)
    }

    /// Drop the pair's context, if any.
    pub async fn clear(&self, tenant_id: &str, user_id: &str) {
        let key = (tenant_id.to_string(), user_id.to_string());
        self.inner.write().await.remove(&key);
    }
}
