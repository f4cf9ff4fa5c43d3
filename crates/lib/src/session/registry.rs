//! Session registry: tenant → session slot, with idempotent creation.
//!
//! The map lock is held only for lookup, insert, and remove; everything slow
//! (waiting for the QR, channel opening, handlers) happens against the slot
//! itself, so tenants never block each other.

use crate::channels::ChannelPort;
use crate::dispatch::Dispatcher;
use crate::session::{lifecycle, SessionState, TenantSession};
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;

/// Outcome of a session-creation request, mirroring the trigger API replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// New session; scan this QR to log in. Only the first caller gets it.
    Qr(String),
    /// A session is live (or persisted login lets this tenant skip the QR).
    AlreadyAuthenticated,
    /// A session is mid-login; no second connection is opened.
    AlreadyLoggingIn,
    Error(String),
}

struct SlotInner {
    state: SessionState,
    created_at: DateTime<Local>,
    last_status_message: Option<String>,
    own_identity: Option<String>,
    qr: Option<String>,
}

/// One tenant's session: state plus the lifecycle task driving it.
pub(crate) struct TenantSlot {
    tenant_id: String,
    inner: RwLock<SlotInner>,
    state_tx: watch::Sender<SessionState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TenantSlot {
    fn new(tenant_id: String) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Uninitialized);
        Self {
            tenant_id,
            inner: RwLock::new(SlotInner {
                state: SessionState::Uninitialized,
                created_at: Local::now(),
                last_status_message: None,
                own_identity: None,
                qr: None,
            }),
            state_tx,
            task: Mutex::new(None),
        }
    }

    pub(crate) fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub(crate) async fn state(&self) -> SessionState {
        self.inner.read().await.state
    }

    /// Transition to `state`, recording a status message when given.
    /// Terminal states are sticky, so a late channel event cannot resurrect a
    /// destroyed session.
    pub(crate) async fn set_state(&self, state: SessionState, message: Option<String>) {
        {
            let mut g = self.inner.write().await;
            if g.state.is_terminal() {
                return;
            }
            g.state = state;
            if message.is_some() {
                g.last_status_message = message;
            }
        }
        let _ = self.state_tx.send(state);
    }

    pub(crate) async fn set_qr(&self, qr: String) {
        self.inner.write().await.qr = Some(qr);
        self.set_state(SessionState::QrPending, None).await;
    }

    pub(crate) async fn set_identity(&self, identity: String) {
        self.inner.write().await.own_identity = Some(identity);
    }

    async fn snapshot(&self) -> TenantSession {
        let g = self.inner.read().await;
        TenantSession {
            tenant_id: self.tenant_id.clone(),
            state: g.state,
            created_at: g.created_at,
            last_status_message: g.last_status_message.clone(),
            own_identity: g.own_identity.clone(),
        }
    }
}

/// Owns all tenant sessions; enforces at most one live session per tenant.
pub struct SessionRegistry {
    slots: RwLock<HashMap<String, Arc<TenantSlot>>>,
    channel: Arc<dyn ChannelPort>,
    dispatcher: Arc<Dispatcher>,
    /// How long the creating caller waits for the QR (or login) to surface.
    qr_wait: Duration,
    /// How long a session may sit in qr_pending before it errors out.
    qr_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(
        channel: Arc<dyn ChannelPort>,
        dispatcher: Arc<Dispatcher>,
        qr_wait: Duration,
        qr_timeout: Duration,
    ) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            channel,
            dispatcher,
            qr_wait,
            qr_timeout,
        }
    }

    /// Idempotently get or create the tenant's session.
    ///
    /// A live slot is never re-created, so no duplicate channel connection is
    /// ever opened for a tenant. A terminated or errored slot is replaced.
    pub async fn get_or_create(&self, tenant_id: &str) -> CreateOutcome {
        if let Some(state) = self.live_state(tenant_id).await {
            return self.live_outcome(tenant_id, state).await;
        }

        let inserted = {
            let mut slots = self.slots.write().await;
            // Double-check under the write lock: a concurrent request may have
            // inserted the slot after our read above.
            let mut live = None;
            if let Some(slot) = slots.get(tenant_id) {
                let state = slot.state().await;
                if !state.is_terminal() {
                    live = Some(state);
                }
            }
            match live {
                Some(state) => Err(state),
                None => {
                    let slot = Arc::new(TenantSlot::new(tenant_id.to_string()));
                    slots.insert(tenant_id.to_string(), slot.clone());
                    let state_rx = slot.state_tx.subscribe();
                    Ok((slot, state_rx))
                }
            }
        };
        let (slot, mut state_rx) = match inserted {
            Ok(pair) => pair,
            // Lost the race; resolve outside the lock (the artifact check may be slow).
            Err(state) => return self.live_outcome(tenant_id, state).await,
        };

        let handle = tokio::spawn(lifecycle::run_session(
            slot.clone(),
            self.channel.clone(),
            self.dispatcher.clone(),
            self.qr_timeout,
        ));
        *slot.task.lock().await = Some(handle);

        // Persisted login artifacts mean the transport re-authenticates on its
        // own; report success without a QR round-trip.
        if self.channel.has_persisted_login(tenant_id).await {
            log::info!("[{}] persisted login found, skipping QR", tenant_id);
            return CreateOutcome::AlreadyAuthenticated;
        }

        let deadline = tokio::time::Instant::now() + self.qr_wait;
        loop {
            let state = *state_rx.borrow_and_update();
            match state {
                SessionState::QrPending => {
                    let qr = slot.inner.read().await.qr.clone().unwrap_or_default();
                    return CreateOutcome::Qr(qr);
                }
                SessionState::Authenticated | SessionState::Running => {
                    return CreateOutcome::AlreadyAuthenticated;
                }
                SessionState::Error | SessionState::Terminated => {
                    let detail = slot
                        .snapshot()
                        .await
                        .last_status_message
                        .unwrap_or_else(|| "session failed during login".to_string());
                    return CreateOutcome::Error(detail);
                }
                SessionState::Uninitialized | SessionState::Initializing => {}
            }
            match tokio::time::timeout_at(deadline, state_rx.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    return CreateOutcome::Error("session task ended unexpectedly".to_string())
                }
                Err(_) => {
                    return CreateOutcome::Error("timed out waiting for login QR".to_string())
                }
            }
        }
    }

    /// Current session snapshot, if the tenant has one.
    pub async fn status(&self, tenant_id: &str) -> Option<TenantSession> {
        let slot = self.slots.read().await.get(tenant_id).cloned()?;
        Some(slot.snapshot().await)
    }

    /// Force-terminate the tenant's session and remove its channel artifacts.
    /// Safe to call when no session exists.
    pub async fn destroy(&self, tenant_id: &str) {
        let slot = self.slots.write().await.remove(tenant_id);
        if let Some(slot) = slot {
            if let Some(handle) = slot.task.lock().await.take() {
                handle.abort();
            }
            slot.set_state(SessionState::Terminated, Some("destroyed".to_string()))
                .await;
            log::info!("[{}] session terminated", tenant_id);
        }
        if let Err(e) = self.channel.destroy(tenant_id).await {
            log::warn!("[{}] channel teardown failed: {}", tenant_id, e);
        }
    }

    /// State of the tenant's slot when one exists and is not terminal.
    async fn live_state(&self, tenant_id: &str) -> Option<SessionState> {
        let slot = self.slots.read().await.get(tenant_id).cloned()?;
        let state = slot.state().await;
        if state.is_terminal() {
            return None;
        }
        Some(state)
    }

    /// Outcome for a tenant whose session already exists. A pre-auth state
    /// with persisted login artifacts still reports authenticated: the
    /// transport re-authenticates on its own and no QR will be issued.
    async fn live_outcome(&self, tenant_id: &str, state: SessionState) -> CreateOutcome {
        match state {
            SessionState::Authenticated | SessionState::Running => {
                CreateOutcome::AlreadyAuthenticated
            }
            // Uninitialized/Initializing/QrPending: a login is in flight and
            // the first caller already owns the QR.
            _ => {
                if self.channel.has_persisted_login(tenant_id).await {
                    CreateOutcome::AlreadyAuthenticated
                } else {
                    CreateOutcome::AlreadyLoggingIn
                }
            }
        }
    }
}
