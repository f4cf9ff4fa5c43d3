//! Tenant sessions: at most one live bot connection per tenant.
//!
//! The registry owns the tenant → session map; the lifecycle task drives a
//! single session through its state machine from the channel's event stream
//! and hands inbound messages to the dispatcher.

mod lifecycle;
mod registry;

pub use registry::{CreateOutcome, SessionRegistry};

use chrono::{DateTime, Local};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    QrPending,
    Authenticated,
    Running,
    Terminated,
    Error,
}

impl SessionState {
    /// Terminal states allow the tenant's slot to be replaced by a new one.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Terminated | SessionState::Error)
    }

    /// Wire name used in status JSON and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Initializing => "initializing",
            SessionState::QrPending => "qr_pending",
            SessionState::Authenticated => "authenticated",
            SessionState::Running => "running",
            SessionState::Terminated => "terminated",
            SessionState::Error => "error",
        }
    }
}

/// Point-in-time snapshot of one tenant's session.
#[derive(Debug, Clone)]
pub struct TenantSession {
    pub tenant_id: String,
    pub state: SessionState,
    pub created_at: DateTime<Local>,
    pub last_status_message: Option<String>,
    /// The tenant's own channel identity, known once authenticated.
    pub own_identity: Option<String>,
}
