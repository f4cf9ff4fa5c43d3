//! Data provider boundary: read-only tenant business data.
//!
//! The real implementation queries the tenant's document store; the assistant
//! only needs these four aggregate reads. Date ranges are half-open
//! `[from, to)` so day boundaries never double-count.

mod memory;

pub use memory::MemoryProvider;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use thiserror::Error;

/// A paid order within a queried range.
#[derive(Debug, Clone)]
pub struct PaidOrder {
    /// Total in the smallest currency unit (whole pesos; never subdivided).
    pub total: i64,
    /// Staff member the order is attributed to.
    pub staff_name: String,
}

/// A currently occupied table.
#[derive(Debug, Clone)]
pub struct OccupiedTable {
    pub table: String,
    pub staff_name: String,
    pub occupied_since: DateTime<Local>,
}

/// Data provider failure, surfaced to the user as a generic apology reply.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("data provider unavailable: {0}")]
    Unavailable(String),
    #[error("data provider query timed out")]
    Timeout,
}

/// Read-only queries over one tenant's business data.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Paid orders finalized within `[from, to)`.
    async fn paid_orders(
        &self,
        tenant_id: &str,
        from: DateTime<Local>,
        to: DateTime<Local>,
    ) -> Result<Vec<PaidOrder>, DataError>;

    /// Number of orders currently open.
    async fn active_orders(&self, tenant_id: &str) -> Result<u64, DataError>;

    /// Tables occupied right now, with the staff member attending each.
    async fn occupied_tables(&self, tenant_id: &str) -> Result<Vec<OccupiedTable>, DataError>;

    /// Tenant display name, when configured.
    async fn tenant_display_name(&self, tenant_id: &str) -> Result<Option<String>, DataError>;
}
