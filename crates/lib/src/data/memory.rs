//! In-memory data provider for tests and the CLI's demo wiring.

use crate::data::{DataError, DataProvider, OccupiedTable, PaidOrder};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct TenantData {
    /// (finalized_at, order) pairs; queries filter by the half-open range.
    orders: Vec<(DateTime<Local>, PaidOrder)>,
    tables: Vec<OccupiedTable>,
    active_orders: u64,
    display_name: Option<String>,
}

/// In-memory provider; a failure toggle exercises the error path.
#[derive(Default)]
pub struct MemoryProvider {
    inner: RwLock<HashMap<String, TenantData>>,
    fail: RwLock<bool>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_display_name(&self, tenant_id: &str, name: impl Into<String>) {
        let mut g = self.inner.write().await;
        g.entry(tenant_id.to_string()).or_default().display_name = Some(name.into());
    }

    pub async fn add_paid_order(
        &self,
        tenant_id: &str,
        finalized_at: DateTime<Local>,
        staff_name: impl Into<String>,
        total: i64,
    ) {
        let mut g = self.inner.write().await;
        g.entry(tenant_id.to_string()).or_default().orders.push((
            finalized_at,
            PaidOrder {
                total,
                staff_name: staff_name.into(),
            },
        ));
    }

    pub async fn add_occupied_table(
        &self,
        tenant_id: &str,
        table: impl Into<String>,
        staff_name: impl Into<String>,
        occupied_since: DateTime<Local>,
    ) {
        let mut g = self.inner.write().await;
        g.entry(tenant_id.to_string())
            .or_default()
            .tables
            .push(OccupiedTable {
                table: table.into(),
                staff_name: staff_name.into(),
                occupied_since,
            });
    }

    pub async fn set_active_orders(&self, tenant_id: &str, count: u64) {
        let mut g = self.inner.write().await;
        g.entry(tenant_id.to_string()).or_default().active_orders = count;
    }

    /// When true, every query fails with `DataError::Unavailable`.
    pub async fn set_failing(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    async fn check_failing(&self) -> Result<(), DataError> {
        if *self.fail.read().await {
            Err(DataError::Unavailable("provider failure injected".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DataProvider for MemoryProvider {
    async fn paid_orders(
        &self,
        tenant_id: &str,
        from: DateTime<Local>,
        to: DateTime<Local>,
    ) -> Result<Vec<PaidOrder>, DataError> {
        self.check_failing().await?;
        let g = self.inner.read().await;
        Ok(g.get(tenant_id)
            .map(|d| {
                d.orders
                    .iter()
                    .filter(|(at, _)| *at >= from && *at < to)
                    .map(|(_, order)| order.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn active_orders(&self, tenant_id: &str) -> Result<u64, DataError> {
        self.check_failing().await?;
        let g = self.inner.read().await;
        Ok(g.get(tenant_id).map(|d| d.active_orders).unwrap_or(0))
    }

    async fn occupied_tables(&self, tenant_id: &str) -> Result<Vec<OccupiedTable>, DataError> {
        self.check_failing().await?;
        let g = self.inner.read().await;
        Ok(g.get(tenant_id).map(|d| d.tables.clone()).unwrap_or_default())
    }

    async fn tenant_display_name(&self, tenant_id: &str) -> Result<Option<String>, DataError> {
        self.check_failing().await?;
        let g = self.inner.read().await;
        Ok(g.get(tenant_id).and_then(|d| d.display_name.clone()))
    }
}
