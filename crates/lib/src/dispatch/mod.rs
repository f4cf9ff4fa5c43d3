//! Conversation dispatcher: route one inbound message to a command handler
//! or to the resolution of a pending offer, and produce the reply texts.
//!
//! Priority order per message: reset-to-menu token, then pending context,
//! then the top-level command table, then the default reply. Handler failures
//! (data provider down or slow) are contained to the message: the user gets a
//! generic apology and the session is untouched.

mod commands;
mod context;
pub mod replies;

pub use commands::{match_command, match_resolution, normalize, Command, Resolution};
pub use context::{ContextKind, ContextStore, ConversationContext};

use crate::data::{DataError, DataProvider, PaidOrder};
use chrono::{DateTime, Days, Local, NaiveDate};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Dispatches inbound messages for all tenants; holds the context store.
pub struct Dispatcher {
    data: Arc<dyn DataProvider>,
    contexts: ContextStore,
    query_timeout: Duration,
}

impl Dispatcher {
    pub fn new(data: Arc<dyn DataProvider>, context_ttl: Duration, query_timeout: Duration) -> Self {
        Self {
            data,
            contexts: ContextStore::new(context_ttl),
            query_timeout,
        }
    }

    /// Handle one inbound message and return the replies to send, in order.
    pub async fn handle(&self, tenant_id: &str, user_id: &str, raw_text: &str) -> Vec<String> {
        self.handle_at(tenant_id, user_id, raw_text, Local::now()).await
    }

    /// Same as `handle` with an injected clock, so day boundaries are testable.
    pub async fn handle_at(
        &self,
        tenant_id: &str,
        user_id: &str,
        raw_text: &str,
        now: DateTime<Local>,
    ) -> Vec<String> {
        let text = normalize(raw_text);

        // Reset always wins, even over a pending offer.
        if commands::is_reset(&text) {
            self.contexts.clear(tenant_id, user_id).await;
            let name = match self.bounded(self.data.tenant_display_name(tenant_id)).await {
                Ok(Some(name)) => name,
                Ok(None) => tenant_id.to_string(),
                Err(e) => {
                    log::warn!("[{}] display name lookup failed: {}", tenant_id, e);
                    replies::GENERIC_TENANT_LABEL.to_string()
                }
            };
            return vec![replies::main_menu(&name)];
        }

        // A pending offer consumes the reply whatever it says.
        if let Some(context) = self.contexts.take(tenant_id, user_id).await {
            return vec![resolve_context(context, &text, now)];
        }

        match match_command(&text) {
            Some(Command::BillingToday) => self.billing_today(tenant_id, user_id, now).await,
            Some(Command::BillingYesterday) => self.billing_yesterday(tenant_id, now).await,
            Some(Command::OccupiedTables) => self.occupied_tables(tenant_id, user_id).await,
            Some(Command::ActiveOrders) => self.active_orders(tenant_id).await,
            Some(Command::TopStaff) => self.top_staff(tenant_id, now).await,
            Some(Command::Help) => vec![replies::help()],
            None => vec![replies::not_understood()],
        }
    }

    /// Wrap a data-provider call in the configured bounded wait.
    async fn bounded<T, F>(&self, query: F) -> Result<T, DataError>
    where
        F: Future<Output = Result<T, DataError>>,
    {
        match tokio::time::timeout(self.query_timeout, query).await {
            Ok(result) => result,
            Err(_) => Err(DataError::Timeout),
        }
    }

    async fn billing_today(
        &self,
        tenant_id: &str,
        user_id: &str,
        now: DateTime<Local>,
    ) -> Vec<String> {
        let Some((from, to)) = day_range(now.date_naive()) else {
            return vec![replies::handler_error()];
        };
        let orders = match self.bounded(self.data.paid_orders(tenant_id, from, to)).await {
            Ok(orders) => orders,
            Err(e) => {
                log::warn!("[{}] paid orders query failed: {}", tenant_id, e);
                return vec![replies::handler_error()];
            }
        };
        if orders.is_empty() {
            return vec![replies::no_sales_today()];
        }
        let total: i64 = orders.iter().map(|o| o.total).sum();
        let by_staff = aggregate_by_staff(&orders);
        self.contexts
            .set(
                tenant_id,
                user_id,
                ConversationContext::new(ContextKind::BillingDetail { total, by_staff }),
            )
            .await;
        vec![replies::billing_today(total, orders.len())]
    }

    async fn billing_yesterday(&self, tenant_id: &str, now: DateTime<Local>) -> Vec<String> {
        let Some(yesterday) = now.date_naive().checked_sub_days(Days::new(1)) else {
            return vec![replies::handler_error()];
        };
        let Some((from, to)) = day_range(yesterday) else {
            return vec![replies::handler_error()];
        };
        let orders = match self.bounded(self.data.paid_orders(tenant_id, from, to)).await {
            Ok(orders) => orders,
            Err(e) => {
                log::warn!("[{}] paid orders query failed: {}", tenant_id, e);
                return vec![replies::handler_error()];
            }
        };
        if orders.is_empty() {
            return vec![replies::no_sales_yesterday()];
        }
        let total: i64 = orders.iter().map(|o| o.total).sum();
        vec![replies::billing_yesterday(total, orders.len())]
    }

    async fn occupied_tables(&self, tenant_id: &str, user_id: &str) -> Vec<String> {
        let tables = match self.bounded(self.data.occupied_tables(tenant_id)).await {
            Ok(tables) => tables,
            Err(e) => {
                log::warn!("[{}] occupied tables query failed: {}", tenant_id, e);
                return vec![replies::handler_error()];
            }
        };
        if tables.is_empty() {
            return vec![replies::no_occupied_tables()];
        }
        let count = tables.len();
        self.contexts
            .set(
                tenant_id,
                user_id,
                ConversationContext::new(ContextKind::TableDetail { tables }),
            )
            .await;
        vec![replies::occupied_tables(count)]
    }

    async fn active_orders(&self, tenant_id: &str) -> Vec<String> {
        match self.bounded(self.data.active_orders(tenant_id)).await {
            Ok(count) => vec![replies::active_orders(count)],
            Err(e) => {
                log::warn!("[{}] active orders query failed: {}", tenant_id, e);
                vec![replies::handler_error()]
            }
        }
    }

    async fn top_staff(&self, tenant_id: &str, now: DateTime<Local>) -> Vec<String> {
        let Some((from, to)) = day_range(now.date_naive()) else {
            return vec![replies::handler_error()];
        };
        let orders = match self.bounded(self.data.paid_orders(tenant_id, from, to)).await {
            Ok(orders) => orders,
            Err(e) => {
                log::warn!("[{}] paid orders query failed: {}", tenant_id, e);
                return vec![replies::handler_error()];
            }
        };
        let mut by_staff = aggregate_by_staff(&orders);
        // Stable descending sort: ties keep first-seen order.
        by_staff.sort_by(|a, b| b.1.cmp(&a.1));
        match by_staff.first() {
            Some((name, amount)) => vec![replies::top_staff(name, *amount)],
            None => vec![replies::no_staff_sales()],
        }
    }
}

/// Render the resolution of a pending offer. Affirm shows the detail for the
/// context's kind; decline and anything unrecognized get the generic ack.
fn resolve_context(context: ConversationContext, text: &str, now: DateTime<Local>) -> String {
    match match_resolution(text) {
        Resolution::Affirm => match context.kind {
            ContextKind::BillingDetail { total, by_staff } => {
                replies::billing_detail(total, &by_staff)
            }
            ContextKind::TableDetail { tables } => replies::table_detail(&tables, now),
        },
        Resolution::Decline | Resolution::Other => replies::decline_ack(),
    }
}

/// Per-staff subtotals in first-seen order.
fn aggregate_by_staff(orders: &[PaidOrder]) -> Vec<(String, i64)> {
    let mut by_staff: Vec<(String, i64)> = Vec::new();
    for order in orders {
        match by_staff.iter_mut().find(|(name, _)| *name == order.staff_name) {
            Some((_, subtotal)) => *subtotal += order.total,
            None => by_staff.push((order.staff_name.clone(), order.total)),
        }
    }
    by_staff
}

/// Midnight-aligned half-open day range `[00:00 of day, 00:00 of next day)`.
/// None only when the local timezone has no unambiguous midnight that day.
fn day_range(day: NaiveDate) -> Option<(DateTime<Local>, DateTime<Local>)> {
    let start = day.and_hms_opt(0, 0, 0)?.and_local_timezone(Local).single()?;
    let next = day.checked_add_days(Days::new(1))?;
    let end = next.and_hms_opt(0, 0, 0)?.and_local_timezone(Local).single()?;
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemoryProvider;
    use chrono::TimeZone;

    const TTL: Duration = Duration::from_secs(600);
    const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

    fn dispatcher(provider: Arc<MemoryProvider>) -> Dispatcher {
        Dispatcher::new(provider, TTL, QUERY_TIMEOUT)
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 10, h, m, s).unwrap()
    }

    #[tokio::test]
    async fn reset_token_returns_menu_with_display_name() {
        let provider = Arc::new(MemoryProvider::new());
        provider.set_display_name("t1", "La Esquina").await;
        let d = dispatcher(provider);
        let replies = d.handle_at("t1", "u1", "  HOLA  ", at(12, 0, 0)).await;
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("La Esquina"));
        assert!(replies[0].contains("A)"));
        assert!(replies[0].contains("D)"));
    }

    #[tokio::test]
    async fn reset_clears_pending_context() {
        let provider = Arc::new(MemoryProvider::new());
        provider.add_paid_order("t1", at(11, 0, 0), "Ana", 1000).await;
        let d = dispatcher(provider);
        d.handle_at("t1", "u1", "a", at(12, 0, 0)).await;
        let menu = d.handle_at("t1", "u1", "menu", at(12, 0, 30)).await;
        assert!(menu[0].contains("asistente"));
        // "a" no longer resolves an offer; it starts the billing command again
        let again = d.handle_at("t1", "u1", "a", at(12, 1, 0)).await;
        assert!(again[0].contains("Hoy se facturó"), "got: {}", again[0]);
    }

    #[tokio::test]
    async fn billing_round_trip_breakdown_sums_to_total() {
        let provider = Arc::new(MemoryProvider::new());
        provider.add_paid_order("t1", at(10, 0, 0), "Ana", 12500).await;
        provider.add_paid_order("t1", at(11, 30, 0), "Bruno", 8000).await;
        provider.add_paid_order("t1", at(12, 15, 0), "Ana", 4300).await;
        let d = dispatcher(provider);

        let offer = d.handle_at("t1", "u1", "facturó hoy", at(13, 0, 0)).await;
        assert!(offer[0].contains("$24.800"), "got: {}", offer[0]);
        assert!(offer[0].contains("3 pedidos"));

        let detail = d.handle_at("t1", "u1", "a", at(13, 0, 20)).await;
        assert!(detail[0].contains("Ana: $16.800"), "got: {}", detail[0]);
        assert!(detail[0].contains("Bruno: $8.000"));
        assert!(detail[0].contains("Total: $24.800"));

        // context consumed: next "a" is a fresh command
        let fresh = d.handle_at("t1", "u1", "a", at(13, 1, 0)).await;
        assert!(fresh[0].contains("Hoy se facturó"));
    }

    #[tokio::test]
    async fn zero_sales_today_installs_no_context() {
        let provider = Arc::new(MemoryProvider::new());
        let d = dispatcher(provider);
        let replies = d.handle_at("t1", "u1", "a", at(9, 0, 0)).await;
        assert_eq!(replies[0], crate::dispatch::replies::no_sales_today());
        // no offer pending, so "a" matches the command again
        let again = d.handle_at("t1", "u1", "a", at(9, 1, 0)).await;
        assert_eq!(again[0], crate::dispatch::replies::no_sales_today());
    }

    #[tokio::test]
    async fn day_boundary_is_half_open() {
        let provider = Arc::new(MemoryProvider::new());
        // yesterday 23:59:59.999 and today 00:00:00.000
        let last_moment = Local
            .with_ymd_and_hms(2026, 3, 9, 23, 59, 59)
            .unwrap()
            .checked_add_signed(chrono::Duration::milliseconds(999))
            .unwrap();
        let midnight = Local.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap();
        provider.add_paid_order("t1", last_moment, "Ana", 1000).await;
        provider.add_paid_order("t1", midnight, "Bruno", 2000).await;
        let d = dispatcher(provider);

        let today = d.handle_at("t1", "u1", "facturó hoy", at(23, 59, 59)).await;
        assert!(today[0].contains("$2.000"), "today excludes yesterday: {}", today[0]);
        assert!(today[0].contains("1 pedidos"));

        d.handle_at("t1", "u1", "no", at(23, 59, 59)).await; // consume offer
        let yesterday = d.handle_at("t1", "u1", "facturó ayer", at(12, 0, 0)).await;
        assert!(yesterday[0].contains("$1.000"), "got: {}", yesterday[0]);
    }

    #[tokio::test]
    async fn occupied_tables_flow_with_decline() {
        let provider = Arc::new(MemoryProvider::new());
        for n in 1..=3 {
            provider
                .add_occupied_table("t1", n.to_string(), "Ana", at(11, 0, 0))
                .await;
        }
        let d = dispatcher(provider);
        let offer = d.handle_at("t1", "u1", "mesa ocupada", at(12, 0, 0)).await;
        assert!(offer[0].contains("3 mesas ocupadas"), "got: {}", offer[0]);

        let ack = d.handle_at("t1", "u1", "no", at(12, 0, 10)).await;
        assert_eq!(ack[0], crate::dispatch::replies::decline_ack());
        assert!(!ack[0].contains("Mesa"), "decline must not list tables");
    }

    #[tokio::test]
    async fn occupied_tables_detail_shows_elapsed() {
        let provider = Arc::new(MemoryProvider::new());
        provider.add_occupied_table("t1", "4", "Bruno", at(10, 30, 0)).await;
        provider.add_occupied_table("t1", "7", "Ana", at(12, 10, 0)).await;
        let d = dispatcher(provider);
        d.handle_at("t1", "u1", "c", at(12, 45, 0)).await;
        let detail = d.handle_at("t1", "u1", "sí", at(12, 45, 0)).await;
        assert!(detail[0].contains("Mesa 4: Bruno, hace 2 h 15 min"), "got: {}", detail[0]);
        assert!(detail[0].contains("Mesa 7: Ana, hace 35 min"));
    }

    #[tokio::test]
    async fn active_orders_count_and_none() {
        let provider = Arc::new(MemoryProvider::new());
        let d = dispatcher(provider.clone());
        let none = d.handle_at("t1", "u1", "pedidos activos", at(12, 0, 0)).await;
        assert_eq!(none[0], crate::dispatch::replies::active_orders(0));
        provider.set_active_orders("t1", 5).await;
        let five = d.handle_at("t1", "u1", "pedidos activos", at(12, 1, 0)).await;
        assert!(five[0].contains("5 pedidos activos"));
    }

    #[tokio::test]
    async fn top_staff_descending_with_first_seen_tie_break() {
        let provider = Arc::new(MemoryProvider::new());
        provider.add_paid_order("t1", at(10, 0, 0), "Ana", 3000).await;
        provider.add_paid_order("t1", at(10, 5, 0), "Bruno", 3000).await;
        let d = dispatcher(provider);
        let reply = d.handle_at("t1", "u1", "mozo", at(12, 0, 0)).await;
        assert!(reply[0].contains("Ana"), "tie goes to first seen: {}", reply[0]);
        assert!(reply[0].contains("$3.000"));
    }

    #[tokio::test]
    async fn top_staff_without_sales() {
        let provider = Arc::new(MemoryProvider::new());
        let d = dispatcher(provider);
        let reply = d.handle_at("t1", "u1", "d", at(12, 0, 0)).await;
        assert_eq!(reply[0], crate::dispatch::replies::no_staff_sales());
    }

    #[tokio::test]
    async fn unrecognized_without_context_gets_default_reply() {
        let provider = Arc::new(MemoryProvider::new());
        let d = dispatcher(provider);
        let reply = d.handle_at("t1", "u1", "b", at(12, 0, 0)).await;
        assert_eq!(reply[0], crate::dispatch::replies::not_understood());
        let reply = d.handle_at("t1", "u1", "cerrá la caja", at(12, 0, 5)).await;
        assert_eq!(reply[0], crate::dispatch::replies::not_understood());
    }

    #[tokio::test]
    async fn provider_failure_gets_apology_and_session_survives() {
        let provider = Arc::new(MemoryProvider::new());
        provider.set_failing(true).await;
        let d = dispatcher(provider.clone());
        let reply = d.handle_at("t1", "u1", "a", at(12, 0, 0)).await;
        assert_eq!(reply[0], crate::dispatch::replies::handler_error());

        // recovery: same dispatcher keeps answering once the provider is back
        provider.set_failing(false).await;
        provider.add_paid_order("t1", at(11, 0, 0), "Ana", 500).await;
        let reply = d.handle_at("t1", "u1", "a", at(12, 1, 0)).await;
        assert!(reply[0].contains("Hoy se facturó"));
    }

    #[tokio::test]
    async fn display_name_failure_falls_back_to_generic_label() {
        let provider = Arc::new(MemoryProvider::new());
        provider.set_failing(true).await;
        let d = dispatcher(provider);
        let reply = d.handle_at("t1", "u1", "hola", at(12, 0, 0)).await;
        assert!(reply[0].contains(crate::dispatch::replies::GENERIC_TENANT_LABEL));
    }

    #[tokio::test]
    async fn contexts_are_per_user() {
        let provider = Arc::new(MemoryProvider::new());
        provider.add_paid_order("t1", at(11, 0, 0), "Ana", 1000).await;
        let d = dispatcher(provider);
        d.handle_at("t1", "u1", "a", at(12, 0, 0)).await;
        // u2 has no pending offer; their "a" is the billing command
        let other = d.handle_at("t1", "u2", "a", at(12, 0, 5)).await;
        assert!(other[0].contains("Hoy se facturó"));
        // u1's offer is still pending
        let detail = d.handle_at("t1", "u1", "sí", at(12, 0, 10)).await;
        assert!(detail[0].contains("Detalle por mozo"));
    }
}
