//! Purchase status reconciliation pass.
//!
//! Loads every order and every order-linked sheet row of a tenant, matches
//! them with [`SourcingIndex`] and writes the derived status back to each
//! matched order. A failed read aborts the pass; a failed write is logged and
//! the pass moves on to the next order.

use serde::Serialize;
use thiserror::Error;
use tracing::{Instrument, debug, info, info_span, warn};

use fulfillment_core::{DomainError, PageRequest, RecordId, TenantId};
use fulfillment_sourcing::{MatchOutcome, MatchType, SHIPMENT_INFO_PREFIX, SourcingIndex};

use crate::error::StoreError;
use crate::paging::collect_all;
use crate::stores::{OrderStore, SourcingSheetStore};

#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("failed to load orders: {0}")]
    LoadOrders(#[source] StoreError),

    #[error("failed to load sourcing sheet: {0}")]
    LoadSheet(#[source] StoreError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// One matched, non-cancelled order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub order_id: RecordId,
    pub order_number: String,
    pub recipient_name: String,
    pub matched_row_ref: String,
    pub match_type: MatchType,
    pub purchase_status: String,
    /// Whether the status write succeeded.
    pub persisted: bool,
}

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub tenant_id: TenantId,
    /// Orders whose status write succeeded.
    pub matched_count: usize,
    pub scanned_orders: usize,
    pub unmatched_count: usize,
    pub cancelled_count: usize,
    pub failed_writes: usize,
    pub results: Vec<MatchResult>,
}

impl ReconcileReport {
    fn empty(tenant_id: TenantId, scanned_orders: usize) -> Self {
        Self {
            tenant_id,
            matched_count: 0,
            scanned_orders,
            unmatched_count: 0,
            cancelled_count: 0,
            failed_writes: 0,
            results: Vec::new(),
        }
    }
}

/// Reconciles order purchase statuses against the sourcing sheet.
#[derive(Debug, Clone)]
pub struct OrderMatcher<O, S> {
    orders: O,
    sheet: S,
    first_page: PageRequest,
}

impl<O, S> OrderMatcher<O, S>
where
    O: OrderStore,
    S: SourcingSheetStore,
{
    pub fn new(orders: O, sheet: S) -> Self {
        Self {
            orders,
            sheet,
            first_page: PageRequest::default(),
        }
    }

    /// Override the batch read size (1..=`MAX_PAGE_SIZE`).
    pub fn with_page_size(mut self, page_size: u32) -> Result<Self, MatcherError> {
        self.first_page = PageRequest::first(page_size)?;
        Ok(self)
    }

    pub fn page_size(&self) -> u32 {
        self.first_page.page_size
    }

    /// Run one full pass for a tenant.
    pub async fn reconcile(&self, tenant_id: TenantId) -> Result<ReconcileReport, MatcherError> {
        let span = info_span!("reconcile_purchase_status", tenant_id = %tenant_id);
        self.run(tenant_id).instrument(span).await
    }

    async fn run(&self, tenant_id: TenantId) -> Result<ReconcileReport, MatcherError> {
        let orders = collect_all(self.first_page, |page| self.orders.page(tenant_id, page))
            .await
            .map_err(MatcherError::LoadOrders)?;
        let rows = collect_all(self.first_page, |page| {
            self.sheet.page_with_prefix(tenant_id, SHIPMENT_INFO_PREFIX, page)
        })
        .await
        .map_err(MatcherError::LoadSheet)?;

        let index = SourcingIndex::new(rows);
        debug!(orders = orders.len(), sheet_rows = index.len(), "loaded reconciliation inputs");

        let mut report = ReconcileReport::empty(tenant_id, orders.len());

        for order in &orders {
            let (found, status) = match index.evaluate(order) {
                MatchOutcome::Unmatched => {
                    report.unmatched_count += 1;
                    continue;
                }
                MatchOutcome::Cancelled(_) => {
                    report.cancelled_count += 1;
                    continue;
                }
                MatchOutcome::Matched { found, status } => (found, status),
            };

            let label = status.label();
            let persisted = match self
                .orders
                .write_purchase_status(tenant_id, order.id, &label)
                .await
            {
                Ok(()) => {
                    report.matched_count += 1;
                    true
                }
                Err(err) => {
                    warn!(order_id = %order.id, error = %err, "failed to write purchase status");
                    report.failed_writes += 1;
                    false
                }
            };

            report.results.push(MatchResult {
                order_id: order.id,
                order_number: order.order_number.clone(),
                recipient_name: order.recipient_name.clone(),
                matched_row_ref: found.row.row_ref.clone(),
                match_type: found.match_type,
                purchase_status: label,
                persisted,
            });
        }

        info!(
            scanned = report.scanned_orders,
            matched = report.matched_count,
            unmatched = report.unmatched_count,
            cancelled = report.cancelled_count,
            failed_writes = report.failed_writes,
            "purchase status pass complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use fulfillment_sourcing::{Order, SheetTag, ShipmentInfo, SourcingRow};

    use crate::stores::{InMemoryOrderStore, InMemorySourcingSheetStore};

    fn row(
        tenant_id: TenantId,
        id: i64,
        info: &str,
        (ordered, imported, shipped): (i64, i64, i64),
        note: &str,
        tag: &str,
    ) -> SourcingRow {
        SourcingRow {
            id: RecordId::new(id),
            tenant_id,
            row_ref: format!("R{id}"),
            shipment_info: ShipmentInfo::new(info),
            quantity_ordered: ordered,
            quantity_imported: imported,
            quantity_shipped: shipped,
            composition_note: note.to_string(),
            sheet_tag: SheetTag::parse(tag),
        }
    }

    fn order(tenant_id: TenantId, id: i64, number: &str, recipient: &str) -> Order {
        Order::new(RecordId::new(id), tenant_id, number, recipient)
    }

    fn status_of(store: &InMemoryOrderStore, tenant_id: TenantId, id: i64) -> Option<String> {
        store
            .get(tenant_id, RecordId::new(id))
            .unwrap()
            .and_then(|o| o.purchase_status)
    }

    #[tokio::test]
    async fn writes_derived_statuses() {
        let t = TenantId::new();
        let orders = Arc::new(InMemoryOrderStore::with_orders([
            order(t, 1, "ORD-100", "Kim"),
            order(t, 2, "ORD-200", "Lee"),
            order(t, 3, "", "Park"),
            order(t, 4, "ORD-400", "Nobody"),
        ]));
        let sheet = InMemorySourcingSheetStore::with_rows([
            row(t, 10, "P-ORD-100 Kim", (5, 5, 5), "BOX-1", "N"),
            row(t, 11, "P-ORD-200", (5, 5, 0), "", "P"),
            row(t, 12, "P- Park ", (5, 2, 0), "", "N"),
        ]);

        let matcher = OrderMatcher::new(orders.clone(), sheet);
        let report = matcher.reconcile(t).await.unwrap();

        assert_eq!(report.matched_count, 3);
        assert_eq!(report.scanned_orders, 4);
        assert_eq!(report.unmatched_count, 1);
        assert_eq!(status_of(&orders, t, 1).as_deref(), Some("SHIPPED\nBOX-1"));
        assert_eq!(status_of(&orders, t, 2).as_deref(), Some("RECEIVED"));
        assert_eq!(status_of(&orders, t, 3).as_deref(), Some("NEW"));
        assert_eq!(status_of(&orders, t, 4), None);

        let park = report.results.iter().find(|r| r.order_id == RecordId::new(3)).unwrap();
        assert_eq!(park.match_type, MatchType::RecipientName);
        assert_eq!(park.matched_row_ref, "R12");
        assert!(report.results.iter().all(|r| r.persisted));
    }

    #[tokio::test]
    async fn first_sheet_row_wins_for_order_numbers() {
        let t = TenantId::new();
        let orders = Arc::new(InMemoryOrderStore::with_orders([order(t, 1, "A7", "Kim")]));
        let sheet = InMemorySourcingSheetStore::with_rows([
            row(t, 20, "P-batch A7/A8", (1, 0, 0), "", "O"),
            row(t, 21, "P-A7", (1, 1, 1), "", "N"),
            row(t, 22, "P-Kim", (1, 1, 0), "", "N"),
        ]);

        let report = OrderMatcher::new(orders.clone(), sheet).reconcile(t).await.unwrap();

        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].matched_row_ref, "R20");
        assert_eq!(report.results[0].match_type, MatchType::OrderNumber);
        assert_eq!(status_of(&orders, t, 1).as_deref(), Some("IN_PROGRESS"));
    }

    #[tokio::test]
    async fn cancelled_rows_are_neither_written_nor_counted() {
        let t = TenantId::new();
        let mut seeded = order(t, 1, "ORD-9", "Kim");
        seeded.purchase_status = Some("PAID".to_string());
        let orders = Arc::new(InMemoryOrderStore::with_orders([seeded]));
        let sheet = InMemorySourcingSheetStore::with_rows([row(t, 30, "P-ORD-9", (2, 2, 2), "", "C")]);

        let report = OrderMatcher::new(orders.clone(), sheet).reconcile(t).await.unwrap();

        assert_eq!(report.matched_count, 0);
        assert_eq!(report.cancelled_count, 1);
        assert!(report.results.is_empty());
        assert_eq!(status_of(&orders, t, 1).as_deref(), Some("PAID"));
    }

    #[tokio::test]
    async fn rows_without_prefix_are_ignored() {
        let t = TenantId::new();
        let orders = Arc::new(InMemoryOrderStore::with_orders([order(t, 1, "ORD-1", "Kim")]));
        let sheet = InMemorySourcingSheetStore::with_rows([row(t, 40, "restock ORD-1", (1, 1, 1), "", "N")]);

        let report = OrderMatcher::new(orders, sheet).reconcile(t).await.unwrap();

        assert_eq!(report.matched_count, 0);
        assert_eq!(report.unmatched_count, 1);
    }

    #[tokio::test]
    async fn second_pass_is_identical() {
        let t = TenantId::new();
        let orders = Arc::new(InMemoryOrderStore::with_orders(
            (1..=25).map(|i| order(t, i, &format!("ORD-{i:03}"), "")),
        ));
        let sheet = Arc::new(InMemorySourcingSheetStore::with_rows(
            (1..=25).map(|i| row(t, 100 + i, &format!("P-ORD-{i:03}"), (4, i % 5, 0), "", "P")),
        ));

        let matcher = OrderMatcher::new(orders.clone(), sheet).with_page_size(7).unwrap();
        let first = matcher.reconcile(t).await.unwrap();
        let second = matcher.reconcile(t).await.unwrap();

        assert_eq!(first.matched_count, 25);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn other_tenants_are_untouched() {
        let a = TenantId::new();
        let b = TenantId::new();
        let orders = Arc::new(InMemoryOrderStore::with_orders([
            order(a, 1, "ORD-1", "Kim"),
            order(b, 2, "ORD-1", "Kim"),
        ]));
        let sheet = InMemorySourcingSheetStore::with_rows([row(a, 50, "P-ORD-1", (1, 1, 0), "", "N")]);

        let report = OrderMatcher::new(orders.clone(), sheet).reconcile(b).await.unwrap();

        assert_eq!(report.matched_count, 0);
        assert_eq!(status_of(&orders, b, 2), None);
    }

    /// Fails every status write for the listed order ids.
    struct FlakyWrites {
        inner: InMemoryOrderStore,
        fail_ids: Vec<RecordId>,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl OrderStore for FlakyWrites {
        async fn page(&self, tenant_id: TenantId, page: PageRequest) -> Result<Vec<Order>, StoreError> {
            self.inner.page(tenant_id, page).await
        }

        async fn write_purchase_status(
            &self,
            tenant_id: TenantId,
            order_id: RecordId,
            purchase_status: &str,
        ) -> Result<(), StoreError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.fail_ids.contains(&order_id) {
                return Err(StoreError::write("write_purchase_status", "connection reset"));
            }
            self.inner.write_purchase_status(tenant_id, order_id, purchase_status).await
        }
    }

    #[tokio::test]
    async fn failed_writes_do_not_stop_the_pass() {
        let t = TenantId::new();
        let orders = Arc::new(FlakyWrites {
            inner: InMemoryOrderStore::with_orders([
                order(t, 1, "ORD-1", ""),
                order(t, 2, "ORD-2", ""),
                order(t, 3, "ORD-3", ""),
            ]),
            fail_ids: vec![RecordId::new(2)],
            attempts: AtomicUsize::new(0),
        });
        let sheet = InMemorySourcingSheetStore::with_rows([
            row(t, 1, "P-ORD-1", (1, 0, 0), "", "N"),
            row(t, 2, "P-ORD-2", (1, 0, 0), "", "N"),
            row(t, 3, "P-ORD-3", (1, 0, 0), "", "N"),
        ]);

        let report = OrderMatcher::new(orders.clone(), sheet).reconcile(t).await.unwrap();

        assert_eq!(orders.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(report.matched_count, 2);
        assert_eq!(report.failed_writes, 1);
        assert_eq!(report.results.len(), 3);
        let failed = report.results.iter().find(|r| !r.persisted).unwrap();
        assert_eq!(failed.order_id, RecordId::new(2));
    }

    struct BrokenSheet;

    #[async_trait]
    impl SourcingSheetStore for BrokenSheet {
        async fn page_with_prefix(
            &self,
            _tenant_id: TenantId,
            _prefix: &str,
            _page: PageRequest,
        ) -> Result<Vec<SourcingRow>, StoreError> {
            Err(StoreError::read("page_sourcing_rows", "timeout"))
        }
    }

    #[tokio::test]
    async fn sheet_read_failure_aborts_before_any_write() {
        let t = TenantId::new();
        let orders = Arc::new(InMemoryOrderStore::with_orders([order(t, 1, "ORD-1", "")]));

        let err = OrderMatcher::new(orders.clone(), BrokenSheet).reconcile(t).await.unwrap_err();

        assert!(matches!(err, MatcherError::LoadSheet(StoreError::Read { .. })));
        assert_eq!(status_of(&orders, t, 1), None);
    }

    #[test]
    fn page_size_is_validated() {
        let matcher = OrderMatcher::new(InMemoryOrderStore::new(), InMemorySourcingSheetStore::new());
        assert!(matches!(matcher.with_page_size(0), Err(MatcherError::Domain(_))));
    }
}
