//! Shipment stock allocation service.
//!
//! Each call runs read, plan and apply for one `(tenant, barcode)` while
//! holding that key's lock, so calls on the same key never interleave. A plan
//! that cannot be satisfied returns an error before anything is written.

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use fulfillment_core::{Barcode, DomainError, TenantId};
use fulfillment_shipments::{AllocationError, ReservationChangeSet, StockSnapshot, TargetPlan};

use crate::error::StoreError;
use crate::locks::KeyedLocks;
use crate::stores::{ShipmentReservationStore, WarehouseStockStore};

#[derive(Debug, Error)]
pub enum AllocatorError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error("failed to load stock state: {0}")]
    StoreRead(#[source] StoreError),

    #[error("failed to apply reservation changes: {0}")]
    StoreWrite(#[source] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationAction {
    Unchanged,
    Cleared,
    Replaced,
    Increased,
    Decreased,
}

/// What a successful allocator call did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationOutcome {
    pub tenant_id: TenantId,
    pub barcode: Barcode,
    pub action: AllocationAction,
    pub reserved_before: i64,
    pub reserved_after: i64,
}

impl AllocationOutcome {
    /// Human-readable summary.
    pub fn message(&self) -> String {
        let b = &self.barcode;
        match self.action {
            AllocationAction::Unchanged => {
                format!("barcode {b} already has {} units reserved", self.reserved_after)
            }
            AllocationAction::Cleared => {
                format!("released all {} reserved units of barcode {b}", self.reserved_before)
            }
            AllocationAction::Replaced => format!(
                "reserved {} units of barcode {b} (previously {})",
                self.reserved_after, self.reserved_before
            ),
            AllocationAction::Increased => format!(
                "reserved {} more units of barcode {b} ({} total)",
                self.reserved_after - self.reserved_before,
                self.reserved_after
            ),
            AllocationAction::Decreased => format!(
                "released {} units of barcode {b} ({} still reserved)",
                self.reserved_before - self.reserved_after,
                self.reserved_after
            ),
        }
    }
}

/// Reserves warehouse stock for outbound shipments.
#[derive(Debug)]
pub struct ShipmentAllocator<W, R> {
    stock: W,
    reservations: R,
    locks: KeyedLocks<(TenantId, Barcode)>,
}

impl<W, R> ShipmentAllocator<W, R>
where
    W: WarehouseStockStore,
    R: ShipmentReservationStore,
{
    pub fn new(stock: W, reservations: R) -> Self {
        Self {
            stock,
            reservations,
            locks: KeyedLocks::new(),
        }
    }

    /// Make the reserved total for `barcode` exactly `quantity`.
    ///
    /// Equal to the current total: nothing is written. Zero: every
    /// reservation is dropped. Otherwise the reservation set is replaced by
    /// a fresh draw over stock records in id order.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, barcode = %barcode), err)]
    pub async fn set_target(
        &self,
        tenant_id: TenantId,
        barcode: &Barcode,
        quantity: i64,
    ) -> Result<AllocationOutcome, AllocatorError> {
        let _guard = self.locks.lock((tenant_id, barcode.clone())).await;
        let snapshot = self.load(tenant_id, barcode).await?;

        let plan = snapshot.plan_target(quantity, Utc::now()).inspect_err(log_rejection)?;
        let action = match &plan {
            TargetPlan::Unchanged { .. } => AllocationAction::Unchanged,
            TargetPlan::Clear { .. } => AllocationAction::Cleared,
            TargetPlan::Replace { .. } => AllocationAction::Replaced,
        };

        self.commit(&snapshot, &plan.change_set(), action, plan.reserved_after())
            .await
    }

    /// Reserve `delta` more units from stock nobody has claimed yet.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, barcode = %barcode), err)]
    pub async fn increase(
        &self,
        tenant_id: TenantId,
        barcode: &Barcode,
        delta: i64,
    ) -> Result<AllocationOutcome, AllocatorError> {
        let _guard = self.locks.lock((tenant_id, barcode.clone())).await;
        let snapshot = self.load(tenant_id, barcode).await?;

        let changes = snapshot.plan_increase(delta, Utc::now()).inspect_err(log_rejection)?;
        let after = snapshot
            .reserved_total()
            .checked_add(delta)
            .ok_or_else(|| AllocationError::from(DomainError::invariant("reserved total overflows i64")))?;
        let action = if changes.is_empty() {
            AllocationAction::Unchanged
        } else {
            AllocationAction::Increased
        };
        self.commit(&snapshot, &changes, action, after).await
    }

    /// Release `delta` reserved units, newest reservation first.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, barcode = %barcode), err)]
    pub async fn decrease(
        &self,
        tenant_id: TenantId,
        barcode: &Barcode,
        delta: i64,
    ) -> Result<AllocationOutcome, AllocatorError> {
        let _guard = self.locks.lock((tenant_id, barcode.clone())).await;
        let snapshot = self.load(tenant_id, barcode).await?;

        let changes = snapshot.plan_decrease(delta).inspect_err(log_rejection)?;
        let after = snapshot.reserved_total() - delta;
        let action = if changes.is_empty() {
            AllocationAction::Unchanged
        } else {
            AllocationAction::Decreased
        };
        self.commit(&snapshot, &changes, action, after).await
    }

    async fn load(&self, tenant_id: TenantId, barcode: &Barcode) -> Result<StockSnapshot, AllocatorError> {
        let stock = self
            .stock
            .records_for_barcode(tenant_id, barcode)
            .await
            .map_err(AllocatorError::StoreRead)?;
        let reservations = self
            .reservations
            .reservations_for_barcode(tenant_id, barcode)
            .await
            .map_err(AllocatorError::StoreRead)?;

        let snapshot = StockSnapshot::new(tenant_id, barcode.clone(), stock, reservations)?;

        let over = snapshot.ledger().over_claimed(snapshot.stock());
        if !over.is_empty() {
            warn!(records = ?over, "reservations exceed the stock they were drawn from");
        }
        Ok(snapshot)
    }

    async fn commit(
        &self,
        snapshot: &StockSnapshot,
        changes: &ReservationChangeSet,
        action: AllocationAction,
        reserved_after: i64,
    ) -> Result<AllocationOutcome, AllocatorError> {
        if !changes.is_empty() {
            self.reservations
                .apply(snapshot.tenant_id(), snapshot.barcode(), changes)
                .await
                .map_err(AllocatorError::StoreWrite)?;
        }

        let outcome = AllocationOutcome {
            tenant_id: snapshot.tenant_id(),
            barcode: snapshot.barcode().clone(),
            action,
            reserved_before: snapshot.reserved_total(),
            reserved_after,
        };
        info!(
            action = ?outcome.action,
            before = outcome.reserved_before,
            after = outcome.reserved_after,
            "shipment reservations updated"
        );
        Ok(outcome)
    }
}

fn log_rejection(err: &AllocationError) {
    if let AllocationError::InsufficientStock {
        requested,
        available,
        shortfall,
        ..
    } = err
    {
        warn!(requested, available, shortfall, "insufficient stock for shipment");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use fulfillment_core::RecordId;
    use fulfillment_shipments::{ShipmentReservation, WarehouseStockRecord};

    use crate::stores::{InMemoryShipmentReservationStore, InMemoryWarehouseStockStore};

    type Allocator = ShipmentAllocator<Arc<InMemoryWarehouseStockStore>, Arc<InMemoryShipmentReservationStore>>;

    fn barcode() -> Barcode {
        Barcode::parse("8801234567890").unwrap()
    }

    fn stock(tenant_id: TenantId, id: i64, quantity: i64) -> WarehouseStockRecord {
        WarehouseStockRecord {
            id: RecordId::new(id),
            tenant_id,
            barcode: barcode(),
            quantity,
            location: format!("SHELF-{id}"),
            note: String::new(),
        }
    }

    fn setup(
        tenant_id: TenantId,
        records: &[(i64, i64)],
    ) -> (Allocator, Arc<InMemoryShipmentReservationStore>) {
        let stock_store = Arc::new(InMemoryWarehouseStockStore::with_records(
            records.iter().map(|&(id, qty)| stock(tenant_id, id, qty)),
        ));
        let reservations = Arc::new(InMemoryShipmentReservationStore::new());
        (ShipmentAllocator::new(stock_store, reservations.clone()), reservations)
    }

    fn reserved(store: &InMemoryShipmentReservationStore, tenant_id: TenantId) -> Vec<(i64, i64)> {
        store
            .all(tenant_id)
            .unwrap()
            .iter()
            .map(|r: &ShipmentReservation| (r.id.get(), r.quantity))
            .collect()
    }

    #[tokio::test]
    async fn replace_draws_records_in_id_order() {
        let t = TenantId::new();
        let (allocator, store) = setup(t, &[(2, 4), (1, 3)]);

        let outcome = allocator.set_target(t, &barcode(), 5).await.unwrap();

        assert_eq!(outcome.action, AllocationAction::Replaced);
        assert_eq!(outcome.reserved_after, 5);
        assert_eq!(reserved(&store, t), vec![(1, 3), (2, 2)]);
        let copied = &store.all(t).unwrap()[0];
        assert_eq!(copied.location, "SHELF-1");
    }

    #[tokio::test]
    async fn shortfall_leaves_prior_reservations_intact() {
        let t = TenantId::new();
        let (allocator, store) = setup(t, &[(1, 3), (2, 4)]);
        allocator.set_target(t, &barcode(), 2).await.unwrap();
        let writes = store.write_count();

        let err = allocator.set_target(t, &barcode(), 100).await.unwrap_err();

        match err {
            AllocatorError::Allocation(AllocationError::InsufficientStock {
                requested,
                available,
                shortfall,
                ..
            }) => {
                assert_eq!((requested, available, shortfall), (100, 7, 93));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(reserved(&store, t), vec![(1, 2)]);
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn increase_past_i64_is_rejected_without_writes() {
        let t = TenantId::new();
        // Record 9 is gone from stock but its reservation is still on the books.
        let stale = ShipmentReservation::drawn_from(&stock(t, 9, i64::MAX - 1), i64::MAX - 1, Utc::now());
        let stock_store = Arc::new(InMemoryWarehouseStockStore::with_records([stock(t, 1, 5)]));
        let store = Arc::new(InMemoryShipmentReservationStore::with_reservations([stale]));
        let allocator: Allocator = ShipmentAllocator::new(stock_store, store.clone());

        let err = allocator.increase(t, &barcode(), 5).await.unwrap_err();

        assert!(matches!(
            err,
            AllocatorError::Allocation(AllocationError::Domain(DomainError::InvariantViolation(_)))
        ));
        assert_eq!(store.write_count(), 0);
        assert_eq!(reserved(&store, t), vec![(9, i64::MAX - 1)]);
    }

    #[tokio::test]
    async fn same_target_writes_nothing() {
        let t = TenantId::new();
        let (allocator, store) = setup(t, &[(1, 3), (2, 4)]);
        allocator.set_target(t, &barcode(), 5).await.unwrap();
        let writes = store.write_count();

        let outcome = allocator.set_target(t, &barcode(), 5).await.unwrap();

        assert_eq!(outcome.action, AllocationAction::Unchanged);
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn zero_target_clears_every_row() {
        let t = TenantId::new();
        let (allocator, store) = setup(t, &[(1, 3), (2, 4)]);
        allocator.set_target(t, &barcode(), 6).await.unwrap();

        let outcome = allocator.set_target(t, &barcode(), 0).await.unwrap();

        assert_eq!(outcome.action, AllocationAction::Cleared);
        assert_eq!(outcome.reserved_before, 6);
        assert!(reserved(&store, t).is_empty());
    }

    #[tokio::test]
    async fn unknown_barcode_is_rejected() {
        let t = TenantId::new();
        let (allocator, store) = setup(t, &[]);

        let err = allocator.set_target(t, &barcode(), 1).await.unwrap_err();

        assert!(matches!(
            err,
            AllocatorError::Allocation(AllocationError::InvalidBarcode { .. })
        ));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn increase_tops_up_then_draws_new_records() {
        let t = TenantId::new();
        let (allocator, store) = setup(t, &[(1, 3), (2, 4), (3, 5)]);
        allocator.set_target(t, &barcode(), 2).await.unwrap();

        let outcome = allocator.increase(t, &barcode(), 4).await.unwrap();

        assert_eq!(outcome.action, AllocationAction::Increased);
        assert_eq!((outcome.reserved_before, outcome.reserved_after), (2, 6));
        assert_eq!(reserved(&store, t), vec![(1, 3), (2, 3)]);
    }

    #[tokio::test]
    async fn increase_only_counts_unclaimed_stock() {
        let t = TenantId::new();
        let (allocator, store) = setup(t, &[(1, 3), (2, 4)]);
        allocator.set_target(t, &barcode(), 6).await.unwrap();

        let err = allocator.increase(t, &barcode(), 2).await.unwrap_err();

        assert!(matches!(
            err,
            AllocatorError::Allocation(AllocationError::InsufficientStock { available: 1, .. })
        ));
        assert_eq!(reserved(&store, t), vec![(1, 3), (2, 3)]);
    }

    #[tokio::test]
    async fn decrease_releases_newest_first() {
        let t = TenantId::new();
        let (allocator, store) = setup(t, &[(1, 3), (2, 4), (3, 5)]);
        allocator.set_target(t, &barcode(), 3).await.unwrap();
        allocator.increase(t, &barcode(), 6).await.unwrap();
        assert_eq!(reserved(&store, t), vec![(1, 3), (2, 4), (3, 2)]);

        let outcome = allocator.decrease(t, &barcode(), 3).await.unwrap();

        assert_eq!(outcome.action, AllocationAction::Decreased);
        assert_eq!(outcome.reserved_after, 6);
        assert_eq!(reserved(&store, t), vec![(1, 3), (2, 3)]);
    }

    #[tokio::test]
    async fn decrease_beyond_reserved_is_rejected() {
        let t = TenantId::new();
        let (allocator, store) = setup(t, &[(1, 3)]);
        allocator.set_target(t, &barcode(), 2).await.unwrap();

        let err = allocator.decrease(t, &barcode(), 5).await.unwrap_err();

        assert!(matches!(
            err,
            AllocatorError::Allocation(AllocationError::InsufficientReservation { reserved: 2, .. })
        ));
        assert_eq!(reserved(&store, t), vec![(1, 2)]);
    }

    #[tokio::test]
    async fn negative_quantities_are_validation_errors() {
        let t = TenantId::new();
        let (allocator, _) = setup(t, &[(1, 3)]);

        let err = allocator.set_target(t, &barcode(), -1).await.unwrap_err();
        assert!(matches!(err, AllocatorError::Allocation(AllocationError::Domain(_))));
    }

    #[tokio::test]
    async fn tenants_do_not_share_stock() {
        let a = TenantId::new();
        let b = TenantId::new();
        let (allocator, store) = setup(a, &[(1, 3)]);

        let err = allocator.set_target(b, &barcode(), 1).await.unwrap_err();

        assert!(matches!(
            err,
            AllocatorError::Allocation(AllocationError::InvalidBarcode { .. })
        ));
        assert!(reserved(&store, a).is_empty());
    }

    #[tokio::test]
    async fn concurrent_increases_never_overdraw() {
        let t = TenantId::new();
        let (allocator, store) = setup(t, &[(1, 4), (2, 6)]);
        let allocator = Arc::new(allocator);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let allocator = allocator.clone();
            handles.push(tokio::spawn(async move { allocator.increase(t, &barcode(), 1).await }));
        }
        let mut succeeded = 0;
        for h in handles {
            if h.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }

        assert_eq!(succeeded, 10);
        assert_eq!(reserved(&store, t), vec![(1, 4), (2, 6)]);
    }

    #[test]
    fn outcome_messages_describe_the_change() {
        let outcome = AllocationOutcome {
            tenant_id: TenantId::new(),
            barcode: barcode(),
            action: AllocationAction::Decreased,
            reserved_before: 9,
            reserved_after: 6,
        };
        assert_eq!(outcome.message(), "released 3 units of barcode 8801234567890 (6 still reserved)");
    }
}
