//! Tenant-scoped record store boundaries.
//!
//! The four logical tables the fulfillment core reads and writes. Every call
//! is scoped by tenant; implementations must never return or touch another
//! tenant's rows.
//!
//! - `in_memory`: `RwLock`-backed stores for tests/dev
//! - `postgres`: SQLx/PostgreSQL stores

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use fulfillment_core::{Barcode, PageRequest, RecordId, TenantId};
use fulfillment_shipments::{ReservationChangeSet, ShipmentReservation, WarehouseStockRecord};
use fulfillment_sourcing::{Order, SourcingRow};

use crate::error::StoreError;

pub use in_memory::{
    InMemoryOrderStore, InMemoryShipmentReservationStore, InMemorySourcingSheetStore,
    InMemoryWarehouseStockStore,
};
pub use postgres::{
    PostgresOrderStore, PostgresShipmentReservationStore, PostgresSourcingSheetStore,
    PostgresWarehouseStockStore, ensure_schema,
};

/// Customer orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// One page of the tenant's orders, in a stable order.
    async fn page(&self, tenant_id: TenantId, page: PageRequest) -> Result<Vec<Order>, StoreError>;

    /// Overwrite `purchase_status` of one order.
    async fn write_purchase_status(
        &self,
        tenant_id: TenantId,
        order_id: RecordId,
        purchase_status: &str,
    ) -> Result<(), StoreError>;
}

/// Rows of the sourcing sheet (read-only).
#[async_trait]
pub trait SourcingSheetStore: Send + Sync {
    /// One page of the tenant's rows whose `shipment_info` starts with `prefix`.
    async fn page_with_prefix(
        &self,
        tenant_id: TenantId,
        prefix: &str,
        page: PageRequest,
    ) -> Result<Vec<SourcingRow>, StoreError>;
}

/// Owned warehouse stock (read-only to the allocator).
#[async_trait]
pub trait WarehouseStockStore: Send + Sync {
    /// Stock records for a barcode, ordered by id ascending.
    async fn records_for_barcode(
        &self,
        tenant_id: TenantId,
        barcode: &Barcode,
    ) -> Result<Vec<WarehouseStockRecord>, StoreError>;
}

/// Shipment reservations.
#[async_trait]
pub trait ShipmentReservationStore: Send + Sync {
    /// Reservations for a barcode in creation order (oldest first).
    async fn reservations_for_barcode(
        &self,
        tenant_id: TenantId,
        barcode: &Barcode,
    ) -> Result<Vec<ShipmentReservation>, StoreError>;

    /// Delete every reservation for a barcode. Returns the number removed.
    async fn delete_for_barcode(&self, tenant_id: TenantId, barcode: &Barcode) -> Result<u64, StoreError>;

    async fn insert(&self, tenant_id: TenantId, rows: &[ShipmentReservation]) -> Result<(), StoreError>;

    async fn update_quantity(&self, tenant_id: TenantId, id: RecordId, quantity: i64) -> Result<(), StoreError>;

    /// Delete reservations by id. Returns the number removed.
    async fn delete_ids(&self, tenant_id: TenantId, ids: &[RecordId]) -> Result<u64, StoreError>;

    /// Apply a planned change set: clear, deletes, updates, inserts.
    ///
    /// The default runs the primitives one after another and is only as
    /// atomic as they are. Backends with transactions override it.
    async fn apply(
        &self,
        tenant_id: TenantId,
        barcode: &Barcode,
        changes: &ReservationChangeSet,
    ) -> Result<(), StoreError> {
        if changes.clear_barcode {
            self.delete_for_barcode(tenant_id, barcode).await?;
        }
        if !changes.deletes.is_empty() {
            self.delete_ids(tenant_id, &changes.deletes).await?;
        }
        for u in &changes.updates {
            self.update_quantity(tenant_id, u.id, u.quantity).await?;
        }
        if !changes.inserts.is_empty() {
            self.insert(tenant_id, &changes.inserts).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<S> OrderStore for Arc<S>
where
    S: OrderStore + ?Sized,
{
    async fn page(&self, tenant_id: TenantId, page: PageRequest) -> Result<Vec<Order>, StoreError> {
        (**self).page(tenant_id, page).await
    }

    async fn write_purchase_status(
        &self,
        tenant_id: TenantId,
        order_id: RecordId,
        purchase_status: &str,
    ) -> Result<(), StoreError> {
        (**self).write_purchase_status(tenant_id, order_id, purchase_status).await
    }
}

#[async_trait]
impl<S> SourcingSheetStore for Arc<S>
where
    S: SourcingSheetStore + ?Sized,
{
    async fn page_with_prefix(
        &self,
        tenant_id: TenantId,
        prefix: &str,
        page: PageRequest,
    ) -> Result<Vec<SourcingRow>, StoreError> {
        (**self).page_with_prefix(tenant_id, prefix, page).await
    }
}

#[async_trait]
impl<S> WarehouseStockStore for Arc<S>
where
    S: WarehouseStockStore + ?Sized,
{
    async fn records_for_barcode(
        &self,
        tenant_id: TenantId,
        barcode: &Barcode,
    ) -> Result<Vec<WarehouseStockRecord>, StoreError> {
        (**self).records_for_barcode(tenant_id, barcode).await
    }
}

#[async_trait]
impl<S> ShipmentReservationStore for Arc<S>
where
    S: ShipmentReservationStore + ?Sized,
{
    async fn reservations_for_barcode(
        &self,
        tenant_id: TenantId,
        barcode: &Barcode,
    ) -> Result<Vec<ShipmentReservation>, StoreError> {
        (**self).reservations_for_barcode(tenant_id, barcode).await
    }

    async fn delete_for_barcode(&self, tenant_id: TenantId, barcode: &Barcode) -> Result<u64, StoreError> {
        (**self).delete_for_barcode(tenant_id, barcode).await
    }

    async fn insert(&self, tenant_id: TenantId, rows: &[ShipmentReservation]) -> Result<(), StoreError> {
        (**self).insert(tenant_id, rows).await
    }

    async fn update_quantity(&self, tenant_id: TenantId, id: RecordId, quantity: i64) -> Result<(), StoreError> {
        (**self).update_quantity(tenant_id, id, quantity).await
    }

    async fn delete_ids(&self, tenant_id: TenantId, ids: &[RecordId]) -> Result<u64, StoreError> {
        (**self).delete_ids(tenant_id, ids).await
    }

    async fn apply(
        &self,
        tenant_id: TenantId,
        barcode: &Barcode,
        changes: &ReservationChangeSet,
    ) -> Result<(), StoreError> {
        (**self).apply(tenant_id, barcode, changes).await
    }
}
