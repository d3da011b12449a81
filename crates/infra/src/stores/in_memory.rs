use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use fulfillment_core::{Barcode, Entity, PageRequest, RecordId, TenantId};
use fulfillment_shipments::{ReservationChangeSet, ShipmentReservation, WarehouseStockRecord};
use fulfillment_sourcing::{Order, SourcingRow};

use crate::error::{StoreError, StoreOp};

use super::{OrderStore, ShipmentReservationStore, SourcingSheetStore, WarehouseStockStore};

fn page_of<'a, T: Clone + 'a>(rows: impl Iterator<Item = &'a T>, page: PageRequest) -> Vec<T> {
    rows.skip(page.offset() as usize)
        .take(page.page_size as usize)
        .cloned()
        .collect()
}

fn ensure_tenant<E: Entity>(tenant_id: TenantId, rows: &[E], operation: &str) -> Result<(), StoreError> {
    match rows.iter().position(|r| !r.belongs_to(tenant_id)) {
        Some(idx) => Err(StoreError::TenantIsolation(format!(
            "{operation}: row {idx} belongs to another tenant"
        ))),
        None => Ok(()),
    }
}

/// In-memory order table for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    rows: RwLock<Vec<Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orders(orders: impl IntoIterator<Item = Order>) -> Self {
        let mut rows: Vec<Order> = orders.into_iter().collect();
        rows.sort_by_key(|o| o.id);
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// Fetch one order (test inspection).
    pub fn get(&self, tenant_id: TenantId, id: RecordId) -> Result<Option<Order>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::poisoned("get_order", StoreOp::Read))?;
        Ok(rows.iter().find(|o| o.belongs_to(tenant_id) && o.id == id).cloned())
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn page(&self, tenant_id: TenantId, page: PageRequest) -> Result<Vec<Order>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::poisoned("page_orders", StoreOp::Read))?;
        Ok(page_of(rows.iter().filter(|o| o.belongs_to(tenant_id)), page))
    }

    async fn write_purchase_status(
        &self,
        tenant_id: TenantId,
        order_id: RecordId,
        purchase_status: &str,
    ) -> Result<(), StoreError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::poisoned("write_purchase_status", StoreOp::Write))?;
        let order = rows
            .iter_mut()
            .find(|o| o.belongs_to(tenant_id) && o.id == order_id)
            .ok_or_else(|| StoreError::NotFound(format!("order {order_id}")))?;
        order.purchase_status = Some(purchase_status.to_string());
        Ok(())
    }
}

/// In-memory sourcing sheet for tests/dev.
#[derive(Debug, Default)]
pub struct InMemorySourcingSheetStore {
    rows: RwLock<Vec<SourcingRow>>,
}

impl InMemorySourcingSheetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows keep the given order; it is the sheet's iteration order.
    pub fn with_rows(rows: impl IntoIterator<Item = SourcingRow>) -> Self {
        Self {
            rows: RwLock::new(rows.into_iter().collect()),
        }
    }
}

#[async_trait]
impl SourcingSheetStore for InMemorySourcingSheetStore {
    async fn page_with_prefix(
        &self,
        tenant_id: TenantId,
        prefix: &str,
        page: PageRequest,
    ) -> Result<Vec<SourcingRow>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::poisoned("page_sourcing_rows", StoreOp::Read))?;
        let matching = rows
            .iter()
            .filter(|r| r.belongs_to(tenant_id) && r.shipment_info.as_str().starts_with(prefix));
        Ok(page_of(matching, page))
    }
}

/// In-memory warehouse stock for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryWarehouseStockStore {
    records: RwLock<Vec<WarehouseStockRecord>>,
}

impl InMemoryWarehouseStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = WarehouseStockRecord>) -> Self {
        let mut records: Vec<WarehouseStockRecord> = records.into_iter().collect();
        records.sort_by_key(|r| r.id);
        Self {
            records: RwLock::new(records),
        }
    }
}

#[async_trait]
impl WarehouseStockStore for InMemoryWarehouseStockStore {
    async fn records_for_barcode(
        &self,
        tenant_id: TenantId,
        barcode: &Barcode,
    ) -> Result<Vec<WarehouseStockRecord>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::poisoned("stock_for_barcode", StoreOp::Read))?;
        Ok(records
            .iter()
            .filter(|r| r.belongs_to(tenant_id) && &r.barcode == barcode)
            .cloned()
            .collect())
    }
}

/// In-memory reservation table for tests/dev.
///
/// Vector order is creation order. `apply` runs under one write lock and
/// either lands completely or not at all.
#[derive(Debug, Default)]
pub struct InMemoryShipmentReservationStore {
    rows: RwLock<Vec<ShipmentReservation>>,
    writes: AtomicU64,
}

impl InMemoryShipmentReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reservations(rows: impl IntoIterator<Item = ShipmentReservation>) -> Self {
        Self {
            rows: RwLock::new(rows.into_iter().collect()),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of mutating calls that reached the store.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Every reservation of a tenant, in creation order.
    pub fn all(&self, tenant_id: TenantId) -> Result<Vec<ShipmentReservation>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::poisoned("all_reservations", StoreOp::Read))?;
        Ok(rows.iter().filter(|r| r.belongs_to(tenant_id)).cloned().collect())
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn apply_to(
    rows: &mut Vec<ShipmentReservation>,
    tenant_id: TenantId,
    barcode: &Barcode,
    changes: &ReservationChangeSet,
) -> Result<(), StoreError> {
    if changes.clear_barcode {
        rows.retain(|r| !(r.belongs_to(tenant_id) && &r.barcode == barcode));
    }
    rows.retain(|r| !(r.belongs_to(tenant_id) && changes.deletes.contains(&r.id)));
    for update in &changes.updates {
        let row = rows
            .iter_mut()
            .find(|r| r.belongs_to(tenant_id) && r.id == update.id)
            .ok_or_else(|| StoreError::NotFound(format!("reservation {}", update.id)))?;
        row.quantity = update.quantity;
    }
    insert_into(rows, tenant_id, &changes.inserts)
}

fn insert_into(
    rows: &mut Vec<ShipmentReservation>,
    tenant_id: TenantId,
    new_rows: &[ShipmentReservation],
) -> Result<(), StoreError> {
    for insert in new_rows {
        if rows.iter().any(|r| r.belongs_to(tenant_id) && r.id == insert.id) {
            return Err(StoreError::write(
                "insert_reservation",
                format!("reservation {} already exists", insert.id),
            ));
        }
        rows.push(insert.clone());
    }
    Ok(())
}

#[async_trait]
impl ShipmentReservationStore for InMemoryShipmentReservationStore {
    async fn reservations_for_barcode(
        &self,
        tenant_id: TenantId,
        barcode: &Barcode,
    ) -> Result<Vec<ShipmentReservation>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::poisoned("reservations_for_barcode", StoreOp::Read))?;
        Ok(rows
            .iter()
            .filter(|r| r.belongs_to(tenant_id) && &r.barcode == barcode)
            .cloned()
            .collect())
    }

    async fn delete_for_barcode(&self, tenant_id: TenantId, barcode: &Barcode) -> Result<u64, StoreError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::poisoned("delete_for_barcode", StoreOp::Write))?;
        self.record_write();
        let before = rows.len();
        rows.retain(|r| !(r.belongs_to(tenant_id) && &r.barcode == barcode));
        Ok((before - rows.len()) as u64)
    }

    async fn insert(&self, tenant_id: TenantId, new_rows: &[ShipmentReservation]) -> Result<(), StoreError> {
        ensure_tenant(tenant_id, new_rows, "insert_reservations")?;
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::poisoned("insert_reservations", StoreOp::Write))?;
        self.record_write();
        let mut staged = rows.clone();
        insert_into(&mut staged, tenant_id, new_rows)?;
        *rows = staged;
        Ok(())
    }

    async fn update_quantity(&self, tenant_id: TenantId, id: RecordId, quantity: i64) -> Result<(), StoreError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::poisoned("update_reservation", StoreOp::Write))?;
        self.record_write();
        let row = rows
            .iter_mut()
            .find(|r| r.belongs_to(tenant_id) && r.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("reservation {id}")))?;
        row.quantity = quantity;
        Ok(())
    }

    async fn delete_ids(&self, tenant_id: TenantId, ids: &[RecordId]) -> Result<u64, StoreError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::poisoned("delete_reservations", StoreOp::Write))?;
        self.record_write();
        let before = rows.len();
        rows.retain(|r| !(r.belongs_to(tenant_id) && ids.contains(&r.id)));
        Ok((before - rows.len()) as u64)
    }

    async fn apply(
        &self,
        tenant_id: TenantId,
        barcode: &Barcode,
        changes: &ReservationChangeSet,
    ) -> Result<(), StoreError> {
        if changes.is_empty() {
            return Ok(());
        }
        ensure_tenant(tenant_id, &changes.inserts, "apply_reservations")?;

        let mut rows = self
            .rows
            .write()
            .map_err(|_| StoreError::poisoned("apply_reservations", StoreOp::Write))?;
        self.record_write();

        let mut staged = rows.clone();
        apply_to(&mut staged, tenant_id, barcode, changes)?;
        *rows = staged;
        Ok(())
    }
}
