//! PostgreSQL-backed record stores.
//!
//! Every query carries `tenant_id` in its WHERE clause. Reads are ordered so
//! paging is stable: orders and stock by `id`, sheet rows by `id` (the sheet's
//! row order), reservations by `seq` (creation order).
//!
//! Schema: `crates/infra/migrations/0001_fulfillment.sql`.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument};

use fulfillment_core::{Barcode, PageRequest, RecordId, TenantId};
use fulfillment_shipments::{ReservationChangeSet, ShipmentReservation, WarehouseStockRecord};
use fulfillment_sourcing::{Order, SheetTag, ShipmentInfo, SourcingRow};

use crate::error::{StoreError, StoreOp, map_sqlx_error};

use super::{OrderStore, ShipmentReservationStore, SourcingSheetStore, WarehouseStockStore};

const SCHEMA: &str = include_str!("../../migrations/0001_fulfillment.sql");

/// Create the fulfillment tables when they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", StoreOp::Write, e))?;
    Ok(())
}

fn limit_offset(page: PageRequest) -> (i64, i64) {
    (i64::from(page.page_size), page.offset() as i64)
}

fn barcode_column(row: &PgRow) -> Result<Barcode, sqlx::Error> {
    let raw: String = row.try_get("barcode")?;
    Barcode::parse(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

fn order_from_row(row: &PgRow) -> Result<Order, sqlx::Error> {
    Ok(Order {
        id: RecordId::new(row.try_get("id")?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
        order_number: row.try_get("order_number")?,
        recipient_name: row.try_get("recipient_name")?,
        purchase_status: row.try_get("purchase_status")?,
    })
}

fn sourcing_row_from_row(row: &PgRow) -> Result<SourcingRow, sqlx::Error> {
    let tag: String = row.try_get("sheet_tag")?;
    let info: String = row.try_get("shipment_info")?;
    Ok(SourcingRow {
        id: RecordId::new(row.try_get("id")?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
        row_ref: row.try_get("row_ref")?,
        shipment_info: ShipmentInfo::new(info),
        quantity_ordered: row.try_get("quantity_ordered")?,
        quantity_imported: row.try_get("quantity_imported")?,
        quantity_shipped: row.try_get("quantity_shipped")?,
        composition_note: row.try_get("composition_note")?,
        sheet_tag: SheetTag::parse(&tag),
    })
}

fn stock_from_row(row: &PgRow) -> Result<WarehouseStockRecord, sqlx::Error> {
    Ok(WarehouseStockRecord {
        id: RecordId::new(row.try_get("id")?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
        barcode: barcode_column(row)?,
        quantity: row.try_get("quantity")?,
        location: row.try_get("location")?,
        note: row.try_get("note")?,
    })
}

fn reservation_from_row(row: &PgRow) -> Result<ShipmentReservation, sqlx::Error> {
    Ok(ShipmentReservation {
        id: RecordId::new(row.try_get("id")?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
        barcode: barcode_column(row)?,
        quantity: row.try_get("quantity")?,
        location: row.try_get("location")?,
        note: row.try_get("note")?,
        reserved_at: row.try_get("reserved_at")?,
    })
}

fn decode_all<T>(
    rows: &[PgRow],
    operation: &str,
    decode: fn(&PgRow) -> Result<T, sqlx::Error>,
) -> Result<Vec<T>, StoreError> {
    rows.iter()
        .map(|r| decode(r).map_err(|e| map_sqlx_error(operation, StoreOp::Read, e)))
        .collect()
}

/// Postgres order table.
#[derive(Debug, Clone)]
pub struct PostgresOrderStore {
    pool: Arc<PgPool>,
}

impl PostgresOrderStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, page = page.page), err)]
    async fn page(&self, tenant_id: TenantId, page: PageRequest) -> Result<Vec<Order>, StoreError> {
        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, order_number, recipient_name, purchase_status
            FROM orders
            WHERE tenant_id = $1
            ORDER BY id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("page_orders", StoreOp::Read, e))?;

        debug!(rows = rows.len(), "loaded order page");
        decode_all(&rows, "page_orders", order_from_row)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, order_id = %order_id), err)]
    async fn write_purchase_status(
        &self,
        tenant_id: TenantId,
        order_id: RecordId,
        purchase_status: &str,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET purchase_status = $3
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(order_id.get())
        .bind(purchase_status)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("write_purchase_status", StoreOp::Write, e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("order {order_id}")));
        }
        Ok(())
    }
}

/// Postgres sourcing sheet.
#[derive(Debug, Clone)]
pub struct PostgresSourcingSheetStore {
    pool: Arc<PgPool>,
}

impl PostgresSourcingSheetStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SourcingSheetStore for PostgresSourcingSheetStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, page = page.page), err)]
    async fn page_with_prefix(
        &self,
        tenant_id: TenantId,
        prefix: &str,
        page: PageRequest,
    ) -> Result<Vec<SourcingRow>, StoreError> {
        let (limit, offset) = limit_offset(page);
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, row_ref, shipment_info,
                   quantity_ordered, quantity_imported, quantity_shipped,
                   composition_note, sheet_tag
            FROM sourcing_rows
            WHERE tenant_id = $1 AND starts_with(shipment_info, $2)
            ORDER BY id ASC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(prefix)
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("page_sourcing_rows", StoreOp::Read, e))?;

        debug!(rows = rows.len(), "loaded sourcing page");
        decode_all(&rows, "page_sourcing_rows", sourcing_row_from_row)
    }
}

/// Postgres warehouse stock.
#[derive(Debug, Clone)]
pub struct PostgresWarehouseStockStore {
    pool: Arc<PgPool>,
}

impl PostgresWarehouseStockStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WarehouseStockStore for PostgresWarehouseStockStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, barcode = %barcode), err)]
    async fn records_for_barcode(
        &self,
        tenant_id: TenantId,
        barcode: &Barcode,
    ) -> Result<Vec<WarehouseStockRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, barcode, quantity, location, note
            FROM warehouse_stock
            WHERE tenant_id = $1 AND barcode = $2
            ORDER BY id ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(barcode.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("stock_for_barcode", StoreOp::Read, e))?;

        decode_all(&rows, "stock_for_barcode", stock_from_row)
    }
}

/// Postgres reservation table. `apply` runs in one transaction.
#[derive(Debug, Clone)]
pub struct PostgresShipmentReservationStore {
    pool: Arc<PgPool>,
}

impl PostgresShipmentReservationStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", StoreOp::Write, e))
    }
}

async fn clear_in(tx: &mut Transaction<'_, Postgres>, tenant_id: TenantId, barcode: &Barcode) -> Result<u64, StoreError> {
    let result = sqlx::query("DELETE FROM shipment_reservations WHERE tenant_id = $1 AND barcode = $2")
        .bind(tenant_id.as_uuid())
        .bind(barcode.as_str())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("delete_for_barcode", StoreOp::Write, e))?;
    Ok(result.rows_affected())
}

async fn delete_ids_in(tx: &mut Transaction<'_, Postgres>, tenant_id: TenantId, ids: &[RecordId]) -> Result<u64, StoreError> {
    let raw: Vec<i64> = ids.iter().map(|id| id.get()).collect();
    let result = sqlx::query("DELETE FROM shipment_reservations WHERE tenant_id = $1 AND id = ANY($2)")
        .bind(tenant_id.as_uuid())
        .bind(&raw)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("delete_reservations", StoreOp::Write, e))?;
    Ok(result.rows_affected())
}

async fn update_in(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: TenantId,
    id: RecordId,
    quantity: i64,
) -> Result<(), StoreError> {
    let result = sqlx::query("UPDATE shipment_reservations SET quantity = $3 WHERE tenant_id = $1 AND id = $2")
        .bind(tenant_id.as_uuid())
        .bind(id.get())
        .bind(quantity)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("update_reservation", StoreOp::Write, e))?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("reservation {id}")));
    }
    Ok(())
}

async fn insert_in(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: TenantId,
    rows: &[ShipmentReservation],
) -> Result<(), StoreError> {
    for (idx, r) in rows.iter().enumerate() {
        if r.tenant_id != tenant_id {
            return Err(StoreError::TenantIsolation(format!(
                "insert_reservations: row {idx} belongs to another tenant"
            )));
        }
        sqlx::query(
            r#"
            INSERT INTO shipment_reservations (
                tenant_id, id, barcode, quantity, location, note, reserved_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(r.id.get())
        .bind(r.barcode.as_str())
        .bind(r.quantity)
        .bind(&r.location)
        .bind(&r.note)
        .bind(r.reserved_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_reservation", StoreOp::Write, e))?;
    }
    Ok(())
}

async fn commit(tx: Transaction<'_, Postgres>) -> Result<(), StoreError> {
    tx.commit()
        .await
        .map_err(|e| map_sqlx_error("commit_transaction", StoreOp::Write, e))
}

async fn rollback_with(tx: Transaction<'_, Postgres>, err: StoreError) -> StoreError {
    if let Err(rollback_err) = tx.rollback().await {
        tracing::warn!(error = %rollback_err, "rollback failed");
    }
    err
}

#[async_trait]
impl ShipmentReservationStore for PostgresShipmentReservationStore {
    #[instrument(skip(self), fields(tenant_id = %tenant_id, barcode = %barcode), err)]
    async fn reservations_for_barcode(
        &self,
        tenant_id: TenantId,
        barcode: &Barcode,
    ) -> Result<Vec<ShipmentReservation>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, barcode, quantity, location, note, reserved_at
            FROM shipment_reservations
            WHERE tenant_id = $1 AND barcode = $2
            ORDER BY seq ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(barcode.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("reservations_for_barcode", StoreOp::Read, e))?;

        decode_all(&rows, "reservations_for_barcode", reservation_from_row)
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, barcode = %barcode), err)]
    async fn delete_for_barcode(&self, tenant_id: TenantId, barcode: &Barcode) -> Result<u64, StoreError> {
        let mut tx = self.begin().await?;
        match clear_in(&mut tx, tenant_id, barcode).await {
            Ok(n) => commit(tx).await.map(|_| n),
            Err(e) => Err(rollback_with(tx, e).await),
        }
    }

    #[instrument(skip(self, rows), fields(tenant_id = %tenant_id, rows = rows.len()), err)]
    async fn insert(&self, tenant_id: TenantId, rows: &[ShipmentReservation]) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        match insert_in(&mut tx, tenant_id, rows).await {
            Ok(()) => commit(tx).await,
            Err(e) => Err(rollback_with(tx, e).await),
        }
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, id = %id), err)]
    async fn update_quantity(&self, tenant_id: TenantId, id: RecordId, quantity: i64) -> Result<(), StoreError> {
        let mut tx = self.begin().await?;
        match update_in(&mut tx, tenant_id, id, quantity).await {
            Ok(()) => commit(tx).await,
            Err(e) => Err(rollback_with(tx, e).await),
        }
    }

    #[instrument(skip(self, ids), fields(tenant_id = %tenant_id, ids = ids.len()), err)]
    async fn delete_ids(&self, tenant_id: TenantId, ids: &[RecordId]) -> Result<u64, StoreError> {
        let mut tx = self.begin().await?;
        match delete_ids_in(&mut tx, tenant_id, ids).await {
            Ok(n) => commit(tx).await.map(|_| n),
            Err(e) => Err(rollback_with(tx, e).await),
        }
    }

    #[instrument(
        skip(self, changes),
        fields(
            tenant_id = %tenant_id,
            barcode = %barcode,
            clear = changes.clear_barcode,
            deletes = changes.deletes.len(),
            updates = changes.updates.len(),
            inserts = changes.inserts.len()
        ),
        err
    )]
    async fn apply(
        &self,
        tenant_id: TenantId,
        barcode: &Barcode,
        changes: &ReservationChangeSet,
    ) -> Result<(), StoreError> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut tx = self.begin().await?;
        let applied = async {
            if changes.clear_barcode {
                clear_in(&mut tx, tenant_id, barcode).await?;
            }
            if !changes.deletes.is_empty() {
                delete_ids_in(&mut tx, tenant_id, &changes.deletes).await?;
            }
            for u in &changes.updates {
                update_in(&mut tx, tenant_id, u.id, u.quantity).await?;
            }
            insert_in(&mut tx, tenant_id, &changes.inserts).await
        }
        .await;

        match applied {
            Ok(()) => commit(tx).await,
            Err(e) => Err(rollback_with(tx, e).await),
        }
    }
}
