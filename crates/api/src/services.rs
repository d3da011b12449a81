//! Service wiring and the public entry points.
//!
//! Backends are chosen by configuration: in-memory stores for dev/tests, or
//! PostgreSQL when `USE_PERSISTENT_STORES=true`. Every entry point validates
//! its string inputs before touching a store.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::{info, instrument};

use fulfillment_core::{Barcode, DomainError, TenantId};
use fulfillment_infra::stores::{
    InMemoryOrderStore, InMemoryShipmentReservationStore, InMemorySourcingSheetStore,
    InMemoryWarehouseStockStore, PostgresOrderStore, PostgresShipmentReservationStore,
    PostgresSourcingSheetStore, PostgresWarehouseStockStore, ensure_schema,
};
use fulfillment_infra::{
    AllocationOutcome, OrderMatcher, OrderStore, ShipmentAllocator, ShipmentReservationStore,
    SourcingSheetStore, StoreError, WarehouseStockStore,
};

use crate::config::AppConfig;
use crate::dto::{ReconcileResponse, ShipmentTargetResponse};
use crate::errors::ApiError;

/// The four record stores behind the service.
#[derive(Clone)]
pub struct Stores {
    pub orders: Arc<dyn OrderStore>,
    pub sheet: Arc<dyn SourcingSheetStore>,
    pub stock: Arc<dyn WarehouseStockStore>,
    pub reservations: Arc<dyn ShipmentReservationStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            orders: Arc::new(InMemoryOrderStore::new()),
            sheet: Arc::new(InMemorySourcingSheetStore::new()),
            stock: Arc::new(InMemoryWarehouseStockStore::new()),
            reservations: Arc::new(InMemoryShipmentReservationStore::new()),
        }
    }

    pub fn postgres(pool: sqlx::PgPool) -> Self {
        let pool = Arc::new(pool);
        Self {
            orders: Arc::new(PostgresOrderStore::new(pool.clone())),
            sheet: Arc::new(PostgresSourcingSheetStore::new(pool.clone())),
            stock: Arc::new(PostgresWarehouseStockStore::new(pool.clone())),
            reservations: Arc::new(PostgresShipmentReservationStore::new(pool)),
        }
    }

    /// Pick a backend from configuration, connecting to Postgres if needed.
    pub async fn from_config(config: &AppConfig) -> Result<Self, ApiError> {
        let Some(url) = config.database_url.as_deref().filter(|_| config.use_persistent_stores) else {
            info!("using in-memory stores");
            return Ok(Self::in_memory());
        };

        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(url)
            .await
            .map_err(|e| ApiError::StoreRead(StoreError::read("connect", e.to_string())))?;
        ensure_schema(&pool).await.map_err(ApiError::StoreWrite)?;

        info!(max_connections = config.database_max_connections, "using postgres stores");
        Ok(Self::postgres(pool))
    }
}

type Matcher = OrderMatcher<Arc<dyn OrderStore>, Arc<dyn SourcingSheetStore>>;
type Allocator = ShipmentAllocator<Arc<dyn WarehouseStockStore>, Arc<dyn ShipmentReservationStore>>;

/// Reconciliation and shipment allocation behind string-typed entry points.
pub struct FulfillmentService {
    matcher: Matcher,
    allocator: Allocator,
}

impl FulfillmentService {
    pub fn new(stores: Stores, page_size: u32) -> Result<Self, ApiError> {
        let matcher = OrderMatcher::new(stores.orders, stores.sheet).with_page_size(page_size)?;
        let allocator = ShipmentAllocator::new(stores.stock, stores.reservations);
        Ok(Self { matcher, allocator })
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self, ApiError> {
        let stores = Stores::from_config(config).await?;
        Self::new(stores, config.page_size)
    }

    /// Rewrite `purchase_status` of every matched order of a tenant.
    #[instrument(skip(self))]
    pub async fn reconcile_purchase_status(&self, tenant_id: &str) -> Result<ReconcileResponse, ApiError> {
        let tenant_id = parse_tenant(tenant_id)?;
        let report = self.matcher.reconcile(tenant_id).await?;
        Ok(report.into())
    }

    /// Make the reserved quantity for a barcode exactly `new_quantity`.
    #[instrument(skip(self))]
    pub async fn set_shipment_target(
        &self,
        tenant_id: &str,
        barcode: &str,
        new_quantity: i64,
    ) -> ShipmentTargetResponse {
        ShipmentTargetResponse::from_result(self.try_set_target(tenant_id, barcode, new_quantity).await)
    }

    /// Reserve `delta` more units from unclaimed stock.
    #[instrument(skip(self))]
    pub async fn increase_shipment(&self, tenant_id: &str, barcode: &str, delta: i64) -> ShipmentTargetResponse {
        ShipmentTargetResponse::from_result(self.try_increase(tenant_id, barcode, delta).await)
    }

    /// Release `delta` reserved units, newest reservation first.
    #[instrument(skip(self))]
    pub async fn decrease_shipment(&self, tenant_id: &str, barcode: &str, delta: i64) -> ShipmentTargetResponse {
        ShipmentTargetResponse::from_result(self.try_decrease(tenant_id, barcode, delta).await)
    }

    async fn try_set_target(&self, tenant_id: &str, barcode: &str, quantity: i64) -> Result<AllocationOutcome, ApiError> {
        let (tenant_id, barcode) = parse_shipment_input(tenant_id, barcode, "new_quantity", quantity)?;
        Ok(self.allocator.set_target(tenant_id, &barcode, quantity).await?)
    }

    async fn try_increase(&self, tenant_id: &str, barcode: &str, delta: i64) -> Result<AllocationOutcome, ApiError> {
        let (tenant_id, barcode) = parse_shipment_input(tenant_id, barcode, "delta", delta)?;
        Ok(self.allocator.increase(tenant_id, &barcode, delta).await?)
    }

    async fn try_decrease(&self, tenant_id: &str, barcode: &str, delta: i64) -> Result<AllocationOutcome, ApiError> {
        let (tenant_id, barcode) = parse_shipment_input(tenant_id, barcode, "delta", delta)?;
        Ok(self.allocator.decrease(tenant_id, &barcode, delta).await?)
    }
}

fn parse_tenant(raw: &str) -> Result<TenantId, ApiError> {
    Ok(raw.parse::<TenantId>()?)
}

fn parse_shipment_input(
    tenant_id: &str,
    barcode: &str,
    field: &str,
    quantity: i64,
) -> Result<(TenantId, Barcode), ApiError> {
    let tenant_id = parse_tenant(tenant_id)?;
    let barcode = Barcode::parse(barcode)?;
    DomainError::ensure_non_negative(field, quantity)?;
    Ok((tenant_id, barcode))
}
