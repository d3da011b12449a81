use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fulfillment_core::{Barcode, Entity, RecordId, TenantId};

use crate::ledger::ClaimTicket;

/// Physical stock owned by a tenant for one barcode at one location.
///
/// Allocation never decrements `quantity`; claims are tracked by
/// reservations instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseStockRecord {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub barcode: Barcode,
    pub quantity: i64,
    pub location: String,
    pub note: String,
}

impl Entity for WarehouseStockRecord {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Stock earmarked for an outbound shipment.
///
/// `id` is the id of the [`WarehouseStockRecord`] the units were drawn from;
/// there is at most one reservation per source record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentReservation {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub barcode: Barcode,
    pub quantity: i64,
    pub location: String,
    pub note: String,
    pub reserved_at: DateTime<Utc>,
}

impl ShipmentReservation {
    /// Claim `quantity` units of `source`, copying its id, location and note.
    pub fn drawn_from(source: &WarehouseStockRecord, quantity: i64, reserved_at: DateTime<Utc>) -> Self {
        Self {
            id: source.id,
            tenant_id: source.tenant_id,
            barcode: source.barcode.clone(),
            quantity,
            location: source.location.clone(),
            note: source.note.clone(),
            reserved_at,
        }
    }

    pub fn claim(&self) -> ClaimTicket {
        ClaimTicket {
            source_record_id: self.id,
            claimed_quantity: self.quantity,
        }
    }
}

impl Entity for ShipmentReservation {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
