//! Allocation planning for one (tenant, barcode).
//!
//! Every operation is split in two steps:
//!
//! 1. **Plan** (this module, pure): given the current stock records and
//!    reservations, compute the complete change set and verify it can be
//!    satisfied. A failed plan produces an error and no changes.
//! 2. **Apply** (infra): hand the change set to the reservation store, which
//!    applies it atomically.
//!
//! Stock records are drawn in ascending id order. Reservations reuse the id of
//! the record they claim, and the [`ClaimLedger`] keeps per-record claims
//! within the record's quantity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fulfillment_core::{Barcode, DomainError, Entity, RecordId, TenantId};

use crate::error::AllocationError;
use crate::ledger::{ClaimLedger, checked_total};
use crate::records::{ShipmentReservation, WarehouseStockRecord};

/// New quantity for an existing reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityUpdate {
    pub id: RecordId,
    pub quantity: i64,
}

/// Reservation writes for one (tenant, barcode), applied in this order:
/// clear (when set), deletes, updates, inserts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationChangeSet {
    /// Remove every reservation for the barcode first.
    pub clear_barcode: bool,
    pub deletes: Vec<RecordId>,
    pub updates: Vec<QuantityUpdate>,
    pub inserts: Vec<ShipmentReservation>,
}

impl ReservationChangeSet {
    pub fn is_empty(&self) -> bool {
        !self.clear_barcode && self.deletes.is_empty() && self.updates.is_empty() && self.inserts.is_empty()
    }
}

/// Outcome of planning a new reserved total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetPlan {
    /// Already at the requested total; nothing to write.
    Unchanged { reserved: i64 },
    /// Requested total is zero; drop every reservation.
    Clear { previous: i64 },
    /// Swap the reservation set for a fresh draw.
    Replace {
        previous: i64,
        reservations: Vec<ShipmentReservation>,
    },
}

impl TargetPlan {
    pub fn change_set(&self) -> ReservationChangeSet {
        match self {
            Self::Unchanged { .. } => ReservationChangeSet::default(),
            Self::Clear { .. } => ReservationChangeSet {
                clear_barcode: true,
                ..ReservationChangeSet::default()
            },
            Self::Replace { reservations, .. } => ReservationChangeSet {
                clear_barcode: true,
                inserts: reservations.clone(),
                ..ReservationChangeSet::default()
            },
        }
    }

    /// Reserved total once the plan is applied.
    pub fn reserved_after(&self) -> i64 {
        match self {
            Self::Unchanged { reserved } => *reserved,
            Self::Clear { .. } => 0,
            Self::Replace { reservations, .. } => reservations.iter().map(|r| r.quantity).sum(),
        }
    }
}

/// Stock records and reservations loaded for one (tenant, barcode).
#[derive(Debug, Clone)]
pub struct StockSnapshot {
    tenant_id: TenantId,
    barcode: Barcode,
    stock: Vec<WarehouseStockRecord>,
    reservations: Vec<ShipmentReservation>,
    ledger: ClaimLedger,
    total_stock: i64,
    reserved_total: i64,
    unclaimed: i64,
}

impl StockSnapshot {
    /// `stock` may arrive in any order; it is sorted by id. `reservations`
    /// must be in creation order (oldest first).
    pub fn new(
        tenant_id: TenantId,
        barcode: Barcode,
        mut stock: Vec<WarehouseStockRecord>,
        reservations: Vec<ShipmentReservation>,
    ) -> Result<Self, AllocationError> {
        if stock.is_empty() && reservations.is_empty() {
            return Err(AllocationError::InvalidBarcode { barcode });
        }

        for r in &stock {
            if !r.belongs_to(tenant_id) || r.barcode != barcode {
                return Err(DomainError::invariant(format!(
                    "stock record {} does not belong to tenant {tenant_id} / barcode {barcode}",
                    r.id
                ))
                .into());
            }
            DomainError::ensure_non_negative("stock quantity", r.quantity)?;
        }
        for r in &reservations {
            if !r.belongs_to(tenant_id) || r.barcode != barcode {
                return Err(DomainError::invariant(format!(
                    "reservation {} does not belong to tenant {tenant_id} / barcode {barcode}",
                    r.id
                ))
                .into());
            }
        }

        stock.sort_by_key(|r| r.id);
        let ledger = ClaimLedger::from_reservations(&reservations)?;
        let total_stock = checked_total(stock.iter().map(|r| r.quantity), "stock total")?;
        let reserved_total = checked_total(reservations.iter().map(|r| r.quantity), "reserved total")?;
        let unclaimed = ledger.available(&stock)?;

        Ok(Self {
            tenant_id,
            barcode,
            stock,
            reservations,
            ledger,
            total_stock,
            reserved_total,
            unclaimed,
        })
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn barcode(&self) -> &Barcode {
        &self.barcode
    }

    pub fn stock(&self) -> &[WarehouseStockRecord] {
        &self.stock
    }

    pub fn reservations(&self) -> &[ShipmentReservation] {
        &self.reservations
    }

    pub fn ledger(&self) -> &ClaimLedger {
        &self.ledger
    }

    /// Total owned stock for the barcode.
    pub fn total_stock(&self) -> i64 {
        self.total_stock
    }

    /// Total currently reserved for the barcode.
    pub fn reserved_total(&self) -> i64 {
        self.reserved_total
    }

    /// Stock not covered by an existing claim.
    pub fn unclaimed(&self) -> i64 {
        self.unclaimed
    }

    /// Plan a new reserved total with replace semantics.
    ///
    /// The replacement is drawn from the full stock (existing reservations
    /// are released by the same change set), so the check is against total
    /// owned stock.
    pub fn plan_target(&self, target: i64, now: DateTime<Utc>) -> Result<TargetPlan, AllocationError> {
        DomainError::ensure_non_negative("target quantity", target)?;

        let current = self.reserved_total();
        if target == current {
            return Ok(TargetPlan::Unchanged { reserved: current });
        }
        if target == 0 {
            return Ok(TargetPlan::Clear { previous: current });
        }

        let available = self.total_stock();
        if available < target {
            return Err(AllocationError::insufficient_stock(&self.barcode, target, available));
        }

        let mut remaining = target;
        let mut reservations = Vec::new();
        for record in &self.stock {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(record.quantity);
            if take == 0 {
                continue;
            }
            reservations.push(ShipmentReservation::drawn_from(record, take, now));
            remaining -= take;
        }

        Ok(TargetPlan::Replace {
            previous: current,
            reservations,
        })
    }

    /// Plan drawing `delta` more units from unclaimed stock.
    ///
    /// A partially claimed record contributes its remaining balance by
    /// growing the existing reservation; untouched records become new
    /// reservations.
    pub fn plan_increase(&self, delta: i64, now: DateTime<Utc>) -> Result<ReservationChangeSet, AllocationError> {
        DomainError::ensure_non_negative("increase quantity", delta)?;
        if delta == 0 {
            return Ok(ReservationChangeSet::default());
        }

        let available = self.unclaimed();
        if available < delta {
            return Err(AllocationError::insufficient_stock(&self.barcode, delta, available));
        }

        let mut changes = ReservationChangeSet::default();
        let mut remaining = delta;
        for record in &self.stock {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(self.ledger.remaining(record));
            if take == 0 {
                continue;
            }
            let claimed = self.ledger.claimed(record.id);
            if claimed > 0 {
                changes.updates.push(QuantityUpdate {
                    id: record.id,
                    quantity: claimed + take,
                });
            } else {
                changes.inserts.push(ShipmentReservation::drawn_from(record, take, now));
            }
            remaining -= take;
        }

        Ok(changes)
    }

    /// Plan releasing `delta` units, newest reservation first.
    pub fn plan_decrease(&self, delta: i64) -> Result<ReservationChangeSet, AllocationError> {
        DomainError::ensure_non_negative("decrease quantity", delta)?;
        if delta == 0 {
            return Ok(ReservationChangeSet::default());
        }

        let reserved = self.reserved_total();
        if reserved < delta {
            return Err(AllocationError::InsufficientReservation {
                barcode: self.barcode.clone(),
                requested: delta,
                reserved,
            });
        }

        let mut changes = ReservationChangeSet::default();
        let mut remaining = delta;
        for r in self.reservations.iter().rev() {
            if remaining == 0 {
                break;
            }
            if r.quantity <= remaining {
                changes.deletes.push(r.id);
                remaining -= r.quantity;
            } else {
                changes.updates.push(QuantityUpdate {
                    id: r.id,
                    quantity: r.quantity - remaining,
                });
                remaining = 0;
            }
        }

        Ok(changes)
    }
}
