//! Claim bookkeeping against warehouse stock records.
//!
//! Each reservation is a claim ticket on the stock record sharing its id.
//! The ledger sums claims per source record so that a partially claimed
//! record still exposes its remaining balance:
//!
//! ```text
//! remaining(record) = record.quantity - sum(claims against record.id)
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use fulfillment_core::{DomainError, DomainResult, RecordId};

use crate::records::{ShipmentReservation, WarehouseStockRecord};

/// Units claimed from one source stock record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimTicket {
    pub source_record_id: RecordId,
    pub claimed_quantity: i64,
}

/// Claimed quantity per source record for one (tenant, barcode).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimLedger {
    claims: HashMap<RecordId, i64>,
}

/// Sum quantities, failing instead of wrapping on overflow.
pub fn checked_total(quantities: impl IntoIterator<Item = i64>, what: &str) -> DomainResult<i64> {
    quantities
        .into_iter()
        .try_fold(0i64, i64::checked_add)
        .ok_or_else(|| DomainError::invariant(format!("{what} overflows i64")))
}

impl ClaimLedger {
    pub fn from_tickets(tickets: impl IntoIterator<Item = ClaimTicket>) -> DomainResult<Self> {
        let mut claims: HashMap<RecordId, i64> = HashMap::new();
        for t in tickets {
            let entry = claims.entry(t.source_record_id).or_insert(0);
            *entry = entry.checked_add(t.claimed_quantity).ok_or_else(|| {
                DomainError::invariant(format!("claims on record {} overflow i64", t.source_record_id))
            })?;
        }
        Ok(Self { claims })
    }

    pub fn from_reservations(reservations: &[ShipmentReservation]) -> DomainResult<Self> {
        Self::from_tickets(reservations.iter().map(ShipmentReservation::claim))
    }

    pub fn claimed(&self, source_record_id: RecordId) -> i64 {
        self.claims.get(&source_record_id).copied().unwrap_or(0)
    }

    pub fn is_claimed(&self, source_record_id: RecordId) -> bool {
        self.claimed(source_record_id) > 0
    }

    /// Units of `record` not yet claimed (never negative).
    pub fn remaining(&self, record: &WarehouseStockRecord) -> i64 {
        record.quantity.saturating_sub(self.claimed(record.id)).max(0)
    }

    pub fn total_claimed(&self) -> DomainResult<i64> {
        checked_total(self.claims.values().copied(), "claimed total")
    }

    /// Unclaimed units across `records`.
    pub fn available(&self, records: &[WarehouseStockRecord]) -> DomainResult<i64> {
        checked_total(records.iter().map(|r| self.remaining(r)), "unclaimed stock")
    }

    /// Source records whose claims exceed their quantity, plus claims whose
    /// source record no longer exists.
    pub fn over_claimed(&self, records: &[WarehouseStockRecord]) -> Vec<RecordId> {
        let by_id: HashMap<RecordId, i64> = records.iter().map(|r| (r.id, r.quantity)).collect();
        let mut ids: Vec<RecordId> = self
            .claims
            .iter()
            .filter(|(id, claimed)| match by_id.get(*id) {
                Some(quantity) => **claimed > *quantity,
                None => **claimed > 0,
            })
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }
}
