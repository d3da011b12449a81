use thiserror::Error;

use fulfillment_core::{Barcode, DomainError};

/// Allocation planning failure. No plan is produced, so nothing is written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    /// Neither stock records nor reservations exist for the barcode.
    #[error("no stock records or reservations exist for barcode {barcode}")]
    InvalidBarcode { barcode: Barcode },

    #[error(
        "insufficient stock for barcode {barcode}: requested {requested}, available {available}, short by {shortfall}"
    )]
    InsufficientStock {
        barcode: Barcode,
        requested: i64,
        available: i64,
        shortfall: i64,
    },

    #[error("cannot release {requested} units for barcode {barcode}: only {reserved} reserved")]
    InsufficientReservation {
        barcode: Barcode,
        requested: i64,
        reserved: i64,
    },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl AllocationError {
    pub(crate) fn insufficient_stock(barcode: &Barcode, requested: i64, available: i64) -> Self {
        Self::InsufficientStock {
            barcode: barcode.clone(),
            requested,
            available,
            shortfall: requested - available,
        }
    }
}
