//! Shipment stock allocation domain module.
//!
//! Turns a desired quantity-to-ship per barcode into reservation records
//! drawn from warehouse stock. Planning is pure: callers load a
//! [`StockSnapshot`], ask it for a plan, and apply the resulting
//! [`ReservationChangeSet`] to their store.

pub mod allocation;
pub mod error;
pub mod ledger;
pub mod records;

pub use allocation::{QuantityUpdate, ReservationChangeSet, StockSnapshot, TargetPlan};
pub use error::AllocationError;
pub use ledger::{ClaimLedger, ClaimTicket};
pub use records::{ShipmentReservation, WarehouseStockRecord};
