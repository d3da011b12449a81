//! Order-to-sourcing domain module.
//!
//! Business rules for reconciling customer orders against rows of the
//! externally maintained sourcing sheet, implemented as deterministic domain
//! logic (no IO, no storage).

pub mod matching;
pub mod order;
pub mod sheet;
pub mod status;

pub use matching::{MatchOutcome, MatchType, SourcingIndex, SourcingMatch};
pub use order::Order;
pub use sheet::{SHIPMENT_INFO_PREFIX, SheetTag, ShipmentInfo, SourcingRow};
pub use status::PurchaseStatus;
