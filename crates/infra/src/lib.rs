//! Infrastructure layer: record stores, paged reads, and the services that
//! compose domain planning with store IO.

pub mod allocator;
pub mod error;
pub mod locks;
pub mod matcher;
pub mod paging;
pub mod stores;

pub use allocator::{AllocationAction, AllocationOutcome, AllocatorError, ShipmentAllocator};
pub use error::StoreError;
pub use locks::KeyedLocks;
pub use matcher::{MatchResult, MatcherError, OrderMatcher, ReconcileReport};
pub use stores::{OrderStore, ShipmentReservationStore, SourcingSheetStore, WarehouseStockStore};
