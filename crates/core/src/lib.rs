//! `fulfillment-core`: shared building blocks for the fulfillment crates.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! tenant and record identifiers, the domain error model and page requests.

pub mod barcode;
pub mod entity;
pub mod error;
pub mod id;
pub mod page;

pub use barcode::Barcode;
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{RecordId, TenantId};
pub use page::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PageRequest};
