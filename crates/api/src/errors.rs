use serde::Serialize;
use thiserror::Error;

use fulfillment_core::DomainError;
use fulfillment_infra::{AllocatorError, MatcherError, StoreError};
use fulfillment_shipments::AllocationError;

/// Every failure an entry point can report, with a stable error code.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed tenant id, barcode or quantity; rejected before store access.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Allocation(AllocationError),

    #[error("store read failed: {0}")]
    StoreRead(StoreError),

    #[error("store write failed: {0}")]
    StoreWrite(StoreError),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Allocation(err) => match err {
                AllocationError::InvalidBarcode { .. } => "invalid_barcode",
                AllocationError::InsufficientStock { .. } => "insufficient_stock",
                AllocationError::InsufficientReservation { .. } => "insufficient_reservation",
                AllocationError::Domain(DomainError::Validation(_) | DomainError::InvalidId(_)) => "invalid_input",
                AllocationError::Domain(_) => "invariant_violation",
            },
            Self::StoreRead(_) => "store_read",
            Self::StoreWrite(_) => "store_write",
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.code(),
            message: self.to_string(),
        }
    }
}

/// Serialized failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<MatcherError> for ApiError {
    fn from(err: MatcherError) -> Self {
        match err {
            MatcherError::LoadOrders(e) | MatcherError::LoadSheet(e) => Self::StoreRead(e),
            MatcherError::Domain(e) => e.into(),
        }
    }
}

impl From<AllocatorError> for ApiError {
    fn from(err: AllocatorError) -> Self {
        match err {
            AllocatorError::Allocation(e) => Self::Allocation(e),
            AllocatorError::StoreRead(e) => Self::StoreRead(e),
            AllocatorError::StoreWrite(e) => Self::StoreWrite(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fulfillment_core::Barcode;

    #[test]
    fn codes_are_stable() {
        let barcode = Barcode::parse("8801").unwrap();
        let shortfall: ApiError = AllocatorError::Allocation(AllocationError::InsufficientStock {
            barcode: barcode.clone(),
            requested: 10,
            available: 7,
            shortfall: 3,
        })
        .into();
        assert_eq!(shortfall.code(), "insufficient_stock");
        assert!(shortfall.to_string().contains("short by 3"));

        let unknown: ApiError = AllocatorError::Allocation(AllocationError::InvalidBarcode { barcode }).into();
        assert_eq!(unknown.code(), "invalid_barcode");

        let read: ApiError = MatcherError::LoadOrders(StoreError::read("page_orders", "timeout")).into();
        assert_eq!(read.code(), "store_read");

        let write: ApiError = AllocatorError::StoreWrite(StoreError::write("apply", "deadlock")).into();
        assert_eq!(write.code(), "store_write");

        let bad: ApiError = DomainError::invalid_id("TenantId: missing").into();
        assert_eq!(bad.to_body().error, "invalid_input");
    }
}
