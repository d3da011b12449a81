use serde::Serialize;

use fulfillment_core::TenantId;
use fulfillment_infra::{AllocationOutcome, MatchResult, ReconcileReport};

use crate::errors::ApiError;

// -------------------------
// Responses
// -------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileResponse {
    pub tenant_id: TenantId,
    pub matched_count: usize,
    pub scanned_orders: usize,
    pub unmatched_count: usize,
    pub cancelled_count: usize,
    pub failed_writes: usize,
    pub results: Vec<MatchResult>,
}

impl From<ReconcileReport> for ReconcileResponse {
    fn from(r: ReconcileReport) -> Self {
        Self {
            tenant_id: r.tenant_id,
            matched_count: r.matched_count,
            scanned_orders: r.scanned_orders,
            unmatched_count: r.unmatched_count,
            cancelled_count: r.cancelled_count,
            failed_writes: r.failed_writes,
            results: r.results,
        }
    }
}

/// Result of a shipment reservation call. Either the whole change landed
/// (`success`) or nothing did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShipmentTargetResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reserved_quantity: Option<i64>,
}

impl From<AllocationOutcome> for ShipmentTargetResponse {
    fn from(o: AllocationOutcome) -> Self {
        Self {
            success: true,
            message: o.message(),
            error: None,
            reserved_quantity: Some(o.reserved_after),
        }
    }
}

impl From<ApiError> for ShipmentTargetResponse {
    fn from(err: ApiError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
            error: Some(err.code()),
            reserved_quantity: None,
        }
    }
}

impl ShipmentTargetResponse {
    pub fn from_result(result: Result<AllocationOutcome, ApiError>) -> Self {
        match result {
            Ok(outcome) => outcome.into(),
            Err(err) => err.into(),
        }
    }
}
