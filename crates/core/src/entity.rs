//! Entity trait: identity + tenant ownership.

use crate::id::TenantId;

/// Tenant-owned record with a stable identity.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Tenant owning the record.
    fn tenant_id(&self) -> TenantId;

    /// True when the record belongs to `tenant_id`.
    fn belongs_to(&self, tenant_id: TenantId) -> bool {
        self.tenant_id() == tenant_id
    }
}
