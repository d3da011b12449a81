use serde::{Deserialize, Serialize};

use fulfillment_core::{Entity, RecordId, TenantId};

/// Customer order as seen by the matcher.
///
/// Owned by the order-taking side; the matcher only ever rewrites
/// `purchase_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub order_number: String,
    pub recipient_name: String,
    pub purchase_status: Option<String>,
}

impl Order {
    pub fn new(
        id: RecordId,
        tenant_id: TenantId,
        order_number: impl Into<String>,
        recipient_name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            order_number: order_number.into(),
            recipient_name: recipient_name.into(),
            purchase_status: None,
        }
    }

    /// Order number usable as a match key, if any. Compared as stored.
    pub fn order_number_key(&self) -> Option<&str> {
        (!self.order_number.is_empty()).then_some(self.order_number.as_str())
    }

    /// Recipient name usable as a match key, if any. Compared as stored.
    pub fn recipient_key(&self) -> Option<&str> {
        (!self.recipient_name.is_empty()).then_some(self.recipient_name.as_str())
    }
}

impl Entity for Order {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}
