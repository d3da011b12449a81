//! Sourcing sheet rows.

use serde::{Deserialize, Serialize};

use fulfillment_core::{Entity, RecordId, TenantId};

/// Prefix marking a sheet row as tied to a customer order.
pub const SHIPMENT_INFO_PREFIX: &str = "P-";

/// Sheet status tag (`N`, `P`, `O`, `C`; anything else passes through).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SheetTag {
    New,
    Paid,
    InProgress,
    Cancelled,
    Other(String),
}

impl SheetTag {
    /// Exact code match; anything else is kept verbatim.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "N" => Self::New,
            "P" => Self::Paid,
            "O" => Self::InProgress,
            "C" => Self::Cancelled,
            other => Self::Other(other.to_string()),
        }
    }

    /// Raw sheet code.
    pub fn code(&self) -> &str {
        match self {
            Self::New => "N",
            Self::Paid => "P",
            Self::InProgress => "O",
            Self::Cancelled => "C",
            Self::Other(raw) => raw,
        }
    }

    /// Label written into `purchase_status`. Unmapped tags pass through.
    pub fn display_name(&self) -> &str {
        match self {
            Self::New => "NEW",
            Self::Paid => "PAID",
            Self::InProgress => "IN_PROGRESS",
            Self::Cancelled | Self::Other(_) => self.code(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<String> for SheetTag {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<SheetTag> for String {
    fn from(value: SheetTag) -> Self {
        value.code().to_string()
    }
}

impl core::fmt::Display for SheetTag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

/// `shipment_info` cell: `"P-<order_number> <recipient_name>"` or `"P-<recipient_name>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShipmentInfo(String);

impl ShipmentInfo {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_order_linked(&self) -> bool {
        self.0.starts_with(SHIPMENT_INFO_PREFIX)
    }

    /// Raw text with the leading `P-` removed and surrounding whitespace trimmed.
    pub fn recipient_part(&self) -> &str {
        self.0
            .strip_prefix(SHIPMENT_INFO_PREFIX)
            .unwrap_or(&self.0)
            .trim()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.0.contains(needle)
    }
}

/// One row of the sourcing/procurement sheet. Read-only to this core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcingRow {
    pub id: RecordId,
    pub tenant_id: TenantId,
    /// Sheet-side row reference (e.g. the sheet's own row number).
    pub row_ref: String,
    pub shipment_info: ShipmentInfo,
    pub quantity_ordered: i64,
    pub quantity_imported: i64,
    pub quantity_shipped: i64,
    pub composition_note: String,
    pub sheet_tag: SheetTag,
}

impl SourcingRow {
    pub fn is_cancelled(&self) -> bool {
        self.sheet_tag.is_cancelled()
    }

    /// Every ordered unit has shipped.
    pub fn fully_shipped(&self) -> bool {
        self.quantity_shipped > 0 && self.quantity_shipped == self.quantity_ordered
    }

    /// Every ordered unit has arrived at the warehouse.
    pub fn fully_received(&self) -> bool {
        self.quantity_imported > 0 && self.quantity_imported == self.quantity_ordered
    }
}

impl Entity for SourcingRow {
    type Id = RecordId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tags_map_to_display_names() {
        assert_eq!(SheetTag::parse("N").display_name(), "NEW");
        assert_eq!(SheetTag::parse("P").display_name(), "PAID");
        assert_eq!(SheetTag::parse("O").display_name(), "IN_PROGRESS");
        assert!(SheetTag::parse("C").is_cancelled());
    }

    #[test]
    fn unknown_tags_pass_through() {
        let tag = SheetTag::parse("HOLD");
        assert_eq!(tag, SheetTag::Other("HOLD".to_string()));
        assert_eq!(tag.display_name(), "HOLD");
        assert_eq!(SheetTag::parse("").display_name(), "");
    }

    #[test]
    fn padded_tags_are_not_sheet_codes() {
        assert!(!SheetTag::parse(" C").is_cancelled());
        assert_eq!(SheetTag::parse(" C").display_name(), " C");
        assert_eq!(SheetTag::parse("HOLD ").display_name(), "HOLD ");
        assert_eq!(SheetTag::parse("N ").display_name(), "N ");
    }

    #[test]
    fn recipient_part_strips_prefix_and_whitespace() {
        assert_eq!(ShipmentInfo::new("P-  Lee Jiwoo ").recipient_part(), "Lee Jiwoo");
        assert_eq!(
            ShipmentInfo::new("P-100234 Lee Jiwoo").recipient_part(),
            "100234 Lee Jiwoo"
        );
        assert!(ShipmentInfo::new("P-x").is_order_linked());
        assert!(!ShipmentInfo::new("X-x").is_order_linked());
    }

    #[test]
    fn tags_serialize_as_sheet_codes() {
        let raw: String = SheetTag::InProgress.into();
        assert_eq!(raw, "O");
        assert_eq!(SheetTag::from("P".to_string()), SheetTag::Paid);
    }
}
