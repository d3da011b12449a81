//! Purchase status derivation.

use serde::{Deserialize, Serialize};

use crate::sheet::{SheetTag, SourcingRow};

const SHIPPED: &str = "SHIPPED";
const RECEIVED: &str = "RECEIVED";

/// Fulfillment status derived from a matched sourcing row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PurchaseStatus {
    /// All ordered units shipped; carries the composition note when present.
    Shipped { composition_note: Option<String> },
    /// All ordered units arrived.
    Received,
    /// Neither threshold reached; mirrors the sheet tag.
    Sheet { tag: SheetTag },
}

impl PurchaseStatus {
    /// Precedence: shipped, then received, then the sheet tag.
    ///
    /// Pure function of the row: the same row always yields the same status.
    pub fn derive(row: &SourcingRow) -> Self {
        if row.fully_shipped() {
            let note = &row.composition_note;
            return Self::Shipped {
                composition_note: (!note.is_empty()).then(|| note.clone()),
            };
        }
        if row.fully_received() {
            return Self::Received;
        }
        Self::Sheet {
            tag: row.sheet_tag.clone(),
        }
    }

    /// Text stored in the order's `purchase_status` column.
    pub fn label(&self) -> String {
        match self {
            Self::Shipped {
                composition_note: Some(note),
            } => format!("{SHIPPED}\n{note}"),
            Self::Shipped {
                composition_note: None,
            } => SHIPPED.to_string(),
            Self::Received => RECEIVED.to_string(),
            Self::Sheet { tag } => tag.display_name().to_string(),
        }
    }
}

impl core::fmt::Display for PurchaseStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.label())
    }
}
