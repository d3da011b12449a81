//! Order-to-sheet matching rules.
//!
//! An order is matched against sheet rows in strict precedence order:
//!
//! 1. **Order number**: the order number appears anywhere inside a row's
//!    `shipment_info`. The first such row in sheet order wins.
//! 2. **Recipient name**: `shipment_info` minus its `P-` prefix and surrounding
//!    whitespace equals the recipient name.
//!
//! The recipient rule is only evaluated when the order-number rule found
//! nothing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::order::Order;
use crate::sheet::SourcingRow;
use crate::status::PurchaseStatus;

/// Which rule produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    OrderNumber,
    RecipientName,
}

impl MatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OrderNumber => "order_number",
            Self::RecipientName => "recipient_name",
        }
    }
}

impl core::fmt::Display for MatchType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sheet row matched to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcingMatch<'a> {
    pub row: &'a SourcingRow,
    pub match_type: MatchType,
}

/// Result of evaluating one order against the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome<'a> {
    /// No row matched; the order is left untouched.
    Unmatched,
    /// The matched row is cancelled; nothing is written.
    Cancelled(SourcingMatch<'a>),
    /// The order should carry `status`.
    Matched {
        found: SourcingMatch<'a>,
        status: PurchaseStatus,
    },
}

/// Order-linked sheet rows in sheet order, with a recipient lookup table.
#[derive(Debug, Clone, Default)]
pub struct SourcingIndex {
    rows: Vec<SourcingRow>,
    by_recipient: HashMap<String, usize>,
}

impl SourcingIndex {
    /// Build from rows in store iteration order. Rows whose `shipment_info`
    /// does not carry the `P-` prefix are ignored.
    pub fn new(rows: impl IntoIterator<Item = SourcingRow>) -> Self {
        let rows: Vec<SourcingRow> = rows
            .into_iter()
            .filter(|r| r.shipment_info.is_order_linked())
            .collect();

        let mut by_recipient = HashMap::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            let key = row.shipment_info.recipient_part();
            if key.is_empty() {
                continue;
            }
            // First row in sheet order wins.
            by_recipient.entry(key.to_string()).or_insert(idx);
        }

        Self { rows, by_recipient }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[SourcingRow] {
        &self.rows
    }

    /// Find the row an order matches, cancelled rows included.
    pub fn find(&self, order: &Order) -> Option<SourcingMatch<'_>> {
        if let Some(number) = order.order_number_key() {
            if let Some(row) = self.rows.iter().find(|r| r.shipment_info.contains(number)) {
                return Some(SourcingMatch {
                    row,
                    match_type: MatchType::OrderNumber,
                });
            }
        }

        let recipient = order.recipient_key()?;
        self.by_recipient.get(recipient).map(|&idx| SourcingMatch {
            row: &self.rows[idx],
            match_type: MatchType::RecipientName,
        })
    }

    /// Match an order and derive the status it should carry.
    pub fn evaluate(&self, order: &Order) -> MatchOutcome<'_> {
        match self.find(order) {
            None => MatchOutcome::Unmatched,
            Some(found) if found.row.is_cancelled() => MatchOutcome::Cancelled(found),
            Some(found) => MatchOutcome::Matched {
                status: PurchaseStatus::derive(found.row),
                found,
            },
        }
    }
}
