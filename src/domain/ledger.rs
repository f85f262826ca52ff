use super::money::Money;
use crate::error::{CantinaError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum LedgerKind {
    Purchase,
    Credit,
    Debit,
    Adjustment,
    Payment,
}

/// Immutable audit row for every balance-affecting event on a wallet.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub kind: LedgerKind,
    /// Signed change applied to the wallet balance.
    pub amount: Money,
    pub balance_after: Money,
    pub description: Option<String>,
    pub related_order_id: Option<Uuid>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Replays entries from a zero balance.
pub fn replay_balance<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Money {
    entries.into_iter().map(|e| e.amount).sum()
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price: Money,
}

fn out_of_range() -> CantinaError {
    CantinaError::ValidationError("purchase total out of range".to_string())
}

impl OrderItem {
    pub fn line_total(&self) -> Result<Money> {
        self.unit_price
            .value()
            .checked_mul(Decimal::from(self.quantity))
            .map(Money::new)
            .ok_or_else(out_of_range)
    }
}

/// Validates a cart and returns its total at cent precision.
pub fn cart_total(items: &[OrderItem]) -> Result<Money> {
    if items.is_empty() {
        return Err(CantinaError::ValidationError(
            "a purchase needs at least one item".to_string(),
        ));
    }
    for item in items {
        if item.quantity == 0 {
            return Err(CantinaError::ValidationError(
                "item quantity must be positive".to_string(),
            ));
        }
        if item.unit_price.is_negative() {
            return Err(CantinaError::ValidationError(
                "item price cannot be negative".to_string(),
            ));
        }
    }
    items
        .iter()
        .try_fold(Money::ZERO, |total, item| {
            total.checked_add(item.line_total()?).ok_or_else(out_of_range)
        })
        .map(Money::round)
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Order {
    pub id: Uuid,
    pub student_id: Uuid,
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}
