use super::alert::{ALERT_LEVELS, Alert, AlertSubject, AlertType, NEGATIVE_EXCEPTION_LEVEL, evaluate_thresholds};
use super::ledger::{LedgerEntry, LedgerKind};
use super::money::Money;
use super::student::Actor;
use crate::error::{CantinaError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

pub const NEGATIVE_BALANCE_REASON: &str = "negative balance, credit required";
pub const CREDIT_LIMIT_REASON: &str = "credit limit exceeded";

/// Default alert baseline for prepaid wallets registered without a credit limit.
pub const DEFAULT_PREPAID_BASELINE: Decimal = dec!(50);

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PricingModel {
    /// Balance is spendable credit.
    Prepaid,
    /// Balance is accumulated debt bounded by the credit limit.
    Postpaid,
}

fn out_of_range() -> CantinaError {
    CantinaError::ValidationError("balance out of range".to_string())
}

/// Rejects negative credit limits and alert baselines.
pub fn validate_limits(credit_limit: Money, alert_baseline: Option<Money>) -> Result<()> {
    if credit_limit.is_negative() {
        return Err(CantinaError::ValidationError(
            "credit limit cannot be negative".to_string(),
        ));
    }
    if alert_baseline.is_some_and(|b| b.is_negative()) {
        return Err(CantinaError::ValidationError(
            "alert baseline cannot be negative".to_string(),
        ));
    }
    Ok(())
}

/// A student's canteen wallet.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Wallet {
    pub id: Uuid,
    pub student_id: Uuid,
    pub balance: Money,
    pub credit_limit: Money,
    pub model: PricingModel,
    pub allow_negative_once_used: bool,
    pub blocked: bool,
    pub blocked_reason: Option<String>,
    pub alert_baseline: Option<Money>,
    /// Lowest threshold already announced in the current cycle.
    pub last_alert_level: Option<Decimal>,
}

/// Inputs of a purchase that are not part of the wallet itself.
#[derive(Debug, Clone, Copy)]
pub struct PurchaseContext<'a> {
    pub guardian_id: Uuid,
    pub order_id: Uuid,
    pub actor_id: &'a str,
    pub now: DateTime<Utc>,
}

/// Result of a successful debit: the audit row and every alert raised.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseReceipt {
    pub ledger_entry: LedgerEntry,
    pub alerts: Vec<Alert>,
}

impl Wallet {
    pub fn new(student_id: Uuid, model: PricingModel, credit_limit: Money) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id,
            balance: Money::ZERO,
            credit_limit,
            model,
            allow_negative_once_used: false,
            blocked: false,
            blocked_reason: None,
            alert_baseline: None,
            last_alert_level: None,
        }
    }

    /// Amount against which the percentage thresholds are measured.
    pub fn alert_base(&self) -> Money {
        self.alert_baseline.unwrap_or(self.credit_limit)
    }

    /// Spendable amount: the balance for prepaid, the unused limit for postpaid.
    pub fn available(&self) -> Money {
        match self.model {
            PricingModel::Prepaid => self.balance,
            PricingModel::Postpaid => {
                Money::new(self.credit_limit.value().saturating_sub(self.balance.value()))
                    .max(Money::ZERO)
            }
        }
    }

    fn block(&mut self, reason: &str) {
        self.blocked = true;
        self.blocked_reason = Some(reason.to_string());
    }

    fn unblock(&mut self) {
        self.blocked = false;
        self.blocked_reason = None;
    }

    /// Starts a new alert cycle once the wallet is back above the highest threshold.
    pub fn rearm_alerts(&mut self) {
        let base = self.alert_base();
        let available = self.available();
        let above = if base.value() > Decimal::ZERO {
            available.ratio_of(base) > ALERT_LEVELS[0]
        } else {
            available.value() > Decimal::ZERO
        };
        if above {
            self.last_alert_level = None;
        }
    }

    /// Debits a purchase of `total`.
    ///
    /// On success the wallet is updated in place and the receipt carries the
    /// single `purchase` ledger entry plus any alerts. On failure the wallet is
    /// left untouched, except for a postpaid purchase over the credit limit,
    /// which still blocks the wallet.
    pub fn apply_purchase(
        &mut self,
        total: Money,
        ctx: &PurchaseContext<'_>,
    ) -> Result<PurchaseReceipt> {
        if self.blocked {
            return Err(CantinaError::WalletBlocked);
        }
        if total.is_negative() {
            return Err(CantinaError::ValidationError(
                "purchase total cannot be negative".to_string(),
            ));
        }
        let total = total.round();
        let subject = AlertSubject {
            student_id: self.student_id,
            guardian_id: ctx.guardian_id,
            now: ctx.now,
        };
        let mut alerts = Vec::new();

        let amount = match self.model {
            PricingModel::Prepaid => {
                let debited = self.balance.checked_sub(total).ok_or_else(out_of_range)?;
                if self.balance >= total {
                    self.balance = debited.round();
                } else if !self.allow_negative_once_used {
                    self.balance = debited.round();
                    self.allow_negative_once_used = true;
                    self.block(NEGATIVE_BALANCE_REASON);
                    alerts.push(Alert::new(
                        &subject,
                        AlertType::Negative,
                        NEGATIVE_EXCEPTION_LEVEL,
                        format!(
                            "Purchase allowed with negative balance ({total}). Student blocked until credit is added."
                        ),
                    ));
                    info!(wallet = %self.id, balance = %self.balance, "negative balance exception used");
                } else {
                    return Err(CantinaError::InsufficientBalance(
                        "negative balance exception already used".to_string(),
                    ));
                }
                -total
            }
            PricingModel::Postpaid => {
                let new_debt = self.balance.checked_add(total).ok_or_else(out_of_range)?;
                if new_debt > self.credit_limit {
                    self.block(CREDIT_LIMIT_REASON);
                    warn!(wallet = %self.id, debt = %new_debt, limit = %self.credit_limit, "credit limit exceeded");
                    return Err(CantinaError::CreditLimitExceeded);
                }
                self.balance = new_debt.round();
                total
            }
        };

        let available = self.available();
        alerts.extend(evaluate_thresholds(self, available, &subject));

        let ledger_entry = LedgerEntry {
            id: Uuid::new_v4(),
            wallet_id: self.id,
            kind: LedgerKind::Purchase,
            amount,
            balance_after: self.balance,
            description: Some("Purchase at the point of sale".to_string()),
            related_order_id: Some(ctx.order_id),
            created_by: ctx.actor_id.to_string(),
            created_at: ctx.now,
        };

        Ok(PurchaseReceipt {
            ledger_entry,
            alerts,
        })
    }

    /// Manual credit (positive `amount`) or debit (negative) by an administrator.
    ///
    /// Any adjustment leaving the balance at or above zero lifts the block,
    /// whatever caused it.
    pub fn apply_adjustment(
        &mut self,
        amount: Money,
        description: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry> {
        actor.require_admin()?;
        let amount = amount.round();
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(out_of_range)?
            .round();
        if !self.balance.is_negative() {
            self.unblock();
        }
        if !amount.is_negative() {
            self.rearm_alerts();
        }

        Ok(LedgerEntry {
            id: Uuid::new_v4(),
            wallet_id: self.id,
            kind: if amount.is_negative() {
                LedgerKind::Debit
            } else {
                LedgerKind::Credit
            },
            amount,
            balance_after: self.balance,
            description: Some(description.to_string()),
            related_order_id: None,
            created_by: actor.id.clone(),
            created_at: now,
        })
    }

    /// Credits a confirmed payment. Postpaid debt never drops below zero.
    pub fn apply_payment(
        &mut self,
        amount: Money,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry> {
        if amount.is_negative() {
            return Err(CantinaError::ValidationError(
                "payment amount cannot be negative".to_string(),
            ));
        }
        let before = self.balance;
        let after = match self.model {
            PricingModel::Prepaid => before.checked_add(amount),
            PricingModel::Postpaid => before.checked_sub(amount).map(|debt| debt.max(Money::ZERO)),
        }
        .ok_or_else(out_of_range)?
        .round();
        let delta = after.checked_sub(before).ok_or_else(out_of_range)?;
        self.balance = after;
        self.unblock();
        self.rearm_alerts();

        Ok(LedgerEntry {
            id: Uuid::new_v4(),
            wallet_id: self.id,
            kind: LedgerKind::Payment,
            amount: delta,
            balance_after: self.balance,
            description: Some(description.to_string()),
            related_order_id: None,
            created_by: "pix".to_string(),
            created_at: now,
        })
    }

    /// Switches between prepaid and postpaid.
    pub fn change_model(
        &mut self,
        model: PricingModel,
        credit_limit: Money,
        blocked_reason: Option<String>,
    ) -> Result<()> {
        validate_limits(credit_limit, None)?;
        self.model = model;
        self.credit_limit = credit_limit;
        match model {
            PricingModel::Prepaid => {
                self.balance = self.balance.max(Money::ZERO);
                self.unblock();
            }
            PricingModel::Postpaid => {
                if blocked_reason.is_some() {
                    self.blocked_reason = blocked_reason;
                }
            }
        }
        Ok(())
    }
}
