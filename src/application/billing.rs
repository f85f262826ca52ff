use crate::domain::money::Money;
use crate::domain::pix::{PixCharge, PixChargeStatus};
use crate::domain::ports::{
    ChargeRequest, LedgerStoreBox, PixChargeStoreBox, PixProviderBox, WalletStoreBox,
};
use crate::error::{CantinaError, Result};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const CHARGE_TTL_MINUTES: i64 = 30;
const PAYMENT_DESCRIPTION: &str = "Pix payment (PagSeguro)";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCharge {
    pub guardian_id: Uuid,
    pub student_id: Option<Uuid>,
    pub amount: Money,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeCreated {
    pub txid: String,
    pub br_code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookOutcome {
    pub txid: String,
    pub status: PixChargeStatus,
    /// Balance change applied to the wallet, if any.
    pub credited: Option<Money>,
}

/// Turns wallet top-ups into Pix charges and settles them from provider callbacks.
pub struct BillingBridge {
    provider: PixProviderBox,
    charges: PixChargeStoreBox,
    wallets: WalletStoreBox,
    ledger: LedgerStoreBox,
    webhook_secret: Option<String>,
}

impl BillingBridge {
    pub fn new(
        provider: PixProviderBox,
        charges: PixChargeStoreBox,
        wallets: WalletStoreBox,
        ledger: LedgerStoreBox,
        webhook_secret: Option<String>,
    ) -> Self {
        Self {
            provider,
            charges,
            wallets,
            ledger,
            webhook_secret: webhook_secret.filter(|s| !s.is_empty()),
        }
    }

    pub async fn create_charge(&self, request: CreateCharge) -> Result<ChargeCreated> {
        if request.guardian_id.is_nil() {
            return Err(CantinaError::ValidationError(
                "guardianId and amount are required".to_string(),
            ));
        }
        if request.amount.value() <= Decimal::ZERO {
            return Err(CantinaError::ValidationError(
                "charge amount must be positive".to_string(),
            ));
        }

        let now = Utc::now();
        let expires_at = now + Duration::minutes(CHARGE_TTL_MINUTES);
        let amount = request.amount.round();
        let created = self
            .provider
            .create_charge(&ChargeRequest {
                guardian_id: request.guardian_id,
                student_id: request.student_id,
                amount,
                description: request.description.clone(),
                expires_at,
            })
            .await?;

        self.charges
            .store(PixCharge {
                id: Uuid::new_v4(),
                guardian_id: request.guardian_id,
                student_id: request.student_id,
                txid: created.txid.clone(),
                status: PixChargeStatus::Pending,
                amount,
                br_code: created.br_code.clone(),
                description: request.description,
                expires_at: Some(expires_at),
                created_at: now,
            })
            .await?;

        info!(txid = %created.txid, amount = %amount, "pix charge created");
        Ok(ChargeCreated {
            txid: created.txid,
            br_code: created.br_code,
            expires_at,
        })
    }

    /// Applies a provider status callback.
    ///
    /// A `paid` status credits the charge's student wallet once; callbacks
    /// repeating `paid` for a settled charge only refresh the stored row.
    pub async fn handle_webhook(
        &self,
        signature: Option<&str>,
        payload: &Value,
    ) -> Result<WebhookOutcome> {
        if let Some(secret) = &self.webhook_secret
            && signature != Some(secret.as_str())
        {
            return Err(CantinaError::Unauthorized(
                "invalid webhook signature".to_string(),
            ));
        }

        let txid = string_field(payload, &["txid", "charge_id"])
            .ok_or_else(|| CantinaError::ValidationError("webhook without txid".to_string()))?;
        let raw_status = string_field(payload, &["status", "charge_status"])
            .ok_or_else(|| CantinaError::ValidationError("webhook without status".to_string()))?;
        let status = PixChargeStatus::parse(&raw_status).ok_or_else(|| {
            CantinaError::ValidationError(format!("unknown charge status {raw_status}"))
        })?;

        let mut charge = self
            .charges
            .get_by_txid(&txid)
            .await?
            .ok_or_else(|| CantinaError::NotFound(format!("charge {txid}")))?;
        let already_paid = charge.status == PixChargeStatus::Paid;

        charge.status = status;
        if let Some(br_code) = payload
            .pointer("/qr_codes/0/emv")
            .and_then(Value::as_str)
        {
            charge.br_code = br_code.to_string();
        }
        let amount = webhook_amount(payload)?.unwrap_or(charge.amount);

        let mut outcome = WebhookOutcome {
            txid,
            status,
            credited: None,
        };
        if status != PixChargeStatus::Paid {
            info!(txid = %outcome.txid, status = ?status, "pix charge updated");
        } else if already_paid {
            warn!(txid = %outcome.txid, "duplicate paid webhook ignored");
        } else {
            outcome.credited = self.credit_payment(&charge, amount).await?;
        }

        // Last write: until the charge reads `paid`, a failed step above is retried.
        self.charges.store(charge).await?;
        Ok(outcome)
    }

    /// Credits a paid charge to its student's wallet.
    ///
    /// The payment entry reuses the charge id. A retry finds that entry and
    /// only saves the wallet if it does not already carry the credit.
    async fn credit_payment(&self, charge: &PixCharge, amount: Money) -> Result<Option<Money>> {
        let Some(student_id) = charge.student_id else {
            info!(txid = %charge.txid, "paid charge without student, nothing to credit");
            return Ok(None);
        };
        let Some(mut wallet) = self.wallets.get_by_student(student_id).await? else {
            warn!(txid = %charge.txid, student = %student_id, "paid charge for student without wallet");
            return Ok(None);
        };

        let recorded = self
            .ledger
            .entries_for_wallet(wallet.id)
            .await?
            .into_iter()
            .find(|e| e.id == charge.id);
        let entry = match recorded {
            Some(entry) if wallet.balance == entry.balance_after => {
                debug!(txid = %charge.txid, "payment already applied to wallet");
                return Ok(Some(entry.amount));
            }
            Some(entry) => {
                wallet.apply_payment(amount, PAYMENT_DESCRIPTION, Utc::now())?;
                entry
            }
            None => {
                let mut entry = wallet.apply_payment(amount, PAYMENT_DESCRIPTION, Utc::now())?;
                entry.id = charge.id;
                self.ledger.append(entry.clone()).await?;
                entry
            }
        };
        self.wallets.store(wallet.clone()).await?;

        info!(
            txid = %charge.txid,
            wallet = %wallet.id,
            delta = %entry.amount,
            balance = %wallet.balance,
            "pix payment credited"
        );
        Ok(Some(entry.amount))
    }
}

fn string_field(payload: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match payload.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Amount from `amount` or `value.amount`, as a number or a decimal string.
fn webhook_amount(payload: &Value) -> Result<Option<Money>> {
    let raw = payload
        .get("amount")
        .or_else(|| payload.pointer("/value/amount"));
    let text = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(CantinaError::ValidationError(format!(
                "invalid webhook amount {other}"
            )));
        }
    };
    Decimal::from_str(text.trim())
        .map(|d| Some(Money::new(d).round()))
        .map_err(|_| CantinaError::ValidationError(format!("invalid webhook amount {text}")))
}
