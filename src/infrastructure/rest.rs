use crate::config::BackendConfig;
use crate::domain::ledger::OrderItem;
use crate::domain::money::Money;
use crate::domain::outbox::{NotificationKind, OutboxMessage, OutboxStatus};
use crate::domain::ports::{BackendClient, ConsumptionRow, ConsumptionSource, OutboxStore};
use crate::domain::student::Guardian;
use crate::domain::wallet::{PricingModel, Wallet};
use crate::error::{CantinaError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

/// Client for the PostgREST backend that owns the authoritative data.
#[derive(Clone)]
pub struct RestBackendClient {
    client: Client,
    base_url: String,
    service_key: String,
}

impl RestBackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(CantinaError::Config(
                "backend url and service key are required".to_string(),
            ));
        }
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.endpoint(path))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        if response.status().is_success() {
            return Ok(response.json().await?);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(remote_error(status.as_u16(), &body))
    }

    async fn expect_success(response: Response) -> Result<()> {
        if response.status().is_success() {
            return Ok(());
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(remote_error(status.as_u16(), &body))
    }
}

/// Error document returned by PostgREST.
#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    message: Option<String>,
    code: Option<String>,
}

/// Keeps the backend message untouched so callers can show it as is.
fn remote_error(status: u16, body: &str) -> CantinaError {
    match serde_json::from_str::<RemoteErrorBody>(body) {
        Ok(RemoteErrorBody {
            message: Some(message),
            code,
        }) => CantinaError::Remote { message, code },
        _ => CantinaError::Remote {
            message: if body.is_empty() {
                format!("backend responded with status {status}")
            } else {
                body.to_string()
            },
            code: None,
        },
    }
}

/// Row of the `wallets` table.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletRow {
    pub id: Uuid,
    pub student_id: Uuid,
    #[serde(default)]
    pub balance: Option<Decimal>,
    #[serde(default)]
    pub credit_limit: Option<Decimal>,
    pub model: PricingModel,
    #[serde(default)]
    pub allow_negative_once_used: Option<bool>,
    #[serde(default)]
    pub blocked: Option<bool>,
    #[serde(default)]
    pub blocked_reason: Option<String>,
    #[serde(default)]
    pub alert_baseline: Option<Decimal>,
    #[serde(default)]
    pub last_alert_level: Option<Decimal>,
}

impl From<WalletRow> for Wallet {
    fn from(row: WalletRow) -> Self {
        Self {
            id: row.id,
            student_id: row.student_id,
            balance: Money::new(row.balance.unwrap_or_default()),
            credit_limit: Money::new(row.credit_limit.unwrap_or_default()),
            model: row.model,
            allow_negative_once_used: row.allow_negative_once_used.unwrap_or(false),
            blocked: row.blocked.unwrap_or(false),
            blocked_reason: row.blocked_reason,
            alert_baseline: row.alert_baseline.map(Money::new),
            last_alert_level: row.last_alert_level,
        }
    }
}

#[derive(Debug, Serialize)]
struct PurchaseItemParam {
    product_id: Uuid,
    quantity: u32,
    unit_price: Money,
}

/// Row of the `notification_outbox` table.
#[derive(Debug, Clone, Deserialize)]
pub struct OutboxRow {
    pub id: Uuid,
    pub guardian_id: Uuid,
    #[serde(default)]
    pub student_id: Option<Uuid>,
    pub kind: NotificationKind,
    pub to_phone: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    #[serde(default)]
    pub attempt_count: Option<u32>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<OutboxRow> for OutboxMessage {
    fn from(row: OutboxRow) -> Self {
        Self {
            id: row.id,
            guardian_id: row.guardian_id,
            student_id: row.student_id,
            kind: row.kind,
            to_phone: row.to_phone,
            payload: row.payload,
            status: row.status,
            attempt_count: row.attempt_count.unwrap_or(0),
            last_error: row.last_error,
            sent_at: row.sent_at,
            created_at: row.created_at,
        }
    }
}

/// Row of the `weekly_consumption` view.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumptionViewRow {
    pub guardian_id: Uuid,
    pub student_id: Uuid,
    pub full_name: String,
    #[serde(default)]
    pub total_spent: Option<Decimal>,
    #[serde(default)]
    pub first_purchase: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_purchase: Option<DateTime<Utc>>,
}

impl From<ConsumptionViewRow> for ConsumptionRow {
    fn from(row: ConsumptionViewRow) -> Self {
        Self {
            guardian_id: row.guardian_id,
            student_id: row.student_id,
            student_name: row.full_name,
            total_spent: Money::new(row.total_spent.unwrap_or_default()),
            first_purchase: row.first_purchase,
            last_purchase: row.last_purchase,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GuardianRow {
    id: Uuid,
    full_name: String,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    cpf: Option<String>,
}

impl From<GuardianRow> for Guardian {
    fn from(row: GuardianRow) -> Self {
        Self {
            id: row.id,
            full_name: row.full_name,
            phone: row.phone.unwrap_or_default(),
            cpf: row.cpf.unwrap_or_default(),
            address: None,
        }
    }
}

#[async_trait]
impl BackendClient for RestBackendClient {
    async fn process_purchase(&self, student_id: Uuid, items: &[OrderItem]) -> Result<Uuid> {
        let p_items: Vec<PurchaseItemParam> = items
            .iter()
            .map(|item| PurchaseItemParam {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();

        let response = self
            .request(Method::POST, "rpc/process_purchase")
            .json(&json!({ "p_student_id": student_id, "p_items": p_items }))
            .send()
            .await?;
        let order_id: Uuid = Self::read_json(response).await?;
        debug!(order = %order_id, student = %student_id, "process_purchase accepted");
        Ok(order_id)
    }

    async fn fetch_wallet(&self, student_id: Uuid) -> Result<Option<Wallet>> {
        let response = self
            .request(
                Method::GET,
                &format!("wallets?student_id=eq.{student_id}&select=*"),
            )
            .send()
            .await?;
        let rows: Vec<WalletRow> = Self::read_json(response).await?;
        Ok(rows.into_iter().next().map(Wallet::from))
    }
}

#[async_trait]
impl OutboxStore for RestBackendClient {
    async fn enqueue(&self, message: OutboxMessage) -> Result<()> {
        let response = self
            .request(Method::POST, "notification_outbox")
            .header("Prefer", "return=minimal")
            .json(&message)
            .send()
            .await?;
        Self::expect_success(response).await
    }

    async fn pending(&self, limit: usize) -> Result<Vec<OutboxMessage>> {
        let response = self
            .request(
                Method::GET,
                &format!(
                    "notification_outbox?status=eq.pending&order=created_at.asc&limit={limit}&select=*"
                ),
            )
            .send()
            .await?;
        let rows: Vec<OutboxRow> = Self::read_json(response).await?;
        Ok(rows.into_iter().map(OutboxMessage::from).collect())
    }

    async fn update(&self, message: OutboxMessage) -> Result<()> {
        let response = self
            .request(
                Method::PATCH,
                &format!("notification_outbox?id=eq.{}", message.id),
            )
            .header("Prefer", "return=minimal")
            .json(&json!({
                "status": message.status,
                "attempt_count": message.attempt_count,
                "last_error": message.last_error,
                "sent_at": message.sent_at,
            }))
            .send()
            .await?;
        Self::expect_success(response).await
    }
}

#[async_trait]
impl ConsumptionSource for RestBackendClient {
    /// The view already covers the trailing week, so `now` is not sent.
    async fn weekly_consumption(&self, _now: DateTime<Utc>) -> Result<Vec<ConsumptionRow>> {
        let response = self
            .request(Method::GET, "weekly_consumption?select=*")
            .send()
            .await?;
        let rows: Vec<ConsumptionViewRow> = Self::read_json(response).await?;
        Ok(rows.into_iter().map(ConsumptionRow::from).collect())
    }

    async fn guardian(&self, guardian_id: Uuid) -> Result<Option<Guardian>> {
        let response = self
            .request(
                Method::GET,
                &format!("guardians?id=eq.{guardian_id}&select=id,full_name,phone,cpf"),
            )
            .send()
            .await?;
        let rows: Vec<GuardianRow> = Self::read_json(response).await?;
        Ok(rows.into_iter().next().map(Guardian::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config() -> BackendConfig {
        BackendConfig {
            url: "https://db.example.com/".to_string(),
            service_key: "service".to_string(),
            timeout_secs: 3,
        }
    }

    #[test]
    fn test_requires_configuration() {
        assert!(matches!(
            RestBackendClient::new(&BackendConfig::default()),
            Err(CantinaError::Config(_))
        ));
    }

    #[test]
    fn test_endpoint_building() {
        let client = RestBackendClient::new(&config()).unwrap();
        assert_eq!(
            client.endpoint("rpc/process_purchase"),
            "https://db.example.com/rest/v1/rpc/process_purchase"
        );
    }

    #[test]
    fn test_wallet_row_mapping_with_defaults() {
        let row: WalletRow = serde_json::from_value(json!({
            "id": "7f1f2b52-0d5e-4c39-9d59-7a8f7a1c2b10",
            "student_id": "0c7d2a46-4a8f-4c7c-9a55-3f7b1e3e2d11",
            "balance": 12.5,
            "credit_limit": null,
            "model": "prepaid",
            "blocked": true,
            "blocked_reason": "saldo negativo"
        }))
        .unwrap();

        let wallet = Wallet::from(row);
        assert_eq!(wallet.balance, Money::new(dec!(12.5)));
        assert_eq!(wallet.credit_limit, Money::ZERO);
        assert!(wallet.blocked);
        assert!(!wallet.allow_negative_once_used);
        assert_eq!(wallet.alert_baseline, None);
        assert_eq!(wallet.last_alert_level, None);
    }

    #[test]
    fn test_wallet_row_accepts_numeric_strings() {
        let row: WalletRow = serde_json::from_value(json!({
            "id": "7f1f2b52-0d5e-4c39-9d59-7a8f7a1c2b10",
            "student_id": "0c7d2a46-4a8f-4c7c-9a55-3f7b1e3e2d11",
            "balance": "30.00",
            "credit_limit": "80.00",
            "model": "postpaid",
            "last_alert_level": "0.15"
        }))
        .unwrap();
        let wallet = Wallet::from(row);
        assert_eq!(wallet.available(), Money::new(dec!(50)));
        assert_eq!(wallet.last_alert_level, Some(dec!(0.15)));
    }

    #[test]
    fn test_remote_error_forwards_backend_message() {
        let err = remote_error(
            400,
            r#"{"message":"Limite de fiado excedido","code":"P0001","details":null}"#,
        );
        assert_eq!(err.to_string(), "Remote error: Limite de fiado excedido");
        assert_eq!(err.remote_code(), Some("P0001"));

        let plain = remote_error(503, "");
        assert_eq!(plain.to_string(), "Remote error: backend responded with status 503");
        assert_eq!(plain.status_code(), 502);
    }

    #[test]
    fn test_outbox_row_defaults_attempts() {
        let row: OutboxRow = serde_json::from_value(json!({
            "id": "7f1f2b52-0d5e-4c39-9d59-7a8f7a1c2b10",
            "guardian_id": "0c7d2a46-4a8f-4c7c-9a55-3f7b1e3e2d11",
            "kind": "weekly_report",
            "to_phone": "5511987654321",
            "payload": { "message": "oi" },
            "status": "pending",
            "attempt_count": null,
            "created_at": "2026-10-16T12:00:00Z"
        }))
        .unwrap();
        let message = OutboxMessage::from(row);
        assert_eq!(message.attempt_count, 0);
        assert_eq!(message.kind, NotificationKind::WeeklyReport);
        assert_eq!(message.message_text(), "oi");
    }

    #[test]
    fn test_consumption_view_mapping() {
        let row: ConsumptionViewRow = serde_json::from_value(json!({
            "guardian_id": "0c7d2a46-4a8f-4c7c-9a55-3f7b1e3e2d11",
            "student_id": "7f1f2b52-0d5e-4c39-9d59-7a8f7a1c2b10",
            "full_name": "Ana",
            "total_spent": 42.5,
            "first_purchase": "2026-10-12T11:00:00Z",
            "last_purchase": null
        }))
        .unwrap();
        let row = ConsumptionRow::from(row);
        assert_eq!(row.student_name, "Ana");
        assert_eq!(row.total_spent, Money::new(dec!(42.5)));
        assert!(row.last_purchase.is_none());
    }
}
