use super::alert::Alert;
use super::ledger::{LedgerEntry, Order, OrderItem};
use super::money::Money;
use super::outbox::OutboxMessage;
use super::pix::PixCharge;
use super::student::{Guardian, Student};
use super::wallet::Wallet;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn store(&self, wallet: Wallet) -> Result<()>;
    async fn get_by_student(&self, student_id: Uuid) -> Result<Option<Wallet>>;
    async fn get_all(&self) -> Result<Vec<Wallet>>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn append(&self, entry: LedgerEntry) -> Result<()>;
    /// Entries of one wallet, oldest first.
    async fn entries_for_wallet(&self, wallet_id: Uuid) -> Result<Vec<LedgerEntry>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn store(&self, order: Order) -> Result<()>;
    async fn get(&self, order_id: Uuid) -> Result<Option<Order>>;
    async fn placed_since(&self, since: DateTime<Utc>) -> Result<Vec<Order>>;
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn store(&self, alert: Alert) -> Result<()>;
    async fn get(&self, alert_id: Uuid) -> Result<Option<Alert>>;
    async fn for_student(&self, student_id: Uuid) -> Result<Vec<Alert>>;
}

#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn store_guardian(&self, guardian: Guardian) -> Result<()>;
    async fn get_guardian(&self, guardian_id: Uuid) -> Result<Option<Guardian>>;
    async fn store_student(&self, student: Student) -> Result<()>;
    async fn get_student(&self, student_id: Uuid) -> Result<Option<Student>>;
}

#[async_trait]
pub trait OutboxStore: Send + Sync {
    async fn enqueue(&self, message: OutboxMessage) -> Result<()>;
    /// Up to `limit` pending messages, oldest first.
    async fn pending(&self, limit: usize) -> Result<Vec<OutboxMessage>>;
    async fn update(&self, message: OutboxMessage) -> Result<()>;
}

#[async_trait]
pub trait PixChargeStore: Send + Sync {
    async fn store(&self, charge: PixCharge) -> Result<()>;
    async fn get_by_txid(&self, txid: &str) -> Result<Option<PixCharge>>;
}

/// Delivers text messages to a phone number.
#[async_trait]
pub trait MessageSender: Send + Sync {
    fn is_configured(&self) -> bool;
    async fn send_text(&self, to_phone: &str, message: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    pub guardian_id: Uuid,
    pub student_id: Option<Uuid>,
    pub amount: Money,
    pub description: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCharge {
    pub txid: String,
    pub br_code: String,
}

/// Creates Pix charges at the payment provider.
#[async_trait]
pub trait PixProvider: Send + Sync {
    async fn create_charge(&self, request: &ChargeRequest) -> Result<ProviderCharge>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseRequest {
    pub student_id: Uuid,
    pub guardian_id: Uuid,
    pub items: Vec<OrderItem>,
    pub actor_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseOutcome {
    pub order: Order,
    pub wallet: Wallet,
    pub alerts: Vec<Alert>,
}

/// Executes the debit of a purchase, either locally or at the backend.
#[async_trait]
pub trait PurchaseGateway: Send + Sync {
    async fn process_purchase(&self, request: &PurchaseRequest) -> Result<PurchaseOutcome>;
}

/// Transactional backend procedures plus the wallet read used to reconcile.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Returns the id of the order created by the backend.
    async fn process_purchase(&self, student_id: Uuid, items: &[OrderItem]) -> Result<Uuid>;
    async fn fetch_wallet(&self, student_id: Uuid) -> Result<Option<Wallet>>;
}

/// One student's spending over the reporting week.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionRow {
    pub guardian_id: Uuid,
    pub student_id: Uuid,
    pub student_name: String,
    pub total_spent: Money,
    pub first_purchase: Option<DateTime<Utc>>,
    pub last_purchase: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ConsumptionSource: Send + Sync {
    async fn weekly_consumption(&self, now: DateTime<Utc>) -> Result<Vec<ConsumptionRow>>;
    async fn guardian(&self, guardian_id: Uuid) -> Result<Option<Guardian>>;
}

pub type WalletStoreBox = Box<dyn WalletStore>;
pub type LedgerStoreBox = Box<dyn LedgerStore>;
pub type OrderStoreBox = Box<dyn OrderStore>;
pub type AlertStoreBox = Box<dyn AlertStore>;
pub type DirectoryStoreBox = Box<dyn DirectoryStore>;
pub type OutboxStoreBox = Box<dyn OutboxStore>;
pub type PixChargeStoreBox = Box<dyn PixChargeStore>;
pub type MessageSenderBox = Box<dyn MessageSender>;
pub type PixProviderBox = Box<dyn PixProvider>;
pub type PurchaseGatewayBox = Box<dyn PurchaseGateway>;
pub type BackendClientBox = Box<dyn BackendClient>;
pub type ConsumptionSourceBox = Box<dyn ConsumptionSource>;
