use crate::domain::alert::Alert;
use crate::domain::ledger::{LedgerEntry, Order};
use crate::domain::money::Money;
use crate::domain::outbox::{OutboxMessage, OutboxStatus};
use crate::domain::pix::PixCharge;
use crate::domain::ports::{
    AlertStore, ConsumptionRow, ConsumptionSource, DirectoryStore, LedgerStore, OrderStore,
    OutboxStore, PixChargeStore, WalletStore,
};
use crate::domain::student::{Guardian, Student};
use crate::domain::wallet::Wallet;
use crate::error::{CantinaError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory store for wallets, keyed by student.
///
/// Cloning shares the underlying map, so the same store can be handed to the
/// purchase gateway and to the canteen service.
#[derive(Default, Clone)]
pub struct InMemoryWalletStore {
    wallets: Arc<RwLock<HashMap<Uuid, Wallet>>>,
}

impl InMemoryWalletStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WalletStore for InMemoryWalletStore {
    async fn store(&self, wallet: Wallet) -> Result<()> {
        let mut wallets = self.wallets.write().await;
        wallets.insert(wallet.student_id, wallet);
        Ok(())
    }

    async fn get_by_student(&self, student_id: Uuid) -> Result<Option<Wallet>> {
        let wallets = self.wallets.read().await;
        Ok(wallets.get(&student_id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Wallet>> {
        let wallets = self.wallets.read().await;
        Ok(wallets.values().cloned().collect())
    }
}

/// Append-only ledger.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    entries: Arc<RwLock<Vec<LedgerEntry>>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append(&self, entry: LedgerEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        if entries.iter().any(|e| e.id == entry.id) {
            return Err(CantinaError::ValidationError(format!(
                "ledger entry {} already recorded",
                entry.id
            )));
        }
        entries.push(entry);
        Ok(())
    }

    async fn entries_for_wallet(&self, wallet_id: Uuid) -> Result<Vec<LedgerEntry>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|e| e.wallet_id == wallet_id)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<Uuid, Order>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn store(&self, order: Order) -> Result<()> {
        let mut orders = self.orders.write().await;
        orders.entry(order.id).or_insert(order);
        Ok(())
    }

    async fn get(&self, order_id: Uuid) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(&order_id).cloned())
    }

    async fn placed_since(&self, since: DateTime<Utc>) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut recent: Vec<Order> = orders
            .values()
            .filter(|o| o.created_at >= since)
            .cloned()
            .collect();
        recent.sort_by_key(|o| o.created_at);
        Ok(recent)
    }
}

#[derive(Default, Clone)]
pub struct InMemoryAlertStore {
    alerts: Arc<RwLock<HashMap<Uuid, Alert>>>,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AlertStore for InMemoryAlertStore {
    async fn store(&self, alert: Alert) -> Result<()> {
        let mut alerts = self.alerts.write().await;
        alerts.insert(alert.id, alert);
        Ok(())
    }

    async fn get(&self, alert_id: Uuid) -> Result<Option<Alert>> {
        let alerts = self.alerts.read().await;
        Ok(alerts.get(&alert_id).cloned())
    }

    async fn for_student(&self, student_id: Uuid) -> Result<Vec<Alert>> {
        let alerts = self.alerts.read().await;
        let mut found: Vec<Alert> = alerts
            .values()
            .filter(|a| a.student_id == student_id)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.created_at);
        Ok(found)
    }
}

/// Guardians and students.
#[derive(Default, Clone)]
pub struct InMemoryDirectory {
    guardians: Arc<RwLock<HashMap<Uuid, Guardian>>>,
    students: Arc<RwLock<HashMap<Uuid, Student>>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DirectoryStore for InMemoryDirectory {
    async fn store_guardian(&self, guardian: Guardian) -> Result<()> {
        let mut guardians = self.guardians.write().await;
        guardians.insert(guardian.id, guardian);
        Ok(())
    }

    async fn get_guardian(&self, guardian_id: Uuid) -> Result<Option<Guardian>> {
        let guardians = self.guardians.read().await;
        Ok(guardians.get(&guardian_id).cloned())
    }

    async fn store_student(&self, student: Student) -> Result<()> {
        let mut students = self.students.write().await;
        students.insert(student.id, student);
        Ok(())
    }

    async fn get_student(&self, student_id: Uuid) -> Result<Option<Student>> {
        let students = self.students.read().await;
        Ok(students.get(&student_id).cloned())
    }
}

/// Notification outbox kept in enqueue order.
#[derive(Default, Clone)]
pub struct InMemoryOutboxStore {
    messages: Arc<RwLock<Vec<OutboxMessage>>>,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<OutboxMessage> {
        self.messages.read().await.clone()
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn enqueue(&self, message: OutboxMessage) -> Result<()> {
        let mut messages = self.messages.write().await;
        messages.push(message);
        Ok(())
    }

    async fn pending(&self, limit: usize) -> Result<Vec<OutboxMessage>> {
        let messages = self.messages.read().await;
        let mut pending: Vec<OutboxMessage> = messages
            .iter()
            .filter(|m| m.status == OutboxStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|m| m.created_at);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn update(&self, message: OutboxMessage) -> Result<()> {
        let mut messages = self.messages.write().await;
        match messages.iter_mut().find(|m| m.id == message.id) {
            Some(slot) => {
                *slot = message;
                Ok(())
            }
            None => Err(CantinaError::NotFound(format!(
                "outbox message {}",
                message.id
            ))),
        }
    }
}

#[derive(Default, Clone)]
pub struct InMemoryPixChargeStore {
    charges: Arc<RwLock<HashMap<String, PixCharge>>>,
}

impl InMemoryPixChargeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PixChargeStore for InMemoryPixChargeStore {
    async fn store(&self, charge: PixCharge) -> Result<()> {
        let mut charges = self.charges.write().await;
        charges.insert(charge.txid.clone(), charge);
        Ok(())
    }

    async fn get_by_txid(&self, txid: &str) -> Result<Option<PixCharge>> {
        let charges = self.charges.read().await;
        Ok(charges.get(txid).cloned())
    }
}

/// Aggregates the last seven days of local orders per student.
#[derive(Clone)]
pub struct LocalConsumptionSource {
    orders: InMemoryOrderStore,
    directory: InMemoryDirectory,
}

impl LocalConsumptionSource {
    pub fn new(orders: InMemoryOrderStore, directory: InMemoryDirectory) -> Self {
        Self { orders, directory }
    }
}

#[async_trait]
impl ConsumptionSource for LocalConsumptionSource {
    async fn weekly_consumption(&self, now: DateTime<Utc>) -> Result<Vec<ConsumptionRow>> {
        let orders = self.orders.placed_since(now - Duration::days(7)).await?;

        let mut by_student: BTreeMap<Uuid, Vec<Order>> = BTreeMap::new();
        for order in orders {
            by_student.entry(order.student_id).or_default().push(order);
        }

        let mut rows = Vec::with_capacity(by_student.len());
        for (student_id, orders) in by_student {
            let Some(student) = self.directory.get_student(student_id).await? else {
                continue;
            };
            rows.push(ConsumptionRow {
                guardian_id: student.guardian_id,
                student_id,
                student_name: student.full_name,
                total_spent: orders.iter().map(|o| o.total).sum::<Money>(),
                first_purchase: orders.iter().map(|o| o.created_at).min(),
                last_purchase: orders.iter().map(|o| o.created_at).max(),
            });
        }
        Ok(rows)
    }

    async fn guardian(&self, guardian_id: Uuid) -> Result<Option<Guardian>> {
        self.directory.get_guardian(guardian_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::{LedgerKind, OrderItem};
    use crate::domain::outbox::NotificationKind;
    use crate::domain::student::{StudentStatus, StudyPeriod};
    use crate::domain::wallet::PricingModel;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[tokio::test]
    async fn test_in_memory_wallet_store() {
        let store = InMemoryWalletStore::new();
        let student = Uuid::new_v4();
        let mut wallet = Wallet::new(student, PricingModel::Prepaid, Money::ZERO);
        wallet.balance = Money::new(dec!(100.0));

        store.store(wallet.clone()).await.unwrap();
        let retrieved = store.get_by_student(student).await.unwrap().unwrap();
        assert_eq!(retrieved, wallet);

        assert!(store.get_by_student(Uuid::new_v4()).await.unwrap().is_none());
        assert_eq!(store.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = InMemoryWalletStore::new();
        let shared = store.clone();
        let student = Uuid::new_v4();
        store
            .store(Wallet::new(student, PricingModel::Postpaid, Money::ZERO))
            .await
            .unwrap();
        assert!(shared.get_by_student(student).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_ledger_is_append_only() {
        let store = InMemoryLedgerStore::new();
        let wallet_id = Uuid::new_v4();
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            wallet_id,
            kind: LedgerKind::Credit,
            amount: Money::new(dec!(10)),
            balance_after: Money::new(dec!(10)),
            description: None,
            related_order_id: None,
            created_by: "admin".to_string(),
            created_at: Utc::now(),
        };

        store.append(entry.clone()).await.unwrap();
        assert!(store.append(entry).await.is_err());
        assert_eq!(store.entries_for_wallet(wallet_id).await.unwrap().len(), 1);
        assert!(store.entries_for_wallet(Uuid::new_v4()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_outbox_pending_is_oldest_first_and_limited() {
        let store = InMemoryOutboxStore::new();
        let now = Utc::now();
        for minutes in [5, 1, 3] {
            store
                .enqueue(OutboxMessage::pending(
                    Uuid::new_v4(),
                    None,
                    NotificationKind::Purchase,
                    "5511999999999",
                    json!({ "message": minutes }),
                    now - Duration::minutes(minutes),
                ))
                .await
                .unwrap();
        }

        let pending = store.pending(2).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].payload["message"], 5);
        assert_eq!(pending[1].payload["message"], 3);

        let mut first = pending[0].clone();
        first.mark_sent(now);
        store.update(first).await.unwrap();
        assert_eq!(store.pending(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_local_consumption_groups_by_student() {
        let orders = InMemoryOrderStore::new();
        let directory = InMemoryDirectory::new();
        let guardian_id = Uuid::new_v4();
        let student = Student {
            id: Uuid::new_v4(),
            guardian_id,
            full_name: "Ana".to_string(),
            grade: "3B".to_string(),
            period: StudyPeriod::Afternoon,
            status: StudentStatus::Active,
            pricing_model: PricingModel::Prepaid,
        };
        directory.store_student(student.clone()).await.unwrap();

        let now = Utc::now();
        for (days_ago, total) in [(1, dec!(10)), (3, dec!(5.5)), (10, dec!(99))] {
            orders
                .store(Order {
                    id: Uuid::new_v4(),
                    student_id: student.id,
                    items: vec![OrderItem {
                        product_id: Uuid::new_v4(),
                        quantity: 1,
                        unit_price: Money::new(total),
                    }],
                    total: Money::new(total),
                    created_at: now - Duration::days(days_ago),
                    created_by: "op".to_string(),
                })
                .await
                .unwrap();
        }

        let source = LocalConsumptionSource::new(orders, directory);
        let rows = source.weekly_consumption(now).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].guardian_id, guardian_id);
        assert_eq!(rows[0].total_spent, Money::new(dec!(15.5)));
        assert_eq!(rows[0].first_purchase, Some(now - Duration::days(3)));
        assert_eq!(rows[0].last_purchase, Some(now - Duration::days(1)));
    }
}
