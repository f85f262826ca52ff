use super::notifications::{NotificationSettings, purchase_notification};
use crate::domain::alert::Alert;
use crate::domain::ledger::{LedgerEntry, OrderItem, cart_total};
use crate::domain::money::Money;
use crate::domain::ports::{
    AlertStoreBox, DirectoryStoreBox, LedgerStoreBox, OrderStoreBox, OutboxStoreBox,
    PurchaseGatewayBox, PurchaseOutcome, PurchaseRequest, WalletStoreBox,
};
use crate::domain::student::{Actor, Guardian, Student};
use crate::domain::wallet::{DEFAULT_PREPAID_BASELINE, PricingModel, Wallet, validate_limits};
use crate::error::{CantinaError, Result};
use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Storage ports the canteen service works against.
pub struct CanteenStores {
    pub directory: DirectoryStoreBox,
    pub wallets: WalletStoreBox,
    pub ledger: LedgerStoreBox,
    pub orders: OrderStoreBox,
    pub alerts: AlertStoreBox,
    pub outbox: OutboxStoreBox,
}

/// Wallet settings chosen when a student is registered.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WalletOptions {
    pub credit_limit: Option<Money>,
    pub alert_baseline: Option<Money>,
}

/// Point-of-sale and back-office operations over guardians, students and wallets.
pub struct CanteenService {
    stores: CanteenStores,
    gateway: PurchaseGatewayBox,
    settings: NotificationSettings,
}

impl CanteenService {
    pub fn new(
        stores: CanteenStores,
        gateway: PurchaseGatewayBox,
        settings: NotificationSettings,
    ) -> Self {
        Self {
            stores,
            gateway,
            settings,
        }
    }

    pub async fn register_guardian(&self, guardian: Guardian) -> Result<Guardian> {
        guardian.validate()?;
        self.stores.directory.store_guardian(guardian.clone()).await?;
        info!(guardian = %guardian.id, "guardian registered");
        Ok(guardian)
    }

    /// Registers the student and opens an empty wallet with its pricing model.
    pub async fn register_student(
        &self,
        student: Student,
        options: WalletOptions,
    ) -> Result<Wallet> {
        student.validate()?;
        validate_limits(
            options.credit_limit.unwrap_or(Money::ZERO),
            options.alert_baseline,
        )?;

        let credit_limit = options.credit_limit.unwrap_or(Money::ZERO);
        let mut wallet = Wallet::new(student.id, student.pricing_model, credit_limit);
        wallet.alert_baseline = Some(options.alert_baseline.unwrap_or(
            match student.pricing_model {
                PricingModel::Prepaid => options
                    .credit_limit
                    .unwrap_or(Money::new(DEFAULT_PREPAID_BASELINE)),
                PricingModel::Postpaid => credit_limit,
            },
        ));

        self.stores.directory.store_student(student.clone()).await?;
        self.stores.wallets.store(wallet.clone()).await?;
        info!(student = %student.id, wallet = %wallet.id, model = ?wallet.model, "student registered");
        Ok(wallet)
    }

    pub async fn record_purchase(
        &self,
        student_id: Uuid,
        items: Vec<OrderItem>,
        actor: &Actor,
    ) -> Result<PurchaseOutcome> {
        let student = self.student(student_id).await?;
        if !student.is_active() {
            return Err(CantinaError::ValidationError(
                "student is not active".to_string(),
            ));
        }
        actor.require_point_of_sale()?;
        cart_total(&items)?;

        let wallet = self.wallet(student_id).await?;
        if wallet.blocked {
            return Err(CantinaError::WalletBlocked);
        }

        let request = PurchaseRequest {
            student_id,
            guardian_id: student.guardian_id,
            items,
            actor_id: actor.id.clone(),
        };
        let outcome = self.gateway.process_purchase(&request).await?;

        // Local gateways already persisted these; writes are keyed by id.
        self.stores.wallets.store(outcome.wallet.clone()).await?;
        self.stores.orders.store(outcome.order.clone()).await?;
        for alert in &outcome.alerts {
            self.stores.alerts.store(alert.clone()).await?;
        }

        if let Err(e) = self.enqueue_purchase_notification(&student, &outcome).await {
            warn!(order = %outcome.order.id, error = %e, "purchase notification not queued");
        }

        info!(
            order = %outcome.order.id,
            student = %student_id,
            total = %outcome.order.total,
            alerts = outcome.alerts.len(),
            "purchase recorded"
        );
        Ok(outcome)
    }

    async fn enqueue_purchase_notification(
        &self,
        student: &Student,
        outcome: &PurchaseOutcome,
    ) -> Result<()> {
        let guardian = self
            .stores
            .directory
            .get_guardian(student.guardian_id)
            .await?
            .ok_or_else(|| CantinaError::NotFound(format!("guardian {}", student.guardian_id)))?;
        let message = purchase_notification(
            &self.settings,
            &guardian,
            student,
            &outcome.order,
            &outcome.wallet,
            Utc::now(),
        );
        self.stores.outbox.enqueue(message).await
    }

    /// Manual credit or debit by an administrator.
    ///
    /// The wallet is saved before the ledger entry is appended. If the append
    /// fails the previous wallet is put back, so no balance change is left
    /// without its entry.
    pub async fn adjust_wallet(
        &self,
        student_id: Uuid,
        amount: Money,
        description: &str,
        actor: &Actor,
    ) -> Result<(Wallet, LedgerEntry)> {
        let mut wallet = self.wallet(student_id).await?;
        let before = wallet.clone();
        let entry = wallet.apply_adjustment(amount, description, actor, Utc::now())?;

        self.stores.wallets.store(wallet.clone()).await?;
        if let Err(e) = self.stores.ledger.append(entry.clone()).await {
            warn!(wallet = %wallet.id, error = %e, "ledger append failed, restoring wallet");
            if let Err(restore) = self.stores.wallets.store(before).await {
                error!(wallet = %wallet.id, error = %restore, "wallet restore failed");
            }
            return Err(e);
        }
        info!(wallet = %wallet.id, amount = %entry.amount, balance = %wallet.balance, "wallet adjusted");
        Ok((wallet, entry))
    }

    pub async fn acknowledge_alert(&self, alert_id: Uuid) -> Result<Alert> {
        let mut alert = self
            .stores
            .alerts
            .get(alert_id)
            .await?
            .ok_or_else(|| CantinaError::NotFound(format!("alert {alert_id}")))?;
        if alert.acknowledge(Utc::now()) {
            self.stores.alerts.store(alert.clone()).await?;
        } else {
            debug!(alert = %alert_id, "alert already acknowledged");
        }
        Ok(alert)
    }

    pub async fn update_wallet_model(
        &self,
        student_id: Uuid,
        model: PricingModel,
        credit_limit: Money,
        blocked_reason: Option<String>,
    ) -> Result<Wallet> {
        let mut wallet = self.wallet(student_id).await?;
        wallet.change_model(model, credit_limit, blocked_reason)?;
        self.stores.wallets.store(wallet.clone()).await?;
        info!(wallet = %wallet.id, model = ?model, "wallet model updated");
        Ok(wallet)
    }

    pub async fn student(&self, student_id: Uuid) -> Result<Student> {
        self.stores
            .directory
            .get_student(student_id)
            .await?
            .ok_or_else(|| CantinaError::NotFound(format!("student {student_id}")))
    }

    pub async fn wallet(&self, student_id: Uuid) -> Result<Wallet> {
        self.stores
            .wallets
            .get_by_student(student_id)
            .await?
            .ok_or_else(|| CantinaError::NotFound(format!("wallet of student {student_id}")))
    }

    pub async fn wallets(&self) -> Result<Vec<Wallet>> {
        self.stores.wallets.get_all().await
    }

    pub async fn ledger_for(&self, student_id: Uuid) -> Result<Vec<LedgerEntry>> {
        let wallet = self.wallet(student_id).await?;
        self.stores.ledger.entries_for_wallet(wallet.id).await
    }

    pub async fn alerts_for(&self, student_id: Uuid) -> Result<Vec<Alert>> {
        self.stores.alerts.for_student(student_id).await
    }
}
