use crate::domain::ledger::{Order, cart_total};
use crate::domain::ports::{
    AlertStoreBox, BackendClientBox, LedgerStoreBox, OrderStoreBox, PurchaseGateway,
    PurchaseOutcome, PurchaseRequest, WalletStoreBox,
};
use crate::domain::wallet::PurchaseContext;
use crate::error::{CantinaError, Result};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Runs the wallet ledger rules in process.
///
/// Used when no backend is configured. Order, ledger entry, alerts and wallet
/// are persisted together once the debit succeeds; a postpaid purchase over
/// the limit still persists the blocked wallet.
pub struct LocalPurchaseGateway {
    wallets: WalletStoreBox,
    ledger: LedgerStoreBox,
    orders: OrderStoreBox,
    alerts: AlertStoreBox,
}

impl LocalPurchaseGateway {
    pub fn new(
        wallets: WalletStoreBox,
        ledger: LedgerStoreBox,
        orders: OrderStoreBox,
        alerts: AlertStoreBox,
    ) -> Self {
        Self {
            wallets,
            ledger,
            orders,
            alerts,
        }
    }
}

#[async_trait]
impl PurchaseGateway for LocalPurchaseGateway {
    async fn process_purchase(&self, request: &PurchaseRequest) -> Result<PurchaseOutcome> {
        let total = cart_total(&request.items)?;
        let mut wallet = self
            .wallets
            .get_by_student(request.student_id)
            .await?
            .ok_or_else(|| CantinaError::NotFound("wallet".to_string()))?;
        let before = wallet.clone();

        let now = Utc::now();
        let ctx = PurchaseContext {
            guardian_id: request.guardian_id,
            order_id: Uuid::new_v4(),
            actor_id: &request.actor_id,
            now,
        };

        let receipt = match wallet.apply_purchase(total, &ctx) {
            Ok(receipt) => receipt,
            Err(e) => {
                if wallet != before {
                    self.wallets.store(wallet).await?;
                }
                return Err(e);
            }
        };

        let order = Order {
            id: ctx.order_id,
            student_id: request.student_id,
            items: request.items.clone(),
            total,
            created_at: now,
            created_by: request.actor_id.clone(),
        };

        self.orders.store(order.clone()).await?;
        self.ledger.append(receipt.ledger_entry).await?;
        for alert in &receipt.alerts {
            self.alerts.store(alert.clone()).await?;
        }
        self.wallets.store(wallet.clone()).await?;

        debug!(order = %order.id, total = %total, balance = %wallet.balance, "local purchase applied");
        Ok(PurchaseOutcome {
            order,
            wallet,
            alerts: receipt.alerts,
        })
    }
}

/// Delegates the debit to the backend procedure and reads back the wallet.
///
/// Backend errors are passed through untouched. The backend raises its own
/// alerts, so the outcome carries none.
pub struct RemotePurchaseGateway {
    backend: BackendClientBox,
}

impl RemotePurchaseGateway {
    pub fn new(backend: BackendClientBox) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl PurchaseGateway for RemotePurchaseGateway {
    async fn process_purchase(&self, request: &PurchaseRequest) -> Result<PurchaseOutcome> {
        let total = cart_total(&request.items)?;

        let order_id = match self
            .backend
            .process_purchase(request.student_id, &request.items)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(student = %request.student_id, error = %e, "backend rejected purchase");
                return Err(e);
            }
        };

        let wallet = self
            .backend
            .fetch_wallet(request.student_id)
            .await?
            .ok_or_else(|| CantinaError::NotFound("wallet after purchase".to_string()))?;

        info!(order = %order_id, student = %request.student_id, "remote purchase confirmed");
        Ok(PurchaseOutcome {
            order: Order {
                id: order_id,
                student_id: request.student_id,
                items: request.items.clone(),
                total,
                created_at: Utc::now(),
                created_by: request.actor_id.clone(),
            },
            wallet,
            alerts: Vec::new(),
        })
    }
}
