use async_trait::async_trait;
use cantina::application::canteen::{CanteenService, CanteenStores, WalletOptions};
use cantina::application::gateway::{LocalPurchaseGateway, RemotePurchaseGateway};
use cantina::application::notifications::NotificationSettings;
use cantina::domain::ledger::{OrderItem, cart_total};
use cantina::domain::money::Money;
use cantina::domain::ports::{
    BackendClient, PurchaseGateway, PurchaseRequest, WalletStore,
};
use cantina::domain::student::{Actor, Guardian, Student, StudentStatus, StudyPeriod, UserRole};
use cantina::domain::wallet::{PricingModel, PurchaseContext, Wallet};
use cantina::error::{CantinaError, Result};
use cantina::infrastructure::in_memory::{
    InMemoryAlertStore, InMemoryDirectory, InMemoryLedgerStore, InMemoryOrderStore,
    InMemoryOutboxStore, InMemoryWalletStore,
};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Stands in for the backend procedure by running the same wallet rules
/// against its own copy of the wallets.
#[derive(Clone, Default)]
struct EngineBackend {
    wallets: InMemoryWalletStore,
}

#[async_trait]
impl BackendClient for EngineBackend {
    async fn process_purchase(&self, student_id: Uuid, items: &[OrderItem]) -> Result<Uuid> {
        let total = cart_total(items)?;
        let mut wallet = self
            .wallets
            .get_by_student(student_id)
            .await?
            .ok_or_else(|| CantinaError::NotFound("wallet".to_string()))?;
        let order_id = Uuid::new_v4();
        let result = wallet.apply_purchase(
            total,
            &PurchaseContext {
                guardian_id: Uuid::nil(),
                order_id,
                actor_id: "backend",
                now: Utc::now(),
            },
        );
        self.wallets.store(wallet).await?;
        result.map_err(|e| CantinaError::Remote {
            message: e.to_string(),
            code: Some("P0001".to_string()),
        })?;
        Ok(order_id)
    }

    async fn fetch_wallet(&self, student_id: Uuid) -> Result<Option<Wallet>> {
        self.wallets.get_by_student(student_id).await
    }
}

fn local_gateway(wallets: &InMemoryWalletStore) -> LocalPurchaseGateway {
    LocalPurchaseGateway::new(
        Box::new(wallets.clone()),
        Box::new(InMemoryLedgerStore::new()),
        Box::new(InMemoryOrderStore::new()),
        Box::new(InMemoryAlertStore::new()),
    )
}

fn request(student_id: Uuid, cents: i64) -> PurchaseRequest {
    PurchaseRequest {
        student_id,
        guardian_id: Uuid::new_v4(),
        items: vec![OrderItem {
            product_id: Uuid::new_v4(),
            quantity: 1,
            unit_price: Money::new(Decimal::new(cents, 2)),
        }],
        actor_id: "operator".to_string(),
    }
}

async fn assert_same_outcomes(wallet: Wallet, purchases: &[i64]) {
    let student_id = wallet.student_id;
    let local_wallets = InMemoryWalletStore::new();
    local_wallets.store(wallet.clone()).await.unwrap();
    let backend = EngineBackend::default();
    backend.wallets.store(wallet).await.unwrap();

    let local = local_gateway(&local_wallets);
    let remote = RemotePurchaseGateway::new(Box::new(backend.clone()));

    for cents in purchases {
        let local_result = local.process_purchase(&request(student_id, *cents)).await;
        let remote_result = remote.process_purchase(&request(student_id, *cents)).await;

        assert_eq!(
            local_result.is_ok(),
            remote_result.is_ok(),
            "purchase of {cents} cents diverged"
        );
        if let (Ok(local), Ok(remote)) = (&local_result, &remote_result) {
            assert_eq!(local.wallet, remote.wallet);
            assert_eq!(local.order.total, remote.order.total);
        }

        let local_wallet = local_wallets.get_by_student(student_id).await.unwrap();
        let remote_wallet = backend.wallets.get_by_student(student_id).await.unwrap();
        assert_eq!(local_wallet, remote_wallet);
    }
}

#[tokio::test]
async fn test_prepaid_paths_match() {
    let mut wallet = Wallet::new(Uuid::new_v4(), PricingModel::Prepaid, Money::new(dec!(50)));
    wallet.balance = Money::new(dec!(45));
    wallet.alert_baseline = Some(Money::new(dec!(50)));

    assert_same_outcomes(wallet, &[1_000, 2_500, 1_500, 100]).await;
}

#[tokio::test]
async fn test_postpaid_paths_match() {
    let mut wallet = Wallet::new(Uuid::new_v4(), PricingModel::Postpaid, Money::new(dec!(80)));
    wallet.balance = Money::new(dec!(20));

    assert_same_outcomes(wallet, &[3_000, 2_000, 7_000, 100]).await;
}

#[tokio::test]
async fn test_random_sequences_match() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50 {
        let model = if rng.gen_bool(0.5) {
            PricingModel::Prepaid
        } else {
            PricingModel::Postpaid
        };
        let limit = Money::new(Decimal::new(rng.gen_range(0..20_000), 2));
        let mut wallet = Wallet::new(Uuid::new_v4(), model, limit);
        wallet.alert_baseline = Some(limit);
        if model == PricingModel::Prepaid {
            wallet.balance = Money::new(Decimal::new(rng.gen_range(0..20_000), 2));
        }
        let purchases: Vec<i64> = (0..rng.gen_range(1..15))
            .map(|_| rng.gen_range(0..6_000))
            .collect();

        assert_same_outcomes(wallet, &purchases).await;
    }
}

#[tokio::test]
async fn test_service_caches_remote_outcome() {
    let directory = InMemoryDirectory::new();
    let wallets = InMemoryWalletStore::new();
    let backend = EngineBackend::default();
    let service = CanteenService::new(
        CanteenStores {
            directory: Box::new(directory),
            wallets: Box::new(wallets.clone()),
            ledger: Box::new(InMemoryLedgerStore::new()),
            orders: Box::new(InMemoryOrderStore::new()),
            alerts: Box::new(InMemoryAlertStore::new()),
            outbox: Box::new(InMemoryOutboxStore::new()),
        },
        Box::new(RemotePurchaseGateway::new(Box::new(backend.clone()))),
        NotificationSettings::default(),
    );

    let guardian = service
        .register_guardian(Guardian {
            id: Uuid::new_v4(),
            full_name: "Maria Souza".to_string(),
            phone: "11987654321".to_string(),
            cpf: "123.456.789-09".to_string(),
            address: None,
        })
        .await
        .unwrap();
    let student = Student {
        id: Uuid::new_v4(),
        guardian_id: guardian.id,
        full_name: "Joao".to_string(),
        grade: "5A".to_string(),
        period: StudyPeriod::Morning,
        status: StudentStatus::Active,
        pricing_model: PricingModel::Prepaid,
    };
    let mut wallet = service
        .register_student(student.clone(), WalletOptions::default())
        .await
        .unwrap();
    wallet.balance = Money::new(dec!(30));
    backend.wallets.store(wallet.clone()).await.unwrap();
    wallets.store(wallet).await.unwrap();

    let outcome = service
        .record_purchase(
            student.id,
            request(student.id, 1_200).items,
            &Actor::new("op", UserRole::Operator),
        )
        .await
        .unwrap();

    assert_eq!(outcome.wallet.balance, Money::new(dec!(18)));
    assert_eq!(
        wallets.get_by_student(student.id).await.unwrap().unwrap().balance,
        Money::new(dec!(18))
    );
}
