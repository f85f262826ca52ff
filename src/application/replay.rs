use super::canteen::{CanteenService, CanteenStores, WalletOptions};
use super::gateway::LocalPurchaseGateway;
use super::notifications::NotificationSettings;
use crate::domain::ledger::OrderItem;
use crate::domain::money::Money;
use crate::domain::student::{Actor, Guardian, Student, StudentStatus, StudyPeriod, UserRole};
use crate::domain::wallet::{PricingModel, Wallet};
use crate::error::{CantinaError, Result};
use crate::infrastructure::in_memory::{
    InMemoryAlertStore, InMemoryDirectory, InMemoryLedgerStore, InMemoryOrderStore,
    InMemoryOutboxStore, InMemoryWalletStore,
};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

const REPLAY_ACTOR: &str = "replay";

/// One step of an offline operations file. Guardians and students are
/// referred to by the keys used in the file.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    RegisterGuardian {
        key: String,
        full_name: String,
        phone: String,
        cpf: String,
    },
    RegisterStudent {
        key: String,
        guardian_key: String,
        full_name: String,
        grade: String,
        period: StudyPeriod,
        model: PricingModel,
        credit_limit: Option<Money>,
    },
    Purchase {
        student_key: String,
        quantity: u32,
        unit_price: Money,
        role: UserRole,
    },
    Adjust {
        student_key: String,
        amount: Money,
        description: String,
        role: UserRole,
    },
    ChangeModel {
        student_key: String,
        model: PricingModel,
        credit_limit: Money,
        blocked_reason: Option<String>,
    },
}

/// Final state of one wallet after a replay.
#[derive(Debug, Clone, PartialEq)]
pub struct WalletReport {
    pub student: String,
    pub wallet: Wallet,
}

/// Runs operations through the local engine with in-memory stores.
pub struct ReplaySession {
    service: CanteenService,
    guardians: BTreeMap<String, Uuid>,
    students: BTreeMap<String, Uuid>,
}

impl ReplaySession {
    pub fn in_memory(settings: NotificationSettings) -> Self {
        let wallets = InMemoryWalletStore::new();
        let ledger = InMemoryLedgerStore::new();
        let orders = InMemoryOrderStore::new();
        let alerts = InMemoryAlertStore::new();
        let gateway = LocalPurchaseGateway::new(
            Box::new(wallets.clone()),
            Box::new(ledger.clone()),
            Box::new(orders.clone()),
            Box::new(alerts.clone()),
        );
        let stores = CanteenStores {
            directory: Box::new(InMemoryDirectory::new()),
            wallets: Box::new(wallets),
            ledger: Box::new(ledger),
            orders: Box::new(orders),
            alerts: Box::new(alerts),
            outbox: Box::new(InMemoryOutboxStore::new()),
        };
        Self {
            service: CanteenService::new(stores, Box::new(gateway), settings),
            guardians: BTreeMap::new(),
            students: BTreeMap::new(),
        }
    }

    pub fn service(&self) -> &CanteenService {
        &self.service
    }

    fn student_id(&self, key: &str) -> Result<Uuid> {
        self.students
            .get(key)
            .copied()
            .ok_or_else(|| CantinaError::NotFound(format!("student {key}")))
    }

    pub async fn apply(&mut self, operation: Operation) -> Result<()> {
        debug!(?operation, "replaying operation");
        match operation {
            Operation::RegisterGuardian {
                key,
                full_name,
                phone,
                cpf,
            } => {
                if self.guardians.contains_key(&key) {
                    return Err(CantinaError::ValidationError(format!(
                        "guardian {key} already registered"
                    )));
                }
                let guardian = self
                    .service
                    .register_guardian(Guardian {
                        id: Uuid::new_v4(),
                        full_name,
                        phone,
                        cpf,
                        address: None,
                    })
                    .await?;
                self.guardians.insert(key, guardian.id);
            }
            Operation::RegisterStudent {
                key,
                guardian_key,
                full_name,
                grade,
                period,
                model,
                credit_limit,
            } => {
                if self.students.contains_key(&key) {
                    return Err(CantinaError::ValidationError(format!(
                        "student {key} already registered"
                    )));
                }
                let guardian_id = self
                    .guardians
                    .get(&guardian_key)
                    .copied()
                    .ok_or_else(|| CantinaError::NotFound(format!("guardian {guardian_key}")))?;
                let student = Student {
                    id: Uuid::new_v4(),
                    guardian_id,
                    full_name,
                    grade,
                    period,
                    status: StudentStatus::Active,
                    pricing_model: model,
                };
                let student_id = student.id;
                self.service
                    .register_student(
                        student,
                        WalletOptions {
                            credit_limit,
                            alert_baseline: None,
                        },
                    )
                    .await?;
                self.students.insert(key, student_id);
            }
            Operation::Purchase {
                student_key,
                quantity,
                unit_price,
                role,
            } => {
                let student_id = self.student_id(&student_key)?;
                let items = vec![OrderItem {
                    product_id: Uuid::new_v4(),
                    quantity,
                    unit_price,
                }];
                self.service
                    .record_purchase(student_id, items, &Actor::new(REPLAY_ACTOR, role))
                    .await?;
            }
            Operation::Adjust {
                student_key,
                amount,
                description,
                role,
            } => {
                let student_id = self.student_id(&student_key)?;
                self.service
                    .adjust_wallet(
                        student_id,
                        amount,
                        &description,
                        &Actor::new(REPLAY_ACTOR, role),
                    )
                    .await?;
            }
            Operation::ChangeModel {
                student_key,
                model,
                credit_limit,
                blocked_reason,
            } => {
                let student_id = self.student_id(&student_key)?;
                self.service
                    .update_wallet_model(student_id, model, credit_limit, blocked_reason)
                    .await?;
            }
        }
        Ok(())
    }

    /// Wallets ordered by student key.
    pub async fn report(&self) -> Result<Vec<WalletReport>> {
        let mut reports = Vec::with_capacity(self.students.len());
        for (key, student_id) in &self.students {
            reports.push(WalletReport {
                student: key.clone(),
                wallet: self.service.wallet(*student_id).await?,
            });
        }
        Ok(reports)
    }
}
