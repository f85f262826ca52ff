use crate::domain::ledger::Order;
use crate::domain::money::Money;
use crate::domain::outbox::{NotificationKind, OutboxMessage};
use crate::domain::ports::{ConsumptionRow, ConsumptionSourceBox, OutboxStoreBox};
use crate::domain::student::{Guardian, Student, StudyPeriod, normalize_phone};
use crate::domain::wallet::{PricingModel, Wallet};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{info, warn};
use uuid::Uuid;

/// Message branding shared by every notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationSettings {
    pub from_name: String,
    pub app_base_url: Option<String>,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            from_name: "Cantina Orion".to_string(),
            app_base_url: None,
        }
    }
}

impl NotificationSettings {
    fn portal_link(&self) -> Option<String> {
        self.app_base_url
            .as_deref()
            .filter(|base| !base.is_empty())
            .map(|base| format!("{}/painel-do-responsavel", base.trim_end_matches('/')))
    }
}

fn period_label(period: StudyPeriod) -> &'static str {
    match period {
        StudyPeriod::Morning => "morning",
        StudyPeriod::Afternoon => "afternoon",
    }
}

fn format_date(at: Option<DateTime<Utc>>) -> String {
    at.map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Text sent to the guardian after a purchase.
pub fn purchase_message(
    settings: &NotificationSettings,
    student: &Student,
    order: &Order,
    wallet: &Wallet,
) -> String {
    let items = order
        .items
        .iter()
        .map(|item| format!("{}x Item ({})", item.quantity, item.unit_price.to_brl()))
        .collect::<Vec<_>>()
        .join(", ");
    let items = if items.is_empty() {
        "Itens indisponiveis".to_string()
    } else {
        items
    };
    let situation = match wallet.model {
        PricingModel::Prepaid => "Pre-pago",
        PricingModel::Postpaid => "Fiado",
    };

    let mut lines = vec![
        format!("{} 🍔", settings.from_name),
        "Compra registrada ✅".to_string(),
        format!(
            "Aluno: {} ({} - {})",
            student.full_name,
            student.grade,
            period_label(student.period)
        ),
        format!("Itens: {items}"),
        format!("Total: {}", order.total.to_brl()),
        format!(
            "Situacao: {situation} | Saldo/Limite disponivel: {}",
            wallet.available().to_brl()
        ),
    ];
    if let Some(link) = settings.portal_link() {
        lines.push(format!("Adicionar saldo: {link}"));
    }
    lines.join("\n")
}

/// Builds the pending outbox row announcing a purchase.
pub fn purchase_notification(
    settings: &NotificationSettings,
    guardian: &Guardian,
    student: &Student,
    order: &Order,
    wallet: &Wallet,
    now: DateTime<Utc>,
) -> OutboxMessage {
    let items: Vec<_> = order
        .items
        .iter()
        .map(|item| {
            json!({
                "product_id": item.product_id,
                "quantity": item.quantity,
                "unit_price": item.unit_price,
                "total": item.line_total().ok(),
            })
        })
        .collect();

    OutboxMessage::pending(
        guardian.id,
        Some(student.id),
        NotificationKind::Purchase,
        normalize_phone(&guardian.phone),
        json!({
            "message": purchase_message(settings, student, order, wallet),
            "order_id": order.id,
            "purchased_at": order.created_at,
            "student": {
                "id": student.id,
                "full_name": student.full_name,
                "grade": student.grade,
                "period": student.period,
            },
            "items": items,
            "total": order.total,
        }),
        now,
    )
}

/// Text of the weekly spending summary for one guardian.
pub fn weekly_message(settings: &NotificationSettings, rows: &[ConsumptionRow]) -> String {
    let mut lines = vec![settings.from_name.clone(), "Resumo semanal".to_string()];
    for row in rows {
        lines.push(format!(
            "- {}: {} (de {} a {})",
            row.student_name,
            row.total_spent.to_brl(),
            format_date(row.first_purchase),
            format_date(row.last_purchase)
        ));
    }
    if let Some(link) = settings.portal_link() {
        lines.push(format!("Acompanhe: {link}"));
    }
    lines.join("\n")
}

/// Queues one weekly report per guardian with recent consumption.
pub struct WeeklySummaryJob {
    source: ConsumptionSourceBox,
    outbox: OutboxStoreBox,
    settings: NotificationSettings,
}

impl WeeklySummaryJob {
    pub fn new(
        source: ConsumptionSourceBox,
        outbox: OutboxStoreBox,
        settings: NotificationSettings,
    ) -> Self {
        Self {
            source,
            outbox,
            settings,
        }
    }

    /// Returns the number of reports queued.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<usize> {
        let rows = self.source.weekly_consumption(now).await?;

        let mut grouped: BTreeMap<Uuid, Vec<ConsumptionRow>> = BTreeMap::new();
        for row in rows {
            grouped.entry(row.guardian_id).or_default().push(row);
        }

        let mut queued = 0;
        for (guardian_id, rows) in grouped {
            let Some(guardian) = self.source.guardian(guardian_id).await? else {
                warn!(guardian = %guardian_id, "weekly summary skipped, guardian not found");
                continue;
            };

            let total_spent: Money = rows.iter().map(|r| r.total_spent).sum();
            let first_purchase = rows.iter().filter_map(|r| r.first_purchase).min();
            let last_purchase = rows.iter().filter_map(|r| r.last_purchase).max();
            let summary: Vec<_> = rows
                .iter()
                .map(|r| {
                    json!({
                        "student_id": r.student_id,
                        "student_name": r.student_name,
                        "total_spent": r.total_spent,
                        "first_purchase": r.first_purchase,
                        "last_purchase": r.last_purchase,
                    })
                })
                .collect();

            let payload = json!({
                "message": weekly_message(&self.settings, &rows),
                "period": { "start": first_purchase, "end": last_purchase },
                "total_spent": total_spent,
                "summary": summary,
            });
            self.outbox
                .enqueue(OutboxMessage::pending(
                    guardian_id,
                    None,
                    NotificationKind::WeeklyReport,
                    normalize_phone(&guardian.phone),
                    payload,
                    now,
                ))
                .await?;
            queued += 1;
        }

        info!(queued, "weekly reports queued");
        Ok(queued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::OrderItem;
    use crate::domain::student::StudentStatus;
    use crate::domain::ports::ConsumptionSource;
    use crate::infrastructure::in_memory::InMemoryOutboxStore;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn student() -> Student {
        Student {
            id: Uuid::new_v4(),
            guardian_id: Uuid::new_v4(),
            full_name: "Pedro Lima".to_string(),
            grade: "4A".to_string(),
            period: StudyPeriod::Morning,
            status: StudentStatus::Active,
            pricing_model: PricingModel::Prepaid,
        }
    }

    fn guardian(id: Uuid) -> Guardian {
        Guardian {
            id,
            full_name: "Clara Lima".to_string(),
            phone: "(21) 99876-5432".to_string(),
            cpf: "111.222.333-44".to_string(),
            address: None,
        }
    }

    fn order(student_id: Uuid) -> Order {
        Order {
            id: Uuid::new_v4(),
            student_id,
            items: vec![OrderItem {
                product_id: Uuid::new_v4(),
                quantity: 2,
                unit_price: Money::new(dec!(4.5)),
            }],
            total: Money::new(dec!(9)),
            created_at: Utc::now(),
            created_by: "op".to_string(),
        }
    }

    #[test]
    fn test_purchase_message() {
        let student = student();
        let mut wallet = Wallet::new(student.id, PricingModel::Prepaid, Money::ZERO);
        wallet.balance = Money::new(dec!(41));
        let settings = NotificationSettings {
            from_name: "Cantina Orion".to_string(),
            app_base_url: Some("https://cantina.example/".to_string()),
        };

        let text = purchase_message(&settings, &student, &order(student.id), &wallet);
        assert_eq!(
            text,
            "Cantina Orion 🍔\nCompra registrada ✅\nAluno: Pedro Lima (4A - morning)\n\
             Itens: 2x Item (R$ 4,50)\nTotal: R$ 9,00\n\
             Situacao: Pre-pago | Saldo/Limite disponivel: R$ 41,00\n\
             Adicionar saldo: https://cantina.example/painel-do-responsavel"
        );
    }

    #[test]
    fn test_purchase_notification_row() {
        let student = student();
        let guardian = guardian(student.guardian_id);
        let wallet = Wallet::new(student.id, PricingModel::Prepaid, Money::ZERO);
        let order = order(student.id);

        let msg = purchase_notification(
            &NotificationSettings::default(),
            &guardian,
            &student,
            &order,
            &wallet,
            Utc::now(),
        );
        assert_eq!(msg.kind, NotificationKind::Purchase);
        assert_eq!(msg.to_phone, "5521998765432");
        assert_eq!(msg.student_id, Some(student.id));
        assert_eq!(msg.payload["order_id"], json!(order.id));
        assert!(msg.message_text().starts_with("Cantina Orion 🍔\nCompra registrada ✅"));
    }

    struct FixedSource {
        rows: Vec<ConsumptionRow>,
        guardian: Guardian,
    }

    #[async_trait]
    impl ConsumptionSource for FixedSource {
        async fn weekly_consumption(&self, _now: DateTime<Utc>) -> Result<Vec<ConsumptionRow>> {
            Ok(self.rows.clone())
        }

        async fn guardian(&self, guardian_id: Uuid) -> Result<Option<Guardian>> {
            Ok((guardian_id == self.guardian.id).then(|| self.guardian.clone()))
        }
    }

    #[tokio::test]
    async fn test_weekly_summary_one_report_per_guardian() {
        let known = Uuid::new_v4();
        let unknown = Uuid::new_v4();
        let monday = Utc.with_ymd_and_hms(2026, 10, 12, 12, 0, 0).unwrap();
        let friday = Utc.with_ymd_and_hms(2026, 10, 16, 12, 0, 0).unwrap();
        let row = |guardian_id, name: &str, total| ConsumptionRow {
            guardian_id,
            student_id: Uuid::new_v4(),
            student_name: name.to_string(),
            total_spent: Money::new(total),
            first_purchase: Some(monday),
            last_purchase: Some(friday),
        };
        let source = FixedSource {
            rows: vec![
                row(known, "Ana", dec!(12.5)),
                row(known, "Bia", dec!(7.5)),
                row(unknown, "Caio", dec!(3)),
            ],
            guardian: guardian(known),
        };
        let outbox = InMemoryOutboxStore::new();
        let job = WeeklySummaryJob::new(
            Box::new(source),
            Box::new(outbox.clone()),
            NotificationSettings::default(),
        );

        assert_eq!(job.run(friday).await.unwrap(), 1);

        let queued = outbox.all().await;
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].kind, NotificationKind::WeeklyReport);
        let total: Money = serde_json::from_value(queued[0].payload["total_spent"].clone()).unwrap();
        assert_eq!(total, Money::new(dec!(20)));
        assert_eq!(
            queued[0].message_text(),
            "Cantina Orion\nResumo semanal\n- Ana: R$ 12,50 (de 12/10/2026 a 16/10/2026)\n\
             - Bia: R$ 7,50 (de 12/10/2026 a 16/10/2026)"
        );
    }
}
