use super::money::Money;
use super::wallet::{PricingModel, Wallet};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// Threshold ratios of the alert baseline, highest first.
pub const ALERT_LEVELS: [Decimal; 3] = [dec!(0.30), dec!(0.15), Decimal::ZERO];

/// Level recorded on the alert emitted when the negative-balance exception is used.
pub const NEGATIVE_EXCEPTION_LEVEL: Decimal = dec!(-1);

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Balance,
    Limit,
    Negative,
    Block,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Alert {
    pub id: Uuid,
    pub student_id: Uuid,
    pub guardian_id: Uuid,
    pub r#type: AlertType,
    pub level: Decimal,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

/// Who an alert is about and when it was raised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertSubject {
    pub student_id: Uuid,
    pub guardian_id: Uuid,
    pub now: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        subject: &AlertSubject,
        r#type: AlertType,
        level: Decimal,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id: subject.student_id,
            guardian_id: subject.guardian_id,
            r#type,
            level,
            message: message.into(),
            created_at: subject.now,
            acknowledged_at: None,
        }
    }

    /// Marks the alert as seen. Returns `false` if it already was.
    pub fn acknowledge(&mut self, at: DateTime<Utc>) -> bool {
        if self.acknowledged_at.is_some() {
            return false;
        }
        self.acknowledged_at = Some(at);
        true
    }
}

fn percent(level: Decimal) -> Decimal {
    (level * dec!(100)).round()
}

/// Emits the percentage warnings crossed by `available` and lowers
/// `wallet.last_alert_level` accordingly.
///
/// Each level fires at most once until `last_alert_level` is cleared by a
/// top-up. Several levels can fire in one call; they are returned highest
/// first. Percentage levels are skipped when the wallet has no positive
/// baseline, but the zero-level warning still fires once `available`
/// reaches zero.
pub fn evaluate_thresholds(
    wallet: &mut Wallet,
    available: Money,
    subject: &AlertSubject,
) -> Vec<Alert> {
    let base = wallet.alert_base();
    let ratio = available.ratio_of(base);
    let alert_type = match wallet.model {
        PricingModel::Prepaid => AlertType::Balance,
        PricingModel::Postpaid => AlertType::Limit,
    };
    let mut triggered = Vec::new();

    if base.value() > Decimal::ZERO {
        for level in ALERT_LEVELS.into_iter().filter(|l| *l > Decimal::ZERO) {
            let already_fired = wallet.last_alert_level.is_some_and(|last| last <= level);
            if !already_fired && ratio <= level {
                let message = match wallet.model {
                    PricingModel::Prepaid => format!("Balance reached {}%", percent(level)),
                    PricingModel::Postpaid => {
                        format!("Remaining credit limit reached {}%", percent(level))
                    }
                };
                triggered.push(Alert::new(subject, alert_type, level, message));
                wallet.last_alert_level = Some(level);
            }
        }
    }

    let zero_fired = wallet
        .last_alert_level
        .is_some_and(|last| last <= Decimal::ZERO);
    if available.value() <= Decimal::ZERO && !zero_fired {
        triggered.push(Alert::new(
            subject,
            alert_type,
            Decimal::ZERO,
            "Automatic notice: balance or limit exhausted",
        ));
        wallet.last_alert_level = Some(Decimal::ZERO);
    }

    if !triggered.is_empty() {
        debug!(
            wallet = %wallet.id,
            count = triggered.len(),
            %ratio,
            "threshold alerts triggered"
        );
    }
    triggered
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subject() -> AlertSubject {
        AlertSubject {
            student_id: Uuid::new_v4(),
            guardian_id: Uuid::new_v4(),
            now: Utc::now(),
        }
    }

    fn prepaid(baseline: Decimal) -> Wallet {
        let mut wallet = Wallet::new(Uuid::new_v4(), PricingModel::Prepaid, Money::ZERO);
        wallet.alert_baseline = Some(Money::new(baseline));
        wallet
    }

    fn levels(alerts: &[Alert]) -> Vec<Decimal> {
        alerts.iter().map(|a| a.level).collect()
    }

    #[test]
    fn test_no_alert_above_highest_level() {
        let mut wallet = prepaid(dec!(100));
        let alerts = evaluate_thresholds(&mut wallet, Money::new(dec!(31)), &subject());
        assert!(alerts.is_empty());
        assert_eq!(wallet.last_alert_level, None);
    }

    #[test]
    fn test_single_level_crossed() {
        let mut wallet = prepaid(dec!(100));
        let alerts = evaluate_thresholds(&mut wallet, Money::new(dec!(30)), &subject());
        assert_eq!(levels(&alerts), vec![dec!(0.30)]);
        assert_eq!(alerts[0].r#type, AlertType::Balance);
        assert_eq!(alerts[0].message, "Balance reached 30%");
        assert_eq!(wallet.last_alert_level, Some(dec!(0.30)));
    }

    #[test]
    fn test_all_levels_in_one_pass_descending() {
        let mut wallet = prepaid(dec!(100));
        let alerts = evaluate_thresholds(&mut wallet, Money::ZERO, &subject());
        assert_eq!(levels(&alerts), vec![dec!(0.30), dec!(0.15), dec!(0)]);
        assert_eq!(
            alerts[2].message,
            "Automatic notice: balance or limit exhausted"
        );
        assert_eq!(wallet.last_alert_level, Some(Decimal::ZERO));
    }

    #[test]
    fn test_levels_fire_once_per_cycle() {
        let mut wallet = prepaid(dec!(100));
        evaluate_thresholds(&mut wallet, Money::new(dec!(20)), &subject());
        assert_eq!(wallet.last_alert_level, Some(dec!(0.30)));

        let again = evaluate_thresholds(&mut wallet, Money::new(dec!(18)), &subject());
        assert!(again.is_empty());

        let lower = evaluate_thresholds(&mut wallet, Money::new(dec!(10)), &subject());
        assert_eq!(levels(&lower), vec![dec!(0.15)]);

        let zero = evaluate_thresholds(&mut wallet, Money::new(dec!(-3)), &subject());
        assert_eq!(levels(&zero), vec![dec!(0)]);

        assert!(evaluate_thresholds(&mut wallet, Money::new(dec!(-9)), &subject()).is_empty());
    }

    #[test]
    fn test_postpaid_uses_limit_type() {
        let mut wallet = Wallet::new(
            Uuid::new_v4(),
            PricingModel::Postpaid,
            Money::new(dec!(80)),
        );
        let alerts = evaluate_thresholds(&mut wallet, Money::new(dec!(10)), &subject());
        assert_eq!(levels(&alerts), vec![dec!(0.30), dec!(0.15)]);
        assert!(alerts.iter().all(|a| a.r#type == AlertType::Limit));
        assert_eq!(alerts[1].message, "Remaining credit limit reached 15%");
    }

    #[test]
    fn test_zero_base_only_fires_zero_level() {
        let mut wallet = Wallet::new(Uuid::new_v4(), PricingModel::Postpaid, Money::ZERO);
        assert!(evaluate_thresholds(&mut wallet, Money::new(dec!(5)), &subject()).is_empty());

        let alerts = evaluate_thresholds(&mut wallet, Money::ZERO, &subject());
        assert_eq!(levels(&alerts), vec![dec!(0)]);
    }

    #[test]
    fn test_acknowledge_is_idempotent() {
        let mut alert = Alert::new(&subject(), AlertType::Block, dec!(0), "blocked");
        let first = Utc::now();
        assert!(alert.acknowledge(first));
        assert!(!alert.acknowledge(Utc::now()));
        assert_eq!(alert.acknowledged_at, Some(first));
    }
}
