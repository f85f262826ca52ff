use crate::application::replay::WalletReport;
use crate::domain::wallet::PricingModel;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize)]
struct WalletRecord<'a> {
    student: &'a str,
    model: PricingModel,
    balance: String,
    credit_limit: String,
    available: String,
    blocked: bool,
    blocked_reason: &'a str,
}

/// Writes final wallet states as CSV, amounts with two decimals.
pub struct WalletWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> WalletWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_wallets(&mut self, reports: &[WalletReport]) -> Result<()> {
        for report in reports {
            let wallet = &report.wallet;
            self.writer.serialize(WalletRecord {
                student: &report.student,
                model: wallet.model,
                balance: wallet.balance.to_string(),
                credit_limit: wallet.credit_limit.to_string(),
                available: wallet.available().to_string(),
                blocked: wallet.blocked,
                blocked_reason: wallet.blocked_reason.as_deref().unwrap_or_default(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
