use crate::application::replay::Operation;
use crate::domain::money::Money;
use crate::domain::student::{StudyPeriod, UserRole};
use crate::domain::wallet::PricingModel;
use crate::error::{CantinaError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Guardian,
    Student,
    Purchase,
    Adjust,
    Model,
}

/// A raw row of an operations file. Which columns are required depends on `type`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct OperationRecord {
    pub r#type: OperationType,
    pub student: Option<String>,
    pub guardian: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub cpf: Option<String>,
    pub grade: Option<String>,
    pub period: Option<StudyPeriod>,
    pub model: Option<PricingModel>,
    pub limit: Option<Decimal>,
    pub quantity: Option<u32>,
    pub amount: Option<Decimal>,
    pub role: Option<UserRole>,
    pub description: Option<String>,
}

fn required<T>(value: Option<T>, column: &str, kind: OperationType) -> Result<T> {
    value.ok_or_else(|| {
        CantinaError::ValidationError(format!("{kind:?} row is missing column `{column}`"))
    })
}

impl TryFrom<OperationRecord> for Operation {
    type Error = CantinaError;

    fn try_from(record: OperationRecord) -> Result<Self> {
        let kind = record.r#type;
        Ok(match kind {
            OperationType::Guardian => Operation::RegisterGuardian {
                key: required(record.guardian, "guardian", kind)?,
                full_name: record.name.unwrap_or_default(),
                phone: record.phone.unwrap_or_default(),
                cpf: record.cpf.unwrap_or_default(),
            },
            OperationType::Student => Operation::RegisterStudent {
                key: required(record.student, "student", kind)?,
                guardian_key: required(record.guardian, "guardian", kind)?,
                full_name: record.name.unwrap_or_default(),
                grade: record.grade.unwrap_or_default(),
                period: record.period.unwrap_or(StudyPeriod::Morning),
                model: record.model.unwrap_or(PricingModel::Prepaid),
                credit_limit: record.limit.map(Money::new),
            },
            OperationType::Purchase => Operation::Purchase {
                student_key: required(record.student, "student", kind)?,
                quantity: record.quantity.unwrap_or(1),
                unit_price: Money::new(required(record.amount, "amount", kind)?),
                role: record.role.unwrap_or(UserRole::Operator),
            },
            OperationType::Adjust => Operation::Adjust {
                student_key: required(record.student, "student", kind)?,
                amount: Money::new(required(record.amount, "amount", kind)?),
                description: record
                    .description
                    .unwrap_or_else(|| "Manual adjustment".to_string()),
                role: record.role.unwrap_or(UserRole::Admin),
            },
            OperationType::Model => Operation::ChangeModel {
                student_key: required(record.student, "student", kind)?,
                model: required(record.model, "model", kind)?,
                credit_limit: Money::new(record.limit.unwrap_or_default()),
                blocked_reason: record.description,
            },
        })
    }
}

/// Reads operations from a CSV source.
///
/// Whitespace is trimmed and rows may omit trailing columns.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes rows; a bad row yields an error without ending the stream.
    pub fn operations(self) -> impl Iterator<Item = Result<Operation>> {
        self.reader
            .into_deserialize::<OperationRecord>()
            .map(|result| result.map_err(CantinaError::from).and_then(Operation::try_from))
    }
}
