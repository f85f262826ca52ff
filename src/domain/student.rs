use super::wallet::PricingModel;
use crate::error::{CantinaError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Operator,
    Guardian,
}

/// The authenticated user performing an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: UserRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: UserRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn require_admin(&self) -> Result<()> {
        if self.role == UserRole::Admin {
            Ok(())
        } else {
            Err(CantinaError::Permission(
                "adjustments are restricted to administrators".to_string(),
            ))
        }
    }

    /// Admins and operators can ring up sales at the counter.
    pub fn require_point_of_sale(&self) -> Result<()> {
        match self.role {
            UserRole::Admin | UserRole::Operator => Ok(()),
            UserRole::Guardian => Err(CantinaError::Permission(
                "not allowed to record purchases".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Default)]
pub struct Address {
    pub street: String,
    pub number: String,
    pub complement: Option<String>,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Guardian {
    pub id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub cpf: String,
    pub address: Option<Address>,
}

impl Guardian {
    pub fn validate(&self) -> Result<()> {
        if self.full_name.trim().is_empty() || self.phone.trim().is_empty() || self.cpf.trim().is_empty()
        {
            return Err(CantinaError::ValidationError(
                "guardian name, phone and cpf are required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum StudyPeriod {
    Morning,
    Afternoon,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    Active,
    Inactive,
    Blocked,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Student {
    pub id: Uuid,
    pub guardian_id: Uuid,
    pub full_name: String,
    pub grade: String,
    pub period: StudyPeriod,
    pub status: StudentStatus,
    pub pricing_model: PricingModel,
}

impl Student {
    pub fn validate(&self) -> Result<()> {
        if self.full_name.trim().is_empty() || self.grade.trim().is_empty() {
            return Err(CantinaError::ValidationError(
                "student name and grade are required".to_string(),
            ));
        }
        if self.guardian_id.is_nil() {
            return Err(CantinaError::ValidationError(
                "student guardian is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.status == StudentStatus::Active
    }
}

/// Normalizes a Brazilian phone number to `55` + DDD + number.
pub fn normalize_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    if (digits.len() == 12 || digits.len() == 13) && digits.starts_with("55") {
        digits
    } else if digits.len() == 10 || digits.len() == 11 {
        format!("55{digits}")
    } else {
        phone.to_string()
    }
}
