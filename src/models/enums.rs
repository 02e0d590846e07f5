//! Wire enums shared between the JSON surface and SQL storage.
//!
//! Stored as their kebab-case strings; `as_str`/`from_str` keep the
//! SQL text and the serde form in lockstep.

use serde::{Deserialize, Serialize};

use crate::db::DatabaseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, DatabaseError> {
        match s {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            _ => Err(DatabaseError::InvalidEnum {
                field: "gender".into(),
                value: s.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApptType {
    Consultation,
    FollowUp,
    Checkup,
    Urgent,
}

impl ApptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApptType::Consultation => "consultation",
            ApptType::FollowUp => "follow-up",
            ApptType::Checkup => "checkup",
            ApptType::Urgent => "urgent",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, DatabaseError> {
        match s {
            "consultation" => Ok(ApptType::Consultation),
            "follow-up" => Ok(ApptType::FollowUp),
            "checkup" => Ok(ApptType::Checkup),
            "urgent" => Ok(ApptType::Urgent),
            _ => Err(DatabaseError::InvalidEnum {
                field: "type".into(),
                value: s.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApptStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl ApptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApptStatus::Scheduled => "scheduled",
            ApptStatus::Completed => "completed",
            ApptStatus::Cancelled => "cancelled",
            ApptStatus::NoShow => "no-show",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, DatabaseError> {
        match s {
            "scheduled" => Ok(ApptStatus::Scheduled),
            "completed" => Ok(ApptStatus::Completed),
            "cancelled" => Ok(ApptStatus::Cancelled),
            "no-show" => Ok(ApptStatus::NoShow),
            _ => Err(DatabaseError::InvalidEnum {
                field: "status".into(),
                value: s.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PayMethod {
    Cash,
    Card,
    Online,
    BankTransfer,
}

impl PayMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayMethod::Cash => "cash",
            PayMethod::Card => "card",
            PayMethod::Online => "online",
            PayMethod::BankTransfer => "bank-transfer",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, DatabaseError> {
        match s {
            "cash" => Ok(PayMethod::Cash),
            "card" => Ok(PayMethod::Card),
            "online" => Ok(PayMethod::Online),
            "bank-transfer" => Ok(PayMethod::BankTransfer),
            _ => Err(DatabaseError::InvalidEnum {
                field: "method".into(),
                value: s.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayStatus {
    Paid,
    Pending,
    Failed,
    Refunded,
}

impl PayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayStatus::Paid => "paid",
            PayStatus::Pending => "pending",
            PayStatus::Failed => "failed",
            PayStatus::Refunded => "refunded",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, DatabaseError> {
        match s {
            "paid" => Ok(PayStatus::Paid),
            "pending" => Ok(PayStatus::Pending),
            "failed" => Ok(PayStatus::Failed),
            "refunded" => Ok(PayStatus::Refunded),
            _ => Err(DatabaseError::InvalidEnum {
                field: "status".into(),
                value: s.into(),
            }),
        }
    }
}
