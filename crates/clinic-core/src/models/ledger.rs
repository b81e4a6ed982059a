//! Financial ledger models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PatientSummary;

/// Ledger movement type.
///
/// Charges are stored with a positive amount and payments with a negative
/// one, so a patient's balance is the plain sum of their entries and a
/// positive balance is money owed to the clinic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Charge,
    Payment,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Charge => "charge",
            EntryType::Payment => "payment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "charge" => Some(EntryType::Charge),
            "payment" => Some(EntryType::Payment),
            _ => None,
        }
    }

    /// Whether `amount` carries the sign this entry type requires.
    pub fn accepts(&self, amount: Decimal) -> bool {
        match self {
            EntryType::Charge => amount > Decimal::ZERO,
            EntryType::Payment => amount < Decimal::ZERO,
        }
    }
}

/// One signed financial movement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub id: String,
    pub patient_id: String,
    pub entry_type: EntryType,
    pub amount: Decimal,
    pub description: String,
    pub created_at: String,
    /// Split detail, present on payments only
    #[serde(default)]
    pub payment_methods: Vec<PaymentMethodDetail>,
}

impl LedgerEntry {
    pub fn new(patient_id: String, entry_type: EntryType, amount: Decimal, description: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            entry_type,
            amount,
            description,
            created_at: crate::db::now_timestamp(),
            payment_methods: Vec::new(),
        }
    }
}

/// How part of a payment was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentMethod {
    Pix,
    Credit,
    Debit,
    Cash,
    Other(String),
}

impl PaymentMethod {
    pub fn parse(s: &str) -> Self {
        match s {
            "pix" => PaymentMethod::Pix,
            "credit" => PaymentMethod::Credit,
            "debit" => PaymentMethod::Debit,
            "cash" => PaymentMethod::Cash,
            other => PaymentMethod::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PaymentMethod::Pix => "pix",
            PaymentMethod::Credit => "credit",
            PaymentMethod::Debit => "debit",
            PaymentMethod::Cash => "cash",
            PaymentMethod::Other(s) => s,
        }
    }

    /// Label printed on receipts and statements.
    pub fn label(&self) -> &str {
        match self {
            PaymentMethod::Pix => "Pix",
            PaymentMethod::Credit => "Crédito",
            PaymentMethod::Debit => "Débito",
            PaymentMethod::Cash => "Dinheiro",
            PaymentMethod::Other(s) => s,
        }
    }
}

impl Serialize for PaymentMethod {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PaymentMethod {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(PaymentMethod::parse(&s))
    }
}

/// One method used in a payment, as requested.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentPart {
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub installments: Option<u32>,
}

/// Stored detail row of a payment entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentMethodDetail {
    pub id: String,
    pub ledger_id: String,
    pub method: PaymentMethod,
    pub amount_paid: Decimal,
    pub installments: u32,
}

/// Patient account statement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Statement {
    pub patient: PatientSummary,
    /// Newest first
    pub ledger: Vec<LedgerEntry>,
    /// Sum of all entry amounts; positive means the patient owes
    pub balance: Decimal,
}

impl Statement {
    pub fn from_entries(patient: PatientSummary, mut ledger: Vec<LedgerEntry>) -> Self {
        ledger.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let balance = ledger.iter().map(|entry| entry.amount).sum();
        Self {
            patient,
            ledger,
            balance,
        }
    }
}
