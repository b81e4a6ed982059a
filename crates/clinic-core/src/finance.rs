//! Financial ledger: charges, multi-method payments and statements.

use rust_decimal::Decimal;
use tracing::info;

use crate::db::Database;
use crate::error::{ClinicError, ClinicResult};
use crate::models::{EntryType, LedgerEntry, PaymentMethodDetail, PaymentPart, Statement};

pub struct FinancialLedger<'a> {
    db: &'a Database,
}

impl<'a> FinancialLedger<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Record a payment split across one or more methods.
    ///
    /// The method amounts must add up to the total paid. The entry is stored
    /// with a negative amount; entry and method rows commit together.
    pub fn record_payment(
        &self,
        patient_id: &str,
        total_paid: Decimal,
        methods: &[PaymentPart],
    ) -> ClinicResult<LedgerEntry> {
        let total = total_paid.abs();
        if total.is_zero() {
            return Err(ClinicError::validation("Payment total must be non-zero"));
        }
        if methods.is_empty() {
            return Err(ClinicError::validation("At least one payment method is required"));
        }

        let mut sum = Decimal::ZERO;
        for part in methods {
            if part.amount <= Decimal::ZERO {
                return Err(ClinicError::Validation(format!(
                    "Amount for {} must be positive",
                    part.method.label()
                )));
            }
            if part.installments == Some(0) {
                return Err(ClinicError::validation("Installments must be at least 1"));
            }
            sum += part.amount;
        }
        if sum != total {
            return Err(ClinicError::Validation(format!(
                "Payment methods add up to {} but the total is {}",
                sum, total
            )));
        }

        let mut entry = LedgerEntry::new(
            patient_id.to_string(),
            EntryType::Payment,
            -total,
            payment_description(methods),
        );
        entry.payment_methods = methods
            .iter()
            .map(|part| PaymentMethodDetail {
                id: uuid::Uuid::new_v4().to_string(),
                ledger_id: entry.id.clone(),
                method: part.method.clone(),
                amount_paid: part.amount,
                installments: part.installments.unwrap_or(1),
            })
            .collect();

        let tx = self.db.immediate()?;
        self.ensure_patient(patient_id)?;
        self.db.insert_ledger_entry(&entry)?;
        tx.commit()?;

        info!(patient_id, amount = %total, "Payment recorded");
        Ok(entry)
    }

    /// Append a charge.
    pub fn record_charge(
        &self,
        patient_id: &str,
        amount: Decimal,
        description: &str,
    ) -> ClinicResult<LedgerEntry> {
        let entry = self.build_charge(patient_id, amount, description)?;
        self.ensure_patient(patient_id)?;
        self.db.insert_ledger_entry(&entry)?;
        Ok(entry)
    }

    /// Append a charge; the caller holds the write lock.
    pub(crate) fn record_charge_locked(
        &self,
        patient_id: &str,
        amount: Decimal,
        description: &str,
    ) -> ClinicResult<LedgerEntry> {
        let entry = self.build_charge(patient_id, amount, description)?;
        self.db.insert_ledger_entry(&entry)?;
        info!(patient_id, amount = %amount, description, "Charge generated");
        Ok(entry)
    }

    /// Patient summary, entries newest first, and computed balance.
    pub fn statement(&self, patient_id: &str) -> ClinicResult<Statement> {
        let patient = self
            .db
            .get_patient_summary(patient_id)?
            .ok_or_else(|| ClinicError::NotFound(format!("Patient {}", patient_id)))?;
        let entries = self.db.ledger_entries_for_patient(patient_id)?;
        Ok(Statement::from_entries(patient, entries))
    }

    fn build_charge(
        &self,
        patient_id: &str,
        amount: Decimal,
        description: &str,
    ) -> ClinicResult<LedgerEntry> {
        if !EntryType::Charge.accepts(amount) {
            return Err(ClinicError::Validation(format!(
                "Charge amount must be positive, got {}",
                amount
            )));
        }
        Ok(LedgerEntry::new(
            patient_id.to_string(),
            EntryType::Charge,
            amount,
            description.to_string(),
        ))
    }

    fn ensure_patient(&self, patient_id: &str) -> ClinicResult<()> {
        if self.db.patient_exists(patient_id)? {
            Ok(())
        } else {
            Err(ClinicError::NotFound(format!("Patient {}", patient_id)))
        }
    }
}

/// `Pagamento Recebido: Pix, Crédito (3x)` style description.
fn payment_description(methods: &[PaymentPart]) -> String {
    let labels: Vec<String> = methods
        .iter()
        .map(|part| match part.installments {
            Some(n) if n > 1 => format!("{} ({}x)", part.method.label(), n),
            _ => part.method.label().to_string(),
        })
        .collect();
    format!("Pagamento Recebido: {}", labels.join(", "))
}
