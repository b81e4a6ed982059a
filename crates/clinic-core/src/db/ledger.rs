//! Financial ledger database operations (append-only).

use std::collections::HashMap;

use rusqlite::params;

use super::{parse_decimal, Database, DbError, DbResult};
use crate::models::{EntryType, LedgerEntry, PaymentMethod, PaymentMethodDetail};

impl Database {
    /// Append a ledger entry together with its payment method rows.
    ///
    /// Run inside a transaction when the entry has method rows, so a partial
    /// payment is never visible.
    pub fn insert_ledger_entry(&self, entry: &LedgerEntry) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO financial_ledger (
                id, patient_id, entry_type, amount, description, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                entry.id,
                entry.patient_id,
                entry.entry_type.as_str(),
                entry.amount.to_string(),
                entry.description,
                entry.created_at,
            ],
        )?;

        for method in &entry.payment_methods {
            self.conn.execute(
                r#"
                INSERT INTO payment_methods (id, ledger_id, method, amount_paid, installments)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    method.id,
                    entry.id,
                    method.method.as_str(),
                    method.amount_paid.to_string(),
                    method.installments,
                ],
            )?;
        }
        Ok(())
    }

    /// All ledger entries of a patient, newest first, with payment methods.
    pub fn ledger_entries_for_patient(&self, patient_id: &str) -> DbResult<Vec<LedgerEntry>> {
        let mut methods = self.payment_methods_for_patient(patient_id)?;

        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, patient_id, entry_type, amount, description, created_at
            FROM financial_ledger
            WHERE patient_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )?;

        let rows = stmt.query_map([patient_id], |row| {
            Ok(LedgerRow {
                id: row.get(0)?,
                patient_id: row.get(1)?,
                entry_type: row.get(2)?,
                amount: row.get(3)?,
                description: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let mut entry: LedgerEntry = row?.try_into()?;
            entry.payment_methods = methods.remove(&entry.id).unwrap_or_default();
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Payment method rows of a patient, grouped by ledger entry.
    fn payment_methods_for_patient(
        &self,
        patient_id: &str,
    ) -> DbResult<HashMap<String, Vec<PaymentMethodDetail>>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT pm.id, pm.ledger_id, pm.method, pm.amount_paid, pm.installments
            FROM payment_methods pm
            JOIN financial_ledger l ON l.id = pm.ledger_id
            WHERE l.patient_id = ?
            ORDER BY pm.rowid
            "#,
        )?;

        let rows = stmt.query_map([patient_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, u32>(4)?,
            ))
        })?;

        let mut grouped: HashMap<String, Vec<PaymentMethodDetail>> = HashMap::new();
        for row in rows {
            let (id, ledger_id, method, amount_paid, installments) = row?;
            grouped
                .entry(ledger_id.clone())
                .or_default()
                .push(PaymentMethodDetail {
                    id,
                    ledger_id,
                    method: PaymentMethod::parse(&method),
                    amount_paid: parse_decimal("payment_methods.amount_paid", &amount_paid)?,
                    installments,
                });
        }
        Ok(grouped)
    }
}

/// Intermediate row struct for database mapping.
struct LedgerRow {
    id: String,
    patient_id: String,
    entry_type: String,
    amount: String,
    description: String,
    created_at: String,
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = DbError;

    fn try_from(row: LedgerRow) -> Result<Self, Self::Error> {
        let entry_type = EntryType::parse(&row.entry_type)
            .ok_or_else(|| DbError::Constraint(format!("Unknown entry type: {}", row.entry_type)))?;

        Ok(LedgerEntry {
            id: row.id,
            patient_id: row.patient_id,
            entry_type,
            amount: parse_decimal("financial_ledger.amount", &row.amount)?,
            description: row.description,
            created_at: row.created_at,
            payment_methods: Vec::new(),
        })
    }
}
