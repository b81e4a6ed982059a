//! Patient database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::{Patient, PatientSummary};

const PATIENT_COLUMNS: &str =
    "id, cpf, full_name, birth_date, email, phone, clinical_notes, created_at";

impl Database {
    /// Insert a new patient.
    ///
    /// A CPF that is already registered fails with `DbError::Duplicate`.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO patients (
                id, cpf, full_name, birth_date, email, phone,
                clinical_notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                patient.id,
                patient.cpf,
                patient.full_name,
                patient.birth_date,
                patient.email,
                patient.phone,
                patient.clinical_notes,
                patient.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM patients WHERE id = ?", PATIENT_COLUMNS),
                [id],
                patient_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Get a patient by normalized CPF digits.
    pub fn get_patient_by_cpf(&self, cpf: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM patients WHERE cpf = ?", PATIENT_COLUMNS),
                [cpf],
                patient_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Get just the identity fields of a patient.
    pub fn get_patient_summary(&self, id: &str) -> DbResult<Option<PatientSummary>> {
        self.conn
            .query_row(
                "SELECT id, full_name FROM patients WHERE id = ?",
                [id],
                |row| {
                    Ok(PatientSummary {
                        id: row.get(0)?,
                        full_name: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    pub fn patient_exists(&self, id: &str) -> DbResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM patients WHERE id = ?)",
            [id],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Search patients whose name contains `name_fragment` (case-insensitive)
    /// or whose CPF contains `cpf_digits`.
    ///
    /// An empty `cpf_digits` disables the CPF match. Results are in name
    /// order; callers rank them.
    pub fn search_patients(
        &self,
        name_fragment: &str,
        cpf_digits: &str,
        limit: usize,
    ) -> DbResult<Vec<Patient>> {
        let name_pattern = format!("%{}%", escape_like(&name_fragment.to_lowercase()));
        let cpf_pattern = if cpf_digits.is_empty() {
            None
        } else {
            Some(format!("%{}%", cpf_digits))
        };

        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {}
            FROM patients
            WHERE lower(full_name) LIKE ?1 ESCAPE '\'
               OR (?2 IS NOT NULL AND cpf LIKE ?2)
            ORDER BY full_name, id
            LIMIT ?3
            "#,
            PATIENT_COLUMNS
        ))?;

        let rows = stmt.query_map(
            params![name_pattern, cpf_pattern, limit as i64],
            patient_from_row,
        )?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        cpf: row.get(1)?,
        full_name: row.get(2)?,
        birth_date: row.get(3)?,
        email: row.get(4)?,
        phone: row.get(5)?,
        clinical_notes: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
