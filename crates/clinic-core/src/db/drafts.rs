//! Pending submission (attendance draft) database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{AdhocDose, BatchReport, DraftStatus, PackageDose, PendingSubmission};

impl Database {
    /// Insert a new draft.
    pub fn insert_draft(&self, draft: &PendingSubmission) -> DbResult<()> {
        let package_doses_json = serde_json::to_string(&draft.package_doses)?;
        let adhoc_doses_json = serde_json::to_string(&draft.adhoc_doses)?;
        let outcome_json = draft
            .outcome
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn.execute(
            r#"
            INSERT INTO pending_submissions (
                draft_id, patient_id, session_id, weight, applications,
                adhoc_applications, status, fingerprint, outcome,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                draft.draft_id,
                draft.patient_id,
                draft.session_id,
                draft.weight,
                package_doses_json,
                adhoc_doses_json,
                status_to_string(&draft.status),
                draft.fingerprint,
                outcome_json,
                draft.created_at,
                draft.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Replace the editable fields of a pending draft.
    ///
    /// Submitted drafts are left untouched; returns `false` for them.
    pub fn update_draft(&self, draft: &PendingSubmission) -> DbResult<bool> {
        let package_doses_json = serde_json::to_string(&draft.package_doses)?;
        let adhoc_doses_json = serde_json::to_string(&draft.adhoc_doses)?;

        let rows_affected = self.conn.execute(
            r#"
            UPDATE pending_submissions SET
                session_id = ?2,
                weight = ?3,
                applications = ?4,
                adhoc_applications = ?5,
                updated_at = ?6
            WHERE draft_id = ?1 AND status = 'pending'
            "#,
            params![
                draft.draft_id,
                draft.session_id,
                draft.weight,
                package_doses_json,
                adhoc_doses_json,
                draft.updated_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a draft by ID.
    pub fn get_draft(&self, draft_id: &str) -> DbResult<Option<PendingSubmission>> {
        self.conn
            .query_row(
                r#"
                SELECT draft_id, patient_id, session_id, weight, applications,
                       adhoc_applications, status, fingerprint, outcome,
                       created_at, updated_at
                FROM pending_submissions
                WHERE draft_id = ?
                "#,
                [draft_id],
                draft_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Most recently edited pending draft of a patient.
    pub fn pending_draft_for_patient(
        &self,
        patient_id: &str,
    ) -> DbResult<Option<PendingSubmission>> {
        self.conn
            .query_row(
                r#"
                SELECT draft_id, patient_id, session_id, weight, applications,
                       adhoc_applications, status, fingerprint, outcome,
                       created_at, updated_at
                FROM pending_submissions
                WHERE patient_id = ? AND status = 'pending'
                ORDER BY updated_at DESC, rowid DESC
                LIMIT 1
                "#,
                [patient_id],
                draft_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Delete a draft.
    pub fn delete_draft(&self, draft_id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "DELETE FROM pending_submissions WHERE draft_id = ?",
            [draft_id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Mark a draft submitted, storing the payload fingerprint and outcome.
    pub fn mark_draft_submitted(
        &self,
        draft_id: &str,
        fingerprint: &str,
        outcome: &BatchReport,
        updated_at: &str,
    ) -> DbResult<bool> {
        let outcome_json = serde_json::to_string(outcome)?;
        let rows_affected = self.conn.execute(
            r#"
            UPDATE pending_submissions SET
                status = 'submitted',
                fingerprint = ?2,
                outcome = ?3,
                session_id = ?4,
                updated_at = ?5
            WHERE draft_id = ?1
            "#,
            params![
                draft_id,
                fingerprint,
                outcome_json,
                outcome.session_id,
                updated_at
            ],
        )?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct DraftRow {
    draft_id: String,
    patient_id: String,
    session_id: Option<String>,
    weight: Option<f64>,
    package_doses: String,
    adhoc_doses: String,
    status: String,
    fingerprint: Option<String>,
    outcome: Option<String>,
    created_at: String,
    updated_at: String,
}

fn draft_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DraftRow> {
    Ok(DraftRow {
        draft_id: row.get(0)?,
        patient_id: row.get(1)?,
        session_id: row.get(2)?,
        weight: row.get(3)?,
        package_doses: row.get(4)?,
        adhoc_doses: row.get(5)?,
        status: row.get(6)?,
        fingerprint: row.get(7)?,
        outcome: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

impl TryFrom<DraftRow> for PendingSubmission {
    type Error = DbError;

    fn try_from(row: DraftRow) -> Result<Self, Self::Error> {
        let package_doses: Vec<PackageDose> = serde_json::from_str(&row.package_doses)?;
        let adhoc_doses: Vec<AdhocDose> = serde_json::from_str(&row.adhoc_doses)?;
        let outcome: Option<BatchReport> = row
            .outcome
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        let status = string_to_status(&row.status)?;

        Ok(PendingSubmission {
            draft_id: row.draft_id,
            patient_id: row.patient_id,
            session_id: row.session_id,
            weight: row.weight,
            package_doses,
            adhoc_doses,
            status,
            fingerprint: row.fingerprint,
            outcome,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn status_to_string(status: &DraftStatus) -> &'static str {
    match status {
        DraftStatus::Pending => "pending",
        DraftStatus::Submitted => "submitted",
    }
}

fn string_to_status(s: &str) -> Result<DraftStatus, DbError> {
    match s {
        "pending" => Ok(DraftStatus::Pending),
        "submitted" => Ok(DraftStatus::Submitted),
        _ => Err(DbError::Constraint(format!("Unknown draft status: {}", s))),
    }
}
