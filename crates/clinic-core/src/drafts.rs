//! Pending submissions: server-held drafts of unsubmitted attendances.

use tracing::debug;

use crate::db::{now_timestamp, Database};
use crate::error::{ClinicError, ClinicResult};
use crate::models::{BatchReport, DraftStatus, PendingSubmission};

pub struct DraftStore<'a> {
    db: &'a Database,
}

impl<'a> DraftStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create or update a draft.
    ///
    /// A draft keeps its patient for life, and a submitted draft can no
    /// longer be edited.
    pub fn save_draft(&self, mut draft: PendingSubmission) -> ClinicResult<PendingSubmission> {
        if draft.draft_id.trim().is_empty() {
            return Err(ClinicError::validation("Draft ID is required"));
        }
        if let Some(weight) = draft.weight {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ClinicError::validation("Weight must not be negative"));
            }
        }

        let tx = self.db.immediate()?;
        if !self.db.patient_exists(&draft.patient_id)? {
            return Err(ClinicError::NotFound(format!("Patient {}", draft.patient_id)));
        }

        match self.db.get_draft(&draft.draft_id)? {
            Some(existing) if existing.status == DraftStatus::Submitted => {
                return Err(ClinicError::Conflict(format!(
                    "Draft {} was already submitted",
                    draft.draft_id
                )));
            }
            Some(existing) if existing.patient_id != draft.patient_id => {
                return Err(ClinicError::Validation(format!(
                    "Draft {} belongs to another patient",
                    draft.draft_id
                )));
            }
            Some(existing) => {
                draft.created_at = existing.created_at;
                draft.status = DraftStatus::Pending;
                draft.fingerprint = None;
                draft.outcome = None;
                draft.touch();
                self.db.update_draft(&draft)?;
            }
            None => {
                draft.status = DraftStatus::Pending;
                draft.fingerprint = None;
                draft.outcome = None;
                draft.touch();
                self.db.insert_draft(&draft)?;
            }
        }
        tx.commit()?;

        debug!(draft_id = %draft.draft_id, "Draft saved");
        Ok(draft)
    }

    /// Get a draft by ID.
    pub fn get(&self, draft_id: &str) -> ClinicResult<Option<PendingSubmission>> {
        Ok(self.db.get_draft(draft_id)?)
    }

    /// The patient's most recently edited pending draft.
    pub fn pending_draft_for_patient(
        &self,
        patient_id: &str,
    ) -> ClinicResult<Option<PendingSubmission>> {
        Ok(self.db.pending_draft_for_patient(patient_id)?)
    }

    /// Throw a draft away.
    pub fn discard_draft(&self, draft_id: &str) -> ClinicResult<()> {
        if self.db.delete_draft(draft_id)? {
            Ok(())
        } else {
            Err(ClinicError::NotFound(format!("Draft {}", draft_id)))
        }
    }

    /// Freeze a draft with the outcome of its submission.
    pub fn mark_submitted(
        &self,
        draft_id: &str,
        fingerprint: &str,
        outcome: &BatchReport,
    ) -> ClinicResult<()> {
        if self
            .db
            .mark_draft_submitted(draft_id, fingerprint, outcome, &now_timestamp())?
        {
            Ok(())
        } else {
            Err(ClinicError::NotFound(format!("Draft {}", draft_id)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Patient, PackageDose};

    fn setup_db() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("Ana Souza".into(), "52998224725".into());
        db.insert_patient(&patient).unwrap();
        (db, patient.id)
    }

    #[test]
    fn test_save_and_resume() {
        let (db, patient_id) = setup_db();
        let store = DraftStore::new(&db);

        let mut draft = PendingSubmission::new(patient_id.clone());
        draft.weight = Some(70.0);
        let saved = store.save_draft(draft.clone()).unwrap();

        draft.package_doses.push(PackageDose {
            package_id: "k1".into(),
            amount_applied: 1.0,
        });
        store.save_draft(draft.clone()).unwrap();

        let pending = store.pending_draft_for_patient(&patient_id).unwrap().unwrap();
        assert_eq!(pending.draft_id, saved.draft_id);
        assert_eq!(pending.package_doses.len(), 1);
        assert_eq!(pending.created_at, saved.created_at);
    }

    #[test]
    fn test_submitted_draft_cannot_be_saved() {
        let (db, patient_id) = setup_db();
        let store = DraftStore::new(&db);

        let draft = store
            .save_draft(PendingSubmission::new(patient_id))
            .unwrap();
        store
            .mark_submitted(&draft.draft_id, "f", &BatchReport::new("s1".into()))
            .unwrap();

        assert!(matches!(
            store.save_draft(draft),
            Err(ClinicError::Conflict(_))
        ));
    }

    #[test]
    fn test_draft_keeps_patient() {
        let (db, patient_id) = setup_db();
        let other = Patient::new("Bruno Lima".into(), "11144477735".into());
        db.insert_patient(&other).unwrap();
        let store = DraftStore::new(&db);

        let mut draft = store
            .save_draft(PendingSubmission::new(patient_id))
            .unwrap();
        draft.patient_id = other.id;
        assert!(matches!(
            store.save_draft(draft),
            Err(ClinicError::Validation(_))
        ));
    }

    #[test]
    fn test_discard() {
        let (db, patient_id) = setup_db();
        let store = DraftStore::new(&db);

        let draft = store
            .save_draft(PendingSubmission::new(patient_id.clone()))
            .unwrap();
        store.discard_draft(&draft.draft_id).unwrap();
        assert!(store.pending_draft_for_patient(&patient_id).unwrap().is_none());
        assert!(matches!(
            store.discard_draft(&draft.draft_id),
            Err(ClinicError::NotFound(_))
        ));
    }

    #[test]
    fn test_unknown_patient() {
        let (db, _) = setup_db();
        let store = DraftStore::new(&db);
        assert!(matches!(
            store.save_draft(PendingSubmission::new("ghost".into())),
            Err(ClinicError::NotFound(_))
        ));
    }
}
