//! Pending submission (attendance draft) models.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{AdhocDose, ApplicationBatch, BatchReport, PackageDose};

/// Pending submission status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DraftStatus {
    /// Being edited, or submission not yet confirmed by the server
    Pending,
    /// Recorded; the stored report answers any replay
    Submitted,
}

/// An attendance the nurse has started but not yet submitted.
///
/// The draft ID is stable across retries, so a resubmission after a lost
/// response is recognized instead of applied twice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingSubmission {
    pub draft_id: String,
    pub patient_id: String,
    pub session_id: Option<String>,
    pub weight: Option<f64>,
    pub package_doses: Vec<PackageDose>,
    pub adhoc_doses: Vec<AdhocDose>,
    pub status: DraftStatus,
    /// Fingerprint of the submitted payload
    pub fingerprint: Option<String>,
    /// Report returned when the draft was submitted
    pub outcome: Option<BatchReport>,
    pub created_at: String,
    pub updated_at: String,
}

impl PendingSubmission {
    /// Create a new, empty draft for a patient.
    pub fn new(patient_id: String) -> Self {
        let now = crate::db::now_timestamp();
        Self {
            draft_id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            session_id: None,
            weight: None,
            package_doses: Vec::new(),
            adhoc_doses: Vec::new(),
            status: DraftStatus::Pending,
            fingerprint: None,
            outcome: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = crate::db::now_timestamp();
    }
}

/// Hex SHA-256 over the clinically meaningful part of a batch.
///
/// Signature and staff name are left out: a retry may re-encode the
/// signature image but still describes the same attendance.
pub fn batch_fingerprint(batch: &ApplicationBatch) -> Result<String, serde_json::Error> {
    #[derive(Serialize)]
    struct Canonical<'a> {
        patient_id: &'a str,
        session_id: Option<&'a str>,
        weight: f64,
        package_doses: &'a [PackageDose],
        adhoc_doses: &'a [AdhocDose],
    }

    let canonical = serde_json::to_vec(&Canonical {
        patient_id: &batch.patient_id,
        session_id: batch.session_id.as_deref(),
        weight: batch.weight,
        package_doses: &batch.package_doses,
        adhoc_doses: &batch.adhoc_doses,
    })?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> ApplicationBatch {
        ApplicationBatch {
            patient_id: "p1".into(),
            session_id: Some("s1".into()),
            weight: 72.5,
            package_doses: vec![PackageDose {
                package_id: "k1".into(),
                amount_applied: 2.0,
            }],
            adhoc_doses: vec![],
            signature_url: None,
            attended_by: None,
        }
    }

    #[test]
    fn test_new_draft_is_empty() {
        let draft = PendingSubmission::new("p1".into());
        assert_eq!(draft.status, DraftStatus::Pending);
        assert!(draft.package_doses.is_empty() && draft.adhoc_doses.is_empty());
        assert_eq!(draft.draft_id.len(), 36);
    }

    #[test]
    fn test_fingerprint_ignores_signature() {
        let a = batch();
        let mut b = batch();
        b.signature_url = Some("/signatures/x.png".into());
        b.attended_by = Some("Nurse Joy".into());
        assert_eq!(batch_fingerprint(&a).unwrap(), batch_fingerprint(&b).unwrap());
    }

    #[test]
    fn test_fingerprint_tracks_doses() {
        let a = batch();
        let mut b = batch();
        b.package_doses[0].amount_applied = 3.0;
        let fa = batch_fingerprint(&a).unwrap();
        assert_ne!(fa, batch_fingerprint(&b).unwrap());
        assert_eq!(fa.len(), 64);
    }
}
