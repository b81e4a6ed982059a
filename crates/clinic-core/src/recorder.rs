//! Application recorder: closes an attendance and records its doses.
//!
//! A whole attendance is one write-locking transaction. The session is
//! completed first, then each dose is recorded under its own savepoint, so
//! one failing dose (exhausted package, missing catalog entry) rolls back
//! alone and is reported while the rest of the batch still applies. A
//! submitted draft's outcome is written before the commit, so the doses
//! and the draft outcome land together or not at all.

use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::catalog::CatalogReader;
use crate::db::{now_timestamp, Database};
use crate::drafts::DraftStore;
use crate::error::{ClinicError, ClinicResult};
use crate::finance::FinancialLedger;
use crate::models::{
    batch_fingerprint, is_counted_unit, quantity_to_milli, AdhocApplication, AdhocDose,
    Application, ApplicationBatch, BatchReport, DraftStatus, ItemFailure, ItemKind, ItemReceipt,
    PackageDose, PendingSubmission,
};
use crate::packages::{validate_amount, PackageLedger};
use crate::queue::SessionManager;

pub struct ApplicationRecorder<'a> {
    db: &'a Database,
}

impl<'a> ApplicationRecorder<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Record a whole attendance.
    ///
    /// Errors returned here concern the session itself (bad weight, unknown
    /// or foreign session); per-dose failures land in the report instead.
    pub fn record_batch(&self, batch: &ApplicationBatch) -> ClinicResult<BatchReport> {
        let tx = self.db.immediate()?;
        let report = self.record_batch_locked(batch)?;
        tx.commit()?;
        log_report(&report);
        Ok(report)
    }

    /// Record a batch inside a transaction the caller already holds.
    fn record_batch_locked(&self, batch: &ApplicationBatch) -> ClinicResult<BatchReport> {
        let session_id = self.close_session_locked(batch)?;
        let mut report = BatchReport::new(session_id.clone());

        for (index, dose) in batch.package_doses.iter().enumerate() {
            match self.record_package_dose(&batch.patient_id, &session_id, index, dose) {
                Ok(receipt) => report.succeeded.push(receipt),
                Err(e) => report.failed.push(failure(
                    &session_id,
                    ItemKind::Package,
                    index,
                    &dose.package_id,
                    e,
                )),
            }
        }

        for (index, dose) in batch.adhoc_doses.iter().enumerate() {
            match self.record_adhoc_dose(&batch.patient_id, &session_id, index, dose) {
                Ok(receipt) => report.succeeded.push(receipt),
                Err(e) => report.failed.push(failure(
                    &session_id,
                    ItemKind::Adhoc,
                    index,
                    &dose.treatment_name,
                    e,
                )),
            }
        }

        Ok(report)
    }

    /// Record a batch on behalf of a draft, at most once.
    ///
    /// Resubmitting the same payload under an already submitted draft
    /// returns the stored report without touching any balance. A different
    /// payload under that draft is a conflict.
    pub fn submit(&self, draft_id: Option<&str>, batch: &ApplicationBatch) -> ClinicResult<BatchReport> {
        let Some(draft_id) = draft_id else {
            return self.record_batch(batch);
        };
        let drafts = DraftStore::new(self.db);
        let fingerprint = batch_fingerprint(batch)?;

        if drafts.get(draft_id)?.is_none() {
            let mut draft = PendingSubmission::new(batch.patient_id.clone());
            draft.draft_id = draft_id.to_string();
            draft.session_id = batch.session_id.clone();
            draft.weight = Some(batch.weight);
            draft.package_doses = batch.package_doses.clone();
            draft.adhoc_doses = batch.adhoc_doses.clone();
            drafts.save_draft(draft)?;
        }

        let tx = self.db.immediate()?;
        match drafts.get(draft_id)? {
            Some(draft) if draft.status == DraftStatus::Submitted => {
                return match draft.outcome {
                    Some(outcome) if draft.fingerprint.as_deref() == Some(fingerprint.as_str()) => {
                        info!(draft_id, "Replaying submitted draft");
                        Ok(outcome)
                    }
                    _ => Err(ClinicError::Conflict(format!(
                        "Draft {} was already submitted with different content",
                        draft_id
                    ))),
                };
            }
            Some(draft) if draft.patient_id != batch.patient_id => {
                return Err(ClinicError::Validation(format!(
                    "Draft {} belongs to another patient",
                    draft_id
                )));
            }
            Some(_) => {}
            None => return Err(ClinicError::NotFound(format!("Draft {}", draft_id))),
        }

        let report = self.record_batch_locked(batch)?;
        drafts.mark_submitted(draft_id, &fingerprint, &report)?;
        tx.commit()?;
        log_report(&report);
        Ok(report)
    }

    /// Resolve the batch's session and complete it.
    fn close_session_locked(&self, batch: &ApplicationBatch) -> ClinicResult<String> {
        if !batch.weight.is_finite() || batch.weight <= 0.0 {
            return Err(ClinicError::validation("Weight must be a positive number"));
        }

        let sessions = SessionManager::new(self.db);
        let session_id = match batch.session_id.as_deref() {
            Some(id) => {
                let session = self
                    .db
                    .get_session(id)?
                    .ok_or_else(|| ClinicError::NotFound(format!("Session {}", id)))?;
                if session.patient_id != batch.patient_id {
                    return Err(ClinicError::Validation(format!(
                        "Session {} belongs to another patient",
                        id
                    )));
                }
                session.id
            }
            None => sessions.resolve_or_create_locked(&batch.patient_id)?.id,
        };
        sessions.complete_locked(
            &session_id,
            batch.weight,
            batch.signature_url.as_deref(),
            batch.attended_by.as_deref(),
        )?;
        Ok(session_id)
    }

    fn record_package_dose(
        &self,
        patient_id: &str,
        session_id: &str,
        index: usize,
        dose: &PackageDose,
    ) -> ClinicResult<ItemReceipt> {
        validate_amount(dose.amount_applied)?;

        let savepoint = self.db.savepoint("dose")?;
        let package = self
            .db
            .get_package(&dose.package_id)?
            .ok_or_else(|| ClinicError::NotFound(format!("Package {}", dose.package_id)))?;
        if package.patient_id != patient_id {
            return Err(ClinicError::Validation(format!(
                "Package {} belongs to another patient",
                dose.package_id
            )));
        }

        let application = Application {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            package_id: dose.package_id.clone(),
            amount_applied: dose.amount_applied,
            created_at: now_timestamp(),
        };
        self.db.insert_application(&application)?;
        let remaining_amount =
            PackageLedger::new(self.db).debit_locked(&dose.package_id, dose.amount_applied)?;
        savepoint.release()?;

        Ok(ItemReceipt::Package {
            index,
            package_id: dose.package_id.clone(),
            application_id: application.id,
            remaining_amount,
        })
    }

    fn record_adhoc_dose(
        &self,
        patient_id: &str,
        session_id: &str,
        index: usize,
        dose: &AdhocDose,
    ) -> ClinicResult<ItemReceipt> {
        validate_amount(dose.amount_applied)?;
        let treatment_id = dose
            .treatment_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| ClinicError::MissingCatalogId(dose.treatment_name.clone()))?;

        let savepoint = self.db.savepoint("dose")?;
        let listing = CatalogReader::new(self.db).listing(treatment_id)?;

        let unit = non_empty_or(&dose.treatment_unit, &listing.unit);
        if is_counted_unit(unit) && dose.amount_applied.fract() != 0.0 {
            return Err(ClinicError::Validation(format!(
                "{} is dosed in whole applications, got {}",
                listing.name, dose.amount_applied
            )));
        }

        let adhoc = AdhocApplication {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            treatment_id: Some(treatment_id.to_string()),
            treatment_name: non_empty_or(&dose.treatment_name, &listing.name).to_string(),
            treatment_unit: unit.to_string(),
            amount_applied: dose.amount_applied,
            created_at: now_timestamp(),
        };
        self.db.insert_adhoc_application(&adhoc)?;

        let mut charged = None;
        let mut ledger_entry_id = None;
        if let Some(price) = listing.billable_price() {
            let quantity = quantity_to_milli(dose.amount_applied)
                .map(|milli| Decimal::new(milli, 3))
                .ok_or_else(|| {
                    ClinicError::Validation(format!("Unrepresentable amount {}", dose.amount_applied))
                })?;
            let amount = (price * quantity).round_dp(2);
            let description = format!(
                "Aplicação Avulsa: {} ({} {})",
                adhoc.treatment_name, dose.amount_applied, adhoc.treatment_unit
            );
            let entry =
                FinancialLedger::new(self.db).record_charge_locked(patient_id, amount, &description)?;
            charged = Some(amount);
            ledger_entry_id = Some(entry.id);
        }
        savepoint.release()?;

        Ok(ItemReceipt::Adhoc {
            index,
            adhoc_id: adhoc.id,
            charged,
            ledger_entry_id,
        })
    }
}

fn non_empty_or<'s>(value: &'s str, fallback: &'s str) -> &'s str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn log_report(report: &BatchReport) {
    info!(
        session_id = %report.session_id,
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "Attendance recorded"
    );
}

/// Log a rolled-back dose and turn it into a report entry.
fn failure(
    session_id: &str,
    kind: ItemKind,
    index: usize,
    reference: &str,
    e: ClinicError,
) -> ItemFailure {
    match &e {
        ClinicError::Database(_) => {
            error!(session_id, ?kind, index, reference, error = %e, "Dose failed to record")
        }
        _ => warn!(session_id, ?kind, index, reference, error = %e, "Dose rejected"),
    }
    ItemFailure {
        kind,
        index,
        reference: reference.to_string(),
        code: e.code().to_string(),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CatalogSeed, Medication, PackageItem, Patient, SessionStatus, Treatment};
    use rust_decimal_macros::dec;

    struct Fixture {
        db: Database,
        patient_id: String,
    }

    fn setup() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("Ana Souza".into(), "52998224725".into());
        db.insert_patient(&patient).unwrap();
        CatalogReader::new(&db)
            .seed(&CatalogSeed {
                medications: vec![
                    Medication {
                        id: "m1".into(),
                        name: "Ferro".into(),
                    },
                    Medication {
                        id: "m2".into(),
                        name: "Vitamina B12".into(),
                    },
                ],
                treatments: vec![
                    Treatment {
                        id: "ferro".into(),
                        medication_id: "m1".into(),
                        unit: "ml".into(),
                        price: None,
                    },
                    Treatment {
                        id: "b12".into(),
                        medication_id: "m2".into(),
                        unit: "ml".into(),
                        price: Some(dec!(20.00)),
                    },
                    Treatment {
                        id: "b12-dose".into(),
                        medication_id: "m2".into(),
                        unit: "aplicação".into(),
                        price: Some(dec!(35.00)),
                    },
                ],
            })
            .unwrap();
        Fixture {
            db,
            patient_id: patient.id,
        }
    }

    impl Fixture {
        fn package(&self, quantity: f64) -> String {
            PackageLedger::new(&self.db)
                .create_packages(
                    &self.patient_id,
                    &[PackageItem {
                        treatment_id: "ferro".into(),
                        quantity,
                        frequency_days: Some(7),
                        day_of_week: None,
                    }],
                )
                .unwrap()
                .remove(0)
                .id
        }

        fn batch(&self) -> ApplicationBatch {
            ApplicationBatch {
                patient_id: self.patient_id.clone(),
                session_id: None,
                weight: 72.0,
                package_doses: vec![],
                adhoc_doses: vec![],
                signature_url: None,
                attended_by: Some("Joana".into()),
            }
        }
    }

    fn adhoc(treatment_id: Option<&str>, amount: f64) -> AdhocDose {
        AdhocDose {
            treatment_id: treatment_id.map(str::to_string),
            treatment_name: "Vitamina B12".into(),
            treatment_unit: String::new(),
            amount_applied: amount,
        }
    }

    #[test]
    fn test_partial_failure_is_reported() {
        let f = setup();
        let full = f.package(10.0);
        let small = f.package(1.0);

        let mut batch = f.batch();
        batch.package_doses = vec![
            PackageDose {
                package_id: full.clone(),
                amount_applied: 2.0,
            },
            PackageDose {
                package_id: small.clone(),
                amount_applied: 5.0,
            },
            PackageDose {
                package_id: full.clone(),
                amount_applied: 1.0,
            },
        ];

        let report = ApplicationRecorder::new(&f.db).record_batch(&batch).unwrap();
        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].index, 1);
        assert_eq!(report.failed[0].code, "insufficient_balance");

        assert_eq!(f.db.get_package(&full).unwrap().unwrap().remaining_amount, 7.0);
        assert_eq!(f.db.get_package(&small).unwrap().unwrap().remaining_amount, 1.0);

        // The failed dose left no clinical record behind
        let apps = f.db.applications_for_session(&report.session_id).unwrap();
        assert_eq!(apps.len(), 2);

        let session = f.db.get_session(&report.session_id).unwrap().unwrap();
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.weight, Some(72.0));
        assert_eq!(session.attended_by.as_deref(), Some("Joana"));
    }

    #[test]
    fn test_adhoc_charge() {
        let f = setup();
        let mut batch = f.batch();
        batch.adhoc_doses = vec![adhoc(Some("b12"), 3.0)];

        let report = ApplicationRecorder::new(&f.db).record_batch(&batch).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.total_charged(), dec!(60.00));

        let statement = FinancialLedger::new(&f.db).statement(&f.patient_id).unwrap();
        assert_eq!(statement.ledger.len(), 1);
        assert_eq!(statement.ledger[0].amount, dec!(60.00));
        assert_eq!(
            statement.ledger[0].description,
            "Aplicação Avulsa: Vitamina B12 (3 ml)"
        );
    }

    #[test]
    fn test_unpriced_adhoc_records_without_charge() {
        let f = setup();
        let mut batch = f.batch();
        batch.adhoc_doses = vec![AdhocDose {
            treatment_id: Some("ferro".into()),
            treatment_name: String::new(),
            treatment_unit: String::new(),
            amount_applied: 1.5,
        }];

        let report = ApplicationRecorder::new(&f.db).record_batch(&batch).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.total_charged(), Decimal::ZERO);

        let stored = f.db.adhoc_applications_for_session(&report.session_id).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].treatment_name, "Ferro");
        assert_eq!(stored[0].treatment_unit, "ml");
        assert!(FinancialLedger::new(&f.db)
            .statement(&f.patient_id)
            .unwrap()
            .ledger
            .is_empty());
    }

    #[test]
    fn test_missing_catalog_id() {
        let f = setup();
        let mut batch = f.batch();
        batch.adhoc_doses = vec![adhoc(None, 1.0), adhoc(Some("b12"), 1.0)];

        let report = ApplicationRecorder::new(&f.db).record_batch(&batch).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].code, "missing_catalog_id");
        assert_eq!(report.failed[0].reference, "Vitamina B12");
        assert_eq!(report.succeeded.len(), 1);

        let stored = f.db.adhoc_applications_for_session(&report.session_id).unwrap();
        assert_eq!(stored.len(), 1);
    }

    #[test]
    fn test_counted_unit_requires_whole_doses() {
        let f = setup();
        let mut batch = f.batch();
        batch.adhoc_doses = vec![adhoc(Some("b12-dose"), 1.5), adhoc(Some("b12-dose"), 2.0)];

        let report = ApplicationRecorder::new(&f.db).record_batch(&batch).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].code, "validation");
        assert_eq!(report.total_charged(), dec!(70.00));
    }

    #[test]
    fn test_foreign_package_is_rejected() {
        let f = setup();
        let pkg = f.package(5.0);
        let other = Patient::new("Bruno Lima".into(), "11144477735".into());
        f.db.insert_patient(&other).unwrap();

        let mut batch = f.batch();
        batch.patient_id = other.id;
        batch.package_doses = vec![PackageDose {
            package_id: pkg.clone(),
            amount_applied: 1.0,
        }];

        let report = ApplicationRecorder::new(&f.db).record_batch(&batch).unwrap();
        assert_eq!(report.failed[0].code, "validation");
        assert_eq!(f.db.get_package(&pkg).unwrap().unwrap().remaining_amount, 5.0);
    }

    #[test]
    fn test_session_errors_abort_batch() {
        let f = setup();
        let recorder = ApplicationRecorder::new(&f.db);

        let mut batch = f.batch();
        batch.weight = 0.0;
        assert!(matches!(
            recorder.record_batch(&batch),
            Err(ClinicError::Validation(_))
        ));

        let mut batch = f.batch();
        batch.session_id = Some("missing".into());
        assert!(matches!(
            recorder.record_batch(&batch),
            Err(ClinicError::NotFound(_))
        ));

        let report = recorder.record_batch(&f.batch()).unwrap();
        let mut batch = f.batch();
        batch.session_id = Some(report.session_id);
        assert!(matches!(
            recorder.record_batch(&batch),
            Err(ClinicError::Conflict(_))
        ));
    }

    #[test]
    fn test_uses_queued_session() {
        let f = setup();
        let queued = SessionManager::new(&f.db).enqueue(&f.patient_id).unwrap();

        let report = ApplicationRecorder::new(&f.db).record_batch(&f.batch()).unwrap();
        assert_eq!(report.session_id, queued.id);
    }

    #[test]
    fn test_submit_replays_same_payload() {
        let f = setup();
        let pkg = f.package(10.0);
        let recorder = ApplicationRecorder::new(&f.db);

        let mut batch = f.batch();
        batch.package_doses = vec![PackageDose {
            package_id: pkg.clone(),
            amount_applied: 2.0,
        }];

        let first = recorder.submit(Some("draft-1"), &batch).unwrap();
        let second = recorder.submit(Some("draft-1"), &batch).unwrap();
        assert_eq!(first, second);
        assert_eq!(f.db.get_package(&pkg).unwrap().unwrap().remaining_amount, 8.0);

        batch.package_doses[0].amount_applied = 3.0;
        assert!(matches!(
            recorder.submit(Some("draft-1"), &batch),
            Err(ClinicError::Conflict(_))
        ));
    }

    #[test]
    fn test_interrupted_submission_leaves_no_doses() {
        let f = setup();
        let pkg = f.package(1.0);
        let recorder = ApplicationRecorder::new(&f.db);
        let drafts = DraftStore::new(&f.db);
        let mut draft = PendingSubmission::new(f.patient_id.clone());
        draft.draft_id = "draft-2".into();
        drafts.save_draft(draft).unwrap();

        let mut batch = f.batch();
        batch.package_doses = vec![
            PackageDose {
                package_id: pkg.clone(),
                amount_applied: 0.1,
            };
            3
        ];

        // Dropping the transaction before the draft outcome is written
        // stands in for a crash between the doses and the outcome.
        {
            let _tx = f.db.immediate().unwrap();
            let report = recorder.record_batch_locked(&batch).unwrap();
            assert_eq!(report.succeeded.len(), 3);
        }
        assert_eq!(f.db.get_package(&pkg).unwrap().unwrap().remaining_amount, 1.0);
        let stored = drafts.get("draft-2").unwrap().unwrap();
        assert_eq!(stored.status, DraftStatus::Pending);

        // The retry applies the doses exactly once
        let report = recorder.submit(Some("draft-2"), &batch).unwrap();
        assert!(report.is_complete());
        let replay = recorder.submit(Some("draft-2"), &batch).unwrap();
        assert_eq!(replay, report);
        assert_eq!(f.db.get_package(&pkg).unwrap().unwrap().remaining_amount, 0.7);
        assert_eq!(
            drafts.get("draft-2").unwrap().unwrap().status,
            DraftStatus::Submitted
        );
    }

    #[test]
    fn test_submit_saved_draft() {
        let f = setup();
        let drafts = DraftStore::new(&f.db);
        let draft = drafts
            .save_draft(PendingSubmission::new(f.patient_id.clone()))
            .unwrap();

        let recorder = ApplicationRecorder::new(&f.db);
        let report = recorder.submit(Some(&draft.draft_id), &f.batch()).unwrap();

        let stored = drafts.get(&draft.draft_id).unwrap().unwrap();
        assert_eq!(stored.status, DraftStatus::Submitted);
        assert_eq!(stored.outcome, Some(report));
        assert!(drafts
            .pending_draft_for_patient(&f.patient_id)
            .unwrap()
            .is_none());
    }
}
