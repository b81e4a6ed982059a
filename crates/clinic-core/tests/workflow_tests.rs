//! End-to-end clinic day: register, sell, queue, attend, pay.

use chrono::{Duration, Utc};
use clinic_core::models::{
    AdhocDose, ApplicationBatch, CatalogSeed, EntryType, Medication, NewPatient, PackageDose,
    PackageItem, PaymentMethod, PaymentPart, SessionStatus, Treatment,
};
use clinic_core::{
    ApplicationRecorder, CatalogReader, ClinicError, Database, FinancialLedger, PackageLedger,
    PatientRegistry, SessionManager,
};
use rust_decimal_macros::dec;

fn seeded_db() -> Database {
    let db = Database::open_in_memory().unwrap();
    let seed: CatalogSeed = serde_json::from_str(
        r#"{
            "medications": [
                {"id": "med-ferro", "name": "Ferro Endovenoso"},
                {"id": "med-b12", "name": "Vitamina B12"}
            ],
            "treatments": [
                {"id": "trt-ferro", "medication_id": "med-ferro", "unit": "ml", "price": "200.00"},
                {"id": "trt-b12", "medication_id": "med-b12", "unit": "ml", "price": "20.00"}
            ]
        }"#,
    )
    .unwrap();
    CatalogReader::new(&db).seed(&seed).unwrap();
    db
}

fn register(db: &Database, name: &str, cpf: &str) -> String {
    PatientRegistry::new(db)
        .register(NewPatient {
            full_name: name.into(),
            cpf: cpf.into(),
            ..Default::default()
        })
        .unwrap()
        .id
}

#[test]
fn test_full_attendance_day() {
    let db = seeded_db();
    let patient_id = register(&db, "maria da silva", "529.982.247-25");

    // Front desk sells a package and queues the patient
    let packages = PackageLedger::new(&db)
        .create_packages(
            &patient_id,
            &[PackageItem {
                treatment_id: "trt-ferro".into(),
                quantity: 10.0,
                frequency_days: Some(7),
                day_of_week: Some(2),
            }],
        )
        .unwrap();
    let package_id = packages[0].id.clone();

    let sessions = SessionManager::new(&db);
    let queued = sessions.enqueue(&patient_id).unwrap();
    let queue = sessions.list_queue().unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].full_name, "Maria da Silva");

    let started = sessions.start_attendance(&queued.id).unwrap();
    assert_eq!(started.status, SessionStatus::InAttendance);

    // Nurse records the attendance
    let active = PackageLedger::new(&db)
        .list_active(&patient_id, Utc::now())
        .unwrap();
    assert!(active[0].is_suggested);

    let report = ApplicationRecorder::new(&db)
        .record_batch(&ApplicationBatch {
            patient_id: patient_id.clone(),
            session_id: Some(queued.id.clone()),
            weight: 64.5,
            package_doses: vec![PackageDose {
                package_id: package_id.clone(),
                amount_applied: 2.5,
            }],
            adhoc_doses: vec![AdhocDose {
                treatment_id: Some("trt-b12".into()),
                treatment_name: "Vitamina B12".into(),
                treatment_unit: "ml".into(),
                amount_applied: 3.0,
            }],
            signature_url: Some("/signatures/x.png".into()),
            attended_by: Some("Joana".into()),
        })
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.session_id, queued.id);

    let active = PackageLedger::new(&db)
        .list_active(&patient_id, Utc::now())
        .unwrap();
    assert_eq!(active[0].package.remaining_amount, 7.5);
    assert_eq!(active[0].last_application_amount, Some(2.5));
    assert!(!active[0].is_suggested);

    let next_week = PackageLedger::new(&db)
        .list_active(&patient_id, Utc::now() + Duration::days(7))
        .unwrap();
    assert!(next_week[0].is_suggested);

    assert!(sessions.list_queue().unwrap().is_empty());
    assert_eq!(sessions.last_weight(&patient_id).unwrap().unwrap().weight, 64.5);

    // Billing: 200 package + 60 ad-hoc, then a split payment of 150
    let finance = FinancialLedger::new(&db);
    finance
        .record_payment(
            &patient_id,
            dec!(150),
            &[
                PaymentPart {
                    method: PaymentMethod::Pix,
                    amount: dec!(100),
                    installments: None,
                },
                PaymentPart {
                    method: PaymentMethod::Cash,
                    amount: dec!(50),
                    installments: None,
                },
            ],
        )
        .unwrap();

    let statement = finance.statement(&patient_id).unwrap();
    assert_eq!(statement.balance, dec!(110.00));
    assert_eq!(statement.ledger.len(), 3);
    let charges = statement
        .ledger
        .iter()
        .filter(|e| e.entry_type == EntryType::Charge)
        .count();
    assert_eq!(charges, 2);
}

#[test]
fn test_exhausted_package_drops_from_active_list() {
    let db = seeded_db();
    let patient_id = register(&db, "Bruno Lima", "111.444.777-35");
    let package_id = PackageLedger::new(&db)
        .create_packages(
            &patient_id,
            &[PackageItem {
                treatment_id: "trt-ferro".into(),
                quantity: 2.0,
                frequency_days: None,
                day_of_week: None,
            }],
        )
        .unwrap()
        .remove(0)
        .id;

    let recorder = ApplicationRecorder::new(&db);
    let batch = |amount: f64| ApplicationBatch {
        patient_id: patient_id.clone(),
        session_id: None,
        weight: 80.0,
        package_doses: vec![PackageDose {
            package_id: package_id.clone(),
            amount_applied: amount,
        }],
        adhoc_doses: vec![],
        signature_url: None,
        attended_by: None,
    };

    assert!(recorder.record_batch(&batch(2.0)).unwrap().is_complete());

    let report = recorder.record_batch(&batch(0.5)).unwrap();
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].code, "insufficient_balance");

    assert!(PackageLedger::new(&db)
        .list_active(&patient_id, Utc::now())
        .unwrap()
        .is_empty());
}

#[test]
fn test_duplicate_registration_is_rejected() {
    let db = seeded_db();
    register(&db, "Ana Souza", "52998224725");

    let err = PatientRegistry::new(&db)
        .register(NewPatient {
            full_name: "Ana Souza".into(),
            cpf: "529.982.247-25".into(),
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, ClinicError::Conflict(_)));
}
