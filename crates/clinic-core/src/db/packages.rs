//! Treatment package database operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{parse_timestamp, quantity_column, Database, DbError, DbResult};
use crate::models::{is_suggested, quantity_from_milli, ActivePackage, Package};

impl Database {
    /// Insert a new package.
    pub fn insert_package(&self, package: &Package) -> DbResult<()> {
        let total = quantity_column("total_amount", package.total_amount)?;
        let remaining = quantity_column("remaining_amount", package.remaining_amount)?;
        self.conn.execute(
            r#"
            INSERT INTO patient_packages (
                id, patient_id, treatment_id, total_amount, remaining_amount,
                purchase_date, frequency_in_days, suggested_day_of_week
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                package.id,
                package.patient_id,
                package.treatment_id,
                total,
                remaining,
                package.purchase_date,
                package.frequency_in_days,
                package.suggested_day_of_week,
            ],
        )?;
        Ok(())
    }

    /// Get a package by ID.
    pub fn get_package(&self, id: &str) -> DbResult<Option<Package>> {
        self.conn
            .query_row(
                r#"
                SELECT id, patient_id, treatment_id, total_amount, remaining_amount,
                       purchase_date, frequency_in_days, suggested_day_of_week
                FROM patient_packages
                WHERE id = ?
                "#,
                [id],
                package_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Packages with a remaining balance, newest purchase first, annotated
    /// with their last application and whether they are due at `now`.
    pub fn active_packages(
        &self,
        patient_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Vec<ActivePackage>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT k.id, k.patient_id, k.treatment_id, k.total_amount, k.remaining_amount,
                   k.purchase_date, k.frequency_in_days, k.suggested_day_of_week,
                   m.name, t.unit, last.created_at, last.amount_applied
            FROM patient_packages k
            JOIN treatments t ON t.id = k.treatment_id
            JOIN medications m ON m.id = t.medication_id
            LEFT JOIN applications last ON last.id = (
                SELECT a.id FROM applications a
                WHERE a.patient_package_id = k.id
                ORDER BY a.created_at DESC, a.rowid DESC
                LIMIT 1
            )
            WHERE k.patient_id = ? AND k.remaining_amount > 0
            ORDER BY k.purchase_date DESC, k.rowid DESC
            "#,
        )?;

        let rows = stmt.query_map([patient_id], |row| {
            Ok(ActivePackageRow {
                package: package_from_row(row)?,
                treatment_name: row.get(8)?,
                treatment_unit: row.get(9)?,
                last_application_at: row.get(10)?,
                last_application_amount: row
                    .get::<_, Option<i64>>(11)?
                    .map(quantity_from_milli),
            })
        })?;

        let mut packages = Vec::new();
        for row in rows {
            packages.push(row?.into_active(now)?);
        }
        Ok(packages)
    }

    /// Subtract `amount` from a package's remaining balance if it covers it.
    ///
    /// The check and the write are one statement over whole thousandths, so
    /// the balance can never go negative and a package debited down to zero
    /// stops being active. Returns `false` when the package is missing or the
    /// balance is insufficient.
    pub fn debit_package(&self, id: &str, amount: f64) -> DbResult<bool> {
        let amount = quantity_column("amount_applied", amount)?;
        let rows_affected = self.conn.execute(
            r#"
            UPDATE patient_packages
            SET remaining_amount = remaining_amount - ?2
            WHERE id = ?1 AND remaining_amount >= ?2
            "#,
            params![id, amount],
        )?;
        Ok(rows_affected > 0)
    }
}

fn package_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Package> {
    Ok(Package {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        treatment_id: row.get(2)?,
        total_amount: quantity_from_milli(row.get(3)?),
        remaining_amount: quantity_from_milli(row.get(4)?),
        purchase_date: row.get(5)?,
        frequency_in_days: row.get(6)?,
        suggested_day_of_week: row.get(7)?,
    })
}

/// Intermediate row struct for database mapping.
struct ActivePackageRow {
    package: Package,
    treatment_name: String,
    treatment_unit: String,
    last_application_at: Option<String>,
    last_application_amount: Option<f64>,
}

impl ActivePackageRow {
    fn into_active(self, now: DateTime<Utc>) -> Result<ActivePackage, DbError> {
        let last = self
            .last_application_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;

        Ok(ActivePackage {
            is_suggested: is_suggested(last, self.package.frequency_in_days, now),
            package: self.package,
            treatment_name: self.treatment_name,
            treatment_unit: self.treatment_unit,
            last_application_at: self.last_application_at,
            last_application_amount: self.last_application_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Application, Medication, Patient, PackageItem, Session, SessionStatus, Treatment,
    };
    use chrono::Duration;

    fn setup_db() -> (Database, String, String) {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("Ana Souza".into(), "52998224725".into());
        db.insert_patient(&patient).unwrap();
        db.upsert_medication(&Medication {
            id: "m1".into(),
            name: "Ferro".into(),
        })
        .unwrap();
        db.upsert_treatment(&Treatment {
            id: "t1".into(),
            medication_id: "m1".into(),
            unit: "ml".into(),
            price: None,
        })
        .unwrap();
        let session = Session::new(patient.id.clone(), SessionStatus::InAttendance);
        db.insert_session(&session).unwrap();
        (db, patient.id, session.id)
    }

    fn package(patient_id: &str, quantity: f64, cadence: Option<u32>) -> Package {
        Package::new(
            patient_id.into(),
            &PackageItem {
                treatment_id: "t1".into(),
                quantity,
                frequency_days: cadence,
                day_of_week: None,
            },
        )
    }

    #[test]
    fn test_insert_and_get_package() {
        let (db, patient_id, _) = setup_db();
        let pkg = package(&patient_id, 10.0, Some(7));
        db.insert_package(&pkg).unwrap();

        let retrieved = db.get_package(&pkg.id).unwrap().unwrap();
        assert_eq!(retrieved, pkg);
    }

    #[test]
    fn test_debit_never_goes_negative() {
        let (db, patient_id, _) = setup_db();
        let pkg = package(&patient_id, 5.0, None);
        db.insert_package(&pkg).unwrap();

        assert!(db.debit_package(&pkg.id, 3.0).unwrap());
        assert!(!db.debit_package(&pkg.id, 3.0).unwrap());
        assert!(db.debit_package(&pkg.id, 2.0).unwrap());
        assert!(!db.debit_package("missing", 1.0).unwrap());

        let retrieved = db.get_package(&pkg.id).unwrap().unwrap();
        assert_eq!(retrieved.remaining_amount, 0.0);
    }

    #[test]
    fn test_tenth_doses_use_up_package_exactly() {
        let (db, patient_id, _) = setup_db();
        let small = package(&patient_id, 0.3, None);
        let whole = package(&patient_id, 1.0, None);
        db.insert_package(&small).unwrap();
        db.insert_package(&whole).unwrap();

        for _ in 0..3 {
            assert!(db.debit_package(&small.id, 0.1).unwrap());
        }
        assert!(!db.debit_package(&small.id, 0.1).unwrap());
        for _ in 0..10 {
            assert!(db.debit_package(&whole.id, 0.1).unwrap());
        }

        assert_eq!(db.get_package(&small.id).unwrap().unwrap().remaining_amount, 0.0);
        assert_eq!(db.get_package(&whole.id).unwrap().unwrap().remaining_amount, 0.0);
        assert!(db.active_packages(&patient_id, Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn test_sub_thousandth_amounts_are_refused() {
        let (db, patient_id, _) = setup_db();
        let pkg = package(&patient_id, 1.0, None);
        db.insert_package(&pkg).unwrap();

        assert!(matches!(
            db.debit_package(&pkg.id, 0.0001),
            Err(DbError::Constraint(_))
        ));
        assert_eq!(db.get_package(&pkg.id).unwrap().unwrap().remaining_amount, 1.0);
    }

    #[test]
    fn test_active_packages_excludes_exhausted() {
        let (db, patient_id, _) = setup_db();
        let live = package(&patient_id, 5.0, None);
        let spent = package(&patient_id, 1.0, None);
        db.insert_package(&live).unwrap();
        db.insert_package(&spent).unwrap();
        db.debit_package(&spent.id, 1.0).unwrap();

        let active = db.active_packages(&patient_id, Utc::now()).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].package.id, live.id);
        assert_eq!(active[0].treatment_name, "Ferro");
        assert!(active[0].is_suggested);
        assert!(active[0].last_application_at.is_none());
    }

    #[test]
    fn test_active_packages_uses_last_application() {
        let (db, patient_id, session_id) = setup_db();
        let pkg = package(&patient_id, 10.0, Some(7));
        db.insert_package(&pkg).unwrap();

        let now = Utc::now();
        let six_days_ago = (now - Duration::days(6))
            .to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
        let mut app = Application {
            id: "a1".into(),
            session_id,
            package_id: pkg.id.clone(),
            amount_applied: 1.5,
            created_at: six_days_ago,
        };
        db.insert_application(&app).unwrap();

        let active = db.active_packages(&patient_id, now).unwrap();
        assert_eq!(active[0].last_application_amount, Some(1.5));
        assert!(!active[0].is_suggested);

        app.id = "a0".into();
        app.amount_applied = 2.0;
        app.created_at = (now - Duration::days(30))
            .to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
        db.insert_application(&app).unwrap();

        // An older application does not displace the latest one
        let active = db.active_packages(&patient_id, now).unwrap();
        assert_eq!(active[0].last_application_amount, Some(1.5));

        let later = now + Duration::days(1);
        let active = db.active_packages(&patient_id, later).unwrap();
        assert!(active[0].is_suggested);
    }
}
