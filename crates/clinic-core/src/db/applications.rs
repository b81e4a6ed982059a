//! Clinical act database operations (append-only).

use rusqlite::params;

use super::{quantity_column, Database, DbResult};
use crate::models::{quantity_from_milli, AdhocApplication, Application};

impl Database {
    /// Insert a package application.
    pub fn insert_application(&self, application: &Application) -> DbResult<()> {
        let amount = quantity_column("amount_applied", application.amount_applied)?;
        self.conn.execute(
            r#"
            INSERT INTO applications (
                id, session_id, patient_package_id, amount_applied, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                application.id,
                application.session_id,
                application.package_id,
                amount,
                application.created_at,
            ],
        )?;
        Ok(())
    }

    /// Insert an ad-hoc application.
    pub fn insert_adhoc_application(&self, application: &AdhocApplication) -> DbResult<()> {
        let amount = quantity_column("amount_applied", application.amount_applied)?;
        self.conn.execute(
            r#"
            INSERT INTO adhoc_applications (
                id, session_id, treatment_id, treatment_name, treatment_unit,
                amount_applied, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                application.id,
                application.session_id,
                application.treatment_id,
                application.treatment_name,
                application.treatment_unit,
                amount,
                application.created_at,
            ],
        )?;
        Ok(())
    }

    /// Package applications recorded in a session, in order.
    pub fn applications_for_session(&self, session_id: &str) -> DbResult<Vec<Application>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, session_id, patient_package_id, amount_applied, created_at
            FROM applications
            WHERE session_id = ?
            ORDER BY created_at, rowid
            "#,
        )?;

        let rows = stmt.query_map([session_id], |row| {
            Ok(Application {
                id: row.get(0)?,
                session_id: row.get(1)?,
                package_id: row.get(2)?,
                amount_applied: quantity_from_milli(row.get(3)?),
                created_at: row.get(4)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Ad-hoc applications recorded in a session, in order.
    pub fn adhoc_applications_for_session(
        &self,
        session_id: &str,
    ) -> DbResult<Vec<AdhocApplication>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, session_id, treatment_id, treatment_name, treatment_unit,
                   amount_applied, created_at
            FROM adhoc_applications
            WHERE session_id = ?
            ORDER BY created_at, rowid
            "#,
        )?;

        let rows = stmt.query_map([session_id], |row| {
            Ok(AdhocApplication {
                id: row.get(0)?,
                session_id: row.get(1)?,
                treatment_id: row.get(2)?,
                treatment_name: row.get(3)?,
                treatment_unit: row.get(4)?,
                amount_applied: quantity_from_milli(row.get(5)?),
                created_at: row.get(6)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
