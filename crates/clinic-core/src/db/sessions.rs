//! Session (visit) database operations.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbError, DbResult};
use crate::models::{QueueEntry, Session, SessionStatus, WeightRecord};

impl Database {
    /// Insert a new session.
    pub fn insert_session(&self, session: &Session) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO sessions (
                id, patient_id, status, check_in_time, weight,
                signature_url, attended_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                session.id,
                session.patient_id,
                session.status.as_str(),
                session.check_in_time,
                session.weight,
                session.signature_url,
                session.attended_by,
                session.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get a session by ID.
    pub fn get_session(&self, id: &str) -> DbResult<Option<Session>> {
        self.conn
            .query_row(
                r#"
                SELECT id, patient_id, status, check_in_time, weight,
                       signature_url, attended_by, created_at
                FROM sessions
                WHERE id = ?
                "#,
                [id],
                session_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Most recent open session for a patient.
    ///
    /// Ties on `created_at` are broken by insertion order.
    pub fn latest_open_session(&self, patient_id: &str) -> DbResult<Option<Session>> {
        self.conn
            .query_row(
                r#"
                SELECT id, patient_id, status, check_in_time, weight,
                       signature_url, attended_by, created_at
                FROM sessions
                WHERE patient_id = ?
                  AND status IN ('scheduled', 'waiting', 'in_attendance')
                ORDER BY created_at DESC, rowid DESC
                LIMIT 1
                "#,
                [patient_id],
                session_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// Set a session's status.
    pub fn set_session_status(&self, id: &str, status: SessionStatus) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE sessions SET status = ?2 WHERE id = ?1",
            params![id, status.as_str()],
        )?;
        Ok(rows_affected > 0)
    }

    /// Put a session in the waiting room with a fresh check-in time.
    pub fn check_in_session(&self, id: &str, check_in_time: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE sessions SET status = 'waiting', check_in_time = ?2 WHERE id = ?1",
            params![id, check_in_time],
        )?;
        Ok(rows_affected > 0)
    }

    /// Close a session with its final measurements.
    pub fn complete_session(
        &self,
        id: &str,
        weight: f64,
        signature_url: Option<&str>,
        attended_by: Option<&str>,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE sessions SET
                status = 'completed',
                weight = ?2,
                signature_url = ?3,
                attended_by = ?4
            WHERE id = ?1
            "#,
            params![id, weight, signature_url, attended_by],
        )?;
        Ok(rows_affected > 0)
    }

    /// Hard-delete a session.
    ///
    /// Fails with `DbError::Constraint` when clinical acts reference it.
    pub fn delete_session(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM sessions WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    /// Number of package and ad-hoc applications recorded in a session.
    pub fn count_session_acts(&self, id: &str) -> DbResult<u64> {
        let count: i64 = self.conn.query_row(
            r#"
            SELECT (SELECT COUNT(*) FROM applications WHERE session_id = ?1)
                 + (SELECT COUNT(*) FROM adhoc_applications WHERE session_id = ?1)
            "#,
            [id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Open sessions with patient names, earliest check-in first.
    pub fn list_open_sessions(&self) -> DbResult<Vec<QueueEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT s.id, s.patient_id, p.full_name, s.status, s.check_in_time
            FROM sessions s
            JOIN patients p ON p.id = s.patient_id
            WHERE s.status IN ('scheduled', 'waiting', 'in_attendance')
            ORDER BY COALESCE(s.check_in_time, s.created_at), s.rowid
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (session_id, patient_id, full_name, status, check_in_time) = row?;
            entries.push(QueueEntry {
                session_id,
                patient_id,
                full_name,
                status: string_to_status(&status)?,
                check_in_time,
            });
        }
        Ok(entries)
    }

    /// Weight recorded in the patient's most recent weighed session.
    pub fn last_recorded_weight(&self, patient_id: &str) -> DbResult<Option<WeightRecord>> {
        self.conn
            .query_row(
                r#"
                SELECT weight, COALESCE(check_in_time, created_at)
                FROM sessions
                WHERE patient_id = ? AND weight IS NOT NULL
                ORDER BY created_at DESC, rowid DESC
                LIMIT 1
                "#,
                [patient_id],
                |row| {
                    Ok(WeightRecord {
                        weight: row.get(0)?,
                        recorded_at: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }
}

/// Intermediate row struct for database mapping.
struct SessionRow {
    id: String,
    patient_id: String,
    status: String,
    check_in_time: Option<String>,
    weight: Option<f64>,
    signature_url: Option<String>,
    attended_by: Option<String>,
    created_at: String,
}

fn session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        status: row.get(2)?,
        check_in_time: row.get(3)?,
        weight: row.get(4)?,
        signature_url: row.get(5)?,
        attended_by: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl TryFrom<SessionRow> for Session {
    type Error = DbError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Session {
            id: row.id,
            patient_id: row.patient_id,
            status: string_to_status(&row.status)?,
            check_in_time: row.check_in_time,
            weight: row.weight,
            signature_url: row.signature_url,
            attended_by: row.attended_by,
            created_at: row.created_at,
        })
    }
}

fn string_to_status(s: &str) -> Result<SessionStatus, DbError> {
    SessionStatus::parse(s)
        .ok_or_else(|| DbError::Constraint(format!("Unknown session status: {}", s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Patient;

    fn setup_db() -> (Database, String) {
        let db = Database::open_in_memory().unwrap();
        let patient = Patient::new("Ana Souza".into(), "52998224725".into());
        db.insert_patient(&patient).unwrap();
        (db, patient.id)
    }

    #[test]
    fn test_insert_and_get_session() {
        let (db, patient_id) = setup_db();
        let session = Session::new(patient_id, SessionStatus::Waiting);
        db.insert_session(&session).unwrap();

        let retrieved = db.get_session(&session.id).unwrap().unwrap();
        assert_eq!(retrieved, session);
        assert!(db.get_session("missing").unwrap().is_none());
    }

    #[test]
    fn test_latest_open_session_skips_completed() {
        let (db, patient_id) = setup_db();
        let open = Session::new(patient_id.clone(), SessionStatus::Waiting);
        db.insert_session(&open).unwrap();
        let done = Session::new(patient_id.clone(), SessionStatus::Completed);
        db.insert_session(&done).unwrap();

        let latest = db.latest_open_session(&patient_id).unwrap().unwrap();
        assert_eq!(latest.id, open.id);
    }

    #[test]
    fn test_latest_open_session_tie_break() {
        let (db, patient_id) = setup_db();
        let first = Session::new(patient_id.clone(), SessionStatus::Waiting);
        let mut second = Session::new(patient_id.clone(), SessionStatus::Waiting);
        second.created_at = first.created_at.clone();
        db.insert_session(&first).unwrap();
        db.insert_session(&second).unwrap();

        let latest = db.latest_open_session(&patient_id).unwrap().unwrap();
        assert_eq!(latest.id, second.id);
    }

    #[test]
    fn test_complete_session() {
        let (db, patient_id) = setup_db();
        let session = Session::new(patient_id.clone(), SessionStatus::InAttendance);
        db.insert_session(&session).unwrap();

        assert!(db
            .complete_session(&session.id, 71.3, Some("/signatures/a.png"), Some("Joana"))
            .unwrap());

        let s = db.get_session(&session.id).unwrap().unwrap();
        assert_eq!(s.status, SessionStatus::Completed);
        assert_eq!(s.weight, Some(71.3));
        assert_eq!(s.attended_by.as_deref(), Some("Joana"));

        let weight = db.last_recorded_weight(&patient_id).unwrap().unwrap();
        assert_eq!(weight.weight, 71.3);
    }

    #[test]
    fn test_queue_listing() {
        let (db, patient_id) = setup_db();
        let waiting = Session::new(patient_id.clone(), SessionStatus::Waiting);
        db.insert_session(&waiting).unwrap();
        let done = Session::new(patient_id, SessionStatus::Completed);
        db.insert_session(&done).unwrap();

        let queue = db.list_open_sessions().unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].session_id, waiting.id);
        assert_eq!(queue[0].full_name, "Ana Souza");
    }

    #[test]
    fn test_delete_session_with_acts_is_refused() {
        let (db, patient_id) = setup_db();
        let session = Session::new(patient_id, SessionStatus::InAttendance);
        db.insert_session(&session).unwrap();
        db.conn()
            .execute(
                r#"INSERT INTO adhoc_applications
                   (id, session_id, treatment_name, treatment_unit, amount_applied, created_at)
                   VALUES ('h1', ?1, 'Ferro', 'ml', 1, 'now')"#,
                [&session.id],
            )
            .unwrap();

        assert_eq!(db.count_session_acts(&session.id).unwrap(), 1);
        assert!(matches!(
            db.delete_session(&session.id),
            Err(DbError::Constraint(_))
        ));
    }

    #[test]
    fn test_delete_session() {
        let (db, patient_id) = setup_db();
        let session = Session::new(patient_id, SessionStatus::Waiting);
        db.insert_session(&session).unwrap();

        assert!(db.delete_session(&session.id).unwrap());
        assert!(!db.delete_session(&session.id).unwrap());
    }
}
