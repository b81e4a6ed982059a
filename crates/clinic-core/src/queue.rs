//! Session/queue manager: the visit state machine.
//!
//! ```text
//!            enqueue / check_in              start_attendance
//!   (new) ─────────────────────► waiting ─────────────────────► in_attendance
//!                                   ▲                                │
//!                                   └──────────── check_in ──────────┤
//!   resolve_or_create ───────────────────────────────────────────►  │
//!                                                           complete │
//!                                                                    ▼
//!                                                               completed
//! ```
//!
//! `completed` is terminal and never deleted. Open sessions may be removed
//! from the queue or canceled; both are hard deletes.

use tracing::{debug, info};

use crate::db::{now_timestamp, Database, DbError};
use crate::error::{ClinicError, ClinicResult};
use crate::models::{QueueEntry, Session, SessionStatus, WeightRecord};

pub struct SessionManager<'a> {
    db: &'a Database,
}

impl<'a> SessionManager<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Return the patient's open session, creating one if there is none.
    ///
    /// A `waiting` or `scheduled` session found this way moves to
    /// `in_attendance`. The lookup and the insert share one write-locking
    /// transaction, so concurrent callers end up with a single session.
    pub fn resolve_or_create(&self, patient_id: &str) -> ClinicResult<Session> {
        let tx = self.db.immediate()?;
        let session = self.resolve_or_create_locked(patient_id)?;
        tx.commit()?;
        Ok(session)
    }

    /// `resolve_or_create` body; the caller holds the write lock.
    pub(crate) fn resolve_or_create_locked(&self, patient_id: &str) -> ClinicResult<Session> {
        if !self.db.patient_exists(patient_id)? {
            return Err(ClinicError::NotFound(format!("Patient {}", patient_id)));
        }

        if let Some(mut session) = self.db.latest_open_session(patient_id)? {
            if session.status != SessionStatus::InAttendance {
                self.db
                    .set_session_status(&session.id, SessionStatus::InAttendance)?;
                session.status = SessionStatus::InAttendance;
            }
            debug!(session_id = %session.id, "Resolved open session");
            return Ok(session);
        }

        let session = Session::new(patient_id.to_string(), SessionStatus::InAttendance);
        self.db.insert_session(&session)?;
        info!(session_id = %session.id, patient_id, "Session created for attendance");
        Ok(session)
    }

    /// Put a patient in the waiting room with a new session.
    ///
    /// Always inserts, even when the patient already has an open session.
    pub fn enqueue(&self, patient_id: &str) -> ClinicResult<Session> {
        if !self.db.patient_exists(patient_id)? {
            return Err(ClinicError::NotFound(format!("Patient {}", patient_id)));
        }
        let session = Session::new(patient_id.to_string(), SessionStatus::Waiting);
        self.db.insert_session(&session)?;
        info!(session_id = %session.id, patient_id, "Patient added to queue");
        Ok(session)
    }

    /// Mark a session as waiting with a fresh check-in time.
    pub fn check_in(&self, session_id: &str) -> ClinicResult<Session> {
        let tx = self.db.immediate()?;
        let mut session = self.open_session(session_id, SessionStatus::Waiting)?;
        let now = now_timestamp();
        self.db.check_in_session(session_id, &now)?;
        tx.commit()?;

        session.status = SessionStatus::Waiting;
        session.check_in_time = Some(now);
        Ok(session)
    }

    /// Delete an open session from the queue.
    ///
    /// No count of recorded acts is made first; if the store refuses the
    /// delete because acts reference the session, this is a conflict.
    pub fn remove_from_queue(&self, session_id: &str) -> ClinicResult<()> {
        let tx = self.db.immediate()?;
        self.deletable_session(session_id)?;
        match self.db.delete_session(session_id) {
            Ok(true) => {}
            Ok(false) => return Err(ClinicError::NotFound(format!("Session {}", session_id))),
            Err(DbError::Constraint(_)) => {
                return Err(ClinicError::Conflict(format!(
                    "Session {} has recorded applications",
                    session_id
                )))
            }
            Err(e) => return Err(e.into()),
        }
        tx.commit()?;

        info!(session_id, "Session removed from queue");
        Ok(())
    }

    /// Call a waiting patient in.
    pub fn start_attendance(&self, session_id: &str) -> ClinicResult<Session> {
        let tx = self.db.immediate()?;
        let mut session = self.open_session(session_id, SessionStatus::InAttendance)?;
        self.db
            .set_session_status(session_id, SessionStatus::InAttendance)?;
        tx.commit()?;

        session.status = SessionStatus::InAttendance;
        Ok(session)
    }

    /// Close a session with the measurements taken.
    pub fn complete(
        &self,
        session_id: &str,
        weight: f64,
        signature_url: Option<&str>,
        attended_by: Option<&str>,
    ) -> ClinicResult<Session> {
        let tx = self.db.immediate()?;
        let session = self.complete_locked(session_id, weight, signature_url, attended_by)?;
        tx.commit()?;
        Ok(session)
    }

    /// `complete` body; the caller holds the write lock.
    pub(crate) fn complete_locked(
        &self,
        session_id: &str,
        weight: f64,
        signature_url: Option<&str>,
        attended_by: Option<&str>,
    ) -> ClinicResult<Session> {
        if !weight.is_finite() || weight <= 0.0 {
            return Err(ClinicError::validation("Weight must be a positive number"));
        }
        let mut session = self.open_session(session_id, SessionStatus::Completed)?;
        self.db
            .complete_session(session_id, weight, signature_url, attended_by)?;

        session.status = SessionStatus::Completed;
        session.weight = Some(weight);
        session.signature_url = signature_url.map(str::to_string);
        session.attended_by = attended_by.map(str::to_string);
        info!(session_id, "Session completed");
        Ok(session)
    }

    /// Delete a session that has no recorded acts.
    pub fn cancel(&self, session_id: &str) -> ClinicResult<()> {
        let tx = self.db.immediate()?;
        self.deletable_session(session_id)?;
        let acts = self.db.count_session_acts(session_id)?;
        if acts > 0 {
            return Err(ClinicError::Conflict(format!(
                "Session {} has {} recorded applications",
                session_id, acts
            )));
        }
        self.db.delete_session(session_id)?;
        tx.commit()?;

        info!(session_id, "Session canceled");
        Ok(())
    }

    /// Open sessions, earliest check-in first.
    pub fn list_queue(&self) -> ClinicResult<Vec<QueueEntry>> {
        Ok(self.db.list_open_sessions()?)
    }

    /// The patient's most recent recorded weight, if any.
    pub fn last_weight(&self, patient_id: &str) -> ClinicResult<Option<WeightRecord>> {
        if !self.db.patient_exists(patient_id)? {
            return Err(ClinicError::NotFound(format!("Patient {}", patient_id)));
        }
        Ok(self.db.last_recorded_weight(patient_id)?)
    }

    /// Load a session that may still be deleted.
    fn deletable_session(&self, session_id: &str) -> ClinicResult<Session> {
        let session = self
            .db
            .get_session(session_id)?
            .ok_or_else(|| ClinicError::NotFound(format!("Session {}", session_id)))?;
        if session.status == SessionStatus::Completed {
            return Err(ClinicError::Conflict(format!(
                "Session {} is completed",
                session_id
            )));
        }
        Ok(session)
    }

    /// Load a session and check that it may move to `next`.
    fn open_session(&self, session_id: &str, next: SessionStatus) -> ClinicResult<Session> {
        let session = self
            .db
            .get_session(session_id)?
            .ok_or_else(|| ClinicError::NotFound(format!("Session {}", session_id)))?;
        if !session.status.can_transition_to(next) {
            return Err(ClinicError::Conflict(format!(
                "Session {} is {} and cannot become {}",
                session_id,
                session.status.as_str(),
                next.as_str()
            )));
        }
        Ok(session)
    }
}
