//! Session (clinic visit) models.

use serde::{Deserialize, Serialize};

/// Visit status.
///
/// `scheduled` is only produced by older records; new visits start as
/// `waiting` (queued) or `in_attendance` (attendance opened directly).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Waiting,
    InAttendance,
    Completed,
}

impl SessionStatus {
    /// Statuses that count as an open visit.
    pub const OPEN: [SessionStatus; 3] = [
        SessionStatus::Scheduled,
        SessionStatus::Waiting,
        SessionStatus::InAttendance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Waiting => "waiting",
            SessionStatus::InAttendance => "in_attendance",
            SessionStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(SessionStatus::Scheduled),
            "waiting" => Some(SessionStatus::Waiting),
            "in_attendance" => Some(SessionStatus::InAttendance),
            "completed" => Some(SessionStatus::Completed),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, SessionStatus::Completed)
    }

    /// Whether the state machine allows moving to `next`.
    ///
    /// `completed` is terminal and nothing moves back to `scheduled`.
    /// Re-entering the current open state is allowed (a repeated check-in
    /// refreshes the check-in time), as is sending an attended patient back
    /// to the waiting room.
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        match (self, next) {
            (SessionStatus::Completed, _) => false,
            (_, SessionStatus::Scheduled) => false,
            _ => true,
        }
    }
}

/// One clinic visit for a patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    pub patient_id: String,
    pub status: SessionStatus,
    pub check_in_time: Option<String>,
    /// Weight (kg) recorded at completion
    pub weight: Option<f64>,
    pub signature_url: Option<String>,
    /// Staff member who completed the attendance
    pub attended_by: Option<String>,
    pub created_at: String,
}

impl Session {
    /// Create a new session in the given status, checked in now.
    pub fn new(patient_id: String, status: SessionStatus) -> Self {
        let now = crate::db::now_timestamp();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            status,
            check_in_time: Some(now.clone()),
            weight: None,
            signature_url: None,
            attended_by: None,
            created_at: now,
        }
    }
}

/// Queue row shown on the front-desk board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueEntry {
    pub session_id: String,
    pub patient_id: String,
    pub full_name: String,
    pub status: SessionStatus,
    pub check_in_time: Option<String>,
}

/// Most recent weight measurement for a patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightRecord {
    pub weight: f64,
    pub recorded_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_names() {
        for status in [
            SessionStatus::Scheduled,
            SessionStatus::Waiting,
            SessionStatus::InAttendance,
            SessionStatus::Completed,
        ] {
            assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SessionStatus::parse("canceled"), None);
    }

    #[test]
    fn test_completed_is_terminal() {
        for next in [
            SessionStatus::Waiting,
            SessionStatus::InAttendance,
            SessionStatus::Completed,
        ] {
            assert!(!SessionStatus::Completed.can_transition_to(next));
        }
    }

    #[test]
    fn test_forward_transitions() {
        assert!(SessionStatus::Waiting.can_transition_to(SessionStatus::InAttendance));
        assert!(SessionStatus::Scheduled.can_transition_to(SessionStatus::InAttendance));
        assert!(SessionStatus::InAttendance.can_transition_to(SessionStatus::Completed));
        assert!(SessionStatus::Waiting.can_transition_to(SessionStatus::Waiting));
        assert!(SessionStatus::InAttendance.can_transition_to(SessionStatus::Waiting));
        assert!(!SessionStatus::Waiting.can_transition_to(SessionStatus::Scheduled));
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&SessionStatus::InAttendance).unwrap();
        assert_eq!(json, "\"in_attendance\"");
    }
}
