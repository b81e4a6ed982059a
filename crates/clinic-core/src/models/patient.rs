//! Patient models.

use serde::{Deserialize, Serialize};

use crate::db::now_timestamp;

/// A registered patient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// UUID generated at registration
    pub id: String,
    /// CPF, 11 normalized digits
    pub cpf: String,
    /// Full name
    pub full_name: String,
    /// Date of birth (ISO date)
    pub birth_date: Option<String>,
    /// Contact email
    pub email: Option<String>,
    /// Contact phone
    pub phone: Option<String>,
    /// Free-text clinical notes
    pub clinical_notes: Option<String>,
    /// Creation timestamp
    pub created_at: String,
}

/// Registration input, as typed at the front desk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewPatient {
    pub full_name: String,
    pub cpf: String,
    pub birth_date: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub clinical_notes: Option<String>,
}

/// Minimal patient identity used by listings and headers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientSummary {
    pub id: String,
    pub full_name: String,
}

impl Patient {
    /// Create a new patient from already-validated fields.
    pub fn new(full_name: String, cpf: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            cpf,
            full_name,
            birth_date: None,
            email: None,
            phone: None,
            clinical_notes: None,
            created_at: now_timestamp(),
        }
    }

    /// CPF in its display form (`000.000.000-00`).
    pub fn formatted_cpf(&self) -> String {
        crate::registry::format_cpf(&self.cpf)
    }

    pub fn summary(&self) -> PatientSummary {
        PatientSummary {
            id: self.id.clone(),
            full_name: self.full_name.clone(),
        }
    }
}
