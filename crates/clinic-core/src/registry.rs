//! Patient registry: identity records and CPF validation.

use strsim::jaro_winkler;
use tracing::info;

use crate::db::{Database, DbError};
use crate::error::{ClinicError, ClinicResult};
use crate::models::{NewPatient, Patient, PatientSummary};

/// Shortest accepted full name, after trimming.
const MIN_NAME_CHARS: usize = 3;

/// Upper bound on search results.
const MAX_SEARCH_RESULTS: usize = 50;

/// Connecting words kept lowercase when a name is title-cased.
const NAME_PARTICLES: [&str; 6] = ["de", "da", "do", "dos", "das", "e"];

/// Reduce a CPF to its 11 digits.
///
/// Accepts the punctuated form `000.000.000-00` or 11 bare digits; anything
/// else is rejected without looking at the check digits.
pub fn normalize_cpf(input: &str) -> Option<String> {
    let input = input.trim();
    let bytes = input.as_bytes();

    let is_bare = bytes.len() == 11 && bytes.iter().all(u8::is_ascii_digit);
    let is_punctuated = bytes.len() == 14
        && bytes[3] == b'.'
        && bytes[7] == b'.'
        && bytes[11] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| matches!(i, 3 | 7 | 11) || b.is_ascii_digit());

    if is_bare || is_punctuated {
        Some(input.chars().filter(char::is_ascii_digit).collect())
    } else {
        None
    }
}

/// Check a CPF's check digits.
///
/// Non-digits are ignored. The number must have exactly 11 digits, not all
/// identical, and both mod-11 check digits must match.
pub fn validate_cpf(cpf: &str) -> bool {
    let digits: Vec<u32> = cpf.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 11 || digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    let check_digit = |len: usize| -> u32 {
        let weight_start = len as u32 + 1;
        let sum: u32 = digits[..len]
            .iter()
            .enumerate()
            .map(|(i, d)| d * (weight_start - i as u32))
            .sum();
        match (sum * 10) % 11 {
            10 => 0,
            r => r,
        }
    };

    check_digit(9) == digits[9] && check_digit(10) == digits[10]
}

/// Display form `000.000.000-00` of an 11-digit CPF. Other input is
/// returned unchanged.
pub fn format_cpf(cpf: &str) -> String {
    if cpf.len() != 11 || !cpf.bytes().all(|b| b.is_ascii_digit()) {
        return cpf.to_string();
    }
    format!("{}.{}.{}-{}", &cpf[0..3], &cpf[3..6], &cpf[6..9], &cpf[9..11])
}

/// Title-case a person's name, keeping Portuguese particles lowercase.
pub fn format_name(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let lower = word.to_lowercase();
            if NAME_PARTICLES.contains(&lower.as_str()) {
                return lower;
            }
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Patient registry over the clinic database.
pub struct PatientRegistry<'a> {
    db: &'a Database,
}

impl<'a> PatientRegistry<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Validate and register a new patient.
    pub fn register(&self, input: NewPatient) -> ClinicResult<Patient> {
        let full_name = input.full_name.trim();
        if full_name.is_empty() || input.cpf.trim().is_empty() {
            return Err(ClinicError::validation("Nome e CPF são obrigatórios"));
        }
        if full_name.chars().count() < MIN_NAME_CHARS {
            return Err(ClinicError::validation(
                "Nome completo é obrigatório (mínimo 3 caracteres)",
            ));
        }

        let cpf = normalize_cpf(&input.cpf).ok_or_else(|| {
            ClinicError::validation("CPF inválido (formato: 000.000.000-00)")
        })?;
        if !validate_cpf(&cpf) {
            return Err(ClinicError::validation("CPF inválido (verifique os dígitos)"));
        }

        let email = non_blank(input.email);
        if let Some(email) = &email {
            if !looks_like_email(email) {
                return Err(ClinicError::validation("E-mail inválido"));
            }
        }

        let mut patient = Patient::new(format_name(full_name), cpf);
        patient.birth_date = non_blank(input.birth_date);
        patient.email = email;
        patient.phone = non_blank(input.phone);
        patient.clinical_notes = non_blank(input.clinical_notes);

        match self.db.insert_patient(&patient) {
            Ok(()) => {}
            Err(DbError::Duplicate(_)) => {
                return Err(ClinicError::Conflict(
                    "Já existe um paciente cadastrado com este CPF.".into(),
                ))
            }
            Err(e) => return Err(e.into()),
        }

        info!(patient_id = %patient.id, "Patient registered");
        Ok(patient)
    }

    /// Get a full patient record.
    pub fn get(&self, id: &str) -> ClinicResult<Patient> {
        self.db
            .get_patient(id)?
            .ok_or_else(|| ClinicError::NotFound(format!("Patient {}", id)))
    }

    /// Get a patient's identity.
    pub fn summary(&self, id: &str) -> ClinicResult<PatientSummary> {
        self.db
            .get_patient_summary(id)?
            .ok_or_else(|| ClinicError::NotFound(format!("Patient {}", id)))
    }

    /// Search by name fragment or CPF digits, best name match first.
    pub fn search(&self, query: &str, limit: usize) -> ClinicResult<Vec<Patient>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let limit = limit.clamp(1, MAX_SEARCH_RESULTS);

        let cpf_digits: String = query
            .chars()
            .filter(|c| !matches!(c, '.' | '-'))
            .collect();
        let cpf_digits = if cpf_digits.chars().all(|c| c.is_ascii_digit()) {
            cpf_digits
        } else {
            String::new()
        };

        // Over-fetch so ranking can promote close matches past alphabetical order
        let patients = self
            .db
            .search_patients(query, &cpf_digits, MAX_SEARCH_RESULTS)?;

        let needle = query.to_lowercase();
        let mut scored: Vec<(f64, Patient)> = patients
            .into_iter()
            .map(|p| (jaro_winkler(&needle, &p.full_name.to_lowercase()), p))
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.full_name.cmp(&b.1.full_name))
        });

        Ok(scored.into_iter().take(limit).map(|(_, p)| p).collect())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}
