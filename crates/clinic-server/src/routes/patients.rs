use axum::extract::{Path, Query, State};
use clinic_core::models::{ActivePackage, NewPatient, Patient, PatientSummary, WeightRecord};
use clinic_core::{PackageLedger, PatientRegistry, SessionManager};
use serde::Deserialize;

use super::{ok, ApiJson, ApiResult};
use crate::auth::StaffContext;
use crate::state::AppState;

const DEFAULT_SEARCH_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePatientRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub cpf: String,
    pub birth_date: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub clinical_notes: Option<String>,
}

impl From<CreatePatientRequest> for NewPatient {
    fn from(req: CreatePatientRequest) -> Self {
        NewPatient {
            full_name: req.full_name,
            cpf: req.cpf,
            birth_date: req.birth_date,
            email: req.email,
            phone: req.phone,
            clinical_notes: req.clinical_notes,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
}

pub async fn create_patient(
    State(state): State<AppState>,
    staff: StaffContext,
    ApiJson(req): ApiJson<CreatePatientRequest>,
) -> ApiResult<Patient> {
    let patient = state
        .run(move |db| PatientRegistry::new(db).register(req.into()))
        .await?;
    tracing::info!(
        patient_id = %patient.id,
        staff = staff.name.as_deref().unwrap_or("-"),
        "Patient registered"
    );
    ok(patient)
}

pub async fn search_patients(
    State(state): State<AppState>,
    _staff: StaffContext,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<Patient>> {
    let limit = query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let patients = state
        .run(move |db| PatientRegistry::new(db).search(&query.q, limit))
        .await?;
    ok(patients)
}

pub async fn get_patient(
    State(state): State<AppState>,
    _staff: StaffContext,
    Path(id): Path<String>,
) -> ApiResult<PatientSummary> {
    ok(state.run(move |db| PatientRegistry::new(db).summary(&id)).await?)
}

pub async fn active_packages(
    State(state): State<AppState>,
    _staff: StaffContext,
    Path(id): Path<String>,
) -> ApiResult<Vec<ActivePackage>> {
    let now = chrono::Utc::now();
    ok(state
        .run(move |db| PackageLedger::new(db).list_active(&id, now))
        .await?)
}

pub async fn last_weight(
    State(state): State<AppState>,
    _staff: StaffContext,
    Path(id): Path<String>,
) -> ApiResult<Option<WeightRecord>> {
    ok(state
        .run(move |db| SessionManager::new(db).last_weight(&id))
        .await?)
}
