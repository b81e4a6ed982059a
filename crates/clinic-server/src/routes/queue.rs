use axum::extract::State;
use clinic_core::models::{QueueEntry, Session};
use clinic_core::SessionManager;
use serde::Deserialize;

use super::{done, ok, ApiJson, ApiResult};
use crate::auth::StaffContext;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRef {
    pub patient_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRef {
    pub session_id: String,
}

pub async fn list_queue(
    State(state): State<AppState>,
    _staff: StaffContext,
) -> ApiResult<Vec<QueueEntry>> {
    ok(state.run(|db| SessionManager::new(db).list_queue()).await?)
}

pub async fn add_to_queue(
    State(state): State<AppState>,
    _staff: StaffContext,
    ApiJson(req): ApiJson<PatientRef>,
) -> ApiResult<Session> {
    ok(state
        .run(move |db| SessionManager::new(db).enqueue(&req.patient_id))
        .await?)
}

pub async fn check_in(
    State(state): State<AppState>,
    _staff: StaffContext,
    ApiJson(req): ApiJson<SessionRef>,
) -> ApiResult<Session> {
    ok(state
        .run(move |db| SessionManager::new(db).check_in(&req.session_id))
        .await?)
}

pub async fn remove_from_queue(
    State(state): State<AppState>,
    _staff: StaffContext,
    ApiJson(req): ApiJson<SessionRef>,
) -> ApiResult<()> {
    state
        .run(move |db| SessionManager::new(db).remove_from_queue(&req.session_id))
        .await?;
    done()
}

pub async fn start_attendance(
    State(state): State<AppState>,
    _staff: StaffContext,
    ApiJson(req): ApiJson<SessionRef>,
) -> ApiResult<Session> {
    ok(state
        .run(move |db| SessionManager::new(db).start_attendance(&req.session_id))
        .await?)
}

pub async fn resolve_session(
    State(state): State<AppState>,
    _staff: StaffContext,
    ApiJson(req): ApiJson<PatientRef>,
) -> ApiResult<Session> {
    ok(state
        .run(move |db| SessionManager::new(db).resolve_or_create(&req.patient_id))
        .await?)
}

pub async fn cancel_session(
    State(state): State<AppState>,
    staff: StaffContext,
    ApiJson(req): ApiJson<SessionRef>,
) -> ApiResult<()> {
    let session_id = req.session_id.clone();
    state
        .run(move |db| SessionManager::new(db).cancel(&req.session_id))
        .await?;
    tracing::info!(
        %session_id,
        staff = staff.name.as_deref().unwrap_or("-"),
        "Session canceled"
    );
    done()
}
