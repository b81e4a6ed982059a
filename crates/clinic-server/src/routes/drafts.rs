use axum::extract::{Path, State};
use clinic_core::models::{AdhocDose, PackageDose, PendingSubmission};
use clinic_core::DraftStore;
use serde::Deserialize;

use super::{done, ok, ApiJson, ApiResult};
use crate::auth::StaffContext;
use crate::state::AppState;

/// An attendance in progress, shaped like the `/applications` payload.
#[derive(Debug, Deserialize)]
pub struct DraftRequest {
    pub draft_id: Option<String>,
    pub patient_id: String,
    pub session_id: Option<String>,
    pub weight: Option<f64>,
    #[serde(default)]
    pub applications_to_save: Vec<PackageDose>,
    #[serde(default)]
    pub adhoc_applications: Vec<AdhocDose>,
}

impl From<DraftRequest> for PendingSubmission {
    fn from(req: DraftRequest) -> Self {
        let mut draft = PendingSubmission::new(req.patient_id);
        if let Some(id) = req.draft_id {
            draft.draft_id = id;
        }
        draft.session_id = req.session_id;
        draft.weight = req.weight;
        draft.package_doses = req.applications_to_save;
        draft.adhoc_doses = req.adhoc_applications;
        draft
    }
}

pub async fn save_draft(
    State(state): State<AppState>,
    _staff: StaffContext,
    ApiJson(req): ApiJson<DraftRequest>,
) -> ApiResult<PendingSubmission> {
    let draft = PendingSubmission::from(req);
    ok(state
        .run(move |db| DraftStore::new(db).save_draft(draft))
        .await?)
}

/// The patient's pending draft, or `null`.
pub async fn pending_draft(
    State(state): State<AppState>,
    _staff: StaffContext,
    Path(patient_id): Path<String>,
) -> ApiResult<Option<PendingSubmission>> {
    ok(state
        .run(move |db| DraftStore::new(db).pending_draft_for_patient(&patient_id))
        .await?)
}

pub async fn discard_draft(
    State(state): State<AppState>,
    _staff: StaffContext,
    Path(draft_id): Path<String>,
) -> ApiResult<()> {
    state
        .run(move |db| DraftStore::new(db).discard_draft(&draft_id))
        .await?;
    done()
}
