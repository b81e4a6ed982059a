use axum::extract::State;
use clinic_core::models::{AdhocDose, ApplicationBatch, BatchReport, DraftStatus, PackageDose};
use clinic_core::{ApplicationRecorder, ClinicError, ClinicResult, Database, DraftStore, SessionManager};
use serde::Deserialize;

use super::{ok, ApiJson, ApiResult};
use crate::auth::StaffContext;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RecordApplicationsRequest {
    pub patient_id: String,
    pub session_id: Option<String>,
    /// Stable ID of the draft being submitted; makes the call replayable
    pub draft_id: Option<String>,
    pub weight: f64,
    #[serde(default)]
    pub applications_to_save: Vec<PackageDose>,
    #[serde(default)]
    pub adhoc_applications: Vec<AdhocDose>,
    /// PNG signature as a base64 data URL
    pub signature: Option<String>,
}

/// Session the batch will close, and whether the draft was already submitted.
struct Target {
    session_id: Option<String>,
    replay: bool,
}

/// Record an attendance.
///
/// The session is pinned before the signature is stored so the image can be
/// named after it. A draft that was already submitted keeps the session it
/// closed, which lets a retry of the same payload replay its report.
pub async fn record_applications(
    State(state): State<AppState>,
    staff: StaffContext,
    ApiJson(req): ApiJson<RecordApplicationsRequest>,
) -> ApiResult<BatchReport> {
    let RecordApplicationsRequest {
        patient_id,
        session_id,
        draft_id,
        weight,
        applications_to_save,
        adhoc_applications,
        signature,
    } = req;

    let mut batch = ApplicationBatch {
        patient_id,
        session_id,
        weight,
        package_doses: applications_to_save,
        adhoc_doses: adhoc_applications,
        signature_url: None,
        attended_by: staff.name,
    };

    let target = {
        let batch = batch.clone();
        let draft_id = draft_id.clone();
        state
            .run(move |db| pin_session(db, draft_id.as_deref(), &batch))
            .await?
    };
    batch.session_id = target.session_id;

    if let (Some(session_id), Some(data)) = (&batch.session_id, signature) {
        if !target.replay && !data.trim().is_empty() {
            batch.signature_url = state.store_signature(session_id, data).await;
        }
    }

    let report = state
        .run(move |db| ApplicationRecorder::new(db).submit(draft_id.as_deref(), &batch))
        .await?;
    ok(report)
}

fn pin_session(db: &Database, draft_id: Option<&str>, batch: &ApplicationBatch) -> ClinicResult<Target> {
    if let Some(draft_id) = draft_id {
        if let Some(draft) = DraftStore::new(db).get(draft_id)? {
            if draft.status == DraftStatus::Submitted {
                return Ok(Target {
                    session_id: batch.session_id.clone().or(draft.session_id),
                    replay: true,
                });
            }
        }
    }

    if batch.session_id.is_some() {
        return Ok(Target {
            session_id: batch.session_id.clone(),
            replay: false,
        });
    }

    if !batch.weight.is_finite() || batch.weight <= 0.0 {
        return Err(ClinicError::Validation(
            "Weight must be a positive number".into(),
        ));
    }
    let session = SessionManager::new(db).resolve_or_create(&batch.patient_id)?;
    Ok(Target {
        session_id: Some(session.id),
        replay: false,
    })
}
