//! HTTP routes.
//!
//! Every handler answers with the `{success, data}` envelope on success and
//! an [`ErrorBody`](crate::error::ErrorBody) on failure.

mod applications;
mod catalog;
mod drafts;
mod financial;
mod packages;
mod patients;
mod queue;

use axum::extract::FromRequest;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::state::AppState;

/// Successful response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub(crate) fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        success: true,
        data: Some(data),
    }))
}

pub(crate) fn done() -> ApiResult<()> {
    Ok(Json(ApiResponse {
        success: true,
        data: None,
    }))
}

/// `Json` extractor whose rejections use the error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

async fn health() -> ApiResult<Health> {
    ok(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/patients/create", post(patients::create_patient))
        .route("/patients/search", get(patients::search_patients))
        .route("/patients/:id", get(patients::get_patient))
        .route("/patients/:id/packages", get(patients::active_packages))
        .route("/patients/:id/last-weight", get(patients::last_weight))
        .route("/queue", get(queue::list_queue))
        .route("/queue/add", post(queue::add_to_queue))
        .route("/queue/checkin", post(queue::check_in))
        .route("/queue/remove", post(queue::remove_from_queue))
        .route("/queue/start-attendance", post(queue::start_attendance))
        .route("/sessions/resolve", post(queue::resolve_session))
        .route("/sessions/cancel", post(queue::cancel_session))
        .route("/medications/list", get(catalog::list_treatments))
        .route("/packages/create", post(packages::create_packages))
        .route("/applications", post(applications::record_applications))
        .route("/drafts", put(drafts::save_draft))
        .route(
            "/drafts/:id",
            get(drafts::pending_draft).delete(drafts::discard_draft),
        )
        .route("/financial/pay", post(financial::record_payment))
        .route("/financial/:id", get(financial::statement))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
