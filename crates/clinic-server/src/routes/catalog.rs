use axum::extract::State;
use clinic_core::models::TreatmentListing;
use clinic_core::CatalogReader;

use super::{ok, ApiResult};
use crate::auth::StaffContext;
use crate::state::AppState;

/// Every treatment, as `{id, name, unit, price}`, sorted by name.
pub async fn list_treatments(
    State(state): State<AppState>,
    _staff: StaffContext,
) -> ApiResult<Vec<TreatmentListing>> {
    ok(state
        .run(|db| CatalogReader::new(db).list_treatments())
        .await?)
}
