use axum::extract::State;
use clinic_core::models::{Package, PackageItem};
use clinic_core::PackageLedger;
use serde::Deserialize;

use super::{ok, ApiJson, ApiResult};
use crate::auth::StaffContext;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePackagesRequest {
    pub patient_id: String,
    #[serde(default)]
    pub items: Vec<PackageItemRequest>,
}

/// One line of a sale. `medicationId` carries the treatment ID.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageItemRequest {
    pub medication_id: String,
    pub quantity: f64,
    pub frequency_days: Option<u32>,
    pub day_of_week: Option<u8>,
}

impl From<PackageItemRequest> for PackageItem {
    fn from(item: PackageItemRequest) -> Self {
        PackageItem {
            treatment_id: item.medication_id,
            quantity: item.quantity,
            frequency_days: item.frequency_days,
            day_of_week: item.day_of_week,
        }
    }
}

pub async fn create_packages(
    State(state): State<AppState>,
    _staff: StaffContext,
    ApiJson(req): ApiJson<CreatePackagesRequest>,
) -> ApiResult<Vec<Package>> {
    let items: Vec<PackageItem> = req.items.into_iter().map(PackageItem::from).collect();
    let patient_id = req.patient_id;
    ok(state
        .run(move |db| PackageLedger::new(db).create_packages(&patient_id, &items))
        .await?)
}
