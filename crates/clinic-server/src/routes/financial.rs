use axum::extract::{Path, State};
use clinic_core::models::{LedgerEntry, PaymentPart, Statement};
use clinic_core::FinancialLedger;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{ok, ApiJson, ApiResult};
use crate::auth::StaffContext;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub patient_id: String,
    pub total_paid: Decimal,
    #[serde(default)]
    pub payments: Vec<PaymentPart>,
}

pub async fn statement(
    State(state): State<AppState>,
    _staff: StaffContext,
    Path(id): Path<String>,
) -> ApiResult<Statement> {
    ok(state
        .run(move |db| FinancialLedger::new(db).statement(&id))
        .await?)
}

pub async fn record_payment(
    State(state): State<AppState>,
    staff: StaffContext,
    ApiJson(req): ApiJson<PaymentRequest>,
) -> ApiResult<LedgerEntry> {
    let entry = state
        .run(move |db| {
            FinancialLedger::new(db).record_payment(&req.patient_id, req.total_paid, &req.payments)
        })
        .await?;
    tracing::info!(
        entry_id = %entry.id,
        amount = %entry.amount,
        staff = staff.name.as_deref().unwrap_or("-"),
        "Payment received"
    );
    ok(entry)
}
