//! Fee schedule handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use voucher_core::FeeSchedule;

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::extract::AppJson;
use crate::state::AppState;

/// Insert or replace the fee schedule of (Cabang, voucher type).
pub async fn set_fee_schedule(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    AppJson(body): AppJson<FeeSchedule>,
) -> Result<Json<FeeSchedule>, ApiError> {
    let schedule = state.store.put_fee_schedule(body).await?;

    tracing::info!(
        actor = %admin.actor,
        cabang_id = %schedule.cabang_id,
        voucher_type = %schedule.voucher_type,
        unit_price = schedule.unit_price,
        unit_fee_link = schedule.unit_fee_link,
        unit_fee_cabang = schedule.unit_fee_cabang,
        unit_komisi_mitra = schedule.unit_komisi_mitra,
        "Fee schedule updated"
    );

    Ok(Json(schedule))
}
