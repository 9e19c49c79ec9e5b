//! Coupon and claim handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use voucher_core::{
    KlaimId, KlaimKupon, KlaimStatus, KuponHadiah, KuponId, NewKupon, Notification, Winner,
};

use crate::auth::{AdminAuth, AuthUser};
use crate::error::ApiError;
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::state::AppState;

/// Create a coupon.
pub async fn create_coupon(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    AppJson(body): AppJson<NewKupon>,
) -> Result<(StatusCode, Json<KuponHadiah>), ApiError> {
    let kupon = body.into_kupon(Utc::now().date_naive())?;
    state.store.put_kupon(&kupon).await?;

    tracing::info!(
        actor = %admin.actor,
        kupon_id = %kupon.id,
        target_role = %kupon.target_role,
        jumlah_pemenang = kupon.jumlah_pemenang,
        "Coupon created"
    );

    Ok((StatusCode::CREATED, Json(kupon)))
}

/// All coupons.
pub async fn list_coupons(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
) -> Result<Json<Vec<KuponHadiah>>, ApiError> {
    Ok(Json(state.store.list_kupons().await?))
}

/// Current ranking of a coupon.
pub async fn coupon_winners(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    AppPath(kupon_id): AppPath<KuponId>,
) -> Result<Json<Vec<Winner>>, ApiError> {
    Ok(Json(state.store.coupon_winners(&kupon_id).await?))
}

/// File a claim for the authenticated user.
pub async fn claim_coupon(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    AppPath(kupon_id): AppPath<KuponId>,
) -> Result<(StatusCode, Json<KlaimKupon>), ApiError> {
    let claim = state
        .store
        .create_claim(&kupon_id, &auth.user.id, Utc::now().date_naive())
        .await?;

    tracing::info!(
        klaim_id = %claim.id,
        kupon_id = %claim.kupon_id,
        user_id = %claim.user_id,
        posisi = claim.posisi_pemenang,
        "Coupon claimed"
    );

    Ok((StatusCode::CREATED, Json(claim)))
}

/// Claim list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListClaimsQuery {
    /// Only claims against this coupon.
    pub kupon_id: Option<KuponId>,
}

/// List claims.
pub async fn list_claims(
    State(state): State<Arc<AppState>>,
    _admin: AdminAuth,
    AppQuery(query): AppQuery<ListClaimsQuery>,
) -> Result<Json<Vec<KlaimKupon>>, ApiError> {
    Ok(Json(state.store.list_claims(query.kupon_id.as_ref()).await?))
}

/// Review decision.
#[derive(Debug, Deserialize)]
pub struct ResolveClaimRequest {
    /// `disetujui` or `ditolak`.
    pub status: String,
    /// Optional note for the claimant.
    #[serde(default)]
    pub catatan: Option<String>,
}

/// Approve or reject a pending claim.
pub async fn resolve_claim(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    AppPath(klaim_id): AppPath<KlaimId>,
    AppJson(body): AppJson<ResolveClaimRequest>,
) -> Result<Json<KlaimKupon>, ApiError> {
    let decision = KlaimStatus::decision(&body.status)?;
    let claim = state
        .store
        .resolve_claim(&klaim_id, decision, body.catatan)
        .await?;

    tracing::info!(
        actor = %admin.actor,
        klaim_id = %claim.id,
        status = %claim.status,
        "Claim resolved"
    );
    state.notify(Notification::claim_resolved(&claim));

    Ok(Json(claim))
}
