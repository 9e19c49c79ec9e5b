//! Deposit and balance handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use voucher_core::{Deposit, NewDeposit, Notification, Tier, UserId};
use voucher_store::DepositReceipt;

use crate::auth::{AdminAuth, Caller};
use crate::error::ApiError;
use crate::extract::{AppJson, AppPath};
use crate::state::AppState;

/// Record a payout and reset the recipient's unclaimed revenue.
pub async fn record_deposit(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    AppJson(body): AppJson<NewDeposit>,
) -> Result<(StatusCode, Json<DepositReceipt>), ApiError> {
    let receipt = state.store.record_deposit(body).await?;
    let deposit = &receipt.deposit;

    tracing::info!(
        actor = %admin.actor,
        deposit_id = %deposit.id,
        kategori = %deposit.kategori,
        user_id = %deposit.user_id,
        jumlah = deposit.jumlah,
        rows_reset = receipt.rows_reset,
        "Deposit recorded"
    );
    state.notify(Notification::deposit_received(deposit));

    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Deposits paid to a user.
pub async fn list_deposits(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    AppPath(user_id): AppPath<UserId>,
) -> Result<Json<Vec<Deposit>>, ApiError> {
    caller.require(&user_id)?;
    Ok(Json(state.store.list_deposits(&user_id).await?))
}

/// Unclaimed balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Tier queried.
    pub tier: Tier,
    /// Member queried.
    pub user_id: UserId,
    /// Revenue earned since the last deposit.
    pub unclaimed: i64,
}

/// Unclaimed revenue of a member in one tier.
pub async fn unclaimed_balance(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    AppPath((tier, user_id)): AppPath<(Tier, UserId)>,
) -> Result<Json<BalanceResponse>, ApiError> {
    caller.require(&user_id)?;
    let unclaimed = state.store.unclaimed_balance(tier, &user_id).await?;

    Ok(Json(BalanceResponse {
        tier,
        user_id,
        unclaimed,
    }))
}
