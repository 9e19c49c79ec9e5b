//! Hierarchy directory handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use voucher_core::{NewUser, User};

use crate::auth::{AdminAuth, AuthUser};
use crate::error::ApiError;
use crate::extract::AppJson;
use crate::state::AppState;

/// Register a user under an existing parent.
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    AppJson(body): AppJson<NewUser>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state.store.create_user(body).await?;

    tracing::info!(
        actor = %admin.actor,
        user_id = %user.id,
        role = %user.role,
        parent_id = ?user.parent_id,
        "User registered"
    );

    Ok((StatusCode::CREATED, Json(user)))
}

/// The authenticated user's directory entry.
pub async fn me(auth: AuthUser) -> Json<User> {
    Json(auth.user)
}
