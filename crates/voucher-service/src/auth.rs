//! Authentication extractors.
//!
//! - [`AuthUser`]: a hierarchy member identified by an HS256 JWT
//! - [`Caller`]: either an admin or a member, for endpoints open to both
//! - [`AdminAuth`]: the `X-Admin-Key` header, or a JWT of an Owner/Admin

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use voucher_core::{User, UserId};

use crate::crypto::constant_time_eq;
use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the admin API key.
pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// JWT claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user id).
    pub sub: String,
    /// Issuer.
    pub iss: String,
    /// Expiration time.
    pub exp: i64,
    /// Issued at.
    pub iat: i64,
}

/// Issue an HS256 token for `user_id`, valid for `ttl_seconds`.
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn issue_token(
    secret: &str,
    issuer: &str,
    user_id: &UserId,
    ttl_seconds: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = JwtClaims {
        sub: user_id.to_string(),
        iss: issuer.to_string(),
        exp: now + ttl_seconds,
        iat: now,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// An authenticated hierarchy member.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The member, as currently stored.
    pub user: User,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        let claims = validate_jwt(token, state)?;
        let user_id = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| ApiError::Unauthorized)?;

        let user = state.store.find_user(&user_id).await?.ok_or_else(|| {
            tracing::debug!(user_id = %user_id, "Token subject is not a known user");
            ApiError::Unauthorized
        })?;

        Ok(Self { user })
    }
}

/// Validate an HS256 token against the configured secret and issuer.
fn validate_jwt(token: &str, state: &AppState) -> Result<JwtClaims, ApiError> {
    let secret = state
        .config
        .jwt_secret
        .as_ref()
        .ok_or(ApiError::Unauthorized)?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&state.config.jwt_issuer]);

    decode::<JwtClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(error = %e, "JWT validation failed");
            ApiError::Unauthorized
        })
}

/// Who is calling: an admin (API key or privileged user) or a member.
#[derive(Debug, Clone)]
pub enum Caller {
    /// Admin key holder or Owner/Admin user.
    Admin {
        /// Audit identifier.
        actor: String,
    },
    /// Any other hierarchy member.
    Member(User),
}

impl Caller {
    /// Whether the caller may act on behalf of `user_id`.
    #[must_use]
    pub fn can_act_for(&self, user_id: &UserId) -> bool {
        match self {
            Self::Admin { .. } => true,
            Self::Member(user) => user.id == *user_id,
        }
    }

    /// Fail with `Forbidden` unless the caller may act for `user_id`.
    pub fn require(&self, user_id: &UserId) -> Result<(), ApiError> {
        if self.can_act_for(user_id) {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(key) = parts
            .headers
            .get(ADMIN_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            let expected = state
                .config
                .admin_api_key
                .as_ref()
                .ok_or(ApiError::Unauthorized)?;
            if !constant_time_eq(key, expected) {
                return Err(ApiError::Unauthorized);
            }
            return Ok(Self::Admin {
                actor: "admin-key".into(),
            });
        }

        let AuthUser { user } = AuthUser::from_request_parts(parts, state).await?;
        if user.role.is_privileged() {
            Ok(Self::Admin {
                actor: user.username,
            })
        } else {
            Ok(Self::Member(user))
        }
    }
}

/// An authenticated admin.
#[derive(Debug, Clone)]
pub struct AdminAuth {
    /// Audit identifier.
    pub actor: String,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match Caller::from_request_parts(parts, state).await? {
            Caller::Admin { actor } => {
                tracing::debug!(actor = %actor, "Admin authenticated");
                Ok(Self { actor })
            }
            Caller::Member(user) => {
                tracing::debug!(user_id = %user.id, role = %user.role, "Admin access denied");
                Err(ApiError::Forbidden)
            }
        }
    }
}
