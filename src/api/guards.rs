use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::{security, state::AppState};
use crate::db::types::Permissions;
use crate::services::session_store::SessionUser;

/// Authenticated caller. The token must name a live server-side session.
#[derive(Debug, Clone)]
pub(crate) struct CurrentUser {
    pub(crate) user: SessionUser,
    pub(crate) session_id: String,
}

impl CurrentUser {
    pub(crate) fn permissions(&self) -> Permissions {
        Permissions::for_user_type(self.user.user_type)
    }
}

/// Teacher or admin: may upload, delete and edit question banks.
pub(crate) struct CurrentStaff(pub(crate) CurrentUser);

/// Admin: may manage user accounts.
pub(crate) struct CurrentAdmin(pub(crate) CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let claims = security::verify_token(token, app_state.settings())
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

        let user = app_state
            .sessions()
            .lookup(&claims.sid)
            .await
            .ok_or(ApiError::Unauthorized("Session expired"))?;

        if user.id != claims.sub {
            return Err(ApiError::Unauthorized("Invalid authentication credentials"));
        }

        Ok(CurrentUser { user, session_id: claims.sid })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentStaff {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;

        if current.permissions().can_edit_tests {
            Ok(CurrentStaff(current))
        } else {
            Err(ApiError::Forbidden("Teacher or admin access required"))
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;

        if current.permissions().can_manage_users {
            Ok(CurrentAdmin(current))
        } else {
            Err(ApiError::Forbidden("Admin access required"))
        }
    }
}
