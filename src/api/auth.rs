use axum::{
    extract::{Form, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::security;
use crate::core::state::AppState;
use crate::db::models::User;
use crate::repositories;
use crate::schemas::auth::{LoginRequest, MeResponse, TokenResponse};
use crate::schemas::user::UserResponse;
use crate::services::session_store::SessionUser;

const BAD_CREDENTIALS: &str = "Incorrect login or password";

#[derive(Debug, Deserialize)]
struct OAuth2PasswordForm {
    username: String,
    password: String,
}

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/token", post(token))
        .route("/me", get(me))
        .route("/logout", post(logout))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = authenticate(&state, &payload.login, &payload.password).await?;
    issue_token(&state, user).await.map(Json)
}

async fn token(
    State(state): State<AppState>,
    Form(payload): Form<OAuth2PasswordForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = authenticate(&state, &payload.username, &payload.password).await?;
    issue_token(&state, user).await.map(Json)
}

async fn me(current: CurrentUser) -> Json<MeResponse> {
    let permissions = current.permissions();
    let user = current.user;
    Json(MeResponse {
        id: user.id,
        login: user.login,
        full_name: user.full_name,
        user_type: user.user_type,
        permissions,
    })
}

async fn logout(State(state): State<AppState>, current: CurrentUser) -> StatusCode {
    state.sessions().evict(&current.session_id).await;
    tracing::info!(user_id = %current.user.id, action = "logout", "User logged out");
    StatusCode::NO_CONTENT
}

async fn authenticate(state: &AppState, login: &str, password: &str) -> Result<User, ApiError> {
    let user = repositories::users::find_by_login(state.db(), login.trim())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load user"))?
        .ok_or(ApiError::Unauthorized(BAD_CREDENTIALS))?;

    let verified = security::verify_password(password, &user.hashed_password)
        .map_err(|_| ApiError::Unauthorized(BAD_CREDENTIALS))?;

    if !verified {
        tracing::warn!(login = %user.login, "Rejected login attempt");
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS));
    }

    Ok(user)
}

/// Every successful login opens a fresh server-side session; the token carries its id.
async fn issue_token(state: &AppState, user: User) -> Result<TokenResponse, ApiError> {
    let session_id = state.sessions().create(SessionUser::from(&user)).await;
    let access_token =
        security::create_access_token(&user.id, &session_id, state.settings(), None)
            .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;

    tracing::info!(user_id = %user.id, session_id = %session_id, action = "login", "User logged in");

    Ok(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        user: UserResponse::from_db(user),
    })
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    use crate::test_support;

    #[tokio::test]
    async fn login_issues_token_for_valid_credentials() {
        let ctx = test_support::setup_test_context().await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(serde_json::json!({
                    "login": test_support::ADMIN_LOGIN,
                    "password": test_support::ADMIN_PASSWORD
                })),
            ))
            .await
            .expect("login response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = test_support::read_json(response).await;
        assert_eq!(body["token_type"], "bearer");
        assert_eq!(body["user"]["user_type"], "admin");

        let token = body["access_token"].as_str().expect("token").to_string();
        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(Method::GET, "/api/v1/auth/me", Some(&token), None))
            .await
            .expect("me response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = test_support::read_json(response).await;
        assert_eq!(body["login"], test_support::ADMIN_LOGIN);
        assert_eq!(body["permissions"]["can_manage_users"], true);
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let ctx = test_support::setup_test_context().await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(serde_json::json!({"login": test_support::ADMIN_LOGIN, "password": "nope"})),
            ))
            .await
            .expect("login response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = test_support::read_json(response).await;
        assert_eq!(body["detail"], "Incorrect login or password");
    }

    #[tokio::test]
    async fn oauth_form_login_is_supported() {
        let ctx = test_support::setup_test_context().await;

        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/api/v1/auth/token")
            .header(axum::http::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(axum::body::Body::from(format!(
                "username={}&password={}",
                test_support::ADMIN_LOGIN,
                test_support::ADMIN_PASSWORD
            )))
            .expect("request");

        let response = ctx.app.clone().oneshot(request).await.expect("token response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn logout_invalidates_the_session_but_not_others() {
        let ctx = test_support::setup_test_context().await;
        let first = test_support::login(&ctx, test_support::ADMIN_LOGIN, test_support::ADMIN_PASSWORD).await;
        let second = test_support::login(&ctx, test_support::ADMIN_LOGIN, test_support::ADMIN_PASSWORD).await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(Method::POST, "/api/v1/auth/logout", Some(&first), None))
            .await
            .expect("logout");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(Method::GET, "/api/v1/auth/me", Some(&first), None))
            .await
            .expect("me");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(Method::GET, "/api/v1/auth/me", Some(&second), None))
            .await
            .expect("me");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
