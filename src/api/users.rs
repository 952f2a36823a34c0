use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::api::upload::read_file_field;
use crate::core::security;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserType;
use crate::repositories;
use crate::schemas::user::{
    CredentialsResponse, ImportResponse, UserListQuery, UserListResponse, UserRegister,
    UserResponse, UserUpdate,
};
use crate::services::accounts::{self, NewAccount, RegisterOutcome};
use crate::services::session_store::SessionUser;
use crate::services::user_import::{self, ImportFormat};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(register_user))
        .route("/import", post(import_users))
        .route("/:user_id", get(get_user).patch(update_user).delete(delete_user))
        .route("/:user_id/password", post(regenerate_password))
}

async fn list_users(
    Query(params): Query<UserListQuery>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<UserListResponse>, ApiError> {
    let filter = params.into_filter().map_err(ApiError::BadRequest)?;

    let users = repositories::users::list(state.db(), &filter)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list users"))?;
    let available_groups = repositories::users::distinct_groups(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list groups"))?;

    let mut response = UserListResponse {
        admins: Vec::new(),
        teachers: Vec::new(),
        students: Vec::new(),
        available_groups,
    };
    for user in users {
        let bucket = match user.user_type {
            UserType::Admin => &mut response.admins,
            UserType::Teacher => &mut response.teachers,
            UserType::Student => &mut response.students,
        };
        bucket.push(UserResponse::from_db(user));
    }

    Ok(Json(response))
}

async fn register_user(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<UserRegister>,
) -> Result<(StatusCode, Json<CredentialsResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let account = NewAccount {
        user_type: payload.user_type,
        last_name: payload.last_name,
        first_name: payload.first_name,
        middle_name: payload.middle_name,
        group_name: payload.group_name,
    };

    match accounts::register(state.db(), account)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to register user"))?
    {
        RegisterOutcome::Created { user, password } => {
            tracing::info!(
                admin_id = %admin.user.id,
                user_id = %user.id,
                login = %user.login,
                action = "register_user",
                "User registered"
            );
            let login = user.login.clone();
            Ok((
                StatusCode::CREATED,
                Json(CredentialsResponse { user: UserResponse::from_db(user), login, password }),
            ))
        }
        RegisterOutcome::AlreadyExists => {
            Err(ApiError::Conflict("User with this name and type already exists".to_string()))
        }
    }
}

async fn import_users(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ImportResponse>, ApiError> {
    let upload = read_file_field(&state, multipart).await?;
    let format = ImportFormat::from_filename(&upload.filename).ok_or_else(|| {
        ApiError::BadRequest("Only .csv, .xlsx and .xls files are supported".to_string())
    })?;

    let report = user_import::import_users(state.db(), upload.bytes, format)
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tracing::info!(
        admin_id = %admin.user.id,
        filename = %upload.filename,
        successful = report.successful,
        failed = report.failed,
        exists = report.exists,
        action = "import_users",
        "User import finished"
    );

    Ok(Json(ImportResponse { filename: upload.filename, report }))
}

async fn get_user(
    Path(user_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = repositories::users::find_by_id(state.db(), &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch user"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(UserResponse::from_db(user)))
}

async fn update_user(
    Path(user_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<UserUpdate>,
) -> Result<Json<UserResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let login = payload.login.map(|login| login.trim().to_string());
    if let Some(login) = login.as_deref() {
        let taken = repositories::users::login_taken(state.db(), login, Some(&user_id))
            .await
            .map_err(|e| ApiError::internal(e, "Failed to check login"))?;
        if taken {
            return Err(ApiError::Conflict("Login is already taken".to_string()));
        }
    }

    let hashed_password = payload
        .password
        .as_deref()
        .map(security::hash_password)
        .transpose()
        .map_err(|e| ApiError::internal(e, "Failed to hash password"))?;

    let user = repositories::users::update(
        state.db(),
        &user_id,
        repositories::users::UpdateUser {
            last_name: payload.last_name.map(|value| value.trim().to_string()),
            first_name: payload.first_name.map(|value| value.trim().to_string()),
            middle_name: payload.middle_name.map(|value| value.trim().to_string()),
            group_name: payload.group_name.map(|value| value.trim().to_string()),
            login,
            hashed_password,
            updated_at: primitive_now_utc(),
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update user"))?
    .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    state.sessions().refresh_user(SessionUser::from(&user)).await;
    tracing::info!(
        admin_id = %admin.user.id,
        user_id = %user.id,
        action = "update_user",
        "User updated"
    );

    Ok(Json(UserResponse::from_db(user)))
}

async fn delete_user(
    Path(user_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    if admin.user.id == user_id {
        return Err(ApiError::BadRequest("You cannot delete your own account".to_string()));
    }

    let deleted = repositories::users::delete(state.db(), &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete user"))?;
    if !deleted {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    let evicted = state.sessions().evict_user(&user_id).await;
    tracing::info!(
        admin_id = %admin.user.id,
        user_id = %user_id,
        evicted_sessions = evicted,
        action = "delete_user",
        "User deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}

async fn regenerate_password(
    Path(user_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<CredentialsResponse>, ApiError> {
    let (user, password) = accounts::regenerate_password(state.db(), &user_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to regenerate password"))?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::info!(
        admin_id = %admin.user.id,
        user_id = %user.id,
        action = "regenerate_password",
        "Password regenerated"
    );

    let login = user.login.clone();
    Ok(Json(CredentialsResponse { user: UserResponse::from_db(user), login, password }))
}
