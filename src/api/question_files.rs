use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentStaff, CurrentUser};
use crate::api::upload::read_file_field;
use crate::core::state::AppState;
use crate::schemas::question_bank::{FileListResponse, UploadResponse};
use crate::services::question_files::validate_name;
use crate::services::spreadsheet;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_files).post(upload_file))
        .route("/:name", delete(delete_file))
}

async fn list_files(
    _current: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<FileListResponse>, ApiError> {
    let files = state.question_files().list().await?;
    Ok(Json(FileListResponse { files }))
}

/// Stores a bank only if it parses; an existing file with the same name is replaced.
async fn upload_file(
    CurrentStaff(current): CurrentStaff,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let upload = read_file_field(&state, multipart).await?;
    let filename = validate_name(&upload.filename)?.to_string();

    let bytes = upload.bytes;
    let bank = tokio::task::spawn_blocking({
        let bytes = bytes.clone();
        move || spreadsheet::parse_question_bank(bytes)
    })
    .await
    .map_err(|e| ApiError::internal(e, "Question bank parsing task failed"))??;

    state.question_files().save(&filename, &bytes).await?;

    tracing::info!(
        user_id = %current.user.id,
        filename = %filename,
        questions = bank.len(),
        action = "upload_bank",
        "Question bank uploaded"
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse { filename, size: bytes.len(), total_questions: bank.len() }),
    ))
}

async fn delete_file(
    CurrentStaff(current): CurrentStaff,
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let filename = validate_name(&name)?;
    state.question_files().delete(filename).await?;

    tracing::info!(
        user_id = %current.user.id,
        filename = %filename,
        action = "delete_bank",
        "Question bank deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use tower::ServiceExt;

    use crate::db::types::UserType;
    use crate::test_support;

    #[tokio::test]
    async fn staff_upload_list_and_delete() {
        let ctx = test_support::setup_test_context().await;
        let token = test_support::admin_token(&ctx).await;
        let bank = test_support::bank_xlsx(&[("2+2?", "\"four\",\"4\""), ("Capital of France?", "\"Paris\"")]);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::multipart_request(
                "/api/v1/question-files",
                &token,
                "math.xlsx",
                bank,
            ))
            .await
            .expect("upload");
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = test_support::read_json(response).await;
        assert_eq!(body["filename"], "math.xlsx");
        assert_eq!(body["total_questions"], 2);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(Method::GET, "/api/v1/question-files", Some(&token), None))
            .await
            .expect("list");
        let body = test_support::read_json(response).await;
        assert_eq!(body["files"][0]["name"], "math.xlsx");

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::DELETE,
                "/api/v1/question-files/math.xlsx",
                Some(&token),
                None,
            ))
            .await
            .expect("delete");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::json_request(
                Method::DELETE,
                "/api/v1/question-files/math.xlsx",
                Some(&token),
                None,
            ))
            .await
            .expect("delete again");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_bank_is_rejected_and_not_stored() {
        let ctx = test_support::setup_test_context().await;
        let token = test_support::admin_token(&ctx).await;
        let bank = test_support::bank_xlsx(&[("No quoted answers", "four")]);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::multipart_request("/api/v1/question-files", &token, "bad.xlsx", bank))
            .await
            .expect("upload");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(ctx.state.question_files().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn students_cannot_upload() {
        let ctx = test_support::setup_test_context().await;
        let (token, _) = test_support::user_token(&ctx, UserType::Student).await;
        let bank = test_support::bank_xlsx(&[("Q", "\"A\"")]);

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::multipart_request("/api/v1/question-files", &token, "q.xlsx", bank))
            .await
            .expect("upload");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn non_xlsx_names_are_rejected() {
        let ctx = test_support::setup_test_context().await;
        let token = test_support::admin_token(&ctx).await;

        let response = ctx
            .app
            .clone()
            .oneshot(test_support::multipart_request(
                "/api/v1/question-files",
                &token,
                "notes.txt",
                b"hello".to_vec(),
            ))
            .await
            .expect("upload");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
