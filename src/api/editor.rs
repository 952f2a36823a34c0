use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStaff;
use crate::api::upload::read_file_field;
use crate::core::state::AppState;
use crate::schemas::question_bank::{EditorDocument, EditorSaveRequest, EditorSaveResponse, SavedRow};
use crate::services::question_files::validate_name;
use crate::services::spreadsheet::{self, EditorRow};

const NEW_FILE_NAME: &str = "new_file.xlsx";
const NEW_FILE_SAVED_AS: &str = "new_questions.xlsx";
const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/upload", post(open_upload))
        .route("/files/:name", get(open_existing))
        .route("/new", get(new_document))
        .route("/save", post(save_document))
        .route("/download/:name", get(download))
}

async fn open_upload(
    CurrentStaff(current): CurrentStaff,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<EditorDocument>, ApiError> {
    let upload = read_file_field(&state, multipart).await?;
    let filename = validate_name(&upload.filename)?.to_string();

    let questions = editor_rows(upload.bytes.clone()).await?;
    state.question_files().save(&filename, &upload.bytes).await?;

    tracing::info!(
        user_id = %current.user.id,
        filename = %filename,
        rows = questions.len(),
        action = "editor_open",
        "Question bank opened for editing"
    );
    Ok(Json(EditorDocument { filename, questions }))
}

async fn open_existing(
    _staff: CurrentStaff,
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<EditorDocument>, ApiError> {
    let filename = validate_name(&name)?.to_string();
    let bytes = state.question_files().read(&filename).await?;
    let questions = editor_rows(bytes).await?;
    Ok(Json(EditorDocument { filename, questions }))
}

async fn new_document(_staff: CurrentStaff) -> Json<EditorDocument> {
    Json(EditorDocument {
        filename: NEW_FILE_NAME.to_string(),
        questions: vec![EditorRow { index: 0, question: String::new(), answers: vec![String::new()] }],
    })
}

/// Writes the edited rows to a new workbook. The source file is never overwritten.
async fn save_document(
    CurrentStaff(current): CurrentStaff,
    State(state): State<AppState>,
    Json(payload): Json<EditorSaveRequest>,
) -> Result<Json<EditorSaveResponse>, ApiError> {
    let source = validate_name(&payload.filename)?;
    let filename = saved_name(source);

    let rows: Vec<SavedRow> = payload
        .questions
        .into_iter()
        .map(|item| SavedRow {
            question: item.question.trim().to_string(),
            answers: item
                .answers
                .into_list()
                .into_iter()
                .map(|answer| answer.trim().to_string())
                .filter(|answer| !answer.is_empty())
                .collect(),
        })
        .filter(|row| !row.question.is_empty())
        .collect();

    let cells: Vec<(String, String)> = rows
        .iter()
        .map(|row| (row.question.clone(), spreadsheet::format_answers(&row.answers)))
        .collect();
    let bytes = spreadsheet::write_question_bank(&cells)
        .map_err(|e| ApiError::internal(e, "Failed to build question bank workbook"))?;
    state.question_files().save(&filename, &bytes).await?;

    tracing::info!(
        user_id = %current.user.id,
        source = %source,
        filename = %filename,
        rows = rows.len(),
        action = "editor_save",
        "Question bank saved"
    );

    let download_url = format!("{}/editor/download/{filename}", state.settings().api().api_v1_str);
    Ok(Json(EditorSaveResponse { filename, rows, download_url }))
}

async fn download(
    _staff: CurrentStaff,
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let filename = validate_name(&name)?;
    let bytes = state.question_files().read(filename).await?;

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .map_err(|e| ApiError::internal(e, "Invalid download file name"))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(XLSX_CONTENT_TYPE)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

async fn editor_rows(bytes: Vec<u8>) -> Result<Vec<EditorRow>, ApiError> {
    let rows = tokio::task::spawn_blocking(move || spreadsheet::read_editor_rows(bytes))
        .await
        .map_err(|e| ApiError::internal(e, "Spreadsheet parsing task failed"))??;
    Ok(rows)
}

fn saved_name(source: &str) -> String {
    if source == NEW_FILE_NAME {
        NEW_FILE_SAVED_AS.to_string()
    } else {
        format!("edited_{source}")
    }
}
