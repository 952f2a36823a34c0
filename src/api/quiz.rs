use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::metrics;
use crate::core::state::AppState;
use crate::schemas::quiz::{
    AnswerRequest, AnswerSaved, NavigateRequest, NavigateResponse, QuizStarted, ResultsResponse,
    StartQuizRequest,
};
use crate::services::question_files::validate_name;
use crate::services::quiz_session::{CompletionStatus, IndexError, QuestionView, QuizSession};
use crate::services::reference_index::ReferenceIndex;
use crate::services::scoring;
use crate::services::spreadsheet;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", delete(reset_quiz))
        .route("/start", post(start_quiz))
        .route("/questions/:index", get(get_question))
        .route("/answers/:index", put(submit_answer))
        .route("/navigate", post(navigate))
        .route("/completion", get(completion))
        .route("/results", get(results))
}

/// Loads a bank, embeds its reference answers and only then swaps it into the caller's
/// session. Any failure leaves the previous quiz in place.
async fn start_quiz(
    current: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<StartQuizRequest>,
) -> Result<Json<QuizStarted>, ApiError> {
    let filename = validate_name(&payload.filename)?.to_string();

    let quiz = match build_quiz(&state, &filename).await {
        Ok(quiz) => {
            metrics::record_bank_loaded("success");
            quiz
        }
        Err(err) => {
            metrics::record_bank_loaded("failure");
            tracing::warn!(
                session_id = %current.session_id,
                filename = %filename,
                error = ?err,
                "Failed to load question bank"
            );
            return Err(err);
        }
    };

    let total_questions = quiz.total_questions();
    state.sessions().install_quiz(&current.session_id, quiz).await?;

    tracing::info!(
        user_id = %current.user.id,
        session_id = %current.session_id,
        filename = %filename,
        total_questions,
        action = "start_quiz",
        "Quiz started"
    );

    Ok(Json(QuizStarted { filename, total_questions }))
}

async fn build_quiz(state: &AppState, filename: &str) -> Result<QuizSession, ApiError> {
    let path = state.question_files().resolve(filename)?;
    let bank = spreadsheet::load_question_bank(&path).await?;
    let index = ReferenceIndex::build(bank, state.embedder().as_ref()).await?;
    Ok(QuizSession::new(filename, index))
}

async fn get_question(
    current: CurrentUser,
    Path(index): Path<usize>,
    State(state): State<AppState>,
) -> Result<Json<QuestionView>, ApiError> {
    let view = state.sessions().with_quiz(&current.session_id, |quiz| quiz.question(index)).await??;
    Ok(Json(view))
}

async fn submit_answer(
    current: CurrentUser,
    Path(index): Path<usize>,
    State(state): State<AppState>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<AnswerSaved>, ApiError> {
    let saved = state
        .sessions()
        .with_quiz(&current.session_id, |quiz| {
            quiz.answer(index, &payload.answer)?;
            let answer = quiz.question(index)?.answer;
            Ok::<_, IndexError>(AnswerSaved {
                index,
                answer,
                answered_count: quiz.completion().answered_count,
            })
        })
        .await??;

    Ok(Json(saved))
}

async fn navigate(
    current: CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<NavigateRequest>,
) -> Result<Json<NavigateResponse>, ApiError> {
    let target = state
        .sessions()
        .with_quiz(&current.session_id, |quiz| {
            quiz.navigate(payload.current_index, payload.direction.into())
        })
        .await??;

    Ok(Json(target.into()))
}

async fn completion(
    current: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<CompletionStatus>, ApiError> {
    let status = state.sessions().with_quiz(&current.session_id, |quiz| quiz.completion()).await?;
    Ok(Json(status))
}

/// Scores a complete quiz. The snapshot is taken under the session lock and scored outside it.
async fn results(
    current: CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ResultsResponse>, ApiError> {
    let (status, snapshot, filename) = state
        .sessions()
        .with_quiz(&current.session_id, |quiz| {
            (quiz.completion(), quiz.snapshot(), quiz.source().to_string())
        })
        .await?;

    if !status.completed {
        return Ok(Json(ResultsResponse::Incomplete(status)));
    }

    let threshold = state.settings().quiz().scoring_threshold;
    let report = scoring::score(&snapshot, state.embedder().as_ref(), threshold).await?;

    tracing::info!(
        user_id = %current.user.id,
        session_id = %current.session_id,
        filename = %filename,
        total_correct = report.total_correct,
        total_questions = report.total_questions,
        action = "score_quiz",
        "Quiz scored"
    );

    Ok(Json(ResultsResponse::Complete(report)))
}

async fn reset_quiz(
    current: CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    if state.sessions().clear_quiz(&current.session_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("No active quiz".to_string()))
    }
}
