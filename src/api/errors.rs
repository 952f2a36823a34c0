use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::embedding::EmbeddingError;
use crate::services::question_files::QuestionFileError;
use crate::services::quiz_session::IndexError;
use crate::services::session_store::SessionError;
use crate::services::spreadsheet::LoadError;

#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: u16,
    detail: String,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Unauthorized(&'static str),
    Forbidden(&'static str),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    PayloadTooLarge(String),
    ServiceUnavailable(String),
    Internal(String),
}

impl ApiError {
    /// Log the underlying error with context and return an `Internal` variant.
    pub(crate) fn internal(err: impl std::fmt::Display, context: &str) -> Self {
        tracing::error!(error = %err, "{context}");
        Self::Internal(context.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            Self::Unauthorized(message) | Self::Forbidden(message) => message.to_string(),
            Self::ServiceUnavailable(message) => {
                tracing::error!(error = %message, "Service unavailable");
                message
            }
            Self::Internal(message) => {
                tracing::error!(error = %message, "Internal server error");
                message
            }
            Self::BadRequest(message)
            | Self::NotFound(message)
            | Self::Conflict(message)
            | Self::PayloadTooLarge(message) => message,
        };

        let mut response =
            (status, Json(ErrorResponse { status: status.as_u16(), detail })).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<LoadError> for ApiError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::Io(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Self::NotFound("Question bank not found".to_string())
            }
            LoadError::Io(err) => Self::internal(err, "Failed to read question bank"),
            other => Self::BadRequest(format!("Invalid question bank: {other}")),
        }
    }
}

impl From<EmbeddingError> for ApiError {
    fn from(err: EmbeddingError) -> Self {
        Self::ServiceUnavailable(format!("Embedding provider failed: {err}"))
    }
}

impl From<IndexError> for ApiError {
    fn from(err: IndexError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::UnknownSession => Self::Unauthorized("Session expired"),
            SessionError::NoActiveQuiz => Self::NotFound("No active quiz".to_string()),
        }
    }
}

impl From<QuestionFileError> for ApiError {
    fn from(err: QuestionFileError) -> Self {
        match err {
            QuestionFileError::InvalidName | QuestionFileError::UnsupportedExtension => {
                Self::BadRequest(err.to_string())
            }
            QuestionFileError::NotFound => Self::NotFound("File not found".to_string()),
            QuestionFileError::Io(err) => Self::internal(err, "Question file storage failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_carries_bearer_challenge() {
        let response = ApiError::Unauthorized("nope").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
    }

    #[test]
    fn domain_errors_map_to_statuses() {
        assert_eq!(
            ApiError::from(LoadError::EmptyAnswers { row: 3 }).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(EmbeddingError::Request("down".into())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(IndexError { index: 4, total: 2 }).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::from(SessionError::NoActiveQuiz).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(QuestionFileError::UnsupportedExtension).status(),
            StatusCode::BAD_REQUEST
        );
    }
}
