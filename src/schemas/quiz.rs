use serde::{Deserialize, Serialize};

use crate::services::quiz_session::{CompletionStatus, Direction, NavigationTarget};
use crate::services::scoring::ScoreReport;

#[derive(Debug, Deserialize)]
pub(crate) struct StartQuizRequest {
    pub(crate) filename: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuizStarted {
    pub(crate) filename: String,
    pub(crate) total_questions: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnswerRequest {
    pub(crate) answer: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerSaved {
    pub(crate) index: usize,
    pub(crate) answer: String,
    pub(crate) answered_count: usize,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum DirectionParam {
    Next,
    #[serde(alias = "previous")]
    Prev,
}

impl From<DirectionParam> for Direction {
    fn from(value: DirectionParam) -> Self {
        match value {
            DirectionParam::Next => Direction::Next,
            DirectionParam::Prev => Direction::Prev,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct NavigateRequest {
    #[serde(alias = "currentIndex")]
    pub(crate) current_index: usize,
    pub(crate) direction: DirectionParam,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "target", rename_all = "lowercase")]
pub(crate) enum NavigateResponse {
    Question { index: usize },
    Completion,
}

impl From<NavigationTarget> for NavigateResponse {
    fn from(value: NavigationTarget) -> Self {
        match value {
            NavigationTarget::Question(index) => Self::Question { index },
            NavigationTarget::Completion => Self::Completion,
        }
    }
}

/// Results are only produced for a complete quiz; otherwise the caller learns what is missing.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub(crate) enum ResultsResponse {
    Complete(ScoreReport),
    Incomplete(CompletionStatus),
}
