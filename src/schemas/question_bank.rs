use serde::{Deserialize, Serialize};

use crate::services::question_files::StoredFile;
use crate::services::spreadsheet::{split_raw_answers, EditorRow};

#[derive(Debug, Serialize)]
pub(crate) struct FileListResponse {
    pub(crate) files: Vec<StoredFile>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UploadResponse {
    pub(crate) filename: String,
    pub(crate) size: usize,
    pub(crate) total_questions: usize,
}

#[derive(Debug, Serialize)]
pub(crate) struct EditorDocument {
    pub(crate) filename: String,
    pub(crate) questions: Vec<EditorRow>,
}

/// Answers arrive either as a list or as the raw `"a","b"` cell text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum EditorAnswers {
    List(Vec<String>),
    Raw(String),
}

impl EditorAnswers {
    pub(crate) fn into_list(self) -> Vec<String> {
        match self {
            Self::List(answers) => answers,
            Self::Raw(raw) => split_raw_answers(&raw),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct EditorQuestion {
    pub(crate) question: String,
    pub(crate) answers: EditorAnswers,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EditorSaveRequest {
    pub(crate) filename: String,
    pub(crate) questions: Vec<EditorQuestion>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SavedRow {
    pub(crate) question: String,
    pub(crate) answers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EditorSaveResponse {
    pub(crate) filename: String,
    pub(crate) rows: Vec<SavedRow>,
    pub(crate) download_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_accept_list_or_raw_cell() {
        let request: EditorSaveRequest = serde_json::from_value(serde_json::json!({
            "filename": "bank.xlsx",
            "questions": [
                {"question": "Q1", "answers": ["a", "b"]},
                {"question": "Q2", "answers": "\"x\",\"y\""}
            ]
        }))
        .unwrap();

        let mut questions = request.questions.into_iter();
        assert_eq!(questions.next().unwrap().answers.into_list(), vec!["a", "b"]);
        assert_eq!(questions.next().unwrap().answers.into_list(), vec!["x", "y"]);
    }
}
