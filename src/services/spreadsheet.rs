//! Question bank spreadsheets: two columns, no header row. Column A holds the question,
//! column B one or more reference answers written as `"first","second"`.

use std::io::Cursor;
use std::path::Path;
use std::sync::OnceLock;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

const SHEET_TITLE: &str = "Questions";

#[derive(Debug, Error)]
pub(crate) enum LoadError {
    #[error("failed to read question bank: {0}")]
    Io(#[from] std::io::Error),
    #[error("unreadable spreadsheet: {0}")]
    Workbook(String),
    #[error("spreadsheet has no worksheets")]
    NoWorksheet,
    #[error("expected two columns (question, answers), found {found}")]
    ColumnCount { found: usize },
    #[error("row {row}: question text is empty")]
    EmptyQuestion { row: usize },
    #[error("row {row}: no quoted reference answers found")]
    EmptyAnswers { row: usize },
}

#[derive(Debug, Error)]
#[error("failed to write spreadsheet: {0}")]
pub(crate) struct WriteError(String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Question {
    pub(crate) text: String,
    pub(crate) reference_answers: Vec<String>,
}

/// Ordered questions; the position of a question is its identifier for the whole quiz.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    pub(crate) fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    pub(crate) fn len(&self) -> usize {
        self.questions.len()
    }

    pub(crate) fn into_questions(self) -> Vec<Question> {
        self.questions
    }
}

/// A row as shown in the bank editor. `index` is the 0-based sheet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct EditorRow {
    pub(crate) index: usize,
    pub(crate) question: String,
    pub(crate) answers: Vec<String>,
}

fn quoted_answer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#""([^"]*)""#).expect("quoted answer pattern is valid"))
}

/// Every `"..."` substring in order; text outside quotes is ignored. There is no escape for an
/// embedded quote: the next `"` always closes the current answer.
pub(crate) fn parse_quoted_answers(cell: &str) -> Vec<String> {
    quoted_answer_pattern()
        .captures_iter(cell)
        .filter_map(|captures| captures.get(1).map(|value| value.as_str().to_string()))
        .collect()
}

/// Lenient variant used by the editor: unquoted text becomes a single answer and an empty cell
/// becomes one blank answer slot.
pub(crate) fn parse_editor_answers(cell: &str) -> Vec<String> {
    if cell.trim().is_empty() {
        return vec![String::new()];
    }

    let quoted = parse_quoted_answers(cell);
    if !quoted.is_empty() {
        return quoted;
    }

    vec![cell.trim().trim_matches('"').to_string()]
}

/// Splits a raw `"a","b"` form field on `","`, stripping stray quotes and dropping blanks.
pub(crate) fn split_raw_answers(raw: &str) -> Vec<String> {
    raw.split("\",\"")
        .map(|part| part.trim().trim_matches('"').trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

/// `["a", "b"]` -> `"a","b"`. Blank answers are dropped; an empty list gives an empty cell.
pub(crate) fn format_answers(answers: &[String]) -> String {
    answers
        .iter()
        .map(|answer| answer.trim().trim_matches('"'))
        .filter(|answer| !answer.is_empty())
        .map(|answer| format!("\"{answer}\""))
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(value) => value.clone(),
        Data::Int(value) => value.to_string(),
        Data::Float(value) => {
            if value.fract() == 0.0 {
                format!("{value:.0}")
            } else {
                value.to_string()
            }
        }
        Data::Bool(value) => value.to_string(),
        Data::DateTime(value) => value.to_string(),
        Data::DateTimeIso(value) => value.clone(),
        Data::DurationIso(value) => value.clone(),
        Data::Error(err) => format!("#ERR:{err:?}"),
    }
}

pub(crate) fn first_sheet(bytes: Vec<u8>) -> Result<Range<Data>, LoadError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|err| LoadError::Workbook(err.to_string()))?;
    let sheet_name = workbook.sheet_names().first().cloned().ok_or(LoadError::NoWorksheet)?;
    workbook.worksheet_range(&sheet_name).map_err(|err| LoadError::Workbook(err.to_string()))
}

/// Absolute `(row, question, answers)` triples for columns A and B; fully blank rows are skipped.
fn two_column_rows(range: &Range<Data>) -> Result<Vec<(usize, String, String)>, LoadError> {
    let (Some((first_row, first_col)), Some((last_row, last_col))) = (range.start(), range.end())
    else {
        return Ok(Vec::new());
    };

    if last_col < 1 {
        return Err(LoadError::ColumnCount { found: (last_col - first_col + 1) as usize });
    }

    let mut rows = Vec::new();
    for row in first_row..=last_row {
        let question = range.get_value((row, 0)).map(cell_to_string).unwrap_or_default();
        let answers = range.get_value((row, 1)).map(cell_to_string).unwrap_or_default();
        if question.trim().is_empty() && answers.trim().is_empty() {
            continue;
        }
        rows.push((row as usize, question, answers));
    }

    Ok(rows)
}

/// Parses a whole bank or fails; no partial bank is ever returned.
pub(crate) fn parse_question_bank(bytes: Vec<u8>) -> Result<QuestionBank, LoadError> {
    let range = first_sheet(bytes)?;
    let mut questions = Vec::new();

    for (row, text, answers_cell) in two_column_rows(&range)? {
        let display_row = row + 1;
        if text.trim().is_empty() {
            return Err(LoadError::EmptyQuestion { row: display_row });
        }

        let reference_answers = parse_quoted_answers(&answers_cell);
        if reference_answers.iter().all(|answer| answer.trim().is_empty()) {
            return Err(LoadError::EmptyAnswers { row: display_row });
        }

        questions.push(Question { text, reference_answers });
    }

    Ok(QuestionBank::new(questions))
}

pub(crate) async fn load_question_bank(path: &Path) -> Result<QuestionBank, LoadError> {
    let bytes = tokio::fs::read(path).await?;
    parse_question_bank(bytes)
}

/// Rows for the editor. Rows with a blank question are skipped, not rejected.
pub(crate) fn read_editor_rows(bytes: Vec<u8>) -> Result<Vec<EditorRow>, LoadError> {
    let range = first_sheet(bytes)?;
    let rows = match two_column_rows(&range) {
        Ok(rows) => rows,
        // A sheet with only questions still opens in the editor.
        Err(LoadError::ColumnCount { .. }) => single_column_rows(&range),
        Err(err) => return Err(err),
    };

    Ok(rows
        .into_iter()
        .filter(|(_, question, _)| !question.trim().is_empty())
        .map(|(index, question, answers)| EditorRow {
            index,
            question,
            answers: parse_editor_answers(&answers),
        })
        .collect())
}

fn single_column_rows(range: &Range<Data>) -> Vec<(usize, String, String)> {
    let (Some((first_row, _)), Some((last_row, _))) = (range.start(), range.end()) else {
        return Vec::new();
    };

    (first_row..=last_row)
        .map(|row| {
            let question = range.get_value((row, 0)).map(cell_to_string).unwrap_or_default();
            (row as usize, question, String::new())
        })
        .collect()
}

/// Serialises `(question, formatted answers)` rows into an xlsx workbook without a header row.
pub(crate) fn write_question_bank(rows: &[(String, String)]) -> Result<Vec<u8>, WriteError> {
    let mut book = umya_spreadsheet::new_file();
    let sheet =
        book.get_sheet_mut(&0).ok_or_else(|| WriteError("default worksheet missing".into()))?;
    sheet.set_name(SHEET_TITLE);

    for (offset, (question, answers)) in rows.iter().enumerate() {
        let row = offset as u32 + 1;
        sheet.get_cell_mut((1, row)).set_value(question.as_str());
        sheet.get_cell_mut((2, row)).set_value(answers.as_str());
    }

    let mut buffer = Cursor::new(Vec::new());
    umya_spreadsheet::writer::xlsx::write_writer(&book, &mut buffer)
        .map_err(|err| WriteError(err.to_string()))?;
    Ok(buffer.into_inner())
}
