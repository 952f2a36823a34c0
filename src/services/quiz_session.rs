use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::services::reference_index::ReferenceIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("question index {index} is out of range for {total} questions")]
pub(crate) struct IndexError {
    pub(crate) index: usize,
    pub(crate) total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Next,
    Prev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NavigationTarget {
    Question(usize),
    Completion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct QuestionView {
    pub(crate) index: usize,
    pub(crate) total_questions: usize,
    pub(crate) question: String,
    pub(crate) answer: String,
    pub(crate) is_last: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct CompletionStatus {
    pub(crate) completed: bool,
    /// 1-based question numbers.
    pub(crate) unanswered: Vec<usize>,
    pub(crate) total_questions: usize,
    pub(crate) answered_count: usize,
}

/// Everything scoring needs, detached from the live session.
#[derive(Debug, Clone)]
pub(crate) struct QuizSnapshot {
    pub(crate) index: Arc<ReferenceIndex>,
    pub(crate) answers: Vec<Option<String>>,
}

/// One user's quiz: the loaded index plus an answer slot per question.
#[derive(Debug, Clone)]
pub(crate) struct QuizSession {
    source: String,
    index: Arc<ReferenceIndex>,
    answers: Vec<Option<String>>,
}

impl QuizSession {
    pub(crate) fn new(source: impl Into<String>, index: ReferenceIndex) -> Self {
        let answers = vec![None; index.len()];
        Self { source: source.into(), index: Arc::new(index), answers }
    }

    pub(crate) fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn total_questions(&self) -> usize {
        self.index.len()
    }

    fn check(&self, index: usize) -> Result<(), IndexError> {
        if index < self.total_questions() {
            Ok(())
        } else {
            Err(IndexError { index, total: self.total_questions() })
        }
    }

    pub(crate) fn question(&self, index: usize) -> Result<QuestionView, IndexError> {
        self.check(index)?;
        let total_questions = self.total_questions();
        let question =
            self.index.get(index).map(|entry| entry.question.clone()).unwrap_or_default();

        Ok(QuestionView {
            index,
            total_questions,
            question,
            answer: self.answers[index].clone().unwrap_or_default(),
            is_last: index + 1 == total_questions,
        })
    }

    /// Stores the trimmed answer, replacing any previous one.
    pub(crate) fn answer(&mut self, index: usize, text: &str) -> Result<(), IndexError> {
        self.check(index)?;
        self.answers[index] = Some(text.trim().to_string());
        Ok(())
    }

    pub(crate) fn navigate(
        &self,
        current: usize,
        direction: Direction,
    ) -> Result<NavigationTarget, IndexError> {
        self.check(current)?;
        let target = match direction {
            Direction::Next => current + 1,
            Direction::Prev => current.saturating_sub(1),
        };

        if target >= self.total_questions() {
            Ok(NavigationTarget::Completion)
        } else {
            Ok(NavigationTarget::Question(target))
        }
    }

    pub(crate) fn completion(&self) -> CompletionStatus {
        let unanswered: Vec<usize> = self
            .answers
            .iter()
            .enumerate()
            .filter(|(_, answer)| answer.as_deref().map_or(true, |text| text.trim().is_empty()))
            .map(|(position, _)| position + 1)
            .collect();
        let total_questions = self.total_questions();

        CompletionStatus {
            completed: unanswered.is_empty(),
            answered_count: total_questions - unanswered.len(),
            unanswered,
            total_questions,
        }
    }

    pub(crate) fn snapshot(&self) -> QuizSnapshot {
        QuizSnapshot { index: Arc::clone(&self.index), answers: self.answers.clone() }
    }
}
