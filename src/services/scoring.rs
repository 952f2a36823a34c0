use std::time::Instant;

use serde::Serialize;

use crate::core::metrics;
use crate::services::embedding::{ensure_count, EmbeddingError, EmbeddingProvider};
use crate::services::quiz_session::QuizSnapshot;
use crate::services::reference_index::ReferenceEntry;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ScoringResult {
    pub(crate) question: String,
    pub(crate) user_answer: String,
    pub(crate) is_correct: bool,
    /// Best cosine similarity, rounded to two decimals.
    pub(crate) score: f32,
    pub(crate) best_reference_answer: String,
    pub(crate) reference_answers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct ScoreReport {
    pub(crate) results: Vec<ScoringResult>,
    pub(crate) total_correct: usize,
    pub(crate) total_questions: usize,
    pub(crate) percentage: f32,
    pub(crate) threshold: f32,
}

/// Cosine of the angle between `a` and `b`; zero when either vector has no length.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Index and similarity of the closest reference. Ties keep the earliest reference.
pub(crate) fn best_match(answer: &[f32], references: &[Vec<f32>]) -> Option<(usize, f32)> {
    references
        .iter()
        .map(|reference| cosine_similarity(answer, reference))
        .enumerate()
        .fold(None, |best, (position, similarity)| match best {
            Some((_, current)) if current >= similarity => best,
            _ => Some((position, similarity)),
        })
}

fn round_to(value: f32, places: i32) -> f32 {
    let factor = 10f32.powi(places);
    (value * factor).round() / factor
}

fn judge(entry: &ReferenceEntry, user_answer: String, vector: &[f32], threshold: f32) -> ScoringResult {
    let (best_index, similarity) = best_match(vector, &entry.embeddings).unwrap_or((0, 0.0));

    ScoringResult {
        question: entry.question.clone(),
        user_answer,
        // Classification uses the unrounded similarity.
        is_correct: similarity >= threshold,
        score: round_to(similarity, 2),
        best_reference_answer: entry.answers.get(best_index).cloned().unwrap_or_default(),
        reference_answers: entry.answers.clone(),
    }
}

/// Pure assembly of the report from already-embedded answers, one vector per entry.
pub(crate) fn assemble(
    entries: &[ReferenceEntry],
    answers: Vec<String>,
    vectors: &[Vec<f32>],
    threshold: f32,
) -> ScoreReport {
    let results: Vec<ScoringResult> = entries
        .iter()
        .zip(answers)
        .zip(vectors)
        .map(|((entry, answer), vector)| judge(entry, answer, vector, threshold))
        .collect();

    let total_questions = results.len();
    let total_correct = results.iter().filter(|result| result.is_correct).count();
    let percentage = if total_questions == 0 {
        0.0
    } else {
        round_to(total_correct as f32 / total_questions as f32 * 100.0, 1)
    };

    ScoreReport { results, total_correct, total_questions, percentage, threshold }
}

/// Embeds every answer in one batch and scores it against its question's references.
/// Callers are expected to have checked completion first.
pub(crate) async fn score(
    snapshot: &QuizSnapshot,
    embedder: &dyn EmbeddingProvider,
    threshold: f32,
) -> Result<ScoreReport, EmbeddingError> {
    let started = Instant::now();
    let entries = snapshot.index.entries();
    let answers: Vec<String> = (0..entries.len())
        .map(|position| snapshot.answers.get(position).cloned().flatten().unwrap_or_default())
        .collect();

    let vectors = embedder.encode(&answers).await?;
    ensure_count(answers.len(), vectors.len())?;

    let report = assemble(entries, answers, &vectors, threshold);
    metrics::record_scoring(
        report.total_correct,
        report.total_questions - report.total_correct,
        started.elapsed(),
    );
    Ok(report)
}
