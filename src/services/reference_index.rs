use crate::services::embedding::{ensure_count, EmbeddingError, EmbeddingProvider};
use crate::services::spreadsheet::QuestionBank;

#[derive(Debug, Clone)]
pub(crate) struct ReferenceEntry {
    pub(crate) question: String,
    pub(crate) answers: Vec<String>,
    /// One vector per entry of `answers`, same order.
    pub(crate) embeddings: Vec<Vec<f32>>,
}

/// Question bank with pre-computed reference embeddings. Immutable once built; the quiz
/// session shares it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReferenceIndex {
    entries: Vec<ReferenceEntry>,
}

impl ReferenceIndex {
    pub(crate) async fn build(
        bank: QuestionBank,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Self, EmbeddingError> {
        let mut entries = Vec::with_capacity(bank.len());

        for question in bank.into_questions() {
            let embeddings = embedder.encode(&question.reference_answers).await?;
            ensure_count(question.reference_answers.len(), embeddings.len())?;
            entries.push(ReferenceEntry {
                question: question.text,
                answers: question.reference_answers,
                embeddings,
            });
        }

        Ok(Self { entries })
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&ReferenceEntry> {
        self.entries.get(index)
    }

    pub(crate) fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::spreadsheet::Question;
    use crate::test_support::{FailingEmbedder, HashingEmbedder};

    fn bank() -> QuestionBank {
        QuestionBank::new(vec![
            Question { text: "2+2?".into(), reference_answers: vec!["four".into(), "4".into()] },
            Question { text: "Sky?".into(), reference_answers: vec!["blue".into()] },
        ])
    }

    #[tokio::test]
    async fn every_reference_answer_gets_a_vector() {
        let index = ReferenceIndex::build(bank(), &HashingEmbedder::default()).await.unwrap();

        assert_eq!(index.len(), 2);
        let first = index.get(0).unwrap();
        assert_eq!(first.question, "2+2?");
        assert_eq!(first.embeddings.len(), first.answers.len());
        assert_eq!(index.get(1).unwrap().embeddings.len(), 1);
    }

    #[tokio::test]
    async fn empty_bank_builds_empty_index() {
        let index =
            ReferenceIndex::build(QuestionBank::default(), &FailingEmbedder).await.unwrap();
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn provider_failure_aborts_the_build() {
        assert!(ReferenceIndex::build(bank(), &FailingEmbedder).await.is_err());
    }
}
