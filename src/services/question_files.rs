use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::core::config::Settings;

pub(crate) const BANK_EXTENSION: &str = "xlsx";

#[derive(Debug, Error)]
pub(crate) enum QuestionFileError {
    #[error("invalid file name")]
    InvalidName,
    #[error("only .xlsx question banks are supported")]
    UnsupportedExtension,
    #[error("file not found")]
    NotFound,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct StoredFile {
    pub(crate) name: String,
    pub(crate) size: u64,
}

/// Flat directory of uploaded and edited question banks.
#[derive(Debug, Clone)]
pub(crate) struct QuestionFileStore {
    root: PathBuf,
}

impl QuestionFileStore {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.quiz().question_bank_dir)
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) async fn ensure_root(&self) -> Result<(), QuestionFileError> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }

    /// Bare file name inside the store. Separators, parent references and non-xlsx names
    /// are rejected.
    pub(crate) fn resolve(&self, name: &str) -> Result<PathBuf, QuestionFileError> {
        Ok(self.root.join(validate_name(name)?))
    }

    pub(crate) async fn list(&self) -> Result<Vec<StoredFile>, QuestionFileError> {
        let mut files = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(err) => return Err(err.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if validate_name(&name).is_ok() {
                files.push(StoredFile { name, size: metadata.len() });
            }
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Writes the file, replacing any existing file with the same name.
    pub(crate) async fn save(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, QuestionFileError> {
        let path = self.resolve(name)?;
        self.ensure_root().await?;
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    pub(crate) async fn read(&self, name: &str) -> Result<Vec<u8>, QuestionFileError> {
        let path = self.resolve(name)?;
        tokio::fs::read(&path).await.map_err(not_found_or_io)
    }

    pub(crate) async fn delete(&self, name: &str) -> Result<(), QuestionFileError> {
        let path = self.resolve(name)?;
        tokio::fs::remove_file(&path).await.map_err(not_found_or_io)
    }
}

fn not_found_or_io(err: std::io::Error) -> QuestionFileError {
    if err.kind() == std::io::ErrorKind::NotFound {
        QuestionFileError::NotFound
    } else {
        QuestionFileError::Io(err)
    }
}

pub(crate) fn validate_name(raw: &str) -> Result<&str, QuestionFileError> {
    let name = raw.trim();
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(QuestionFileError::InvalidName);
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => {}
        _ => return Err(QuestionFileError::InvalidName),
    }

    let has_bank_extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(BANK_EXTENSION));
    if !has_bank_extension {
        return Err(QuestionFileError::UnsupportedExtension);
    }

    Ok(name)
}
