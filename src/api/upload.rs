use axum::extract::Multipart;

use crate::api::errors::ApiError;
use crate::core::state::AppState;

/// The `file` part of a multipart form.
#[derive(Debug)]
pub(crate) struct UploadedFile {
    pub(crate) filename: String,
    pub(crate) bytes: Vec<u8>,
}

/// Reads the `file` field chunk by chunk, refusing anything larger than the configured limit.
/// Other fields are ignored.
pub(crate) async fn read_file_field(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<UploadedFile, ApiError> {
    let limit_mb = state.settings().quiz().max_upload_size_mb;
    let max_bytes = state.settings().quiz().max_upload_bytes();
    let mut uploaded: Option<UploadedFile> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Invalid multipart data".to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("File name is required".to_string()))?;

        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|_| ApiError::BadRequest("Failed to read file".to_string()))?
        {
            if bytes.len() + chunk.len() > max_bytes {
                return Err(ApiError::PayloadTooLarge(format!(
                    "File size exceeds {limit_mb}MB limit"
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        uploaded = Some(UploadedFile { filename, bytes });
    }

    let file = uploaded.ok_or_else(|| ApiError::BadRequest("File is required".to_string()))?;
    if file.bytes.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }
    Ok(file)
}
