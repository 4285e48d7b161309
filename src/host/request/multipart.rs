//! Multipart form data parsing.

use std::path::PathBuf;

use bytes::Bytes;
use futures_util::stream;
use multer::Multipart;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::core::{Error, Result};
use crate::types::{
    FileEntry, FileList, NestedBuilder, ParamList, ParamValue, UploadedFile, UPLOAD_ERR_NO_FILE,
    UPLOAD_ERR_OK, UPLOAD_ERR_SIZE,
};

/// Extract the boundary parameter from a multipart content type.
fn boundary(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let trimmed = part.trim();
        let is_boundary = trimmed
            .get(..9)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("boundary="));
        if is_boundary && trimmed.len() > 9 {
            Some(trimmed[9..].trim_matches('"').to_string())
        } else {
            None
        }
    })
}

/// Parse multipart form data.
///
/// Returns a tuple of (form fields, uploaded files). File contents are written
/// to `upload.dir`; files over `upload.max_size` are recorded with an error
/// code and not stored, file fields without a file name are recorded as
/// "no file". When parsing fails part way, every temp file written for this
/// body is removed before the error is returned.
pub async fn parse_multipart(
    content_type: &str,
    body: Bytes,
    upload: &UploadConfig,
) -> Result<(ParamList, FileList)> {
    tracing::debug!(
        content_type = content_type,
        body_len = body.len(),
        "parse_multipart: starting"
    );

    let boundary = boundary(content_type)
        .ok_or_else(|| Error::Multipart("missing boundary in content type".to_string()))?;

    let multipart = Multipart::new(
        stream::once(async { Ok::<_, std::io::Error>(body) }),
        boundary,
    );

    let mut written = Vec::new();
    match read_fields(multipart, upload, &mut written).await {
        Ok((params, files)) => {
            tracing::debug!(
                params_count = params.len(),
                files_count = files.len(),
                "parse_multipart: completed"
            );
            Ok((params, files))
        }
        Err(e) => {
            discard(written).await;
            Err(e)
        }
    }
}

/// Remove temp files of a body that failed to parse.
async fn discard(paths: Vec<PathBuf>) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(error = %e, path = %path.display(), "failed to remove upload temp file");
            }
        }
    }
}

/// Read every field; `written` collects each temp path before its file is
/// created.
async fn read_fields(
    mut multipart: Multipart<'_>,
    upload: &UploadConfig,
    written: &mut Vec<PathBuf>,
) -> Result<(ParamList, FileList)> {
    let mut params = NestedBuilder::new();
    let mut files = NestedBuilder::new();

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or("").to_string();
        let file_name = field.file_name().map(|s| s.to_string());
        let mime_type = field
            .content_type()
            .map(|m| m.to_string())
            .unwrap_or_default();

        let Some(original_name) = file_name else {
            let value = field.text().await?;
            tracing::debug!(
                field_name = %field_name,
                value_len = value.len(),
                "parse_multipart: parsed form field"
            );
            params.insert(&field_name, ParamValue::Scalar(value));
            continue;
        };

        let data = field.bytes().await?;
        let size = data.len() as u64;

        let uploaded = if original_name.is_empty() {
            UploadedFile {
                name: original_name,
                mime_type,
                tmp_name: String::new(),
                size: 0,
                error: UPLOAD_ERR_NO_FILE,
            }
        } else if size > upload.max_size {
            UploadedFile {
                name: original_name,
                mime_type,
                tmp_name: String::new(),
                size,
                error: UPLOAD_ERR_SIZE,
            }
        } else {
            let path = upload
                .dir
                .join(format!("upload-{}", Uuid::new_v4().simple()));
            written.push(path.clone());

            let mut file = File::create(&path).await?;
            file.write_all(&data).await?;
            file.flush().await?;

            UploadedFile {
                name: original_name,
                mime_type,
                tmp_name: path.to_string_lossy().into_owned(),
                size,
                error: UPLOAD_ERR_OK,
            }
        };

        tracing::debug!(
            field_name = %field_name,
            file_name = %uploaded.name,
            tmp_name = %uploaded.tmp_name,
            size = uploaded.size,
            error = uploaded.error,
            "parse_multipart: parsed uploaded file"
        );

        let stored = (!uploaded.tmp_name.is_empty()).then(|| PathBuf::from(&uploaded.tmp_name));
        if !files.insert(&field_name, FileEntry::Single(uploaded)) {
            // Over the input limits: nothing will ever reference this file.
            if let Some(path) = stored {
                written.retain(|p| *p != path);
                discard(vec![path]).await;
            }
        }
    }

    Ok((params.finish(), files.finish()))
}
