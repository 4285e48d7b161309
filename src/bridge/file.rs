//! Uploaded file as seen by application code.

use std::path::{Path, PathBuf};

use crate::core::Result;
use crate::types::{FileEntry, FileList, UploadedFile};

/// One uploaded file, flattened out of its form field.
///
/// Array-style inputs get dotted keys: `docs[]` yields `docs.0`, `docs.1`,
/// and `docs[a][]` yields `docs.a.0`. Plain inputs keep their field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    key: String,
    upload: UploadedFile,
}

impl File {
    pub fn new(key: impl Into<String>, upload: UploadedFile) -> Self {
        Self {
            key: key.into(),
            upload,
        }
    }

    /// Dotted form key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Original client-side file name.
    pub fn name(&self) -> &str {
        &self.upload.name
    }

    /// Temporary path on the server; empty when nothing was stored.
    pub fn tmp_name(&self) -> &str {
        &self.upload.tmp_name
    }

    pub fn size(&self) -> u64 {
        self.upload.size
    }

    /// MIME type as sent by the client.
    pub fn mime_type(&self) -> &str {
        &self.upload.mime_type
    }

    /// Upload error code, 0 on success.
    pub fn error(&self) -> u8 {
        self.upload.error
    }

    /// Extension of the client file name, without the dot.
    pub fn extension(&self) -> &str {
        Path::new(&self.upload.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
    }

    /// MIME type guessed from the file name.
    pub fn guessed_type(&self) -> String {
        mime_guess::from_path(&self.upload.name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }

    /// Whether the upload succeeded and its temporary file is still in place.
    pub fn is_uploaded_file(&self) -> bool {
        self.upload.is_successful()
            && !self.upload.tmp_name.is_empty()
            && Path::new(&self.upload.tmp_name).is_file()
    }

    /// Move the temporary file to `dest`.
    ///
    /// Falls back to copy-and-delete when a rename is not possible, e.g.
    /// across filesystems.
    pub async fn move_to(&self, dest: impl AsRef<Path>) -> Result<PathBuf> {
        let dest = dest.as_ref();
        let src = Path::new(&self.upload.tmp_name);

        if let Err(e) = tokio::fs::rename(src, dest).await {
            tracing::debug!(error = %e, key = %self.key, "rename failed, copying upload");
            tokio::fs::copy(src, dest).await?;
            if let Err(e) = tokio::fs::remove_file(src).await {
                tracing::warn!(error = %e, path = %src.display(), "failed to remove upload after copy");
            }
        }

        Ok(dest.to_path_buf())
    }

    /// Underlying upload record.
    pub fn upload(&self) -> &UploadedFile {
        &self.upload
    }
}

/// Flatten uploaded files into dotted-key entries, in form order.
pub fn flatten(files: &FileList, only_successful: bool) -> Vec<File> {
    fn walk(entries: &FileList, prefix: Option<&str>, only_successful: bool, out: &mut Vec<File>) {
        for (name, entry) in entries {
            let key = match prefix {
                Some(prefix) => format!("{}.{}", prefix, name),
                None => name.clone(),
            };
            match entry {
                FileEntry::Single(upload) => {
                    if !only_successful || upload.is_successful() {
                        out.push(File::new(key, upload.clone()));
                    }
                }
                FileEntry::Group(members) => walk(members, Some(&key), only_successful, out),
            }
        }
    }

    let mut out = Vec::new();
    walk(files, None, only_successful, &mut out);
    out
}

/// Count uploaded files the same way [`flatten`] enumerates them.
pub fn count(files: &FileList, only_successful: bool) -> usize {
    files
        .iter()
        .map(|(_, entry)| match entry {
            FileEntry::Single(upload) => usize::from(!only_successful || upload.is_successful()),
            FileEntry::Group(members) => count(members, only_successful),
        })
        .sum()
}
