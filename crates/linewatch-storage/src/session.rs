//! Session directory layout.
//!
//! ```text
//! <root>/<session_id>/
//!     <source images>
//!     results.json
//!     masks/<stem>_mask.png
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use linewatch_models::{ResultsDocument, SessionFile};
use tracing::debug;

use crate::error::{StorageError, StorageResult};

/// Extensions accepted as source images (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff", "raw"];

const RESULTS_FILE: &str = "results.json";
const MASKS_DIR: &str = "masks";

/// Whether a path has a supported image extension.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Mask file name for a source image: `<stem>_mask.png`.
pub fn mask_file_name(image_filename: &str) -> String {
    let stem = Path::new(image_filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(image_filename);
    format!("{}_mask.png", stem)
}

/// Passive filesystem store for session artifacts.
#[derive(Debug, Clone)]
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create from the `SESSIONS_DIR` environment variable.
    pub fn from_env() -> Self {
        Self::new(std::env::var("SESSIONS_DIR").unwrap_or_else(|_| "./sessions".to_string()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for a session, after validating the id.
    pub fn session_dir(&self, session_id: &str) -> StorageResult<PathBuf> {
        validate_component(session_id).map_err(|_| StorageError::InvalidSessionId(session_id.to_string()))?;
        Ok(self.root.join(session_id))
    }

    pub async fn session_exists(&self, session_id: &str) -> StorageResult<bool> {
        let dir = self.session_dir(session_id)?;
        Ok(is_dir(&dir).await)
    }

    /// Path of a source image inside the session.
    pub fn image_path(&self, session_id: &str, filename: &str) -> StorageResult<PathBuf> {
        validate_component(filename)?;
        Ok(self.session_dir(session_id)?.join(filename))
    }

    /// Supported source images in the session. Order is unspecified.
    pub async fn list_images(&self, session_id: &str) -> StorageResult<Vec<PathBuf>> {
        let dir = self.existing_session_dir(session_id).await?;
        let mut entries = tokio::fs::read_dir(&dir).await?;
        let mut images = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && is_supported_image(&path) {
                images.push(path);
            }
        }

        debug!(session_id, count = images.len(), "Enumerated session images");
        Ok(images)
    }

    /// Source images with their sizes, sorted by name.
    pub async fn list_files(&self, session_id: &str) -> StorageResult<Vec<SessionFile>> {
        let mut files = Vec::new();
        for path in self.list_images(session_id).await? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let size = tokio::fs::metadata(&path).await?.len();
            files.push(SessionFile {
                name: name.to_string(),
                size,
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    pub fn results_path(&self, session_id: &str) -> StorageResult<PathBuf> {
        Ok(self.session_dir(session_id)?.join(RESULTS_FILE))
    }

    pub async fn results_exists(&self, session_id: &str) -> StorageResult<bool> {
        let path = self.results_path(session_id)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    /// Read the persisted results document.
    pub async fn read_results(&self, session_id: &str) -> StorageResult<ResultsDocument> {
        let path = self.results_path(session_id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::not_found(format!("results for session {}", session_id)));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Overwrite the results document.
    ///
    /// The document is written to a temporary file in the session directory
    /// and renamed into place, so readers see either the old or the new
    /// document and never a partial one.
    pub async fn write_results(&self, session_id: &str, results: &ResultsDocument) -> StorageResult<()> {
        let dir = self.existing_session_dir(session_id).await?;
        let target = dir.join(RESULTS_FILE);
        let payload = serde_json::to_vec_pretty(results)?;

        tokio::task::spawn_blocking(move || -> StorageResult<()> {
            let mut tmp = tempfile::Builder::new()
                .prefix(".results-")
                .suffix(".json.tmp")
                .tempfile_in(&dir)?;
            tmp.write_all(&payload)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&target)
                .map_err(|e| StorageError::write_failed(format!("{}: {}", target.display(), e.error)))?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::write_failed(format!("results writer task: {}", e)))??;

        debug!(session_id, "Persisted results document");
        Ok(())
    }

    pub fn masks_dir(&self, session_id: &str) -> StorageResult<PathBuf> {
        Ok(self.session_dir(session_id)?.join(MASKS_DIR))
    }

    pub async fn masks_dir_exists(&self, session_id: &str) -> StorageResult<bool> {
        Ok(is_dir(&self.masks_dir(session_id)?).await)
    }

    pub async fn ensure_masks_dir(&self, session_id: &str) -> StorageResult<PathBuf> {
        self.existing_session_dir(session_id).await?;
        let dir = self.masks_dir(session_id)?;
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Mask artifact path for a source image.
    pub fn mask_path(&self, session_id: &str, image_filename: &str) -> StorageResult<PathBuf> {
        validate_component(image_filename)?;
        Ok(self.masks_dir(session_id)?.join(mask_file_name(image_filename)))
    }

    /// Mask file names, sorted. Empty when the masks directory is absent.
    pub async fn list_masks(&self, session_id: &str) -> StorageResult<Vec<String>> {
        let dir = self.masks_dir(session_id)?;
        if !is_dir(&dir).await {
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&dir).await?;
        let mut masks = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with("_mask.png") {
                    masks.push(name.to_string());
                }
            }
        }
        masks.sort();
        Ok(masks)
    }

    /// Bytes of a source image.
    pub async fn read_image(&self, session_id: &str, filename: &str) -> StorageResult<Vec<u8>> {
        let path = self.image_path(session_id, filename)?;
        if !is_supported_image(&path) {
            return Err(StorageError::InvalidFileName(filename.to_string()));
        }
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(format!("file {} in session {}", filename, session_id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Bytes of a written mask artifact.
    pub async fn read_mask(&self, session_id: &str, mask_name: &str) -> StorageResult<Vec<u8>> {
        validate_component(mask_name)?;
        if !mask_name.ends_with("_mask.png") {
            return Err(StorageError::InvalidFileName(mask_name.to_string()));
        }
        let path = self.masks_dir(session_id)?.join(mask_name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::not_found(format!("mask {} in session {}", mask_name, session_id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn existing_session_dir(&self, session_id: &str) -> StorageResult<PathBuf> {
        let dir = self.session_dir(session_id)?;
        if !is_dir(&dir).await {
            return Err(StorageError::SessionNotFound(session_id.to_string()));
        }
        Ok(dir)
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

/// Reject anything that is not a single plain path component.
fn validate_component(name: &str) -> StorageResult<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.chars().any(|c| matches!(c, '/' | '\\' | '\0'));
    if invalid {
        return Err(StorageError::InvalidFileName(name.to_string()));
    }
    Ok(())
}
