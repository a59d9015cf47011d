//! File cloud service port (driven/secondary port)
//!
//! This module defines the capability surface of a file-based cloud store.
//! The snapshot merge only needs to upload, download, list and delete whole
//! files, so any vendor offering those primitives can back a sync.
//!
//! ## Design Notes
//!
//! - Operations never return errors. Network and authorization failures
//!   are logged by the adapter and surface as `false`, `None` or an empty
//!   list, which keeps the merge logic free of vendor error types.
//!   [`FileDownload`] is the one exception: callers that must not mistake
//!   an outage for a missing file get the three-way outcome.
//! - Sign-in state is reactive so callers can observe login/logout.

use futures_util::stream::BoxStream;

use crate::domain::ServiceType;

/// Outcome of a file download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileDownload {
    Found(Vec<u8>),
    /// The backend confirmed that no file exists at the path
    NotFound,
    /// The request failed; the file may or may not exist
    Failed,
}

impl FileDownload {
    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            FileDownload::Found(bytes) => Some(bytes),
            FileDownload::NotFound | FileDownload::Failed => None,
        }
    }
}

/// Port trait for file-based cloud storage backends
#[async_trait::async_trait]
pub trait IFileCloudServiceProvider: Send + Sync {
    /// The service this provider talks to
    fn service_type(&self) -> ServiceType;

    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Observes whether the user is signed in to this backend
    ///
    /// The stream yields the current value first, then every change.
    fn is_signed_in(&self) -> BoxStream<'static, bool>;

    /// Returns the current sign-in state
    async fn is_signed_in_immediate(&self) -> bool;

    /// Forgets the stored login for this backend
    async fn sign_out(&self);

    /// Uploads `data` to `path`, replacing any existing file
    ///
    /// # Returns
    /// `true` only if the backend confirmed the write
    async fn upload(&self, path: &str, data: Vec<u8>) -> bool;

    /// Downloads the file at `path`, telling a missing file apart from a
    /// failed request
    async fn fetch_file(&self, path: &str) -> FileDownload;

    /// Downloads the file at `path`
    ///
    /// # Returns
    /// The file content, or `None` if the file does not exist or the
    /// request failed
    async fn download(&self, path: &str) -> Option<Vec<u8>> {
        self.fetch_file(path).await.into_bytes()
    }

    /// Lists file paths that start with `prefix`
    ///
    /// # Returns
    /// Matching paths, or an empty list on any failure
    async fn list_files(&self, prefix: &str) -> Vec<String>;

    /// Deletes the file at `path`
    ///
    /// # Returns
    /// `true` if the backend deleted the file. A file that was already
    /// absent yields `false` without being treated as an error.
    async fn delete_file(&self, path: &str) -> bool;
}
