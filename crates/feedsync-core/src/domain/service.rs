//! Remote service identification
//!
//! Every token, user record and sync backend is keyed by a [`ServiceType`],
//! which allows several backends to be signed in at the same time.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// How a remote service stores the user's reading state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Generic file store holding a single snapshot file (upload/download/list/delete)
    FileStore,
    /// RSS aggregator exposing feed and entry level operations
    Account,
}

/// A remote synchronization target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    /// Dropbox file store
    Dropbox,
    /// Miniflux aggregator
    Miniflux,
}

impl ServiceType {
    /// All known services, in declaration order
    pub const ALL: [ServiceType; 2] = [ServiceType::Dropbox, ServiceType::Miniflux];

    /// Returns the backend kind of this service
    pub fn kind(&self) -> BackendKind {
        match self {
            ServiceType::Dropbox => BackendKind::FileStore,
            ServiceType::Miniflux => BackendKind::Account,
        }
    }

    /// Selection priority when several services are signed in (higher wins)
    pub fn priority(&self) -> u8 {
        match self {
            ServiceType::Miniflux => 2,
            ServiceType::Dropbox => 1,
        }
    }

    /// Stable identifier used in storage and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::Dropbox => "dropbox",
            ServiceType::Miniflux => "miniflux",
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dropbox" => Ok(ServiceType::Dropbox),
            "miniflux" => Ok(ServiceType::Miniflux),
            other => Err(DomainError::UnknownService(other.to_string())),
        }
    }
}

/// Outcome of the last full synchronization, persisted in settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Failure,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Failure => "failure",
        }
    }
}

impl FromStr for SyncStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(SyncStatus::Success),
            "failure" => Ok(SyncStatus::Failure),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown sync status: {other}"
            ))),
        }
    }
}
