//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! such as unknown identifiers and validation failures.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The service name is not one of the supported backends
    #[error("Unknown service: {0}")]
    UnknownService(String),

    /// Unknown post flag name
    #[error("Unknown post flag: {0}")]
    UnknownPostFlag(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
