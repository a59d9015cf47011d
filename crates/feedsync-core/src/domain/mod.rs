//! Domain entities and business logic
//!
//! This module contains the core domain types for FeedSync:
//! - Remote service identification (`ServiceType`, `BackendKind`)
//! - Reading-state entities: feeds, groups, posts, blocked words
//! - The signed-in user record, scoped per service
//! - `Library`, the aggregate exported and applied by a repository
//! - Domain-specific error types

pub mod blocked_word;
pub mod errors;
pub mod feed;
pub mod group;
pub mod library;
pub mod post;
pub mod service;
pub mod user;

// Re-export commonly used types
pub use blocked_word::{name_based_uuid, BlockedWord};
pub use errors::DomainError;
pub use feed::Feed;
pub use group::FeedGroup;
pub use library::Library;
pub use post::{Post, PostFlag};
pub use service::{BackendKind, ServiceType, SyncStatus};
pub use user::User;
