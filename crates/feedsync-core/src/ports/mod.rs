//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync engine
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRssRepository`] - Local feeds, groups, posts and blocked words
//! - [`IUserRepository`] - Per-service user records and their tokens
//! - [`ISettingsRepository`] - Sync-related user preferences and bookkeeping
//! - [`IOAuthTokenProvider`] - Token persistence and sign-in state per service
//! - [`IFileCloudServiceProvider`] - File-based cloud stores (Dropbox)
//! - [`IFeedFetcher`] / [`IAggregatorApi`] - Sources of fresh posts
//! - [`INotificationService`] - User-facing notifications
//! - [`IFailureReporter`] - Crash/telemetry channel for unexpected failures

pub mod cloud_provider;
pub mod failure_reporter;
pub mod feed_source;
pub mod notification;
pub mod rss_repository;
pub mod settings_repository;
pub mod token_provider;
pub mod user_repository;

pub use cloud_provider::{FileDownload, IFileCloudServiceProvider};
pub use failure_reporter::IFailureReporter;
pub use feed_source::{FeedPayload, IAggregatorApi, IFeedFetcher, PostPayload, Subscription};
pub use notification::{INotificationService, Notification, NotificationPriority};
pub use rss_repository::IRssRepository;
pub use settings_repository::ISettingsRepository;
pub use token_provider::IOAuthTokenProvider;
pub use user_repository::IUserRepository;
