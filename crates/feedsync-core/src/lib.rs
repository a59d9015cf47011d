//! FeedSync Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `Feed`, `FeedGroup`, `Post`, `BlockedWord`, `User`, `Library`
//! - **Port definitions** - Traits for adapters: `IRssRepository`, `IUserRepository`,
//!   `IOAuthTokenProvider`, `IFileCloudServiceProvider`, `IFeedFetcher`, `IAggregatorApi`
//! - **Configuration** - YAML-backed settings with validation
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains plain data and pure rules with no I/O.
//! Ports define trait interfaces that adapter crates (`feedsync-store`,
//! `feedsync-cloud`) implement and that `feedsync-sync` orchestrates.

pub mod config;
pub mod domain;
pub mod ports;
