//! CLI command implementations

pub mod auth;
pub mod config;
pub mod feed;
pub mod report;
pub mod settings;
pub mod status;
pub mod sync;

use clap::ValueEnum;
use feedsync_core::domain::ServiceType;

/// Service names accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ServiceArg {
    Dropbox,
    Miniflux,
}

impl From<ServiceArg> for ServiceType {
    fn from(arg: ServiceArg) -> Self {
        match arg {
            ServiceArg::Dropbox => ServiceType::Dropbox,
            ServiceArg::Miniflux => ServiceType::Miniflux,
        }
    }
}
